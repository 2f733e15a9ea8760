use anyhow::{bail, Result};
use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{build_customer, CustomerStore};
use crate::customer::{Customer, NewCustomer};

/// Process-local store, for embedding the client book without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    customers: Mutex<Vec<Customer>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customers(customers: Vec<Customer>) -> Self {
        Self {
            customers: Mutex::new(customers),
        }
    }

    pub fn len(&self) -> usize {
        self.customers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.lock().is_empty()
    }

    fn next_number(customers: &[Customer]) -> i64 {
        customers
            .iter()
            .filter_map(|customer| customer.customer_id)
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl CustomerStore for MemoryStore {
    fn list_customers(&self) -> Result<Vec<Customer>> {
        Ok(self.customers.lock().clone())
    }

    fn fetch_customer(&self, id: &str) -> Result<Option<Customer>> {
        Ok(self
            .customers
            .lock()
            .iter()
            .find(|customer| customer.id == id)
            .cloned())
    }

    fn insert_customer(&self, new: NewCustomer, now: OffsetDateTime) -> Result<Customer> {
        let mut customers = self.customers.lock();
        let customer = build_customer(new, Self::next_number(&customers), now)?;
        customers.push(customer.clone());
        Ok(customer)
    }

    fn restore_customer(&self, customer: &Customer) -> Result<bool> {
        let mut customers = self.customers.lock();
        if customers.iter().any(|existing| existing.id == customer.id) {
            return Ok(false);
        }
        let mut record = customer.clone();
        record.refresh_reminder_date();
        let taken = match record.customer_id {
            Some(number) => customers
                .iter()
                .any(|existing| existing.customer_id == Some(number)),
            None => true,
        };
        if taken {
            record.customer_id = Some(Self::next_number(&customers));
        }
        customers.push(record);
        Ok(true)
    }

    fn save_customer(&self, customer: &Customer) -> Result<()> {
        let mut customers = self.customers.lock();
        let Some(slot) = customers.iter_mut().find(|existing| existing.id == customer.id) else {
            bail!("customer {} not found", customer.id);
        };
        if slot.reminder_history.len() > customer.reminder_history.len() {
            bail!("reminder history for customer {} is append-only", customer.id);
        }
        *slot = customer.clone();
        Ok(())
    }

    fn delete_customer(&self, id: &str) -> Result<bool> {
        let mut customers = self.customers.lock();
        let before = customers.len();
        customers.retain(|customer| customer.id != id);
        Ok(customers.len() != before)
    }
}
