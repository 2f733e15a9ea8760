use anyhow::{anyhow, Context, Result};
use time::OffsetDateTime;

use crate::customer::{apply_update, Customer, CustomerUpdate, NewCustomer};
use crate::reminders::{compute_schedule_status, ScheduleStatus};
use crate::sorting::sort_by_customer_id;
use crate::storage::CustomerStore;

pub struct ActionDispatcher<'a, S: CustomerStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CustomerStore + ?Sized> ActionDispatcher<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn register(&self, new: NewCustomer, now: OffsetDateTime) -> Result<Customer> {
        self.store.insert_customer(new, now)
    }

    pub fn customer(&self, number: i64) -> Result<Customer> {
        self.store
            .find_by_number(number)?
            .ok_or_else(|| anyhow!("customer #{number} not found"))
    }

    /// Applies every update in order and saves once; a rejected update
    /// leaves the stored record untouched.
    pub fn update(
        &self,
        number: i64,
        updates: Vec<CustomerUpdate>,
        now: OffsetDateTime,
    ) -> Result<Customer> {
        let mut customer = self.customer(number)?;
        for update in updates {
            apply_update(&mut customer, update, now)
                .with_context(|| format!("updating customer #{number}"))?;
        }
        self.store.save_customer(&customer)?;
        tracing::debug!(number, "customer updated");
        Ok(customer)
    }

    pub fn record_reminder(
        &self,
        number: i64,
        message: &str,
        now: OffsetDateTime,
    ) -> Result<Customer> {
        let customer = self.update(
            number,
            vec![CustomerUpdate::RecordReminderSent {
                sent_at: now,
                message: message.to_string(),
            }],
            now,
        )?;
        tracing::info!(number, "recorded reminder");
        Ok(customer)
    }

    pub fn delete(&self, number: i64) -> Result<Customer> {
        let customer = self.customer(number)?;
        if !self.store.delete_customer(&customer.id)? {
            return Err(anyhow!("customer #{number} disappeared before delete"));
        }
        Ok(customer)
    }

    /// Customers whose reminder is due today and unsent, or already overdue,
    /// by display number.
    pub fn due(&self, now: OffsetDateTime) -> Result<Vec<(Customer, ScheduleStatus)>> {
        let customers = self.store.list_customers()?;
        Ok(sort_by_customer_id(&customers)
            .into_iter()
            .filter_map(|customer| {
                let status = compute_schedule_status(customer, now);
                matches!(status, ScheduleStatus::Pending | ScheduleStatus::Overdue)
                    .then(|| (customer.clone(), status))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::{ReminderInterval, UpdateError};
    use crate::storage::MemoryStore;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-10-18 10:00 UTC);

    fn seeded() -> anyhow::Result<MemoryStore> {
        let store = MemoryStore::new();
        for (name, visit, interval) in [
            ("Ana", "2026-10-18", ReminderInterval::Today),
            ("Bob", "2026-10-10", ReminderInterval::OneWeek),
            ("Carla", "2026-10-18", ReminderInterval::FourWeeks),
        ] {
            store.insert_customer(
                NewCustomer {
                    full_name: name.into(),
                    mobile_number: "9876543210".into(),
                    visiting_date: Some(visit.into()),
                    reminder_interval: interval,
                    ..NewCustomer::default()
                },
                NOW,
            )?;
        }
        Ok(store)
    }

    #[test]
    fn due_lists_pending_and_overdue_only() -> anyhow::Result<()> {
        let store = seeded()?;
        let actions = ActionDispatcher::new(&store);
        let due: Vec<_> = actions
            .due(NOW)?
            .into_iter()
            .map(|(customer, status)| (customer.full_name, status))
            .collect();
        assert_eq!(
            due,
            vec![
                ("Ana".to_string(), ScheduleStatus::Pending),
                ("Bob".to_string(), ScheduleStatus::Overdue),
            ]
        );

        actions.record_reminder(1, "See you today!", NOW)?;
        let due = actions.due(NOW)?;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0.full_name, "Bob");
        Ok(())
    }

    #[test]
    fn failed_update_batch_is_not_saved() -> anyhow::Result<()> {
        let store = seeded()?;
        let actions = ActionDispatcher::new(&store);
        let err = actions
            .update(
                2,
                vec![
                    CustomerUpdate::Rename {
                        full_name: "Robert".into(),
                    },
                    CustomerUpdate::Reschedule {
                        visiting_date: Some("someday".into()),
                    },
                ],
                NOW,
            )
            .expect_err("invalid date must fail");
        assert!(matches!(
            err.downcast_ref::<UpdateError>(),
            Some(UpdateError::InvalidVisitDate(_))
        ));
        assert_eq!(actions.customer(2)?.full_name, "Bob");
        Ok(())
    }

    #[test]
    fn delete_reports_unknown_numbers() -> anyhow::Result<()> {
        let store = seeded()?;
        let actions = ActionDispatcher::new(&store);
        let removed = actions.delete(3)?;
        assert_eq!(removed.full_name, "Carla");
        let err = actions.delete(3).expect_err("already gone");
        assert!(err.to_string().contains("#3 not found"));
        Ok(())
    }
}
