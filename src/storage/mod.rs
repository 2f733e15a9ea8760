use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rusqlite::config::DbConfig;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::{ConfigPaths, StorageOptions};
use crate::customer::{normalize_interest, Customer, NewCustomer, ReminderEntry, ReminderInterval};
use crate::dates;
use crate::reminders::compute_reminder_date;

mod memory;
mod schema;
pub mod snapshot;

pub use memory::MemoryStore;

const SERVICE_NAME_LIMIT: usize = 64;
const DEFAULT_SERVICES: [&str; 5] = ["Haircut", "Hair Colour", "Facial", "Manicure", "Pedicure"];

/// Persistence port for customer records. Implementations own record
/// lifetime; callers load, mutate in memory and save explicitly.
pub trait CustomerStore {
    fn list_customers(&self) -> Result<Vec<Customer>>;

    fn fetch_customer(&self, id: &str) -> Result<Option<Customer>>;

    /// Registers a customer, assigning `id`, the next display number and
    /// both timestamps.
    fn insert_customer(&self, new: NewCustomer, now: OffsetDateTime) -> Result<Customer>;

    /// Inserts a record exported elsewhere, keeping its id and reminder
    /// history. Returns `false` when a record with that id already exists.
    fn restore_customer(&self, customer: &Customer) -> Result<bool>;

    fn save_customer(&self, customer: &Customer) -> Result<()>;

    fn delete_customer(&self, id: &str) -> Result<bool>;

    fn find_by_number(&self, number: i64) -> Result<Option<Customer>> {
        Ok(self
            .list_customers()?
            .into_iter()
            .find(|customer| customer.customer_id == Some(number)))
    }
}

/// Validates a registration and builds the stored record.
pub fn build_customer(new: NewCustomer, customer_id: i64, now: OffsetDateTime) -> Result<Customer> {
    let full_name = new.full_name.trim();
    if full_name.is_empty() {
        bail!("customer name cannot be empty");
    }
    let visiting_date = match new.visiting_date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            if dates::parse_instant(raw, now.offset()).is_none() {
                bail!("visit date '{raw}' is not a valid date");
            }
            Some(raw.to_string())
        }
        _ => None,
    };
    let reminder_date = visiting_date
        .as_deref()
        .and_then(|visit| compute_reminder_date(visit, new.reminder_interval));
    let stamp = dates::format_instant(now);
    Ok(Customer {
        id: Uuid::new_v4().to_string(),
        customer_id: Some(customer_id),
        full_name: full_name.to_string(),
        mobile_number: new.mobile_number.trim().to_string(),
        interest: normalize_interest(new.interest),
        preferences: new.preferences.trim().to_string(),
        visiting_date,
        created_at: stamp.clone(),
        updated_at: stamp,
        reminder_interval: new.reminder_interval,
        reminder_date,
        reminder_sent_dates: Default::default(),
        reminder_history: Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub id: i64,
    pub name: String,
    pub position: i64,
    pub created_at: String,
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, position, created_at FROM services ORDER BY position, id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ServiceRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    position: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
                .context("fetching services")
        })
    }

    pub fn add_service(&self, name: &str, now: OffsetDateTime) -> Result<i64> {
        let mut name = name.trim().to_string();
        if name.is_empty() {
            bail!("service name cannot be empty");
        }
        if name.chars().count() > SERVICE_NAME_LIMIT {
            name = name.chars().take(SERVICE_NAME_LIMIT).collect();
        }
        self.with_connection(|conn| {
            if service_id(conn, &name)?.is_some() {
                bail!("service '{name}' already exists");
            }
            let position: i64 = conn.query_row(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM services",
                [],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO services (name, position, created_at) VALUES (?1, ?2, ?3)",
                params![name, position, dates::format_instant(now)],
            )
            .context("inserting service")?;
            tracing::info!(service = %name, position, "added service");
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn rename_service(&self, current: &str, new_name: &str) -> Result<()> {
        let from = current.trim();
        let to = new_name.trim();
        if from.is_empty() || to.is_empty() {
            bail!("service names cannot be empty");
        }
        self.with_connection(|conn| {
            let Some(id) = service_id(conn, from)? else {
                bail!("service '{from}' not found");
            };
            if let Some(existing) = service_id(conn, to)? {
                if existing != id {
                    bail!("service '{to}' already exists");
                }
            }
            conn.execute(
                "UPDATE services SET name = ?1 WHERE id = ?2",
                params![to, id],
            )
            .context("renaming service")?;
            Ok(())
        })
    }

    pub fn remove_service(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            bail!("service name cannot be empty");
        }
        self.with_connection(|conn| {
            let removed = conn
                .execute("DELETE FROM services WHERE name = ?1", params![name])
                .context("deleting service")?;
            Ok(removed > 0)
        })
    }

    fn next_customer_number(conn: &Connection) -> Result<i64> {
        conn.query_row(
            "SELECT COALESCE(MAX(customer_id), 0) + 1 FROM customers",
            [],
            |row| row.get(0),
        )
        .context("allocating customer number")
    }
}

impl CustomerStore for StorageHandle {
    fn list_customers(&self) -> Result<Vec<Customer>> {
        self.with_connection(|conn| load_customers(conn, None))
    }

    fn fetch_customer(&self, id: &str) -> Result<Option<Customer>> {
        self.with_connection(|conn| Ok(load_customers(conn, Some(id))?.into_iter().next()))
    }

    fn insert_customer(&self, new: NewCustomer, now: OffsetDateTime) -> Result<Customer> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let number = Self::next_customer_number(&tx)?;
        let customer = build_customer(new, number, now)?;
        insert_row(&tx, &customer)?;
        write_children(&tx, &customer)?;
        tx.commit()?;
        tracing::info!(id = %customer.id, number, "registered customer");
        Ok(customer)
    }

    fn restore_customer(&self, customer: &Customer) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM customers WHERE id = ?1",
                params![customer.id],
                |_row| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Ok(false);
        }
        let mut record = customer.clone();
        record.refresh_reminder_date();
        let taken = match record.customer_id {
            Some(number) => tx
                .query_row(
                    "SELECT 1 FROM customers WHERE customer_id = ?1",
                    params![number],
                    |_row| Ok(()),
                )
                .optional()?
                .is_some(),
            None => true,
        };
        if taken {
            record.customer_id = Some(Self::next_customer_number(&tx)?);
        }
        insert_row(&tx, &record)?;
        write_children(&tx, &record)?;
        tx.commit()?;
        Ok(true)
    }

    fn save_customer(&self, customer: &Customer) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let updated = tx
            .execute(
                "UPDATE customers
                 SET full_name = ?1,
                     mobile_number = ?2,
                     preferences = ?3,
                     visiting_date = ?4,
                     updated_at = ?5,
                     reminder_interval = ?6,
                     reminder_date = ?7
                 WHERE id = ?8",
                params![
                    customer.full_name,
                    customer.mobile_number,
                    customer.preferences,
                    customer.visiting_date,
                    customer.updated_at,
                    customer.reminder_interval.as_ref(),
                    customer.reminder_date,
                    customer.id,
                ],
            )
            .context("updating customer")?;
        if updated == 0 {
            bail!("customer {} not found", customer.id);
        }
        write_children(&tx, customer)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_customer(&self, id: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn
                .execute("DELETE FROM customers WHERE id = ?1", params![id])
                .context("deleting customer")?;
            if removed > 0 {
                tracing::info!(%id, "deleted customer");
            }
            Ok(removed > 0)
        })
    }

    fn find_by_number(&self, number: i64) -> Result<Option<Customer>> {
        self.with_connection(|conn| {
            let id: Option<String> = conn
                .query_row(
                    "SELECT id FROM customers WHERE customer_id = ?1",
                    params![number],
                    |row| row.get(0),
                )
                .optional()
                .context("looking up customer number")?;
            match id {
                Some(id) => Ok(load_customers(conn, Some(&id))?.into_iter().next()),
                None => Ok(None),
            }
        })
    }
}

fn service_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM services WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
    .context("looking up service")
}

fn insert_row(conn: &Connection, customer: &Customer) -> Result<()> {
    conn.execute(
        "INSERT INTO customers (
             id, customer_id, full_name, mobile_number, preferences, visiting_date,
             created_at, updated_at, reminder_interval, reminder_date
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            customer.id,
            customer.customer_id,
            customer.full_name,
            customer.mobile_number,
            customer.preferences,
            customer.visiting_date,
            customer.created_at,
            customer.updated_at,
            customer.reminder_interval.as_ref(),
            customer.reminder_date,
        ],
    )
    .context("inserting customer")?;
    Ok(())
}

fn write_children(conn: &Connection, customer: &Customer) -> Result<()> {
    conn.execute(
        "DELETE FROM customer_interests WHERE customer_ref = ?1",
        params![customer.id],
    )?;
    for name in &customer.interest {
        conn.execute(
            "INSERT INTO customer_interests (customer_ref, name) VALUES (?1, ?2)",
            params![customer.id, name],
        )
        .context("linking interest")?;
    }

    conn.execute(
        "DELETE FROM reminder_sent_dates WHERE customer_ref = ?1",
        params![customer.id],
    )?;
    for day in &customer.reminder_sent_dates {
        conn.execute(
            "INSERT INTO reminder_sent_dates (customer_ref, day) VALUES (?1, ?2)",
            params![customer.id, day],
        )
        .context("recording reminder day")?;
    }

    let stored: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reminder_history WHERE customer_ref = ?1",
        params![customer.id],
        |row| row.get(0),
    )?;
    let stored = stored as usize;
    if stored > customer.reminder_history.len() {
        bail!(
            "reminder history for customer {} is append-only ({} stored, {} given)",
            customer.id,
            stored,
            customer.reminder_history.len()
        );
    }
    for entry in &customer.reminder_history[stored..] {
        conn.execute(
            "INSERT INTO reminder_history (customer_ref, sent_at, message) VALUES (?1, ?2, ?3)",
            params![customer.id, entry.sent_at, entry.message],
        )
        .context("appending reminder history")?;
    }
    Ok(())
}

fn load_customers(conn: &Connection, only: Option<&str>) -> Result<Vec<Customer>> {
    let filter = if only.is_some() { " WHERE id = ?1" } else { "" };
    let sql = format!(
        "SELECT id, customer_id, full_name, mobile_number, preferences, visiting_date,
                created_at, updated_at, reminder_interval, reminder_date
         FROM customers{filter}
         ORDER BY customer_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut customers = stmt
        .query_map(params_from_iter(only.iter()), customer_from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("querying customers")?;

    let index: HashMap<String, usize> = customers
        .iter()
        .enumerate()
        .map(|(pos, customer)| (customer.id.clone(), pos))
        .collect();

    for (owner, name) in child_rows(conn, "SELECT customer_ref, name FROM customer_interests", only)? {
        if let Some(&pos) = index.get(&owner) {
            customers[pos].interest.insert(name);
        }
    }
    for (owner, day) in child_rows(conn, "SELECT customer_ref, day FROM reminder_sent_dates", only)? {
        if let Some(&pos) = index.get(&owner) {
            customers[pos].reminder_sent_dates.insert(day);
        }
    }

    let history_filter = if only.is_some() { " WHERE customer_ref = ?1" } else { "" };
    let sql = format!(
        "SELECT customer_ref, sent_at, message FROM reminder_history{history_filter} ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(only.iter()), |row| {
        Ok((
            row.get::<_, String>(0)?,
            ReminderEntry {
                sent_at: row.get(1)?,
                message: row.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (owner, entry) = row.context("reading reminder history")?;
        if let Some(&pos) = index.get(&owner) {
            customers[pos].reminder_history.push(entry);
        }
    }
    Ok(customers)
}

fn child_rows(conn: &Connection, select: &str, only: Option<&str>) -> Result<Vec<(String, String)>> {
    let sql = if only.is_some() {
        format!("{select} WHERE customer_ref = ?1")
    } else {
        select.to_string()
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(only.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("querying {select}"))
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    let id: String = row.get(0)?;
    let interval: String = row.get(8)?;
    let reminder_interval = ReminderInterval::from_str(&interval).unwrap_or_else(|_| {
        tracing::warn!(%id, %interval, "unknown reminder interval, treating as none");
        ReminderInterval::None
    });
    Ok(Customer {
        id,
        customer_id: row.get(1)?,
        full_name: row.get(2)?,
        mobile_number: row.get(3)?,
        interest: Default::default(),
        preferences: row.get(4)?,
        visiting_date: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        reminder_interval,
        reminder_date: row.get(9)?,
        reminder_sent_dates: Default::default(),
        reminder_history: Vec::new(),
    })
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &paths.database_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    if !existed && storage.seed_services {
        seed_default_services(&conn)?;
    }
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)
        .context("enabling foreign keys")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

fn seed_default_services(conn: &Connection) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM services LIMIT 1", [], |row| row.get(0))
        .optional()
        .context("checking for existing services")?;
    if existing.is_some() {
        return Ok(());
    }

    tracing::info!("seeding default service catalog");
    let now = dates::format_instant(OffsetDateTime::now_utc());
    for (position, name) in DEFAULT_SERVICES.iter().enumerate() {
        conn.execute(
            "INSERT INTO services (name, position, created_at) VALUES (?1, ?2, ?3)",
            params![name, position as i64 + 1, now],
        )
        .context("inserting seed service")?;
    }
    Ok(())
}
