//! JSON blob format shared with the browser build: a pretty-printed array of
//! camelCase customer records.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::CustomerStore;
use crate::customer::Customer;

const TMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
}

/// Writes `customers` to `path` via a temporary sibling and a rename so a
/// crash never leaves a half-written export behind.
pub fn export_customers(path: &Path, customers: &[Customer]) -> Result<()> {
    let json = serde_json::to_vec_pretty(customers).context("serialising customers")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating export directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension(TMP_EXTENSION);
    fs::write(&tmp_path, &json)
        .with_context(|| format!("writing temporary export {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("atomically persisting export {}", path.display()))?;
    tracing::info!(count = customers.len(), path = %path.display(), "exported customers");
    Ok(())
}

pub fn read_customers(path: &Path) -> Result<Vec<Customer>> {
    let raw = fs::read(path).with_context(|| format!("reading export {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing export {}", path.display()))
}

/// Restores every record from an export; records whose id already exists
/// are skipped.
pub fn import_customers<S>(store: &S, path: &Path) -> Result<ImportOutcome>
where
    S: CustomerStore + ?Sized,
{
    let customers = read_customers(path)?;
    let mut outcome = ImportOutcome::default();
    for customer in &customers {
        if store
            .restore_customer(customer)
            .with_context(|| format!("importing customer {}", customer.id))?
        {
            outcome.imported += 1;
        } else {
            tracing::debug!(id = %customer.id, "customer already present, skipping");
            outcome.skipped += 1;
        }
    }
    Ok(outcome)
}
