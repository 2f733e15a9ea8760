use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use strum::IntoEnumIterator;
use time::OffsetDateTime;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{build_list_view, ActionDispatcher, CustomerSummary, ListOptions, ListView};
use crate::config::{AppConfig, ConfigPaths};
use crate::customer::{Customer, CustomerUpdate, NewCustomer, ReminderInterval};
use crate::dates;
use crate::reminders::{
    classify_reminder_category, compute_schedule_status, count_by_category, CategoryCounts,
    CategoryFilter, ReminderCategory,
};
use crate::sorting::SortField;
use crate::storage::{snapshot, CustomerStore, StorageHandle};

const NAME_WIDTH: usize = 22;
const EXPORT_FILE: &str = "customers.json";

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Search terms (supports interest:<name> and visited:<from>..<to>)
    #[arg()]
    pub query: Vec<String>,
    /// Reminder category: all, yet-to-send, sent-today, 3-days, 7-days, 2-weeks, 4-weeks
    #[arg(long)]
    pub category: Option<CategoryFilter>,
    /// Sort order: customer-id or name (defaults to the configured order)
    #[arg(long)]
    pub sort: Option<SortField>,
    /// Print one list instead of date sections
    #[arg(long)]
    pub flat: bool,
    /// Limit the number of customers printed
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Customer full name (prompted if omitted)
    #[arg()]
    pub name: Option<String>,
    /// Mobile number; reminders need it to normalize to 10 digits
    #[arg(long, default_value = "")]
    pub mobile: String,
    /// Service interest, repeat for several
    #[arg(long = "interest")]
    pub interests: Vec<String>,
    /// Free-text preferences note
    #[arg(long, default_value = "")]
    pub preferences: String,
    /// Visit date (yyyy-mm-dd or ISO date-time), defaults to today
    #[arg(long)]
    pub visit: Option<String>,
    /// Reminder interval: today, 1week, 2weeks, 3weeks, 4weeks, none
    #[arg(long)]
    pub interval: Option<ReminderInterval>,
}

#[derive(Args, Debug, Clone)]
pub struct NumberArgs {
    /// Customer number
    pub number: i64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    /// Customer number
    pub number: i64,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub mobile: Option<String>,
    /// Replace the interests, repeat for several
    #[arg(long = "interest")]
    pub interests: Vec<String>,
    /// Remove every interest
    #[arg(long, conflicts_with = "interests")]
    pub clear_interests: bool,
    #[arg(long)]
    pub preferences: Option<String>,
    /// New visit date; the reminder date is derived again
    #[arg(long)]
    pub visit: Option<String>,
    /// Forget the visit date
    #[arg(long, conflicts_with = "visit")]
    pub clear_visit: bool,
    #[arg(long)]
    pub interval: Option<ReminderInterval>,
}

#[derive(Args, Debug, Clone)]
pub struct RemindArgs {
    /// Customer number
    pub number: i64,
    /// The message that was sent over WhatsApp
    #[arg(long, short)]
    pub message: String,
}

#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// JSON file (defaults to customers.json in the export directory)
    pub path: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ServiceCommand {
    /// Add a service to the end of the catalog
    Add(ServiceNameArgs),
    /// List the catalog in display order
    List,
    /// Remove a service
    Remove(ServiceNameArgs),
    /// Rename a service
    Rename(ServiceRenameArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServiceNameArgs {
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct ServiceRenameArgs {
    pub from: String,
    pub to: String,
}

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    #[command(subcommand)]
    pub command: ServiceCommand,
}

pub fn list_customers(
    config: &AppConfig,
    storage: &dyn CustomerStore,
    args: ListArgs,
    now: OffsetDateTime,
) -> Result<String> {
    let customers = storage.list_customers().context("loading customers")?;
    let options = ListOptions {
        search: args.query.join(" "),
        category: args.category.unwrap_or(CategoryFilter::All),
        sort: args.sort.unwrap_or(config.default_sort),
        grouped: config.group_by_date && !args.flat,
        limit: args.limit.unwrap_or(config.search.max_results),
    };
    let view = build_list_view(&customers, &options, now);
    Ok(render_list(&view))
}

pub fn add_customer(
    config: &AppConfig,
    storage: &dyn CustomerStore,
    args: AddArgs,
    now: OffsetDateTime,
) -> Result<String> {
    let name = match args.name {
        Some(name) => name,
        None => prompt("Name")?,
    };
    let new = NewCustomer {
        full_name: name,
        mobile_number: args.mobile,
        interest: args.interests.into_iter().collect(),
        preferences: args.preferences,
        visiting_date: Some(
            args.visit
                .unwrap_or_else(|| dates::day_key(now.date())),
        ),
        reminder_interval: args.interval.unwrap_or(config.default_interval),
    };
    let customer = ActionDispatcher::new(storage)
        .register(new, now)
        .context("adding customer")?;

    let mut out = String::new();
    let _ = writeln!(
        &mut out,
        "Added customer #{} {}",
        customer.customer_id.unwrap_or(0),
        customer.full_name
    );
    if let Some(reminder) = &customer.reminder_date {
        let _ = writeln!(&mut out, "    reminder due {reminder}");
    }
    if !customer.is_reminder_eligible() {
        let _ = writeln!(
            &mut out,
            "    note: mobile number is not 10 digits, reminders cannot be recorded"
        );
    }
    Ok(out)
}

pub fn show_customer(
    storage: &dyn CustomerStore,
    args: NumberArgs,
    now: OffsetDateTime,
) -> Result<String> {
    let customer = ActionDispatcher::new(storage).customer(args.number)?;
    Ok(render_customer(&customer, now))
}

pub fn edit_customer(
    storage: &dyn CustomerStore,
    args: EditArgs,
    now: OffsetDateTime,
) -> Result<String> {
    let updates = edit_updates(&args);
    if updates.is_empty() {
        bail!("nothing to change; pass at least one field flag");
    }
    let customer = ActionDispatcher::new(storage).update(args.number, updates, now)?;
    let mut out = format!("Updated customer #{}\n", args.number);
    out.push_str(&render_customer(&customer, now));
    Ok(out)
}

fn edit_updates(args: &EditArgs) -> Vec<CustomerUpdate> {
    let mut updates = Vec::new();
    if let Some(name) = &args.name {
        updates.push(CustomerUpdate::Rename {
            full_name: name.clone(),
        });
    }
    if let Some(mobile) = &args.mobile {
        updates.push(CustomerUpdate::SetMobile {
            mobile_number: mobile.clone(),
        });
    }
    if args.clear_interests || !args.interests.is_empty() {
        updates.push(CustomerUpdate::SetInterest {
            interest: args.interests.iter().cloned().collect(),
        });
    }
    if let Some(preferences) = &args.preferences {
        updates.push(CustomerUpdate::SetPreferences {
            preferences: preferences.clone(),
        });
    }
    if let Some(interval) = args.interval {
        updates.push(CustomerUpdate::SetReminderInterval { interval });
    }
    if args.clear_visit || args.visit.is_some() {
        updates.push(CustomerUpdate::Reschedule {
            visiting_date: args.visit.clone(),
        });
    }
    updates
}

pub fn remind_customer(
    storage: &dyn CustomerStore,
    args: RemindArgs,
    now: OffsetDateTime,
) -> Result<String> {
    let customer =
        ActionDispatcher::new(storage).record_reminder(args.number, &args.message, now)?;
    Ok(format!(
        "Recorded reminder #{} for #{} {} ({})\n",
        customer.reminder_history.len(),
        args.number,
        customer.full_name,
        customer.normalized_mobile().unwrap_or_default()
    ))
}

pub fn category_counts(storage: &dyn CustomerStore, now: OffsetDateTime) -> Result<String> {
    let customers = storage.list_customers().context("loading customers")?;
    let counts = count_by_category(&customers, now);
    Ok(render_counts(&counts, customers.len()))
}

pub fn due_customers(storage: &dyn CustomerStore, now: OffsetDateTime) -> Result<String> {
    let due = ActionDispatcher::new(storage).due(now)?;
    if due.is_empty() {
        return Ok("No reminders due.\n".to_string());
    }
    let mut out = String::new();
    for (customer, status) in due {
        let _ = writeln!(
            &mut out,
            "{:<5} {} {:<12} {:<8} {}",
            format!("#{}", customer.customer_id.unwrap_or(0)),
            pad(&customer.full_name, NAME_WIDTH),
            customer.mobile_number,
            status.as_ref(),
            customer.reminder_date.as_deref().unwrap_or("-")
        );
    }
    Ok(out)
}

pub fn delete_customer(storage: &dyn CustomerStore, args: NumberArgs) -> Result<String> {
    let removed = ActionDispatcher::new(storage).delete(args.number)?;
    Ok(format!(
        "Deleted customer #{} ({})\n",
        args.number, removed.full_name
    ))
}

pub fn handle_service_command(
    storage: &StorageHandle,
    args: ServiceArgs,
    now: OffsetDateTime,
) -> Result<String> {
    match args.command {
        ServiceCommand::Add(args) => {
            storage
                .add_service(&args.name, now)
                .with_context(|| format!("adding service '{}'", args.name))?;
            Ok(format!("Added service '{}'\n", args.name.trim()))
        }
        ServiceCommand::List => {
            let services = storage.list_services()?;
            if services.is_empty() {
                return Ok("(no services)\n".to_string());
            }
            let mut out = String::new();
            for service in services {
                let _ = writeln!(&mut out, "{:>3}. {}", service.position, service.name);
            }
            Ok(out)
        }
        ServiceCommand::Remove(args) => {
            if !storage.remove_service(&args.name)? {
                bail!("service '{}' not found", args.name.trim());
            }
            Ok(format!("Removed service '{}'\n", args.name.trim()))
        }
        ServiceCommand::Rename(args) => {
            storage
                .rename_service(&args.from, &args.to)
                .with_context(|| format!("renaming service '{}' to '{}'", args.from, args.to))?;
            Ok(format!(
                "Renamed service '{}' to '{}'\n",
                args.from.trim(),
                args.to.trim()
            ))
        }
    }
}

pub fn export_customers(
    paths: &ConfigPaths,
    storage: &dyn CustomerStore,
    args: PathArgs,
) -> Result<String> {
    let path = args
        .path
        .unwrap_or_else(|| paths.export_dir.join(EXPORT_FILE));
    let customers = storage.list_customers().context("loading customers")?;
    snapshot::export_customers(&path, &customers)?;
    Ok(format!(
        "Exported {} customer{} to {}\n",
        customers.len(),
        if customers.len() == 1 { "" } else { "s" },
        path.display()
    ))
}

pub fn import_customers(
    paths: &ConfigPaths,
    storage: &dyn CustomerStore,
    args: PathArgs,
) -> Result<String> {
    let path = args
        .path
        .unwrap_or_else(|| paths.export_dir.join(EXPORT_FILE));
    let outcome = snapshot::import_customers(storage, &path)?;
    Ok(format!(
        "Imported {} customer{}, skipped {} already present\n",
        outcome.imported,
        if outcome.imported == 1 { "" } else { "s" },
        outcome.skipped
    ))
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn render_list(view: &ListView) -> String {
    if view.is_empty() {
        return format!("No customers found ({} in book).\n", view.total);
    }
    let mut out = String::new();
    for section in &view.sections {
        if let Some(label) = &section.label {
            let _ = writeln!(&mut out, "{label} ({})", section.customers.len());
        }
        for summary in &section.customers {
            let _ = writeln!(&mut out, "  {}", render_row(summary));
        }
        out.push('\n');
    }
    let _ = writeln!(
        &mut out,
        "showing {} of {} matching, {} in book",
        view.shown, view.matched, view.total
    );
    out
}

fn render_row(summary: &CustomerSummary) -> String {
    format!(
        "{:<5} {} {:<12} {:<12} {}",
        format!("#{}", summary.number),
        pad(&summary.full_name, NAME_WIDTH),
        summary.mobile_number,
        category_tag(summary.category),
        summary.status.as_ref()
    )
}

fn render_customer(customer: &Customer, now: OffsetDateTime) -> String {
    let mut out = String::new();
    let _ = writeln!(
        &mut out,
        "#{} {}",
        customer.customer_id.unwrap_or(0),
        customer.full_name
    );
    let interests = if customer.interest.is_empty() {
        "-".to_string()
    } else {
        customer
            .interest
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    let fields = [
        ("mobile", or_dash(&customer.mobile_number)),
        ("interests", interests),
        ("preferences", or_dash(&customer.preferences)),
        (
            "visited",
            or_dash(customer.visiting_date.as_deref().unwrap_or_default()),
        ),
        ("interval", customer.reminder_interval.to_string()),
        (
            "reminder",
            match &customer.reminder_date {
                Some(date) => format!("{date} ({})", compute_schedule_status(customer, now)),
                None => "-".to_string(),
            },
        ),
        (
            "category",
            category_tag(classify_reminder_category(customer, now)).to_string(),
        ),
    ];
    for (label, value) in fields {
        let _ = writeln!(&mut out, "    {label:<12} {value}");
    }
    if customer.reminder_history.is_empty() {
        let _ = writeln!(&mut out, "    history      (no reminders sent)");
    } else {
        let _ = writeln!(&mut out, "    history");
        for entry in &customer.reminder_history {
            let _ = writeln!(&mut out, "      {}  {}", entry.sent_at, entry.message);
        }
    }
    out
}

fn render_counts(counts: &CategoryCounts, total: usize) -> String {
    let mut out = String::new();
    for category in ReminderCategory::iter() {
        let _ = writeln!(&mut out, "{:<12} {}", category.as_ref(), counts.get(category));
    }
    let _ = writeln!(
        &mut out,
        "{:<12} {}",
        "uncounted",
        total.saturating_sub(counts.total())
    );
    let _ = writeln!(&mut out, "{:<12} {}", "total", total);
    out
}

fn category_tag(category: Option<ReminderCategory>) -> &'static str {
    match category {
        Some(category) => category.into(),
        None => "-",
    }
}

fn or_dash(value: &str) -> String {
    if value.trim().is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Pads or truncates to `width` terminal columns.
fn pad(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    if UnicodeWidthStr::width(text) > width {
        for ch in text.chars() {
            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
            if used + ch_width + 1 > width {
                break;
            }
            out.push(ch);
            used += ch_width;
        }
        out.push('…');
        used += 1;
    } else {
        out.push_str(text);
        used = UnicodeWidthStr::width(text);
    }
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(used)));
    out
}
