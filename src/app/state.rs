use time::OffsetDateTime;

use crate::customer::Customer;
use crate::grouping::{group_by_display_date, sort_groups};
use crate::reminders::{
    classify_reminder_category, compute_schedule_status, count_by_category, filter_by_category,
    CategoryCounts, CategoryFilter, ReminderCategory, ScheduleStatus,
};
use crate::search::{filter_customers, parse_query};
use crate::sorting::{sort_customers, SortField};

/// Flattened, render-ready view of one customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSummary {
    pub id: String,
    pub number: i64,
    pub full_name: String,
    pub mobile_number: String,
    pub interests: Vec<String>,
    pub display_date: String,
    pub category: Option<ReminderCategory>,
    pub status: ScheduleStatus,
    pub reminder_date: Option<String>,
    pub last_sent: Option<String>,
    pub reminders_sent: usize,
}

impl CustomerSummary {
    pub fn from_customer(customer: &Customer, now: OffsetDateTime) -> Self {
        Self {
            id: customer.id.clone(),
            number: customer.customer_id.unwrap_or(0),
            full_name: customer.full_name.clone(),
            mobile_number: customer.mobile_number.clone(),
            interests: customer.interest.iter().cloned().collect(),
            display_date: customer.display_date().to_string(),
            category: classify_reminder_category(customer, now),
            status: compute_schedule_status(customer, now),
            reminder_date: customer.reminder_date.clone(),
            last_sent: customer.last_reminder().map(|entry| entry.sent_at.clone()),
            reminders_sent: customer.reminder_history.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub search: String,
    pub category: CategoryFilter,
    pub sort: SortField,
    pub grouped: bool,
    pub limit: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: CategoryFilter::All,
            sort: SortField::CustomerId,
            grouped: true,
            limit: usize::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSection {
    /// Date group label, `None` for an ungrouped listing.
    pub label: Option<String>,
    pub customers: Vec<CustomerSummary>,
}

#[derive(Debug, Clone)]
pub struct ListView {
    pub sections: Vec<ListSection>,
    /// Per-category counts over the whole book, ignoring filters.
    pub counts: CategoryCounts,
    pub total: usize,
    pub matched: usize,
    pub shown: usize,
}

impl ListView {
    pub fn is_empty(&self) -> bool {
        self.shown == 0
    }
}

/// search -> category -> sort -> (group) over an in-memory customer list.
pub fn build_list_view(customers: &[Customer], options: &ListOptions, now: OffsetDateTime) -> ListView {
    let query = parse_query(&options.search);
    let searched = filter_customers(customers, &query, now);
    let filtered = filter_by_category(searched, options.category, now);
    let mut sorted = sort_customers(filtered, options.sort);
    let matched = sorted.len();
    sorted.truncate(options.limit);
    let shown = sorted.len();

    let sections = if options.grouped {
        let mut groups = group_by_display_date(sorted, now);
        sort_groups(&mut groups);
        groups
            .into_iter()
            .map(|(label, members)| ListSection {
                label: Some(label),
                customers: members
                    .into_iter()
                    .map(|customer| CustomerSummary::from_customer(customer, now))
                    .collect(),
            })
            .collect()
    } else if sorted.is_empty() {
        Vec::new()
    } else {
        vec![ListSection {
            label: None,
            customers: sorted
                .into_iter()
                .map(|customer| CustomerSummary::from_customer(customer, now))
                .collect(),
        }]
    };

    ListView {
        sections,
        counts: count_by_category(customers, now),
        total: customers.len(),
        matched,
        shown,
    }
}
