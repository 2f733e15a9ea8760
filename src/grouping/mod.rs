use std::cmp::Ordering;

use indexmap::IndexMap;
use time::{Date, OffsetDateTime};

use crate::customer::Customer;
use crate::dates;

pub const TODAY: &str = "Today";
pub const YESTERDAY: &str = "Yesterday";
pub const UNKNOWN_DATE: &str = "Unknown Date";

pub type DateGroups<'a> = IndexMap<String, Vec<&'a Customer>>;

/// Section label for a raw visit/creation timestamp relative to `now`'s
/// calendar day.
pub fn group_label(raw: &str, now: OffsetDateTime) -> String {
    let Some(at) = dates::parse_instant(raw, now.offset()) else {
        return UNKNOWN_DATE.to_string();
    };
    let day = at.date();
    let today = now.date();
    if day == today {
        TODAY.to_string()
    } else if today.previous_day() == Some(day) {
        YESTERDAY.to_string()
    } else {
        dates::format_label(day)
    }
}

/// Buckets customers by display date. Labels keep first-appearance order and
/// customers keep input order within a label; use [`order_group_labels`] or
/// [`sort_groups`] for display order.
pub fn group_by_display_date<'a, I>(customers: I, now: OffsetDateTime) -> DateGroups<'a>
where
    I: IntoIterator<Item = &'a Customer>,
{
    let mut groups = DateGroups::new();
    for customer in customers {
        groups
            .entry(group_label(customer.display_date(), now))
            .or_default()
            .push(customer);
    }
    groups
}

pub fn order_group_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let mut ordered: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
    ordered.sort_by(|a, b| compare_labels(a, b));
    ordered
}

pub fn sort_groups(groups: &mut DateGroups<'_>) {
    groups.sort_by(|a, _, b, _| compare_labels(a, b));
}

/// Today, Yesterday, dated labels newest first, labels that do not parse,
/// then Unknown Date.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    let (rank_a, date_a) = label_rank(a);
    let (rank_b, date_b) = label_rank(b);
    match rank_a.cmp(&rank_b) {
        Ordering::Equal => match (date_a, date_b) {
            (Some(a), Some(b)) => b.cmp(&a),
            _ => Ordering::Equal,
        },
        other => other,
    }
}

fn label_rank(label: &str) -> (u8, Option<Date>) {
    match label {
        TODAY => (0, None),
        YESTERDAY => (1, None),
        UNKNOWN_DATE => (4, None),
        other => match dates::parse_label(other) {
            Some(date) => (2, Some(date)),
            None => (3, None),
        },
    }
}
