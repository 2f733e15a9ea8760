use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::customer::Customer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SortField {
    #[default]
    CustomerId,
    Name,
}

pub fn sort_customers<'a, I>(customers: I, field: SortField) -> Vec<&'a Customer>
where
    I: IntoIterator<Item = &'a Customer>,
{
    match field {
        SortField::CustomerId => sort_by_customer_id(customers),
        SortField::Name => sort_by_name(customers),
    }
}

/// Ascending display id; records without one sort as id 0.
pub fn sort_by_customer_id<'a, I>(customers: I) -> Vec<&'a Customer>
where
    I: IntoIterator<Item = &'a Customer>,
{
    let mut sorted: Vec<&Customer> = customers.into_iter().collect();
    sorted.sort_by_key(|customer| customer.customer_id.unwrap_or(0));
    sorted
}

pub fn sort_by_name<'a, I>(customers: I) -> Vec<&'a Customer>
where
    I: IntoIterator<Item = &'a Customer>,
{
    let mut sorted: Vec<&Customer> = customers.into_iter().collect();
    sorted.sort_by(|a, b| collate(&a.full_name, &b.full_name));
    sorted
}

/// Dictionary-style comparison. Letters compare with accents and case
/// folded away first, so `Émile` files under E. Ties fall back to unaccented
/// before accented, then lowercase before uppercase.
pub fn collate(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| {
            a.nfd()
                .flat_map(char::to_lowercase)
                .cmp(b.nfd().flat_map(char::to_lowercase))
        })
        .then_with(|| {
            a.chars()
                .map(case_weight)
                .cmp(b.chars().map(case_weight))
        })
}

fn base_letters(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
}

fn case_weight(ch: char) -> u8 {
    if ch.is_uppercase() {
        1
    } else {
        0
    }
}
