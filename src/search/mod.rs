use std::cmp::{max, min};

use time::{Date, Duration, OffsetDateTime};

use crate::customer::Customer;
use crate::dates;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeFilter {
    pub from: Option<Date>,
    pub to: Option<Date>, // exclusive
}

impl RangeFilter {
    pub fn has_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn merge(&mut self, other: RangeFilter) {
        if let Some(from) = other.from {
            self.from = Some(match self.from {
                Some(existing) => max(existing, from),
                None => from,
            });
        }
        if let Some(to) = other.to {
            self.to = Some(match self.to {
                Some(existing) => min(existing, to),
                None => to,
            });
        }
    }

    pub fn contains(&self, day: Date) -> bool {
        if let Some(from) = self.from {
            if day < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if day >= to {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub interests: Vec<String>,
    pub visited: RangeFilter,
}

impl SearchQuery {
    pub fn has_terms(&self) -> bool {
        !self.terms.is_empty()
    }

    pub fn has_filters(&self) -> bool {
        !self.interests.is_empty() || self.visited.has_range()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_terms() && !self.has_filters()
    }

    pub fn matches(&self, customer: &Customer, now: OffsetDateTime) -> bool {
        if !self.terms.iter().all(|term| term_matches(customer, term)) {
            return false;
        }
        if !self.interests.is_empty() {
            let held: Vec<String> = customer
                .interest
                .iter()
                .map(|interest| interest.to_lowercase())
                .collect();
            if !self.interests.iter().all(|wanted| held.contains(wanted)) {
                return false;
            }
        }
        if self.visited.has_range() {
            let visited_on = customer
                .visiting_date
                .as_deref()
                .and_then(|raw| dates::parse_instant(raw, now.offset()))
                .map(|at| at.date());
            match visited_on {
                Some(day) if self.visited.contains(day) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Search terms are free text; `interest:` and `visited:` prefixes become
/// filters. Terms are matched lowercase.
pub fn parse_query(input: &str) -> SearchQuery {
    let mut query = SearchQuery::default();
    for raw in input.split_whitespace() {
        if let Some(interest) = raw.strip_prefix("interest:") {
            if let Some(value) = sanitize_term(interest) {
                query.interests.push(value);
            }
            continue;
        }
        if let Some(range) = raw.strip_prefix("visited:") {
            let parsed = parse_date_range(range);
            query.visited.merge(parsed);
            continue;
        }
        if let Some(value) = sanitize_term(raw) {
            query.terms.push(value);
        }
    }
    query
}

/// Keeps the customers matching `query`, in input order.
pub fn filter_customers<'a, I>(
    customers: I,
    query: &SearchQuery,
    now: OffsetDateTime,
) -> Vec<&'a Customer>
where
    I: IntoIterator<Item = &'a Customer>,
{
    customers
        .into_iter()
        .filter(|customer| query.matches(customer, now))
        .collect()
}

fn term_matches(customer: &Customer, term: &str) -> bool {
    if customer.full_name.to_lowercase().contains(term)
        || customer.preferences.to_lowercase().contains(term)
    {
        return true;
    }
    let term_digits: String = term.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if !term_digits.is_empty() && term_digits.len() == term.len() {
        let mobile_digits: String = customer
            .mobile_number
            .chars()
            .filter(|ch| ch.is_ascii_digit())
            .collect();
        return mobile_digits.contains(&term_digits);
    }
    false
}

fn sanitize_term(raw: &str) -> Option<String> {
    let term: String = raw
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | '\''))
        .flat_map(char::to_lowercase)
        .collect();
    if term.is_empty() {
        None
    } else {
        Some(term)
    }
}

fn parse_date_range(spec: &str) -> RangeFilter {
    let mut range = RangeFilter::default();
    let parts: Vec<&str> = spec.split("..").collect();
    match parts.as_slice() {
        [single] => {
            if let Some((from, to)) = parse_single_day(single) {
                range.from = Some(from);
                range.to = Some(to);
            }
        }
        [from, to] => {
            if !from.is_empty() {
                if let Some((start, _)) = parse_single_day(from) {
                    range.from = Some(start);
                }
            }
            if !to.is_empty() {
                if let Some((_, end)) = parse_single_day(to) {
                    range.to = Some(end);
                }
            }
        }
        _ => {}
    }
    range
}

fn parse_single_day(input: &str) -> Option<(Date, Date)> {
    let day = dates::parse_day(input)?;
    let next = day.checked_add(Duration::days(1))?;
    Some((day, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::ReminderInterval;
    use std::collections::BTreeSet;
    use time::macros::{date, datetime};

    const NOW: OffsetDateTime = datetime!(2026-10-18 09:00 UTC);

    fn customer(id: &str, name: &str, mobile: &str, interests: &[&str], visit: &str) -> Customer {
        Customer {
            id: id.into(),
            customer_id: None,
            full_name: name.into(),
            mobile_number: mobile.into(),
            interest: interests.iter().map(|s| s.to_string()).collect(),
            preferences: "prefers mornings".into(),
            visiting_date: Some(visit.into()),
            created_at: String::new(),
            updated_at: String::new(),
            reminder_interval: ReminderInterval::None,
            reminder_date: None,
            reminder_sent_dates: BTreeSet::new(),
            reminder_history: Vec::new(),
        }
    }

    #[test]
    fn parses_terms_interests_and_visit_ranges() {
        let query = parse_query("Ana interest:Facial visited:2026-10-01..2026-10-05");
        assert_eq!(query.terms, vec!["ana"]);
        assert_eq!(query.interests, vec!["facial"]);
        assert_eq!(query.visited.from, Some(date!(2026 - 10 - 01)));
        assert_eq!(query.visited.to, Some(date!(2026 - 10 - 06)));
    }

    #[test]
    fn repeated_ranges_narrow_each_other() {
        let query = parse_query("visited:2026-10-01.. visited:..2026-10-10 visited:2026-10-03..");
        assert_eq!(query.visited.from, Some(date!(2026 - 10 - 03)));
        assert_eq!(query.visited.to, Some(date!(2026 - 10 - 11)));
        assert!(parse_query("visited:garbage").is_empty());
    }

    #[test]
    fn filters_by_name_mobile_interest_and_visit_day() {
        let list = vec![
            customer("1", "Ana Silva", "98765 43210", &["Haircut"], "2026-10-02"),
            customer("2", "Bob Stone", "91234 56789", &["Facial", "Haircut"], "2026-10-09"),
            customer("3", "Carla", "90000 00000", &[], "not recorded"),
        ];

        let by_name = filter_customers(&list, &parse_query("silva"), NOW);
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].id, "1");

        let by_mobile = filter_customers(&list, &parse_query("9123456"), NOW);
        assert_eq!(by_mobile.len(), 1);
        assert_eq!(by_mobile[0].id, "2");

        let by_interest = filter_customers(&list, &parse_query("interest:haircut"), NOW);
        assert_eq!(by_interest.len(), 2);

        let by_visit = filter_customers(&list, &parse_query("visited:2026-10-09"), NOW);
        assert_eq!(by_visit.len(), 1);
        assert_eq!(by_visit[0].id, "2");

        let everyone = filter_customers(&list, &parse_query(""), NOW);
        assert_eq!(everyone.len(), 3);

        let preferences = filter_customers(&list, &parse_query("mornings"), NOW);
        assert_eq!(preferences.len(), 3);
    }
}
