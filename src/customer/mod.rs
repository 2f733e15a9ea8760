use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::reminders::compute_reminder_date;

mod update;

pub use update::{apply_update, CustomerUpdate, UpdateError};

pub const MOBILE_DIGITS: usize = 10;

/// How long after a visit the follow-up reminder falls due.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum ReminderInterval {
    #[serde(rename = "today")]
    #[strum(serialize = "today")]
    Today,
    #[serde(rename = "1week")]
    #[strum(serialize = "1week")]
    OneWeek,
    #[serde(rename = "2weeks")]
    #[strum(serialize = "2weeks")]
    TwoWeeks,
    #[serde(rename = "3weeks")]
    #[strum(serialize = "3weeks")]
    ThreeWeeks,
    #[serde(rename = "4weeks")]
    #[strum(serialize = "4weeks")]
    FourWeeks,
    #[default]
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    None,
}

impl ReminderInterval {
    /// Offset from the visit date, `None` when no reminder is scheduled.
    pub fn days(self) -> Option<i64> {
        match self {
            ReminderInterval::Today => Some(0),
            ReminderInterval::OneWeek => Some(7),
            ReminderInterval::TwoWeeks => Some(14),
            ReminderInterval::ThreeWeeks => Some(21),
            ReminderInterval::FourWeeks => Some(28),
            ReminderInterval::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderEntry {
    pub sent_at: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub customer_id: Option<i64>,
    pub full_name: String,
    #[serde(default)]
    pub mobile_number: String,
    #[serde(default)]
    pub interest: BTreeSet<String>,
    #[serde(default)]
    pub preferences: String,
    #[serde(default)]
    pub visiting_date: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub reminder_interval: ReminderInterval,
    #[serde(default)]
    pub reminder_date: Option<String>,
    #[serde(default)]
    pub reminder_sent_dates: BTreeSet<String>,
    #[serde(default)]
    pub reminder_history: Vec<ReminderEntry>,
}

impl Customer {
    /// Most recent reminder; the history is append-only so the tail wins.
    pub fn last_reminder(&self) -> Option<&ReminderEntry> {
        self.reminder_history.last()
    }

    pub fn normalized_mobile(&self) -> Option<String> {
        normalize_mobile(&self.mobile_number)
    }

    pub fn is_reminder_eligible(&self) -> bool {
        self.normalized_mobile().is_some()
    }

    /// Derives `reminder_date` from the visit date and interval. Never set it
    /// any other way.
    pub fn refresh_reminder_date(&mut self) {
        self.reminder_date = self
            .visiting_date
            .as_deref()
            .and_then(|visit| compute_reminder_date(visit, self.reminder_interval));
    }

    /// Visit date when recorded, otherwise the creation timestamp.
    pub fn display_date(&self) -> &str {
        match self.visiting_date.as_deref() {
            Some(visit) if !visit.trim().is_empty() => visit,
            _ => &self.created_at,
        }
    }
}

/// Data needed to register a customer; the store fills in ids and timestamps.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub full_name: String,
    pub mobile_number: String,
    pub interest: BTreeSet<String>,
    pub preferences: String,
    pub visiting_date: Option<String>,
    pub reminder_interval: ReminderInterval,
}

/// Strips everything but digits; only exactly ten digits qualify.
pub fn normalize_mobile(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if digits.len() == MOBILE_DIGITS {
        Some(digits)
    } else {
        None
    }
}

pub fn normalize_interest<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| value.as_ref().trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn interval_tags_round_trip_through_strum_and_serde() -> anyhow::Result<()> {
        assert_eq!(ReminderInterval::from_str("2weeks")?, ReminderInterval::TwoWeeks);
        assert_eq!(ReminderInterval::OneWeek.to_string(), "1week");
        let json = serde_json::to_string(&ReminderInterval::FourWeeks)?;
        assert_eq!(json, "\"4weeks\"");
        assert_eq!(ReminderInterval::None.days(), None);
        assert_eq!(ReminderInterval::Today.days(), Some(0));
        Ok(())
    }

    #[test]
    fn mobile_normalization_requires_ten_digits() {
        assert_eq!(normalize_mobile("98765 43210"), Some("9876543210".into()));
        assert_eq!(normalize_mobile("(987) 654-3210"), Some("9876543210".into()));
        assert_eq!(normalize_mobile("+91 98765 43210"), None);
        assert_eq!(normalize_mobile("12345"), None);
    }

    #[test]
    fn display_date_falls_back_to_created_at() -> anyhow::Result<()> {
        let mut customer: Customer = serde_json::from_str(
            r#"{"id":"a","fullName":"Ana","createdAt":"2026-10-01T10:00:00Z","visitingDate":""}"#,
        )?;
        assert_eq!(customer.display_date(), "2026-10-01T10:00:00Z");
        customer.visiting_date = Some("2026-10-05".into());
        assert_eq!(customer.display_date(), "2026-10-05");
        assert_eq!(customer.reminder_interval, ReminderInterval::None);
        Ok(())
    }

    #[test]
    fn interest_normalization_drops_blanks() {
        let set = normalize_interest(["  Haircut ", "", "Facial", "Haircut"]);
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["Facial", "Haircut"]);
    }
}
