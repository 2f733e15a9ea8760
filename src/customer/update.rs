use std::collections::BTreeSet;

use thiserror::Error;
use time::OffsetDateTime;

use super::{normalize_interest, Customer, ReminderEntry, ReminderInterval};
use crate::dates;

/// A single, fully-typed edit to a customer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerUpdate {
    Rename { full_name: String },
    SetMobile { mobile_number: String },
    SetInterest { interest: BTreeSet<String> },
    SetPreferences { preferences: String },
    /// `None` clears the visit date (and with it the reminder date).
    Reschedule { visiting_date: Option<String> },
    SetReminderInterval { interval: ReminderInterval },
    RecordReminderSent { sent_at: OffsetDateTime, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("customer name cannot be empty")]
    EmptyName,
    #[error("mobile number '{0}' does not normalize to 10 digits")]
    IneligibleMobile(String),
    #[error("visit date '{0}' is not a valid date")]
    InvalidVisitDate(String),
    #[error("a reminder was already sent on {0}")]
    AlreadySentOn(String),
    #[error("reminder message cannot be empty")]
    EmptyMessage,
}

/// Validates `update` against the current record and applies it. Nothing is
/// modified when validation fails.
pub fn apply_update(
    customer: &mut Customer,
    update: CustomerUpdate,
    now: OffsetDateTime,
) -> Result<(), UpdateError> {
    match update {
        CustomerUpdate::Rename { full_name } => {
            let trimmed = full_name.trim();
            if trimmed.is_empty() {
                return Err(UpdateError::EmptyName);
            }
            customer.full_name = trimmed.to_string();
        }
        CustomerUpdate::SetMobile { mobile_number } => {
            customer.mobile_number = mobile_number.trim().to_string();
        }
        CustomerUpdate::SetInterest { interest } => {
            customer.interest = normalize_interest(interest);
        }
        CustomerUpdate::SetPreferences { preferences } => {
            customer.preferences = preferences.trim().to_string();
        }
        CustomerUpdate::Reschedule { visiting_date } => {
            let visiting_date = match visiting_date {
                Some(raw) if !raw.trim().is_empty() => {
                    let trimmed = raw.trim();
                    if dates::parse_instant(trimmed, now.offset()).is_none() {
                        return Err(UpdateError::InvalidVisitDate(raw));
                    }
                    Some(trimmed.to_string())
                }
                _ => None,
            };
            customer.visiting_date = visiting_date;
            customer.refresh_reminder_date();
        }
        CustomerUpdate::SetReminderInterval { interval } => {
            customer.reminder_interval = interval;
            customer.refresh_reminder_date();
        }
        CustomerUpdate::RecordReminderSent { sent_at, message } => {
            let message = message.trim();
            if message.is_empty() {
                return Err(UpdateError::EmptyMessage);
            }
            if !customer.is_reminder_eligible() {
                return Err(UpdateError::IneligibleMobile(customer.mobile_number.clone()));
            }
            let sent_day = dates::day_key(sent_at.to_offset(now.offset()).date());
            if customer.reminder_sent_dates.contains(&sent_day) {
                return Err(UpdateError::AlreadySentOn(sent_day));
            }
            customer.reminder_history.push(ReminderEntry {
                sent_at: dates::format_instant(sent_at),
                message: message.to_string(),
            });
            customer.reminder_sent_dates.insert(sent_day);
        }
    }
    customer.updated_at = dates::format_instant(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    fn customer() -> Customer {
        Customer {
            id: "c-1".into(),
            customer_id: Some(1),
            full_name: "Ana".into(),
            mobile_number: "98765 43210".into(),
            interest: BTreeSet::new(),
            preferences: String::new(),
            visiting_date: None,
            created_at: "2026-10-01T10:00:00Z".into(),
            updated_at: "2026-10-01T10:00:00Z".into(),
            reminder_interval: ReminderInterval::None,
            reminder_date: None,
            reminder_sent_dates: BTreeSet::new(),
            reminder_history: Vec::new(),
        }
    }

    #[test]
    fn rename_rejects_blank_names_and_leaves_record_untouched() {
        let now = datetime!(2026-10-18 12:00 UTC);
        let mut record = customer();
        let result = apply_update(
            &mut record,
            CustomerUpdate::Rename {
                full_name: "   ".into(),
            },
            now,
        );
        assert_matches!(result, Err(UpdateError::EmptyName));
        assert_eq!(record, customer());
    }

    #[test]
    fn reschedule_and_interval_rederive_reminder_date() -> anyhow::Result<()> {
        let now = datetime!(2026-10-18 12:00 UTC);
        let mut record = customer();
        apply_update(
            &mut record,
            CustomerUpdate::SetReminderInterval {
                interval: ReminderInterval::TwoWeeks,
            },
            now,
        )?;
        assert_eq!(record.reminder_date, None);

        apply_update(
            &mut record,
            CustomerUpdate::Reschedule {
                visiting_date: Some("2026-10-18".into()),
            },
            now,
        )?;
        assert_eq!(record.reminder_date.as_deref(), Some("2026-11-01"));
        assert_eq!(record.updated_at, "2026-10-18T12:00:00Z");

        apply_update(&mut record, CustomerUpdate::Reschedule { visiting_date: None }, now)?;
        assert_eq!(record.visiting_date, None);
        assert_eq!(record.reminder_date, None);
        Ok(())
    }

    #[test]
    fn reschedule_rejects_unparseable_dates() {
        let now = datetime!(2026-10-18 12:00 UTC);
        let mut record = customer();
        let result = apply_update(
            &mut record,
            CustomerUpdate::Reschedule {
                visiting_date: Some("next tuesday".into()),
            },
            now,
        );
        assert_matches!(result, Err(UpdateError::InvalidVisitDate(raw)) if raw == "next tuesday");
    }

    #[test]
    fn recording_a_reminder_appends_history_and_day_key() -> anyhow::Result<()> {
        let now = datetime!(2026-10-18 12:00 UTC);
        let mut record = customer();
        apply_update(
            &mut record,
            CustomerUpdate::RecordReminderSent {
                sent_at: now,
                message: "Time for your next visit!".into(),
            },
            now,
        )?;
        assert_eq!(record.reminder_history.len(), 1);
        assert_eq!(record.last_reminder().map(|e| e.sent_at.as_str()), Some("2026-10-18T12:00:00Z"));
        assert!(record.reminder_sent_dates.contains("2026-10-18"));

        let again = apply_update(
            &mut record,
            CustomerUpdate::RecordReminderSent {
                sent_at: now,
                message: "Second ping".into(),
            },
            now,
        );
        assert_matches!(again, Err(UpdateError::AlreadySentOn(day)) if day == "2026-10-18");
        assert_eq!(record.reminder_history.len(), 1);
        Ok(())
    }

    #[test]
    fn reminders_require_a_ten_digit_mobile() {
        let now = datetime!(2026-10-18 12:00 UTC);
        let mut record = customer();
        record.mobile_number = "555-0100".into();
        let result = apply_update(
            &mut record,
            CustomerUpdate::RecordReminderSent {
                sent_at: now,
                message: "hello".into(),
            },
            now,
        );
        assert_matches!(result, Err(UpdateError::IneligibleMobile(_)));
        assert!(record.reminder_history.is_empty());
    }
}
