//! Reminder lifecycle views over customer records.
//!
//! Two independent readings of the same record live here: the history based
//! [`ReminderCategory`] (how long ago the last reminder went out) and the
//! schedule based [`ScheduleStatus`] (whether the next one is due). Both take
//! an explicit `now` and never fail; malformed timestamps read as absent.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};
use time::{Duration, OffsetDateTime};

use crate::customer::{Customer, ReminderInterval};
use crate::dates;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReminderCategory {
    YetToSend,
    SentToday,
    #[serde(rename = "3-days")]
    #[strum(serialize = "3-days")]
    ThreeDays,
    #[serde(rename = "7-days")]
    #[strum(serialize = "7-days")]
    SevenDays,
    #[serde(rename = "2-weeks")]
    #[strum(serialize = "2-weeks")]
    TwoWeeks,
    #[serde(rename = "4-weeks")]
    #[strum(serialize = "4-weeks")]
    FourWeeks,
}

impl ReminderCategory {
    /// Inclusive whole-day window since the last reminder, for the
    /// age-based buckets.
    pub fn day_window(self) -> Option<(i64, i64)> {
        match self {
            ReminderCategory::ThreeDays => Some((2, 4)),
            ReminderCategory::SevenDays => Some((5, 9)),
            ReminderCategory::TwoWeeks => Some((10, 18)),
            ReminderCategory::FourWeeks => Some((19, 35)),
            ReminderCategory::YetToSend | ReminderCategory::SentToday => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScheduleStatus {
    None,
    Pending,
    SentToday,
    Overdue,
    Upcoming,
}

/// Category selector for list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Only(ReminderCategory),
}

impl std::str::FromStr for CategoryFilter {
    type Err = strum::ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        raw.to_ascii_lowercase()
            .parse::<ReminderCategory>()
            .map(CategoryFilter::Only)
    }
}

/// Buckets by the age of the most recent `reminder_history` entry. Returns
/// `None` for records that fall between buckets: sent one day ago, more than
/// 35 days ago, in the future, or with an unparseable `sentAt`.
pub fn classify_reminder_category(
    customer: &Customer,
    now: OffsetDateTime,
) -> Option<ReminderCategory> {
    let Some(last) = customer.last_reminder() else {
        return Some(ReminderCategory::YetToSend);
    };
    let sent_at = dates::parse_instant(&last.sent_at, now.offset())?;
    if sent_at.date() == now.date() {
        return Some(ReminderCategory::SentToday);
    }
    let days = dates::whole_days_between(sent_at, now);
    ReminderCategory::iter().find(|category| {
        category
            .day_window()
            .map(|(from, to)| (from..=to).contains(&days))
            .unwrap_or(false)
    })
}

pub fn compute_schedule_status(customer: &Customer, now: OffsetDateTime) -> ScheduleStatus {
    let Some(reminder_at) = customer
        .reminder_date
        .as_deref()
        .and_then(|raw| dates::parse_instant(raw, now.offset()))
    else {
        return ScheduleStatus::None;
    };
    if reminder_at.date() == now.date() {
        let today = dates::day_key(now.date());
        return if customer.reminder_sent_dates.contains(&today) {
            ScheduleStatus::SentToday
        } else {
            ScheduleStatus::Pending
        };
    }
    if reminder_at < dates::start_of_day(now) {
        ScheduleStatus::Overdue
    } else {
        ScheduleStatus::Upcoming
    }
}

/// `visit_date` shifted by the interval, keeping the input's shape: a
/// date-only value stays date-only, an offset-less date-time stays
/// offset-less (local to whoever reads it) and an RFC 3339 value keeps its
/// stated offset.
pub fn compute_reminder_date(visit_date: &str, interval: ReminderInterval) -> Option<String> {
    let days = interval.days()?;
    if let Some(day) = dates::parse_day(visit_date) {
        return day.checked_add(Duration::days(days)).map(dates::day_key);
    }
    if let Some(local) = dates::parse_local(visit_date) {
        return local
            .checked_add(Duration::days(days))
            .map(dates::format_local);
    }
    let offset = dates::stated_offset(visit_date)?;
    dates::parse_instant(visit_date, offset)?
        .checked_add(Duration::days(days))
        .map(dates::format_instant)
}

pub fn filter_by_category<'a, I>(
    customers: I,
    filter: CategoryFilter,
    now: OffsetDateTime,
) -> Vec<&'a Customer>
where
    I: IntoIterator<Item = &'a Customer>,
{
    match filter {
        CategoryFilter::All => customers.into_iter().collect(),
        CategoryFilter::Only(wanted) => customers
            .into_iter()
            .filter(|customer| classify_reminder_category(customer, now) == Some(wanted))
            .collect(),
    }
}

/// Per-category tallies. Customers outside every bucket are not counted, so
/// [`CategoryCounts::total`] can fall short of the input length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CategoryCounts {
    pub yet_to_send: usize,
    pub sent_today: usize,
    #[serde(rename = "3-days")]
    pub three_days: usize,
    #[serde(rename = "7-days")]
    pub seven_days: usize,
    #[serde(rename = "2-weeks")]
    pub two_weeks: usize,
    #[serde(rename = "4-weeks")]
    pub four_weeks: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: ReminderCategory) -> usize {
        match category {
            ReminderCategory::YetToSend => self.yet_to_send,
            ReminderCategory::SentToday => self.sent_today,
            ReminderCategory::ThreeDays => self.three_days,
            ReminderCategory::SevenDays => self.seven_days,
            ReminderCategory::TwoWeeks => self.two_weeks,
            ReminderCategory::FourWeeks => self.four_weeks,
        }
    }

    pub fn total(&self) -> usize {
        ReminderCategory::iter().map(|category| self.get(category)).sum()
    }

    fn bump(&mut self, category: ReminderCategory) {
        let slot = match category {
            ReminderCategory::YetToSend => &mut self.yet_to_send,
            ReminderCategory::SentToday => &mut self.sent_today,
            ReminderCategory::ThreeDays => &mut self.three_days,
            ReminderCategory::SevenDays => &mut self.seven_days,
            ReminderCategory::TwoWeeks => &mut self.two_weeks,
            ReminderCategory::FourWeeks => &mut self.four_weeks,
        };
        *slot += 1;
    }
}

pub fn count_by_category<'a, I>(customers: I, now: OffsetDateTime) -> CategoryCounts
where
    I: IntoIterator<Item = &'a Customer>,
{
    let mut counts = CategoryCounts::default();
    for customer in customers {
        if let Some(category) = classify_reminder_category(customer, now) {
            counts.bump(category);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::{NewCustomer, ReminderEntry};
    use std::collections::BTreeSet;
    use time::macros::{datetime, offset};

    const NOW: OffsetDateTime = datetime!(2026-10-18 15:30 UTC);

    fn customer(id: &str) -> Customer {
        Customer {
            id: id.into(),
            customer_id: None,
            full_name: id.into(),
            mobile_number: "9876543210".into(),
            interest: BTreeSet::new(),
            preferences: String::new(),
            visiting_date: None,
            created_at: "2026-09-01T09:00:00Z".into(),
            updated_at: "2026-09-01T09:00:00Z".into(),
            reminder_interval: ReminderInterval::None,
            reminder_date: None,
            reminder_sent_dates: BTreeSet::new(),
            reminder_history: Vec::new(),
        }
    }

    fn sent(id: &str, ago: Duration) -> Customer {
        let mut record = customer(id);
        record.reminder_history.push(ReminderEntry {
            sent_at: dates::format_instant(NOW - ago),
            message: "see you soon".into(),
        });
        record
    }

    #[test]
    fn empty_history_is_always_yet_to_send() {
        let mut record = customer("a");
        record.reminder_sent_dates.insert("2026-10-18".into());
        record.reminder_date = Some("2026-10-18".into());
        assert_eq!(
            classify_reminder_category(&record, NOW),
            Some(ReminderCategory::YetToSend)
        );
    }

    #[test]
    fn sent_now_is_sent_today() {
        let record = sent("a", Duration::ZERO);
        assert_eq!(
            classify_reminder_category(&record, NOW),
            Some(ReminderCategory::SentToday)
        );
    }

    #[test]
    fn bucket_edges_are_inclusive_and_day_one_is_a_gap() {
        let cases = [
            (1, None),
            (2, Some(ReminderCategory::ThreeDays)),
            (3, Some(ReminderCategory::ThreeDays)),
            (4, Some(ReminderCategory::ThreeDays)),
            (5, Some(ReminderCategory::SevenDays)),
            (9, Some(ReminderCategory::SevenDays)),
            (10, Some(ReminderCategory::TwoWeeks)),
            (18, Some(ReminderCategory::TwoWeeks)),
            (19, Some(ReminderCategory::FourWeeks)),
            (35, Some(ReminderCategory::FourWeeks)),
            (36, None),
        ];
        for (days, expected) in cases {
            let record = sent("a", Duration::days(days));
            assert_eq!(
                classify_reminder_category(&record, NOW),
                expected,
                "{days} days ago"
            );
        }
    }

    #[test]
    fn only_the_last_history_entry_counts() {
        let mut record = sent("a", Duration::days(20));
        record.reminder_history.push(ReminderEntry {
            sent_at: dates::format_instant(NOW - Duration::days(3)),
            message: "follow-up".into(),
        });
        assert_eq!(
            classify_reminder_category(&record, NOW),
            Some(ReminderCategory::ThreeDays)
        );
    }

    #[test]
    fn unparseable_sent_at_is_uncategorized() {
        let mut record = customer("a");
        record.reminder_history.push(ReminderEntry {
            sent_at: "yesterday-ish".into(),
            message: "hi".into(),
        });
        assert_eq!(classify_reminder_category(&record, NOW), None);
    }

    #[test]
    fn filter_all_is_identity() {
        let list = vec![
            sent("a", Duration::days(3)),
            customer("b"),
            sent("c", Duration::days(50)),
        ];
        let filtered = filter_by_category(&list, CategoryFilter::All, NOW);
        let ids: Vec<_> = filtered.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn filter_keeps_relative_order() {
        let list = vec![
            sent("a", Duration::days(6)),
            customer("b"),
            sent("c", Duration::days(8)),
        ];
        let filtered = filter_by_category(
            &list,
            CategoryFilter::Only(ReminderCategory::SevenDays),
            NOW,
        );
        let ids: Vec<_> = filtered.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn counts_sum_to_length_only_when_every_record_is_bucketed() {
        let mut list = vec![
            customer("a"),
            sent("b", Duration::ZERO),
            sent("c", Duration::days(3)),
            sent("d", Duration::days(7)),
            sent("e", Duration::days(14)),
            sent("f", Duration::days(30)),
        ];
        let counts = count_by_category(&list, NOW);
        assert_eq!(counts.total(), list.len());
        assert_eq!(counts.get(ReminderCategory::TwoWeeks), 1);

        list.push(sent("g", Duration::days(50)));
        let counts = count_by_category(&list, NOW);
        assert_eq!(counts.total(), list.len() - 1);
    }

    #[test]
    fn reminder_date_round_trip_recovers_interval_days() {
        let visits = [
            "2026-10-18",
            "2026-10-18T22:00",
            "2026-10-18T10:15:00+05:30",
            "2026-10-18T23:30:00Z",
        ];
        for reader in [offset!(UTC), offset!(+5:30), offset!(-8)] {
            for interval in ReminderInterval::iter() {
                for visit in visits {
                    let derived = compute_reminder_date(visit, interval);
                    let Some(expected_days) = interval.days() else {
                        assert_eq!(derived, None);
                        continue;
                    };
                    let derived = derived.expect("derived date");
                    let visit_at = dates::parse_instant(visit, reader).expect("visit");
                    let reminder_at = dates::parse_instant(&derived, reader).expect("reminder");
                    assert_eq!(
                        dates::whole_days_between(visit_at, reminder_at),
                        expected_days,
                        "{visit} + {interval} read at {reader}"
                    );
                }
            }
        }
        assert_eq!(
            compute_reminder_date("2026-10-18", ReminderInterval::OneWeek).as_deref(),
            Some("2026-10-25")
        );
        assert_eq!(
            compute_reminder_date("2026-10-18T10:15:00+05:30", ReminderInterval::OneWeek)
                .as_deref(),
            Some("2026-10-25T10:15:00+05:30")
        );
        assert_eq!(
            compute_reminder_date("2026-10-18T22:00", ReminderInterval::OneWeek).as_deref(),
            Some("2026-10-25T22:00:00")
        );
        assert_eq!(compute_reminder_date("garbage", ReminderInterval::OneWeek), None);
    }

    #[test]
    fn offsetless_visit_today_is_pending_in_a_local_offset() -> anyhow::Result<()> {
        let now = datetime!(2026-10-18 12:00 +5:30);
        let record = crate::storage::build_customer(
            NewCustomer {
                full_name: "Ana".into(),
                mobile_number: "9876543210".into(),
                visiting_date: Some("2026-10-18T22:00".into()),
                reminder_interval: ReminderInterval::Today,
                ..NewCustomer::default()
            },
            1,
            now,
        )?;
        assert_eq!(record.reminder_date.as_deref(), Some("2026-10-18T22:00:00"));
        assert_eq!(crate::grouping::group_label(record.display_date(), now), crate::grouping::TODAY);
        assert_eq!(compute_schedule_status(&record, now), ScheduleStatus::Pending);

        let west = datetime!(2026-10-18 20:00 -8);
        assert_eq!(compute_schedule_status(&record, west), ScheduleStatus::Pending);
        Ok(())
    }

    #[test]
    fn schedule_status_follows_reminder_date_and_sent_days() {
        let mut record = customer("a");
        assert_eq!(compute_schedule_status(&record, NOW), ScheduleStatus::None);

        record.reminder_date = Some("2026-10-18".into());
        assert_eq!(compute_schedule_status(&record, NOW), ScheduleStatus::Pending);
        record.reminder_sent_dates.insert("2026-10-18".into());
        assert_eq!(compute_schedule_status(&record, NOW), ScheduleStatus::SentToday);

        let mut overdue = customer("b");
        overdue.reminder_date = Some("2026-10-17".into());
        assert_eq!(compute_schedule_status(&overdue, NOW), ScheduleStatus::Overdue);

        let mut upcoming = customer("c");
        upcoming.reminder_date = Some("2026-10-19T09:00:00Z".into());
        assert_eq!(compute_schedule_status(&upcoming, NOW), ScheduleStatus::Upcoming);

        let mut broken = customer("d");
        broken.reminder_date = Some("soon".into());
        assert_eq!(compute_schedule_status(&broken, NOW), ScheduleStatus::None);
    }

    #[test]
    fn category_filter_parses_cli_tags() -> anyhow::Result<()> {
        assert_eq!("all".parse::<CategoryFilter>()?, CategoryFilter::All);
        assert_eq!(
            "Yet-To-Send".parse::<CategoryFilter>()?,
            CategoryFilter::Only(ReminderCategory::YetToSend)
        );
        assert_eq!(
            "2-weeks".parse::<CategoryFilter>()?,
            CategoryFilter::Only(ReminderCategory::TwoWeeks)
        );
        assert!("ages".parse::<CategoryFilter>().is_err());
        assert_eq!(ReminderCategory::FourWeeks.to_string(), "4-weeks");
        assert_eq!(ScheduleStatus::SentToday.to_string(), "sent-today");
        Ok(())
    }
}
