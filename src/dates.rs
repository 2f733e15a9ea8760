use time::format_description::{well_known::Rfc3339, FormatItem};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

const DAY_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

const LABEL_FORMAT: &[FormatItem<'_>] = format_description!("[day] [month repr:short] [year]");

// Local date-times without an offset, most specific first.
const LOCAL_FORMATS: [&[FormatItem<'_>]; 3] = [
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
];

/// Current wall-clock time in the local offset, or UTC when the offset
/// cannot be determined.
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Parses an ISO date (`2026-10-18`) or date-time string into an instant
/// expressed in `offset`. Date-only and offset-less values are read as local
/// to `offset`. Returns `None` for anything else.
pub fn parse_instant(raw: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(parsed.to_offset(offset));
    }
    if let Some(date) = parse_day(trimmed) {
        return Some(date.with_time(Time::MIDNIGHT).assume_offset(offset));
    }
    parse_local(trimmed).map(|local| local.assume_offset(offset))
}

/// Parses a date-time that carries no offset. A space may stand in for the
/// `T` separator.
pub fn parse_local(raw: &str) -> Option<PrimitiveDateTime> {
    let normalized = raw.trim().replacen(' ', "T", 1);
    LOCAL_FORMATS
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(&normalized, *format).ok())
}

/// `yyyy-MM-ddTHH:mm:ss` without an offset, for values that are local to
/// whoever reads them.
pub fn format_local(at: PrimitiveDateTime) -> String {
    at.format(LOCAL_FORMATS[1])
        .unwrap_or_else(|_| at.to_string())
}

/// The UTC offset written into an RFC 3339 value, if it carries one.
pub fn stated_offset(raw: &str) -> Option<UtcOffset> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .ok()
        .map(|parsed| parsed.offset())
}

/// Parses a bare `yyyy-MM-dd` day.
pub fn parse_day(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), DAY_FORMAT).ok()
}

/// True when `raw` carries no time-of-day component.
pub fn is_date_only(raw: &str) -> bool {
    parse_day(raw).is_some()
}

/// RFC 3339 rendering used for stored timestamps.
pub fn format_instant(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// `yyyy-MM-dd` key for a calendar day.
pub fn day_key(date: Date) -> String {
    date.format(DAY_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn start_of_day(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_time(Time::MIDNIGHT)
}

/// Whole 24h periods elapsed from `earlier` to `later`, truncated toward zero.
pub fn whole_days_between(earlier: OffsetDateTime, later: OffsetDateTime) -> i64 {
    (later - earlier).whole_days()
}

/// `dd MMM yyyy`, e.g. `08 Oct 2026`.
pub fn format_label(date: Date) -> String {
    date.format(LABEL_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

pub fn parse_label(label: &str) -> Option<Date> {
    Date::parse(label.trim(), LABEL_FORMAT).ok()
}
