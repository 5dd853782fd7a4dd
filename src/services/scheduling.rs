use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

/// Time slots offered on every bookable day.
pub const OFFERED_TIME_LABELS: [&str; 6] = [
    "10:00 AM", "11:00 AM", "1:00 PM", "2:30 PM", "4:00 PM", "5:00 PM",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid time label {0:?}: expected \"h:mm AM\" or \"h:mm PM\"")]
    InvalidTimeLabel(String),

    #[error("{0} is not one of the offered time slots")]
    SlotNotOffered(String),

    #[error("{date} is in the past")]
    DateInPast { date: NaiveDate },
}

pub fn offered_time_labels() -> &'static [&'static str] {
    &OFFERED_TIME_LABELS
}

/// The rolling window of bookable dates, starting with `today`.
pub fn offered_dates(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..days)
        .filter_map(|offset| today.checked_add_days(Days::new(offset.into())))
        .collect()
}

/// Parses a 12-hour `"h:mm AM|PM"` label. 12 AM is midnight, 12 PM is noon.
pub fn parse_time_label(label: &str) -> Result<NaiveTime, SchedulingError> {
    let trimmed = label.trim();
    let time = NaiveTime::parse_from_str(trimmed, "%I:%M %p")
        .map_err(|_| SchedulingError::InvalidTimeLabel(label.to_string()))?;

    // chrono is lenient about minute digits and spacing; only the canonical
    // shape is a label
    if !time.format("%-I:%M %p").to_string().eq_ignore_ascii_case(trimmed) {
        return Err(SchedulingError::InvalidTimeLabel(label.to_string()));
    }
    Ok(time)
}

/// Combines a calendar date with a time label into a point in shop-local time.
pub fn to_point_in_time(date: NaiveDate, label: &str) -> Result<NaiveDateTime, SchedulingError> {
    Ok(date.and_time(parse_time_label(label)?))
}

/// Resolves a customer's slot choice, rejecting past dates and labels that
/// are not on offer.
pub fn resolve_slot(
    date: NaiveDate,
    label: &str,
    today: NaiveDate,
) -> Result<NaiveDateTime, SchedulingError> {
    if date < today {
        return Err(SchedulingError::DateInPast { date });
    }

    let at = to_point_in_time(date, label)?;
    let offered = OFFERED_TIME_LABELS
        .iter()
        .filter_map(|l| parse_time_label(l).ok())
        .any(|t| t == at.time());
    if !offered {
        return Err(SchedulingError::SlotNotOffered(label.trim().to_string()));
    }

    Ok(at)
}
