use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};

/// Number of days in the calendar month containing `date`.
///
/// Returns `None` only at the very end of chrono's representable range.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use lake_hydrology::units::days_in_month;
///
/// let feb_2020 = NaiveDate::from_ymd_opt(2020, 2, 10).unwrap();
/// let feb_2021 = NaiveDate::from_ymd_opt(2021, 2, 10).unwrap();
/// assert_eq!(days_in_month(feb_2020), Some(29));
/// assert_eq!(days_in_month(feb_2021), Some(28));
/// ```
pub fn days_in_month(date: NaiveDate) -> Option<u32> {
    let first = date.with_day(1)?;
    let next = first.checked_add_months(Months::new(1))?;
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Midnight on the first day of the month containing `timestamp`.
pub fn month_start(timestamp: &NaiveDateTime) -> NaiveDateTime {
    let date = timestamp.date();
    date.with_day(1)
        .unwrap_or(date)
        .and_time(NaiveTime::default())
}
