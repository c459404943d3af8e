use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::errors::ExportError;

/// Months before "now" used as the default start of the export window.
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 4;

/// Parse a `dd.mm.yyyy` date into UTC midnight.
///
/// A blank input selects the first day of the month [`DEFAULT_LOOKBACK_MONTHS`]
/// months before `now`.
///
/// # Errors
///
/// Returns `ValidationError` for anything that is not a valid `dd.mm.yyyy` date.
pub fn parse_date_input(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ExportError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(default_start(now));
    }

    let date = NaiveDate::parse_from_str(input, "%d.%m.%Y").map_err(|e| {
        ExportError::ValidationError(format!(
            "'{}' is not a dd.mm.yyyy date: {}",
            input, e
        ))
    })?;

    Ok(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}

/// Last instant of the day that starts at `day_start`, for inclusive end dates.
#[must_use]
pub fn end_of_day(day_start: DateTime<Utc>) -> DateTime<Utc> {
    day_start + Duration::days(1) - Duration::seconds(1)
}

/// First day of the month [`DEFAULT_LOOKBACK_MONTHS`] months before `now`.
#[must_use]
pub fn default_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let months = now.year() * 12 + now.month0() as i32 - DEFAULT_LOOKBACK_MONTHS as i32;
    let year = months.div_euclid(12);
    let month = months.rem_euclid(12) as u32 + 1;

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_dotted_dates() {
        let now = at(2024, 6, 1);
        assert_eq!(parse_date_input("10.05.2023", now).unwrap(), at(2023, 5, 10));
    }

    #[test]
    fn blank_input_defaults_to_four_months_back() {
        let result = parse_date_input("  ", at(2024, 6, 20)).unwrap();
        assert_eq!(result, at(2024, 2, 1));
    }

    #[test]
    fn default_start_wraps_year() {
        assert_eq!(default_start(at(2024, 1, 15)), at(2023, 9, 1));
        assert_eq!(default_start(at(2024, 4, 30)), at(2023, 12, 1));
    }

    #[test]
    fn rejects_other_formats() {
        let now = at(2024, 6, 1);
        for bad in ["31-12-2024", "2024.12.31", "32.01.2024", "tomorrow"] {
            let err = parse_date_input(bad, now).unwrap_err();
            assert!(matches!(err, ExportError::ValidationError(_)), "{bad}");
        }
    }

    #[test]
    fn end_of_day_is_inclusive() {
        let end = end_of_day(at(2024, 3, 5));
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 59).unwrap());
    }
}
