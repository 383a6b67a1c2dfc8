//! Calendar arithmetic for computing public holidays
//!
//! Contains rule helpers used by the holiday calendars:
//! - n-th / last weekday of a month
//! - weekday on or before a date
//! - Easter Sunday (Gregorian computus)
//! - weekend-observed shifting

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// The `n`-th (1-based) occurrence of `weekday` in the given month
pub fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

/// The last occurrence of `weekday` in the given month
pub fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    weekday_on_or_before(first_of_next.pred_opt()?, weekday)
}

/// The closest date on or before `date` that falls on `weekday`
pub fn weekday_on_or_before(date: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let back = (7 + date.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    date.checked_sub_signed(Duration::days(back as i64))
}

/// Easter Sunday in the Gregorian calendar (anonymous computus)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Shift a Saturday holiday to Friday and a Sunday holiday to Monday
pub fn observed_weekend_shift(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date.pred_opt().unwrap_or(date),
        Weekday::Sun => date.succ_opt().unwrap_or(date),
        _ => date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_easter_known_years() {
        assert_eq!(easter_sunday(2010), Some(date(2010, 4, 4)));
        assert_eq!(easter_sunday(2016), Some(date(2016, 3, 27)));
        assert_eq!(easter_sunday(2024), Some(date(2024, 3, 31)));
    }

    #[test]
    fn test_thanksgiving_and_memorial_day() {
        // Fourth Thursday of November 2015
        assert_eq!(
            nth_weekday(2015, 11, Weekday::Thu, 4),
            Some(date(2015, 11, 26))
        );
        // Last Monday of May 2016
        assert_eq!(last_weekday(2016, 5, Weekday::Mon), Some(date(2016, 5, 30)));
        assert_eq!(last_weekday(2016, 12, Weekday::Mon), Some(date(2016, 12, 26)));
    }

    #[test]
    fn test_weekday_on_or_before() {
        // Victoria Day 2016: Monday on or before May 24
        assert_eq!(
            weekday_on_or_before(date(2016, 5, 24), Weekday::Mon),
            Some(date(2016, 5, 23))
        );
        assert_eq!(
            weekday_on_or_before(date(2016, 5, 23), Weekday::Mon),
            Some(date(2016, 5, 23))
        );
    }

    #[test]
    fn test_observed_shift() {
        // July 4th 2015 was a Saturday
        assert_eq!(observed_weekend_shift(date(2015, 7, 4)), date(2015, 7, 3));
        // Christmas 2016 was a Sunday
        assert_eq!(observed_weekend_shift(date(2016, 12, 25)), date(2016, 12, 26));
        assert_eq!(observed_weekend_shift(date(2016, 7, 4)), date(2016, 7, 4));
    }
}
