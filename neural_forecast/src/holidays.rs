//! Computed public holiday calendars
//!
//! Holidays are derived from calendar rules rather than looked up, so any
//! year can be covered. Supported countries: `US`, `CA`, `GB` (alias `UK`)
//! and `DE`.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate, Weekday};
use forecast_math::calendar::{
    easter_sunday, last_weekday, nth_weekday, observed_weekend_shift, weekday_on_or_before,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Country with a supported holiday calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Country {
    US,
    CA,
    GB,
    DE,
}

impl FromStr for Country {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "US" | "USA" => Ok(Country::US),
            "CA" | "CAN" => Ok(Country::CA),
            "GB" | "UK" => Ok(Country::GB),
            "DE" | "DEU" => Ok(Country::DE),
            other => Err(ForecastError::InvalidParameter(format!(
                "Holidays for country '{}' are not supported",
                other
            ))),
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Country::US => "US",
            Country::CA => "CA",
            Country::GB => "GB",
            Country::DE => "DE",
        };
        write!(f, "{}", code)
    }
}

impl Country {
    /// Every holiday name the calendar produces, observed variants included
    pub fn holiday_names(self) -> BTreeSet<&'static str> {
        country_holidays(self, 1990..=2030)
            .into_iter()
            .map(|(_, name)| name)
            .collect()
    }
}

fn fixed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

fn easter_offset(year: i32, days: i64) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_add_signed(Duration::days(days))
}

/// Adds a fixed-date holiday and, if it falls on a weekend, its observed day
fn push_observed(
    out: &mut Vec<(NaiveDate, &'static str)>,
    date: Option<NaiveDate>,
    name: &'static str,
    observed: &'static str,
) {
    if let Some(date) = date {
        out.push((date, name));
        let shifted = observed_weekend_shift(date);
        if shifted != date {
            out.push((shifted, observed));
        }
    }
}

fn us_holidays(year: i32, out: &mut Vec<(NaiveDate, &'static str)>) {
    push_observed(out, fixed(year, 1, 1), "New Year's Day", "New Year's Day (Observed)");
    if year >= 1986 {
        let mlk = nth_weekday(year, 1, Weekday::Mon, 3);
        out.extend(mlk.map(|d| (d, "Martin Luther King Jr. Day")));
    }
    out.extend(nth_weekday(year, 2, Weekday::Mon, 3).map(|d| (d, "Washington's Birthday")));
    out.extend(last_weekday(year, 5, Weekday::Mon).map(|d| (d, "Memorial Day")));
    push_observed(out, fixed(year, 7, 4), "Independence Day", "Independence Day (Observed)");
    out.extend(nth_weekday(year, 9, Weekday::Mon, 1).map(|d| (d, "Labor Day")));
    out.extend(nth_weekday(year, 10, Weekday::Mon, 2).map(|d| (d, "Columbus Day")));
    push_observed(out, fixed(year, 11, 11), "Veterans Day", "Veterans Day (Observed)");
    out.extend(nth_weekday(year, 11, Weekday::Thu, 4).map(|d| (d, "Thanksgiving")));
    push_observed(out, fixed(year, 12, 25), "Christmas Day", "Christmas Day (Observed)");
}

fn ca_holidays(year: i32, out: &mut Vec<(NaiveDate, &'static str)>) {
    push_observed(out, fixed(year, 1, 1), "New Year's Day", "New Year's Day (Observed)");
    out.extend(easter_offset(year, -2).map(|d| (d, "Good Friday")));
    out.extend(
        fixed(year, 5, 24)
            .and_then(|d| weekday_on_or_before(d, Weekday::Mon))
            .map(|d| (d, "Victoria Day")),
    );
    push_observed(out, fixed(year, 7, 1), "Canada Day", "Canada Day (Observed)");
    out.extend(nth_weekday(year, 9, Weekday::Mon, 1).map(|d| (d, "Labour Day")));
    out.extend(nth_weekday(year, 10, Weekday::Mon, 2).map(|d| (d, "Thanksgiving")));
    out.extend(fixed(year, 12, 25).map(|d| (d, "Christmas Day")));
    out.extend(fixed(year, 12, 26).map(|d| (d, "Boxing Day")));
}

fn gb_holidays(year: i32, out: &mut Vec<(NaiveDate, &'static str)>) {
    push_observed(out, fixed(year, 1, 1), "New Year's Day", "New Year's Day (Observed)");
    out.extend(easter_offset(year, -2).map(|d| (d, "Good Friday")));
    out.extend(easter_offset(year, 1).map(|d| (d, "Easter Monday")));
    out.extend(nth_weekday(year, 5, Weekday::Mon, 1).map(|d| (d, "May Day")));
    out.extend(last_weekday(year, 5, Weekday::Mon).map(|d| (d, "Spring Bank Holiday")));
    out.extend(last_weekday(year, 8, Weekday::Mon).map(|d| (d, "Late Summer Bank Holiday")));
    out.extend(fixed(year, 12, 25).map(|d| (d, "Christmas Day")));
    out.extend(fixed(year, 12, 26).map(|d| (d, "Boxing Day")));
}

fn de_holidays(year: i32, out: &mut Vec<(NaiveDate, &'static str)>) {
    out.extend(fixed(year, 1, 1).map(|d| (d, "Neujahr")));
    out.extend(easter_offset(year, -2).map(|d| (d, "Karfreitag")));
    out.extend(easter_offset(year, 1).map(|d| (d, "Ostermontag")));
    out.extend(fixed(year, 5, 1).map(|d| (d, "Erster Mai")));
    out.extend(easter_offset(year, 39).map(|d| (d, "Christi Himmelfahrt")));
    out.extend(easter_offset(year, 50).map(|d| (d, "Pfingstmontag")));
    if year >= 1990 {
        out.extend(fixed(year, 10, 3).map(|d| (d, "Tag der Deutschen Einheit")));
    }
    out.extend(fixed(year, 12, 25).map(|d| (d, "Erster Weihnachtstag")));
    out.extend(fixed(year, 12, 26).map(|d| (d, "Zweiter Weihnachtstag")));
}

/// All holidays of `country` in the given years, sorted by date
pub fn country_holidays<I>(country: Country, years: I) -> Vec<(NaiveDate, &'static str)>
where
    I: IntoIterator<Item = i32>,
{
    let mut out = Vec::new();
    for year in years {
        match country {
            Country::US => us_holidays(year, &mut out),
            Country::CA => ca_holidays(year, &mut out),
            Country::GB => gb_holidays(year, &mut out),
            Country::DE => de_holidays(year, &mut out),
        }
    }
    out.sort();
    out
}

/// Holiday dates of one country grouped by holiday name
#[derive(Debug, Clone, Default)]
pub struct HolidayIndex {
    by_name: BTreeMap<&'static str, BTreeSet<NaiveDate>>,
}

impl HolidayIndex {
    pub fn new<I>(country: Country, years: I) -> Self
    where
        I: IntoIterator<Item = i32>,
    {
        let mut by_name: BTreeMap<&'static str, BTreeSet<NaiveDate>> = BTreeMap::new();
        for (date, name) in country_holidays(country, years) {
            by_name.entry(name).or_default().insert(date);
        }
        Self { by_name }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }

    pub fn contains(&self, name: &str, date: &NaiveDate) -> bool {
        self.by_name
            .get(name)
            .map(|dates| dates.contains(date))
            .unwrap_or(false)
    }
}
