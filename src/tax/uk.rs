use crate::error::{ConvertError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// UK Tax Year (runs 6 April to 5 April)
/// The year value represents the end year (e.g., 2025 = 2024/25 tax year)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxYear(pub i32);

/// Map a calendar day to the tax year containing it.
///
/// The two branches cover every valid day; anything that falls through is an
/// out-of-range day or month and is reported as an internal error.
pub fn fiscal_year(day: u32, month: u32, year: i32) -> Result<TaxYear> {
    let valid = (1..=12).contains(&month) && (1..=31).contains(&day);
    if valid && (month > 4 || (month == 4 && day >= 6)) {
        return Ok(TaxYear(year + 1));
    }
    if valid && (month < 4 || (month == 4 && day <= 5)) {
        return Ok(TaxYear(year));
    }
    Err(ConvertError::Internal(format!(
        "fiscal year calculation failed for day {day}, month {month}, year {year}"
    )))
}

impl TaxYear {
    /// Create a tax year from a date
    pub fn from_date(date: NaiveDate) -> Self {
        // Tax year starts 6 April
        if (date.month(), date.day()) >= (4, 6) {
            TaxYear(date.year() + 1)
        } else {
            TaxYear(date.year())
        }
    }

    /// Start date of the tax year (6 April of previous year)
    pub fn start_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0 - 1, 4, 6)
    }

    /// End date of the tax year (5 April)
    pub fn end_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 4, 5)
    }

    /// Display as "2024/25" format
    pub fn display(&self) -> String {
        format!("{}/{:02}", self.0 - 1, self.0.rem_euclid(100))
    }

    /// Every tax year from `first` through `last`, both inclusive.
    pub fn range(first: TaxYear, last: TaxYear) -> impl Iterator<Item = TaxYear> {
        (first.0..=last.0).map(TaxYear)
    }
}

impl fmt::Display for TaxYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl FromStr for TaxYear {
    type Err = String;

    /// Parse a "2023/24" label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("expected a YYYY/YY tax year, got '{s}'"))?;
        let start: i32 = start
            .parse()
            .map_err(|_| format!("invalid tax year start in '{s}'"))?;
        let end: i32 = end
            .parse()
            .map_err(|_| format!("invalid tax year end in '{s}'"))?;
        let end_year = start
            .checked_add(1)
            .ok_or_else(|| format!("tax year out of range in '{s}'"))?;
        if end != end_year.rem_euclid(100) {
            return Err(format!("'{s}' does not span consecutive years"));
        }
        Ok(TaxYear(end_year))
    }
}

impl TryFrom<String> for TaxYear {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaxYear> for String {
    fn from(year: TaxYear) -> Self {
        year.display()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fiscal_year_on_and_after_april_6() {
        assert_eq!(fiscal_year(6, 4, 2024).unwrap().display(), "2024/25");
        assert_eq!(fiscal_year(30, 4, 2024).unwrap().display(), "2024/25");
        for month in 5..=12 {
            assert_eq!(fiscal_year(1, month, 2023).unwrap().display(), "2023/24");
        }
    }

    #[test]
    fn fiscal_year_up_to_april_5() {
        assert_eq!(fiscal_year(5, 4, 2024).unwrap().display(), "2023/24");
        assert_eq!(fiscal_year(1, 4, 2024).unwrap().display(), "2023/24");
        for month in 1..=3 {
            assert_eq!(fiscal_year(31, month, 2020).unwrap().display(), "2019/20");
        }
    }

    #[test]
    fn fiscal_year_zero_pads_century_boundary() {
        assert_eq!(fiscal_year(1, 6, 2099).unwrap().display(), "2099/00");
        assert_eq!(fiscal_year(1, 6, 2008).unwrap().display(), "2008/09");
    }

    #[test]
    fn fiscal_year_rejects_impossible_dates() {
        assert!(matches!(fiscal_year(1, 13, 2024), Err(ConvertError::Internal(_))));
        assert!(matches!(fiscal_year(0, 4, 2024), Err(ConvertError::Internal(_))));
        assert!(matches!(fiscal_year(1, 0, 2024), Err(ConvertError::Internal(_))));
    }

    #[test]
    fn tax_year_from_date_matches_fiscal_year() {
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        while date.year() < 2025 {
            assert_eq!(
                TaxYear::from_date(date),
                fiscal_year(date.day(), date.month(), date.year()).unwrap(),
                "{date}"
            );
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn tax_year_start_end_dates() {
        let ty = TaxYear(2025);
        assert_eq!(ty.start_date(), NaiveDate::from_ymd_opt(2024, 4, 6));
        assert_eq!(ty.end_date(), NaiveDate::from_ymd_opt(2025, 4, 5));
    }

    #[test]
    fn tax_year_parse_label() {
        assert_eq!("2023/24".parse::<TaxYear>(), Ok(TaxYear(2024)));
        assert_eq!("1999/00".parse::<TaxYear>(), Ok(TaxYear(2000)));
        assert!("2023/25".parse::<TaxYear>().is_err());
        assert!("2023".parse::<TaxYear>().is_err());
    }

    #[test]
    fn tax_year_parse_rejects_overflowing_start() {
        assert!("2147483647/48".parse::<TaxYear>().is_err());
        assert!(serde_json::from_str::<TaxYear>("\"2147483647/48\"").is_err());
    }

    #[test]
    fn tax_year_serde_uses_label() {
        let json = serde_json::to_string(&TaxYear(2024)).unwrap();
        assert_eq!(json, "\"2023/24\"");
        let back: TaxYear = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaxYear(2024));
    }

    #[test]
    fn tax_year_range_is_inclusive() {
        let years: Vec<_> = TaxYear::range(TaxYear(2020), TaxYear(2022))
            .map(|y| y.display())
            .collect();
        assert_eq!(years, vec!["2019/20", "2020/21", "2021/22"]);
    }
}
