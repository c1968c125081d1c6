// 🗓️ Enrollment periods and calendar months
// A timeline is just Vec<EnrollmentPeriod> in the order the evidence arrived.

use crate::error::PeriodError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendered in the snapshot where a period has no end date.
pub const OPEN_END_LABEL: &str = "até hoje";

// ============================================================================
// ENROLLMENT PERIOD
// ============================================================================

/// One contiguous stretch of Simples Nacional membership.
///
/// `start` and `end` are inclusive. `end == None` means the period was still
/// running when the registry was queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentPeriod {
    start: NaiveDate,
    end: Option<NaiveDate>,
    detail: String,
}

impl EnrollmentPeriod {
    pub fn new(
        start: NaiveDate,
        end: Option<NaiveDate>,
        detail: impl Into<String>,
    ) -> Result<Self, PeriodError> {
        if let Some(end) = end {
            if end < start {
                return Err(PeriodError::Inverted { start, end });
            }
        }

        Ok(EnrollmentPeriod {
            start,
            end,
            detail: detail.into(),
        })
    }

    /// A period with no end date yet.
    pub fn open(start: NaiveDate, detail: impl Into<String>) -> Self {
        EnrollmentPeriod {
            start,
            end: None,
            detail: detail.into(),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// End date with open periods running through `today`.
    pub fn effective_end(&self, today: NaiveDate) -> NaiveDate {
        self.end.unwrap_or(today)
    }
}

impl fmt::Display for EnrollmentPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{} - {} [{}]", self.start, end, self.detail),
            None => write!(f, "{} - {} [{}]", self.start, OPEN_END_LABEL, self.detail),
        }
    }
}

/// "2019-01-01 - 2019-12-31 [..]; 2021-03-01 - até hoje [..]"
pub fn render_snapshot(periods: &[EnrollmentPeriod]) -> String {
    periods
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn has_open_period(periods: &[EnrollmentPeriod]) -> bool {
    periods.iter().any(EnrollmentPeriod::is_open)
}

// ============================================================================
// CALENDAR MONTH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Month { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn next(&self) -> Month {
        if self.month == 12 {
            Month {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Month {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First day of the month as shown in the result sheet: DD/MM/YYYY.
    pub fn label(&self) -> String {
        self.first_day().format("%d/%m/%Y").to_string()
    }
}

/// Every month from January of `start_year` through the month containing `today`.
pub fn reporting_months(start_year: i32, today: NaiveDate) -> Vec<Month> {
    let last = Month::containing(today);
    let mut months = Vec::new();
    let mut current = match Month::new(start_year, 1) {
        Some(month) => month,
        None => return months,
    };

    while current <= last {
        months.push(current);
        current = current.next();
    }

    months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_inverted_period_rejected() {
        let err = EnrollmentPeriod::new(ymd(2020, 5, 1), Some(ymd(2020, 4, 30)), "").unwrap_err();
        assert_eq!(
            err,
            PeriodError::Inverted {
                start: ymd(2020, 5, 1),
                end: ymd(2020, 4, 30)
            }
        );
    }

    #[test]
    fn test_single_day_period_allowed() {
        let period = EnrollmentPeriod::new(ymd(2020, 5, 1), Some(ymd(2020, 5, 1)), "x").unwrap();
        assert!(!period.is_open());
    }

    #[test]
    fn test_snapshot_rendering() {
        let periods = vec![
            EnrollmentPeriod::new(ymd(2019, 1, 1), Some(ymd(2019, 12, 31)), "Excluída por comunicação")
                .unwrap(),
            EnrollmentPeriod::open(ymd(2021, 3, 1), ""),
        ];

        assert_eq!(
            render_snapshot(&periods),
            "2019-01-01 - 2019-12-31 [Excluída por comunicação]; 2021-03-01 - até hoje []"
        );
        assert_eq!(render_snapshot(&[]), "");
    }

    #[test]
    fn test_month_bounds() {
        let feb = Month::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), ymd(2024, 2, 1));
        assert_eq!(feb.last_day(), ymd(2024, 2, 29));

        let dec = Month::new(2020, 12).unwrap();
        assert_eq!(dec.last_day(), ymd(2020, 12, 31));
        assert_eq!(dec.label(), "01/12/2020");

        assert!(Month::new(2020, 13).is_none());
        assert!(Month::new(2020, 0).is_none());
    }

    #[test]
    fn test_reporting_window_stops_at_current_month() {
        let months = reporting_months(2020, ymd(2021, 3, 15));
        assert_eq!(months.len(), 15);
        assert_eq!(months[0], Month::new(2020, 1).unwrap());
        assert_eq!(months[14], Month::new(2021, 3).unwrap());
    }

    #[test]
    fn test_reporting_window_empty_when_start_in_future() {
        assert!(reporting_months(2030, ymd(2021, 3, 15)).is_empty());
    }
}
