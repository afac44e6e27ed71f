//! Reporting cadence and calendar arithmetic
//!
//! Energy figures depend on the real length of each calendar month, and
//! forecast timestamps are aligned to period boundaries (month-end for
//! monthly data).

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Hours in a day
pub const HOURS_PER_DAY: f64 = 24.0;

/// Seasonal cycle length for monthly data
pub const MONTHS_PER_YEAR: usize = 12;

/// Seasonal cycle length for daily data
pub const DAYS_PER_WEEK: usize = 7;

/// Reporting period of a record set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodCadence {
    /// One record per calendar month
    #[default]
    Monthly,
    /// One record per calendar day
    Daily,
}

impl PeriodCadence {
    /// Hours covered by the period containing `date`
    pub fn hours_in_period(&self, date: NaiveDate) -> f64 {
        match self {
            PeriodCadence::Monthly => f64::from(days_in_month(date)) * HOURS_PER_DAY,
            PeriodCadence::Daily => HOURS_PER_DAY,
        }
    }

    /// Length of one seasonal cycle in periods
    pub fn seasonal_period(&self) -> usize {
        match self {
            PeriodCadence::Monthly => MONTHS_PER_YEAR,
            PeriodCadence::Daily => DAYS_PER_WEEK,
        }
    }

    /// Ordinal of the period containing `date`; consecutive periods differ by one
    pub fn period_index(&self, date: NaiveDate) -> i64 {
        match self {
            PeriodCadence::Monthly => i64::from(date.year()) * 12 + i64::from(date.month0()),
            PeriodCadence::Daily => i64::from(date.num_days_from_ce()),
        }
    }

    /// Boundary-aligned timestamp `steps` periods after `date`
    ///
    /// Monthly steps land on the last day of the target month.
    pub fn advance(&self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            PeriodCadence::Monthly => {
                let first = first_of_month(date);
                let target = first.checked_add_months(Months::new(steps))?;
                month_end(target)
            }
            PeriodCadence::Daily => date.checked_add_signed(Duration::days(i64::from(steps))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodCadence::Monthly => "monthly",
            PeriodCadence::Daily => "daily",
        }
    }
}

impl std::fmt::Display for PeriodCadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// Last day of the month containing `date`
pub fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    let next = first_of_month(date).checked_add_months(Months::new(1))?;
    next.pred_opt()
}

/// Number of days in the calendar month containing `date` (28 to 31)
pub fn days_in_month(date: NaiveDate) -> u32 {
    match month_end(date) {
        Some(last) => last.day(),
        // December of the last representable year
        None => 31,
    }
}
