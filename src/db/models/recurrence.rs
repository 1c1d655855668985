//! Recurrence patterns and the dates they produce.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How far ahead instances are generated
pub const HORIZON_DAYS: u64 = 90;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RecurrencePattern {
    pub id: String,
    pub frequency: Frequency,
    /// Every N days, weeks, months or years
    pub interval: i64,
    /// Comma-separated weekdays, 0 = Monday
    pub days_of_week: Option<String>,
    pub day_of_month: Option<i64>,
    pub month_of_year: Option<i64>,
    /// Last date (inclusive) an instance may fall on
    pub end_date: Option<String>,
    /// Total number of occurrences
    pub end_count: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

fn default_interval() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRecurrenceRequest {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_of_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_count: Option<i64>,
}

impl CreateRecurrenceRequest {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days_of_week: None,
            day_of_month: None,
            month_of_year: None,
            end_date: None,
            end_count: None,
        }
    }
}

/// Partial update. `None` keeps the stored value; an empty `days_of_week` or
/// `end_date` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecurrenceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_of_year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_count: Option<i64>,
}

/// Response of `POST /api/recurrence/:id/instances`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedInstances {
    pub pattern_id: String,
    pub count: usize,
    pub data: Vec<super::Reminder>,
}

/// Parse `"0,2,4"` into sorted, distinct weekday numbers
pub fn parse_days_of_week(value: &str) -> Result<Vec<u32>, String> {
    let mut days = Vec::new();
    for part in value.split(',') {
        let day: u32 = part
            .trim()
            .parse()
            .map_err(|_| format!("Invalid weekday: {:?}", part.trim()))?;
        if day > 6 {
            return Err(format!("Weekday out of range (0-6): {}", day));
        }
        days.push(day);
    }
    days.sort_unstable();
    days.dedup();
    Ok(days)
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}

/// The date `day` in the given month, pulled back to the month's last day
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

/// `months` after the start of (`year`, `month`), as a (year, month) pair
fn add_months(year: i32, month: u32, months: i64) -> Option<(i32, u32)> {
    let index = i64::from(year) * 12 + i64::from(month) - 1 + months;
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    Some((year, index.rem_euclid(12) as u32 + 1))
}

impl RecurrencePattern {
    /// Occurrence dates from `start` (inclusive) up to the earlier of
    /// `horizon_end` and the pattern's `end_date`, capped at `end_count`.
    ///
    /// Monthly and yearly dates keep their anchor day and clamp to the end of
    /// shorter months, so a pattern on the 31st lands on Apr 30 and then May 31.
    pub fn occurrences(&self, start: NaiveDate, horizon_end: NaiveDate) -> Vec<NaiveDate> {
        let end = self
            .end_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map_or(horizon_end, |d| d.min(horizon_end));
        let limit = match self.end_count {
            Some(n) => usize::try_from(n.max(0)).unwrap_or(usize::MAX),
            None => usize::MAX,
        };
        let interval = self.interval.max(1);

        self.candidates(start, interval)
            .filter(|d| *d >= start)
            .take_while(|d| *d <= end)
            .take(limit)
            .collect()
    }

    /// Ascending, unbounded candidate dates. Only the first period may
    /// produce dates before `start`.
    fn candidates(&self, start: NaiveDate, interval: i64) -> Box<dyn Iterator<Item = NaiveDate>> {
        let step = interval as u64;
        match self.frequency {
            Frequency::Daily => Box::new(
                (0u64..).map_while(move |k| start.checked_add_days(Days::new(k * step))),
            ),
            Frequency::Weekly => {
                let days = self
                    .days_of_week
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .and_then(|s| parse_days_of_week(s).ok())
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| vec![start.weekday().num_days_from_monday()]);
                let monday = start - Days::new(u64::from(start.weekday().num_days_from_monday()));

                Box::new(
                    (0u64..)
                        .map_while(move |k| monday.checked_add_days(Days::new(7 * k * step)))
                        .flat_map(move |week| {
                            days.clone()
                                .into_iter()
                                .filter_map(move |d| week.checked_add_days(Days::new(u64::from(d))))
                        }),
                )
            }
            Frequency::Monthly => {
                let anchor = self
                    .day_of_month
                    .and_then(|d| u32::try_from(d).ok())
                    .unwrap_or_else(|| start.day());
                let (year, month) = (start.year(), start.month());

                Box::new((0i64..).map_while(move |k| {
                    let (y, m) = add_months(year, month, k * interval)?;
                    clamped_date(y, m, anchor)
                }))
            }
            Frequency::Yearly => {
                let month = self
                    .month_of_year
                    .and_then(|m| u32::try_from(m).ok())
                    .unwrap_or_else(|| start.month());
                let day = self
                    .day_of_month
                    .and_then(|d| u32::try_from(d).ok())
                    .unwrap_or_else(|| start.day());
                let year = start.year();

                Box::new((0i64..).map_while(move |k| {
                    let y = i32::try_from(i64::from(year) + k * interval).ok()?;
                    clamped_date(y, month, day)
                }))
            }
        }
    }
}
