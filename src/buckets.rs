use std::fmt;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::week_start_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Seven daily buckets.
    Fine,
    /// Four Monday-anchored weekly buckets.
    #[default]
    Medium,
    /// Twelve calendar-month buckets.
    Coarse,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Granularity::Fine => "fine",
            Granularity::Medium => "medium",
            Granularity::Coarse => "coarse",
        })
    }
}

impl Granularity {
    pub fn bucket_count(&self) -> usize {
        match self {
            Granularity::Fine => 7,
            Granularity::Medium => 4,
            Granularity::Coarse => 12,
        }
    }
}

/// Closed wall-clock window `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    pub label: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeBucket {
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        instant >= self.start && instant <= self.end
    }
}

fn out_of_range(date: NaiveDate) -> CoreError {
    CoreError::DateOutOfRange(date.to_string())
}

fn start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Last millisecond of `date`.
fn end_of(date: NaiveDate) -> Result<NaiveDateTime, CoreError> {
    let next = date.succ_opt().ok_or_else(|| out_of_range(date))?;
    start_of(next)
        .checked_sub_signed(Duration::milliseconds(1))
        .ok_or_else(|| out_of_range(date))
}

fn days_before(date: NaiveDate, days: i64) -> Result<NaiveDate, CoreError> {
    date.checked_sub_signed(Duration::days(days))
        .ok_or_else(|| out_of_range(date))
}

/// Trailing windows ending at `reference`, oldest first.
pub fn build_buckets(
    granularity: Granularity,
    reference: NaiveDateTime,
) -> Result<Vec<TimeBucket>, CoreError> {
    let today = reference.date();
    let count = granularity.bucket_count();
    let mut buckets = Vec::with_capacity(count);

    match granularity {
        Granularity::Fine => {
            for back in (0..count as i64).rev() {
                let day = days_before(today, back)?;
                buckets.push(TimeBucket {
                    label: day.format("%a %b %-d").to_string(),
                    start: start_of(day),
                    end: end_of(day)?,
                });
            }
        }
        Granularity::Medium => {
            let this_monday = week_start_of(today);
            for back in (0..count as i64).rev() {
                let monday = days_before(this_monday, back * 7)?;
                let sunday = monday
                    .checked_add_signed(Duration::days(6))
                    .ok_or_else(|| out_of_range(monday))?;
                buckets.push(TimeBucket {
                    label: format!("{} - {}", monday.format("%b %-d"), sunday.format("%b %-d")),
                    start: start_of(monday),
                    end: end_of(sunday)?,
                });
            }
        }
        Granularity::Coarse => {
            let this_month = today.with_day(1).ok_or_else(|| out_of_range(today))?;
            for back in (0..count as u32).rev() {
                let first = this_month
                    .checked_sub_months(Months::new(back))
                    .ok_or_else(|| out_of_range(this_month))?;
                let last = first
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(|| out_of_range(first))?;
                buckets.push(TimeBucket {
                    label: first.format("%b %y").to_string(),
                    start: start_of(first),
                    end: end_of(last)?,
                });
            }
        }
    }

    Ok(buckets)
}
