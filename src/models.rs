use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weekly frequency per source key, as submitted.
pub type SourceCounts = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    Microplastic,
    Pfas,
}

impl TrackerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerKind::Microplastic => "microplastic",
            TrackerKind::Pfas => "pfas",
        }
    }

    /// Decimal places stored and displayed for this tracker's scores.
    pub fn decimals(&self) -> u32 {
        match self {
            TrackerKind::Microplastic => 2,
            TrackerKind::Pfas => 3,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            TrackerKind::Microplastic => "p/mL",
            TrackerKind::Pfas => "ppt",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackerKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "microplastic" => Ok(TrackerKind::Microplastic),
            "pfas" => Ok(TrackerKind::Pfas),
            other => Err(format!("unknown tracker kind '{other}'")),
        }
    }
}

/// Which timestamp of an entry places it on the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalKey {
    #[default]
    WeekStart,
    CreatedAt,
}

/// One scored weekly submission. `total_score` and `risk_tier` are fixed
/// when the entry is recorded and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: Uuid,
    pub kind: TrackerKind,
    pub week_start: NaiveDate,
    pub source_counts: SourceCounts,
    pub total_score: f64,
    pub risk_tier: String,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Wall-clock instant used for bucketing, in the given time zone.
    pub fn local_instant<Tz: TimeZone>(&self, key: TemporalKey, tz: &Tz) -> NaiveDateTime {
        match key {
            TemporalKey::WeekStart => self.week_start.and_time(NaiveTime::MIN),
            TemporalKey::CreatedAt => self.created_at.with_timezone(tz).naive_local(),
        }
    }
}

/// Unscored weekly counts crossing the storage/CLI boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub week_start: NaiveDate,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Identifier assigned where the counts were first recorded (CSV
    /// `source_key`, browser entry id). Re-imports dedupe on it.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub counts: BTreeMap<String, serde_json::Value>,
}

impl Submission {
    /// Numeric counts only; strings, nulls and other shapes are dropped here
    /// and the remaining values are sanitised by the score calculator.
    pub fn numeric_counts(&self) -> SourceCounts {
        self.counts
            .iter()
            .filter_map(|(key, value)| value.as_f64().map(|count| (key.clone(), count)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContribution {
    pub key: String,
    pub label: String,
    pub count: f64,
    pub contribution: f64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPoint {
    pub label: String,
    pub mean: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub value: f64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub current_risk_tier: String,
    pub current_score: f64,
    pub weekly_intake: f64,
    pub monthly_average: f64,
    pub data_completeness_percent: u32,
    pub weekly_change_percent: f64,
    pub total_entries: usize,
}

pub const NO_DATA: &str = "No Data";

impl DashboardStats {
    pub fn empty() -> Self {
        Self {
            current_risk_tier: NO_DATA.to_string(),
            current_score: 0.0,
            weekly_intake: 0.0,
            monthly_average: 0.0,
            data_completeness_percent: 0,
            weekly_change_percent: 0.0,
            total_entries: 0,
        }
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}
