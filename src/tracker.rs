use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::aggregate::aggregate;
use crate::axis::compute_display_range;
use crate::buckets::{build_buckets, Granularity};
use crate::catalog::{preset_bands, preset_sources, RiskBands, SourceCatalog};
use crate::config::{AppConfig, StatsConfig, TrackerConfig};
use crate::error::CoreError;
use crate::models::{
    week_start_of, AggregatedPoint, DashboardStats, Entry, HistogramBin, SourceContribution,
    SourceCounts, Submission, TemporalKey, TrackerKind,
};
use crate::percentile::percentile_rank;
use crate::risk::classify_risk;
use crate::score::{compute_total_score, sanitize_count, source_breakdown};
use crate::stats::compute_stats;
use crate::trend::fit_linear_trend;

/// Chart-ready series for one granularity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSeries {
    pub granularity: Granularity,
    pub points: Vec<AggregatedPoint>,
    pub fitted: Vec<f64>,
    pub display_range: (f64, f64),
}

/// Catalog, bands and bucketing policy for one tracker kind. Built once at
/// start-up and only read afterwards.
#[derive(Debug, Clone)]
pub struct Tracker {
    pub kind: TrackerKind,
    pub catalog: SourceCatalog,
    pub bands: RiskBands,
    pub temporal_key: TemporalKey,
}

impl Tracker {
    pub fn from_config(kind: TrackerKind, config: &TrackerConfig) -> Result<Self, CoreError> {
        let sources = config
            .sources
            .clone()
            .unwrap_or_else(|| preset_sources(kind, config.preset));
        let bands = config
            .bands
            .clone()
            .unwrap_or_else(|| preset_bands(kind, config.preset));

        Ok(Self {
            kind,
            catalog: SourceCatalog::new(sources)?,
            bands: RiskBands::new(bands)?,
            temporal_key: config.temporal_key,
        })
    }

    pub fn decimals(&self) -> u32 {
        self.kind.decimals()
    }

    /// Catalog keys only, with unusable counts replaced by zero.
    pub fn normalize_counts(&self, counts: &SourceCounts) -> SourceCounts {
        self.catalog
            .sources()
            .iter()
            .map(|source| (source.key.clone(), sanitize_count(counts.get(&source.key).copied())))
            .collect()
    }

    pub fn score(&self, counts: &SourceCounts) -> f64 {
        compute_total_score(counts, &self.catalog, self.decimals())
    }

    /// Scores a submission into a new entry. The submission's `createdAt`
    /// wins over `now` so imported history keeps its original timing.
    pub fn record(&self, submission: &Submission, now: DateTime<Utc>) -> Result<Entry, CoreError> {
        let source_counts = self.normalize_counts(&submission.numeric_counts());
        let total_score = self.score(&source_counts);
        let risk_tier = classify_risk(total_score, &self.bands)?.label.clone();
        debug!(tracker = %self.kind, total_score, %risk_tier, "recorded entry");

        Ok(Entry {
            id: Uuid::new_v4(),
            kind: self.kind,
            week_start: week_start_of(submission.week_start),
            source_counts,
            total_score,
            risk_tier,
            created_at: submission.created_at.unwrap_or(now),
        })
    }

    pub fn breakdown(&self, entry: &Entry) -> Vec<SourceContribution> {
        source_breakdown(&entry.source_counts, &self.catalog, self.decimals())
    }

    pub fn trends<Tz: TimeZone>(
        &self,
        entries: &[Entry],
        granularity: Granularity,
        reference: NaiveDateTime,
        tz: &Tz,
    ) -> Result<TrendSeries, CoreError> {
        let buckets = build_buckets(granularity, reference)?;
        let points = aggregate(entries, &buckets, self.temporal_key, tz);
        let means: Vec<f64> = points.iter().map(|point| point.mean).collect();
        let fitted = fit_linear_trend(&means);
        let display_range = compute_display_range(&means, &self.bands.thresholds());

        Ok(TrendSeries {
            granularity,
            points,
            fitted,
            display_range,
        })
    }

    pub fn stats(&self, entries: &[Entry], now: DateTime<Utc>, config: &StatsConfig) -> DashboardStats {
        compute_stats(entries, now, config, self.decimals())
    }

    pub fn percentile(&self, score: f64, histogram: &[HistogramBin]) -> Result<Option<u8>, CoreError> {
        percentile_rank(score, histogram)
    }
}

/// Both trackers, resolved from configuration.
#[derive(Debug, Clone)]
pub struct Trackers {
    microplastic: Tracker,
    pfas: Tracker,
}

impl Trackers {
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        Ok(Self {
            microplastic: Tracker::from_config(TrackerKind::Microplastic, &config.microplastic)?,
            pfas: Tracker::from_config(TrackerKind::Pfas, &config.pfas)?,
        })
    }

    pub fn get(&self, kind: TrackerKind) -> &Tracker {
        match kind {
            TrackerKind::Microplastic => &self.microplastic,
            TrackerKind::Pfas => &self.pfas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RiskBand;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn trackers() -> Trackers {
        Trackers::from_config(&AppConfig::default()).unwrap()
    }

    fn submission(week: (i32, u32, u32), created_at: &str, counts: &[(&str, serde_json::Value)]) -> Submission {
        Submission {
            week_start: NaiveDate::from_ymd_opt(week.0, week.1, week.2).unwrap(),
            created_at: Some(created_at.parse().unwrap()),
            id: None,
            counts: counts
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn record_scores_and_classifies_once() {
        let trackers = trackers();
        let tracker = trackers.get(TrackerKind::Microplastic);
        let entry = tracker
            .record(
                &submission(
                    (2026, 10, 14),
                    "2026-10-14T10:00:00Z",
                    &[
                        ("bottledWater", serde_json::json!(10)),
                        ("seafood", serde_json::json!(2)),
                        ("mystery", serde_json::json!(50)),
                    ],
                ),
                Utc::now(),
            )
            .unwrap();

        assert_eq!(entry.total_score, 2.7);
        assert_eq!(entry.risk_tier, "Low");
        assert_eq!(entry.week_start, NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        assert_eq!(entry.source_counts.len(), tracker.catalog.sources().len());
        assert!(!entry.source_counts.contains_key("mystery"));
        assert_eq!(entry.created_at, "2026-10-14T10:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn record_defaults_created_at_to_now() {
        let trackers = trackers();
        let now: DateTime<Utc> = "2026-10-14T18:00:00Z".parse().unwrap();
        let mut raw = submission((2026, 10, 12), "2026-10-14T10:00:00Z", &[("tapWater", serde_json::json!(5))]);
        raw.created_at = None;
        let entry = trackers.get(TrackerKind::Pfas).record(&raw, now).unwrap();
        assert_eq!(entry.created_at, now);
        assert_eq!(entry.total_score, 0.005);
        assert_eq!(entry.kind, TrackerKind::Pfas);
    }

    #[test]
    fn trends_combine_aggregation_fit_and_range() {
        let trackers = trackers();
        let tracker = trackers.get(TrackerKind::Microplastic);
        let now: DateTime<Utc> = "2026-10-14T12:00:00Z".parse().unwrap();
        let entries: Vec<Entry> = [(2026, 9, 21, 4), (2026, 9, 28, 8), (2026, 10, 5, 12)]
            .iter()
            .map(|(y, m, d, bottles)| {
                tracker
                    .record(
                        &submission((*y, *m, *d), "2026-10-01T00:00:00Z", &[("bottledWater", serde_json::json!(bottles * 10))]),
                        now,
                    )
                    .unwrap()
            })
            .collect();

        let series = tracker
            .trends(&entries, Granularity::Medium, now.naive_utc(), &Utc)
            .unwrap();
        let means: Vec<f64> = series.points.iter().map(|p| p.mean).collect();
        assert_eq!(means, vec![8.0, 16.0, 24.0]);
        assert_eq!(series.fitted.len(), 3);
        assert!((series.fitted[2] - 24.0).abs() < 1e-9);
        assert_eq!(series.display_range.0, 0.0);
        assert!((series.display_range.1 - 103.5).abs() < 1e-9);
    }

    #[test]
    fn invalid_custom_bands_fail_at_start_up() {
        let mut config = AppConfig::default();
        config.pfas.bands = Some(vec![RiskBand {
            label: "Only".to_string(),
            min: 0.0,
            max: Some(1.0),
        }]);
        assert!(matches!(Trackers::from_config(&config), Err(CoreError::InvalidBands(_))));
    }
}
