use chrono::TimeZone;
use tracing::debug;

use crate::buckets::TimeBucket;
use crate::models::{AggregatedPoint, Entry, TemporalKey};

/// Scores outside `[0, inf)` or non-finite are charted as zero.
fn chartable(score: f64) -> f64 {
    if score.is_finite() && score >= 0.0 {
        score
    } else {
        0.0
    }
}

/// Mean score per bucket, oldest first. Each entry lands in the first bucket
/// holding its instant; entries outside every bucket and empty buckets are
/// left out.
pub fn aggregate<Tz: TimeZone>(
    entries: &[Entry],
    buckets: &[TimeBucket],
    key: TemporalKey,
    tz: &Tz,
) -> Vec<AggregatedPoint> {
    let mut sums = vec![(0.0f64, 0usize); buckets.len()];
    let mut dropped = 0usize;

    for entry in entries {
        let instant = entry.local_instant(key, tz);
        match buckets.iter().position(|bucket| bucket.contains(instant)) {
            Some(index) => {
                let slot = &mut sums[index];
                slot.0 += chartable(entry.total_score);
                slot.1 += 1;
            }
            None => dropped += 1,
        }
    }

    debug!(
        entries = entries.len(),
        dropped,
        buckets = buckets.len(),
        "aggregated entries into buckets"
    );

    buckets
        .iter()
        .zip(sums)
        .filter(|(_, (_, count))| *count > 0)
        .map(|(bucket, (sum, count))| AggregatedPoint {
            label: bucket.label.clone(),
            mean: sum / count as f64,
            sample_count: count,
        })
        .collect()
}
