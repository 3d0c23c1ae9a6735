use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::config::{MonthlyAveragePolicy, StatsConfig};
use crate::models::{round_to, DashboardStats, Entry};

fn mean(scores: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = scores.fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Overview numbers for a user's entries, in any order, as of `now`.
pub fn compute_stats(
    entries: &[Entry],
    now: DateTime<Utc>,
    config: &StatsConfig,
    decimals: u32,
) -> DashboardStats {
    let Some(latest) = entries.iter().max_by_key(|entry| entry.created_at) else {
        return DashboardStats::empty();
    };

    let monthly_average = match config.monthly_average {
        MonthlyAveragePolicy::TrailingDays { days } => {
            // A window reaching past the representable range covers everything.
            let cutoff = Duration::try_days(days).and_then(|window| now.checked_sub_signed(window));
            mean(
                entries
                    .iter()
                    .filter(|entry| cutoff.map_or(true, |cutoff| entry.created_at >= cutoff))
                    .map(|entry| entry.total_score),
            )
        }
        MonthlyAveragePolicy::RecentEntries { count } => {
            let mut newest: Vec<&Entry> = entries.iter().collect();
            newest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            mean(newest.into_iter().take(count).map(|entry| entry.total_score))
        }
    }
    .unwrap_or(0.0);

    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);
    let previous = mean(
        entries
            .iter()
            .filter(|entry| entry.created_at >= two_weeks_ago && entry.created_at < week_ago)
            .map(|entry| entry.total_score),
    );
    let weekly_change_percent = match previous {
        Some(baseline) if baseline > 0.0 => {
            round_to((latest.total_score - baseline) / baseline * 100.0, 2)
        }
        _ => 0.0,
    };

    let distinct_weeks = entries
        .iter()
        .map(|entry| entry.week_start)
        .collect::<HashSet<_>>()
        .len();
    let expected = config.expected_weeks.max(1) as f64;
    let completeness = (distinct_weeks as f64 / expected * 100.0).min(100.0).round() as u32;

    DashboardStats {
        current_risk_tier: latest.risk_tier.clone(),
        current_score: latest.total_score,
        weekly_intake: latest.total_score,
        monthly_average: round_to(monthly_average, decimals),
        data_completeness_percent: completeness,
        weekly_change_percent,
        total_entries: entries.len(),
    }
}
