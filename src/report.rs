use std::fmt::Write;

use crate::insights::{Goal, GoalKind, Insight};
use crate::models::{DashboardStats, Entry, NO_DATA};
use crate::tracker::{Tracker, TrendSeries};
use crate::trend::trend_slope;

pub struct ReportInput<'a> {
    pub owner: &'a str,
    pub stats: &'a DashboardStats,
    pub series: &'a TrendSeries,
    pub insights: &'a [Insight],
    pub goals: &'a [Goal],
    pub percentile: Option<u8>,
    /// Newest first.
    pub entries: &'a [Entry],
}

fn direction(slope: f64) -> &'static str {
    if slope > 0.0 {
        "rising"
    } else if slope < 0.0 {
        "falling"
    } else {
        "flat"
    }
}

pub fn build_report(tracker: &Tracker, input: &ReportInput<'_>) -> String {
    let unit = tracker.kind.unit();
    let stats = input.stats;
    let mut output = String::new();

    let _ = writeln!(output, "# {} Exposure Report", title_case(tracker.kind.as_str()));
    let _ = writeln!(output, "Generated for {}", input.owner);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    if stats.current_risk_tier == NO_DATA {
        let _ = writeln!(output, "No entries recorded yet.");
    } else {
        let _ = writeln!(output, "- Current level: {}", stats.current_risk_tier);
        let _ = writeln!(output, "- Weekly intake: {} {}", stats.weekly_intake, unit);
        let _ = writeln!(output, "- Monthly average: {} {}", stats.monthly_average, unit);
        let _ = writeln!(output, "- Change vs last week: {:+.2}%", stats.weekly_change_percent);
        let _ = writeln!(output, "- Data completeness: {}%", stats.data_completeness_percent);
        let _ = writeln!(output, "- Entries: {}", stats.total_entries);
        match input.percentile {
            Some(rank) => {
                let _ = writeln!(output, "- Population percentile: {rank}th");
            }
            None => {
                let _ = writeln!(output, "- Population percentile: not enough data");
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trend");

    if input.series.points.is_empty() {
        let _ = writeln!(output, "No entries fall inside the charted window.");
    } else {
        let _ = writeln!(output, "| Period | Mean ({unit}) | Samples | Trend |");
        let _ = writeln!(output, "|---|---|---|---|");
        for (point, fitted) in input.series.points.iter().zip(input.series.fitted.iter()) {
            let _ = writeln!(
                output,
                "| {} | {:.3} | {} | {:.3} |",
                point.label, point.mean, point.sample_count, fitted
            );
        }
        let (_, max) = input.series.display_range;
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Trend is {} (chart range 0 to {:.2} {}).",
            direction(trend_slope(&input.series.fitted)),
            max,
            unit
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");

    if input.insights.is_empty() && input.goals.is_empty() {
        let _ = writeln!(output, "Nothing to flag this week.");
    } else {
        for insight in input.insights {
            let _ = writeln!(output, "- **{}**: {}", insight.title, insight.description);
        }
        for goal in input.goals {
            match goal.kind {
                GoalKind::ReduceTier {
                    target,
                    reduction_needed,
                } => {
                    let _ = writeln!(
                        output,
                        "- **{}**: {:.0}% of the way below {} {} (reduce by {} {})",
                        goal.title, goal.progress_percent, target, unit, reduction_needed, unit
                    );
                }
                GoalKind::CompleteTracking => {
                    let _ = writeln!(
                        output,
                        "- **{}**: {:.0}% of expected weeks logged",
                        goal.title, goal.progress_percent
                    );
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Entries");

    if input.entries.is_empty() {
        let _ = writeln!(output, "No entries recorded yet.");
    } else {
        for entry in input.entries.iter().take(5) {
            let top = tracker
                .breakdown(entry)
                .into_iter()
                .next()
                .filter(|source| source.contribution > 0.0)
                .map(|source| source.label)
                .unwrap_or_else(|| "none".to_string());
            let _ = writeln!(
                output,
                "- Week of {}: {} {} ({}), top source {}",
                entry.week_start, entry.total_score, unit, entry.risk_tier, top
            );
        }
    }

    output
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
