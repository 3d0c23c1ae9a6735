use serde::Serialize;

use crate::models::{round_to, DashboardStats, Entry, TrackerKind};
use crate::risk::is_elevated;
use crate::tracker::Tracker;

const MAX_INSIGHTS: usize = 3;
const PROGRESS_THRESHOLD_PERCENT: f64 = -10.0;
const CAUTION_COUNT: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Reduce,
    Progress,
    Caution,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GoalKind {
    /// Bring the score under `target`, the lowest band's upper bound.
    #[serde(rename_all = "camelCase")]
    ReduceTier { target: f64, reduction_needed: f64 },
    /// Log an entry every expected week.
    CompleteTracking,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub title: String,
    pub progress_percent: f64,
    #[serde(flatten)]
    pub kind: GoalKind,
}

/// Smallest top-source contribution worth a "reduce" suggestion.
fn contribution_floor(kind: TrackerKind) -> f64 {
    match kind {
        TrackerKind::Microplastic => 0.5,
        TrackerKind::Pfas => 0.01,
    }
}

pub fn build_insights(tracker: &Tracker, latest: Option<&Entry>, stats: &DashboardStats) -> Vec<Insight> {
    let Some(latest) = latest else {
        return Vec::new();
    };
    let unit = tracker.kind.unit();
    let mut insights = Vec::new();

    if let Some(top) = tracker.breakdown(latest).into_iter().next() {
        if top.contribution > contribution_floor(tracker.kind) {
            let potential = round_to(top.contribution * 0.5, tracker.decimals());
            insights.push(Insight {
                kind: InsightKind::Reduce,
                title: format!("Reduce {}", top.label),
                description: format!(
                    "Your biggest contributor. Cutting it in half could lower your weekly total by {potential} {unit}."
                ),
            });
        }
    }

    if stats.weekly_change_percent < PROGRESS_THRESHOLD_PERCENT {
        insights.push(Insight {
            kind: InsightKind::Progress,
            title: "Good progress".to_string(),
            description: format!(
                "Your total is down {:.1}% compared with last week.",
                stats.weekly_change_percent.abs()
            ),
        });
    }

    if let Some(heaviest) = tracker.catalog.heaviest() {
        let count = latest.source_counts.get(&heaviest.key).copied().unwrap_or(0.0);
        if count > CAUTION_COUNT {
            insights.push(Insight {
                kind: InsightKind::Caution,
                title: format!("Watch {}", heaviest.label),
                description: format!(
                    "{count} {} logged this week from your highest-weight source.",
                    heaviest.unit
                ),
            });
        }
    }

    if is_elevated(&stats.current_risk_tier, &tracker.bands) {
        insights.push(Insight {
            kind: InsightKind::Warning,
            title: format!("{} risk level detected", stats.current_risk_tier),
            description: "Consider changes to the sources above to bring your exposure down.".to_string(),
        });
    }

    insights.truncate(MAX_INSIGHTS);
    insights
}

/// Progress toward the lowest tier; `None` once the score is already there.
pub fn lowest_tier_goal(tracker: &Tracker, stats: &DashboardStats) -> Option<Goal> {
    if stats.total_entries == 0 {
        return None;
    }
    let bands = tracker.bands.bands();
    let low = bands.first()?;
    let low_max = low.max?;
    if stats.current_score < low_max {
        return None;
    }

    let progress_percent = match bands.get(1).and_then(|band| band.max) {
        Some(next_max) if next_max > low_max => {
            ((next_max - stats.current_score) / (next_max - low_max) * 100.0).clamp(0.0, 100.0)
        }
        _ => 0.0,
    };

    Some(Goal {
        title: format!("Reduce to {} risk", low.label),
        progress_percent: round_to(progress_percent, 0),
        kind: GoalKind::ReduceTier {
            target: low_max,
            reduction_needed: round_to(stats.current_score - low_max, tracker.decimals()),
        },
    })
}

/// Logging completeness; dropped once every expected week has an entry.
pub fn tracking_goal(stats: &DashboardStats) -> Option<Goal> {
    if stats.data_completeness_percent >= 100 {
        return None;
    }
    Some(Goal {
        title: "Complete Weekly Tracking".to_string(),
        progress_percent: f64::from(stats.data_completeness_percent),
        kind: GoalKind::CompleteTracking,
    })
}

pub fn build_goals(tracker: &Tracker, stats: &DashboardStats) -> Vec<Goal> {
    lowest_tier_goal(tracker, stats)
        .into_iter()
        .chain(tracking_goal(stats))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, StatsConfig};
    use crate::models::Submission;
    use crate::tracker::Trackers;
    use chrono::{DateTime, Utc};

    fn now() -> DateTime<Utc> {
        "2026-10-14T12:00:00Z".parse().unwrap()
    }

    fn recorded(tracker: &Tracker, counts: serde_json::Value) -> Entry {
        let mut map = serde_json::Map::new();
        map.insert("weekStart".into(), serde_json::json!("2026-10-12"));
        if let serde_json::Value::Object(extra) = counts {
            map.extend(extra);
        }
        let submission: Submission = serde_json::from_value(serde_json::Value::Object(map)).unwrap();
        tracker.record(&submission, now()).unwrap()
    }

    #[test]
    fn suggests_biggest_contributor_and_warns_on_high_tier() {
        let trackers = Trackers::from_config(&AppConfig::default()).unwrap();
        let tracker = trackers.get(crate::models::TrackerKind::Microplastic);
        let entry = recorded(tracker, serde_json::json!({"bottledWater": 100, "salt": 6}));
        let stats = tracker.stats(std::slice::from_ref(&entry), now(), &StatsConfig::default());
        assert_eq!(stats.current_risk_tier, "High");

        let insights = build_insights(tracker, Some(&entry), &stats);
        assert_eq!(insights.len(), 3);
        assert_eq!(insights[0].kind, InsightKind::Reduce);
        assert_eq!(insights[0].title, "Reduce Plastic Water Bottles");
        assert!(insights[0].description.contains("10 p/mL"));
        assert_eq!(insights[1].kind, InsightKind::Caution);
        assert_eq!(insights[2].kind, InsightKind::Warning);
    }

    #[test]
    fn quiet_week_gets_no_insights_or_goal() {
        let trackers = Trackers::from_config(&AppConfig::default()).unwrap();
        let tracker = trackers.get(crate::models::TrackerKind::Microplastic);
        let entry = recorded(tracker, serde_json::json!({"teaBags": 2}));
        let stats = tracker.stats(std::slice::from_ref(&entry), now(), &StatsConfig::default());
        assert!(build_insights(tracker, Some(&entry), &stats).is_empty());
        assert!(lowest_tier_goal(tracker, &stats).is_none());
        assert!(build_insights(tracker, None, &DashboardStats::empty()).is_empty());
    }

    #[test]
    fn progress_insight_needs_a_real_drop() {
        let trackers = Trackers::from_config(&AppConfig::default()).unwrap();
        let tracker = trackers.get(crate::models::TrackerKind::Microplastic);
        let entry = recorded(tracker, serde_json::json!({"teaBags": 2}));
        let mut stats = tracker.stats(std::slice::from_ref(&entry), now(), &StatsConfig::default());
        stats.weekly_change_percent = -25.0;
        let insights = build_insights(tracker, Some(&entry), &stats);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Progress);
        assert!(insights[0].description.contains("25.0%"));
    }

    #[test]
    fn goal_tracks_distance_to_lowest_tier() {
        let trackers = Trackers::from_config(&AppConfig::default()).unwrap();
        let tracker = trackers.get(crate::models::TrackerKind::Microplastic);
        let mut stats = DashboardStats::empty();
        stats.total_entries = 1;
        stats.current_score = 12.5;
        stats.current_risk_tier = "Normal".to_string();

        let goal = lowest_tier_goal(tracker, &stats).unwrap();
        assert_eq!(goal.title, "Reduce to Low risk");
        assert_eq!(goal.progress_percent, 50.0);
        assert_eq!(
            goal.kind,
            GoalKind::ReduceTier {
                target: 5.0,
                reduction_needed: 7.5
            }
        );

        stats.current_score = 45.0;
        assert_eq!(lowest_tier_goal(tracker, &stats).unwrap().progress_percent, 0.0);
    }

    #[test]
    fn tracking_goal_follows_completeness() {
        let trackers = Trackers::from_config(&AppConfig::default()).unwrap();
        let tracker = trackers.get(crate::models::TrackerKind::Microplastic);
        let mut stats = DashboardStats::empty();
        stats.total_entries = 2;
        stats.current_score = 12.5;
        stats.data_completeness_percent = 50;

        let goals = build_goals(tracker, &stats);
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[1].title, "Complete Weekly Tracking");
        assert_eq!(goals[1].progress_percent, 50.0);
        assert_eq!(goals[1].kind, GoalKind::CompleteTracking);

        stats.data_completeness_percent = 100;
        let goals = build_goals(tracker, &stats);
        assert_eq!(goals.len(), 1);
        assert!(matches!(goals[0].kind, GoalKind::ReduceTier { .. }));

        assert_eq!(
            tracking_goal(&DashboardStats::empty()).map(|goal| goal.progress_percent),
            Some(0.0)
        );
    }

    #[test]
    fn goal_serializes_with_kind_tag() {
        let goal = tracking_goal(&DashboardStats::empty()).unwrap();
        let json = serde_json::to_value(&goal).unwrap();
        assert_eq!(json["kind"], "completeTracking");
        assert_eq!(json["progressPercent"], 0.0);
    }
}
