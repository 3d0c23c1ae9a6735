use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{week_start_of, Entry, HistogramBin, SourceCounts, Submission, TrackerKind};
use crate::tracker::Trackers;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts one entry. Rows sharing an `id`, or an owner/tracker/`source_key`
/// triple, with an existing row are skipped and reported as `false`.
pub async fn insert_entry<'e, E: PgExecutor<'e>>(
    executor: E,
    owner: &str,
    entry: &Entry,
    source_key: Option<&str>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO exposure_tracker.entries
        (id, owner, tracker, week_start, source_counts, total_score, risk_tier, created_at, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(entry.id)
    .bind(owner)
    .bind(entry.kind.as_str())
    .bind(entry.week_start)
    .bind(Json(&entry.source_counts))
    .bind(entry.total_score)
    .bind(&entry.risk_tier)
    .bind(entry.created_at)
    .bind(source_key)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All of `owner`'s entries for one tracker, newest first.
pub async fn fetch_entries(
    pool: &PgPool,
    owner: &str,
    kind: TrackerKind,
) -> anyhow::Result<Vec<Entry>> {
    let rows = sqlx::query(
        "SELECT id, tracker, week_start, source_counts, total_score, risk_tier, created_at \
         FROM exposure_tracker.entries \
         WHERE owner = $1 AND tracker = $2 \
         ORDER BY created_at DESC",
    )
    .bind(owner)
    .bind(kind.as_str())
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let tracker: String = row.try_get("tracker")?;
        let Json(source_counts): Json<SourceCounts> = row.try_get("source_counts")?;
        entries.push(Entry {
            id: row.try_get("id")?,
            kind: tracker.parse().map_err(anyhow::Error::msg)?,
            week_start: row.try_get("week_start")?,
            source_counts,
            total_score: row.try_get("total_score")?,
            risk_tier: row.try_get("risk_tier")?,
            created_at: row.try_get("created_at")?,
        });
    }

    Ok(entries)
}

/// Latest score of every owner, grouped by value.
pub async fn fetch_population_histogram(
    pool: &PgPool,
    kind: TrackerKind,
) -> anyhow::Result<Vec<HistogramBin>> {
    let rows = sqlx::query(
        r#"
        SELECT latest.total_score AS value, COUNT(*) AS count
        FROM (
            SELECT DISTINCT ON (owner) owner, total_score
            FROM exposure_tracker.entries
            WHERE tracker = $1
            ORDER BY owner, created_at DESC
        ) latest
        GROUP BY latest.total_score
        ORDER BY value
        "#,
    )
    .bind(kind.as_str())
    .fetch_all(pool)
    .await?;

    let mut bins = Vec::with_capacity(rows.len());
    for row in rows {
        bins.push(HistogramBin {
            value: row.try_get("value")?,
            count: row.try_get("count")?,
        });
    }
    Ok(bins)
}

pub async fn seed(pool: &PgPool, trackers: &Trackers) -> anyhow::Result<usize> {
    let now = Utc::now();
    let this_monday = week_start_of(now.date_naive());

    let weekly = vec![
        ("demo", TrackerKind::Microplastic, 3, vec![("bottledWater", 14.0), ("seafood", 3.0), ("takeoutContainers", 4.0)]),
        ("demo", TrackerKind::Microplastic, 2, vec![("bottledWater", 10.0), ("seafood", 2.0), ("teaBags", 7.0)]),
        ("demo", TrackerKind::Microplastic, 1, vec![("bottledWater", 6.0), ("salt", 4.0), ("syntheticClothing", 5.0)]),
        ("demo", TrackerKind::Microplastic, 0, vec![("bottledWater", 4.0), ("seafood", 1.0), ("householdDust", 70.0)]),
        ("demo", TrackerKind::Pfas, 1, vec![("dentalFloss", 7.0), ("tapWater", 21.0)]),
        ("demo", TrackerKind::Pfas, 0, vec![("dentalFloss", 3.0), ("nonStickPans", 2.0), ("tapWater", 14.0)]),
        ("neighbor-a", TrackerKind::Microplastic, 0, vec![("bottledWater", 30.0), ("seafood", 5.0)]),
        ("neighbor-b", TrackerKind::Microplastic, 0, vec![("teaBags", 5.0), ("cannedFood", 3.0)]),
        ("neighbor-c", TrackerKind::Microplastic, 0, vec![("plasticPackaged", 40.0), ("takeoutContainers", 10.0)]),
        ("neighbor-a", TrackerKind::Pfas, 0, vec![("toiletPaper", 3.0), ("sweatResistantClothing", 4.0)]),
    ];

    let mut inserted = 0usize;
    for (index, (owner, kind, weeks_back, counts)) in weekly.into_iter().enumerate() {
        let week_start = this_monday - Duration::weeks(weeks_back);
        let submission = Submission {
            week_start,
            created_at: Some(now - Duration::weeks(weeks_back)),
            id: None,
            counts: counts
                .into_iter()
                .map(|(key, count)| (key.to_string(), serde_json::Value::from(count)))
                .collect(),
        };
        let mut entry = trackers.get(kind).record(&submission, now)?;
        entry.id = Uuid::from_u128(0x5eed_0000_0000_0000_0000_0000_0000_0000 + index as u128);
        let key = format!("seed-{index}");
        if insert_entry(pool, owner, &entry, Some(key.as_str())).await? {
            inserted += 1;
        }
    }

    info!(inserted, "seeded demo entries");
    Ok(inserted)
}

/// Dedupe key for an imported submission: its own id when it carries one,
/// otherwise derived from the week, timestamp and scored counts so an
/// identical row maps to the same key on every run.
fn import_key(origin: &str, submission: &Submission, counts: &SourceCounts) -> anyhow::Result<String> {
    if let Some(id) = submission.id.as_deref() {
        return Ok(format!("{origin}:{id}"));
    }
    let created_at = submission
        .created_at
        .map(|created_at| created_at.to_rfc3339())
        .unwrap_or_default();
    Ok(format!(
        "{origin}:{}:{created_at}:{}",
        submission.week_start,
        serde_json::to_string(counts)?
    ))
}

fn parse_row(headers: &csv::StringRecord, record: &csv::StringRecord, line: usize) -> Option<Submission> {
    let mut week_start = None;
    let mut created_at = None;
    let mut id = None;
    let mut counts = BTreeMap::new();

    for (header, value) in headers.iter().zip(record.iter()) {
        let value = value.trim();
        match header.trim() {
            "week_start" | "weekStart" => {
                week_start = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok();
            }
            "created_at" | "createdAt" => {
                created_at = value.parse::<DateTime<Utc>>().ok();
            }
            "source_key" | "sourceKey" | "id" => {
                id = (!value.is_empty()).then(|| value.to_string());
            }
            key => match value.parse::<f64>() {
                Ok(count) => {
                    counts.insert(key.to_string(), serde_json::Value::from(count));
                }
                Err(_) if value.is_empty() => {}
                Err(_) => warn!(line, column = key, value, "ignoring non-numeric count"),
            },
        }
    }

    match week_start {
        Some(week_start) => Some(Submission {
            week_start,
            created_at,
            id,
            counts,
        }),
        None => {
            warn!(line, "skipping row without a valid week_start");
            None
        }
    }
}

/// Imports weekly count rows (`week_start`, optional `created_at` and
/// `source_key`, one column per source key). Every row is scored on the way
/// in; rows already imported for this owner are skipped.
pub async fn import_csv(
    pool: &PgPool,
    trackers: &Trackers,
    kind: TrackerKind,
    owner: &str,
    csv_path: &Path,
) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let headers = reader.headers()?.clone();
    let tracker = trackers.get(kind);
    let now = Utc::now();
    let mut inserted = 0usize;

    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let Some(submission) = parse_row(&headers, &record, index + 2) else {
            continue;
        };
        let entry = tracker.record(&submission, now)?;
        let key = import_key("csv", &submission, &entry.source_counts)?;
        if insert_entry(pool, owner, &entry, Some(key.as_str())).await? {
            inserted += 1;
        }
    }

    info!(inserted, tracker = %kind, owner, "imported csv");
    Ok(inserted)
}

/// Browser-side entries saved before the user signed in.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GuestExport {
    pub microplastic: Vec<Submission>,
    pub pfas: Vec<Submission>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum GuestImportOutcome {
    Imported(usize),
    AlreadyImported,
}

/// One-time import of guest data; a second attempt for the same owner is a
/// no-op.
pub async fn import_guest(
    pool: &PgPool,
    trackers: &Trackers,
    owner: &str,
    json_path: &Path,
) -> anyhow::Result<GuestImportOutcome> {
    let contents = std::fs::read_to_string(json_path)
        .with_context(|| format!("failed to read {}", json_path.display()))?;
    let export: GuestExport =
        serde_json::from_str(&contents).context("guest export is not valid JSON")?;

    let mut tx = pool.begin().await?;
    let claimed = sqlx::query(
        "INSERT INTO exposure_tracker.guest_imports (owner, entry_count) VALUES ($1, 0) \
         ON CONFLICT (owner) DO NOTHING",
    )
    .bind(owner)
    .execute(&mut *tx)
    .await?;
    if claimed.rows_affected() == 0 {
        info!(owner, "guest data already imported");
        return Ok(GuestImportOutcome::AlreadyImported);
    }

    let now = Utc::now();
    let mut inserted = 0usize;
    for (kind, submissions) in [
        (TrackerKind::Microplastic, &export.microplastic),
        (TrackerKind::Pfas, &export.pfas),
    ] {
        let tracker = trackers.get(kind);
        for submission in submissions {
            let entry = tracker.record(submission, now)?;
            let key = import_key("guest", submission, &entry.source_counts)?;
            if insert_entry(&mut *tx, owner, &entry, Some(key.as_str())).await? {
                inserted += 1;
            }
        }
    }

    sqlx::query("UPDATE exposure_tracker.guest_imports SET entry_count = $2 WHERE owner = $1")
        .bind(owner)
        .bind(inserted as i32)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(owner, inserted, "imported guest entries");
    Ok(GuestImportOutcome::Imported(inserted))
}
