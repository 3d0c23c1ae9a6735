use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::TrackerKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub key: String,
    pub label: String,
    pub unit: String,
    pub weight_per_unit: f64,
    pub category: String,
}

/// Upper bound on a source's per-unit weight.
pub const MAX_WEIGHT: f64 = 1_000_000.0;

/// Immutable set of sources for one tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCatalog {
    sources: Vec<SourceDefinition>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<SourceDefinition>) -> Result<Self, CoreError> {
        if sources.is_empty() {
            return Err(CoreError::InvalidCatalog("no sources defined".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.key.as_str()) {
                return Err(CoreError::InvalidCatalog(format!(
                    "duplicate source key '{}'",
                    source.key
                )));
            }
            if !(0.0..=MAX_WEIGHT).contains(&source.weight_per_unit) {
                return Err(CoreError::InvalidCatalog(format!(
                    "source '{}' has weight {}",
                    source.key, source.weight_per_unit
                )));
            }
        }

        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[SourceDefinition] {
        &self.sources
    }

    /// Source with the largest per-unit weight.
    pub fn heaviest(&self) -> Option<&SourceDefinition> {
        self.sources
            .iter()
            .max_by(|a, b| a.weight_per_unit.total_cmp(&b.weight_per_unit))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBand {
    pub label: String,
    pub min: f64,
    /// Exclusive upper bound; `None` means unbounded.
    #[serde(default)]
    pub max: Option<f64>,
}

impl RiskBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && self.max.map_or(true, |max| score < max)
    }
}

/// Ordered band table partitioning `[0, inf)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskBands {
    bands: Vec<RiskBand>,
}

impl RiskBands {
    pub fn new(bands: Vec<RiskBand>) -> Result<Self, CoreError> {
        let first = bands
            .first()
            .ok_or_else(|| CoreError::InvalidBands("no bands defined".to_string()))?;
        if first.min != 0.0 {
            return Err(CoreError::InvalidBands(format!(
                "first band '{}' starts at {} instead of 0",
                first.label, first.min
            )));
        }

        for pair in bands.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            match current.max {
                None => {
                    return Err(CoreError::InvalidBands(format!(
                        "band '{}' is unbounded but is not the last band",
                        current.label
                    )))
                }
                Some(max) if max <= current.min => {
                    return Err(CoreError::InvalidBands(format!(
                        "band '{}' is empty",
                        current.label
                    )))
                }
                Some(max) if max != next.min => {
                    return Err(CoreError::InvalidBands(format!(
                        "band '{}' ends at {} but '{}' starts at {}",
                        current.label, max, next.label, next.min
                    )))
                }
                Some(_) => {}
            }
        }

        if let Some(last) = bands.last() {
            if last.max.is_some() {
                return Err(CoreError::InvalidBands(format!(
                    "last band '{}' must be unbounded",
                    last.label
                )));
            }
        }

        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[RiskBand] {
        &self.bands
    }

    /// Finite band boundaries, ascending.
    pub fn thresholds(&self) -> Vec<f64> {
        self.bands.iter().filter_map(|band| band.max).collect()
    }

    /// Position of `label` in the ordering, lowest tier first.
    pub fn rank_of(&self, label: &str) -> Option<usize> {
        self.bands.iter().position(|band| band.label == label)
    }
}

/// Named revisions of the weight and threshold tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Tables used when entries are scored server-side.
    #[default]
    Standard,
    /// Older tables shipped with the browser client.
    ClientLegacy,
}

fn source(key: &str, label: &str, unit: &str, weight_per_unit: f64, category: &str) -> SourceDefinition {
    SourceDefinition {
        key: key.to_string(),
        label: label.to_string(),
        unit: unit.to_string(),
        weight_per_unit,
        category: category.to_string(),
    }
}

fn band(label: &str, min: f64, max: Option<f64>) -> RiskBand {
    RiskBand {
        label: label.to_string(),
        min,
        max,
    }
}

pub fn preset_sources(kind: TrackerKind, preset: Preset) -> Vec<SourceDefinition> {
    match (kind, preset) {
        (TrackerKind::Microplastic, Preset::Standard) => vec![
            source("bottledWater", "Plastic Water Bottles", "bottles per week", 0.2, "beverages"),
            source("seafood", "Seafood Meals", "meals per week", 0.35, "food"),
            source("salt", "Salt Usage", "teaspoons per week", 0.5, "food"),
            source("plasticPackaged", "Plastic Packaged Food", "items per week", 0.2, "packaging"),
            source("teaBags", "Tea Bags", "bags per week", 0.1, "beverages"),
            source("householdDust", "Indoor Time", "hours per week", 0.01, "household"),
            source("syntheticClothing", "Synthetic Clothing", "wears per week", 0.15, "clothing"),
            source("cannedFood", "Canned Food", "cans per week", 0.1, "food"),
            source("plasticKitchenware", "Plastic Kitchen Items", "uses per week", 0.05, "household"),
            source("coffeeCups", "Single-Serve Coffee Cups", "cups per week", 0.05, "beverages"),
            source("takeoutContainers", "Takeout Orders", "containers per week", 0.08, "packaging"),
        ],
        (TrackerKind::Microplastic, Preset::ClientLegacy) => vec![
            source("bottledWater", "Plastic Water Bottles", "bottles per week", 0.2, "beverages"),
            source("syntheticClothing", "Synthetic Clothing", "wears per week", 0.15, "clothing"),
            source("plasticPackaged", "Plastic Packaged Food", "items per week", 0.2, "packaging"),
            source("householdDust", "Indoor Time", "hours per day", 0.01, "household"),
            source("seafood", "Seafood Meals", "meals per week", 0.4, "food"),
            source("salt", "Salt Usage", "grams per week", 0.1, "food"),
            source("teaBags", "Tea Bags", "bags per week", 0.1, "beverages"),
            source("cannedFood", "Canned Food", "cans per week", 0.3, "food"),
            source("plasticKitchenware", "Plastic Kitchen Items", "times per week", 0.1, "household"),
            source("coffeeCups", "Single-Serve Coffee Cups", "cups per week", 0.15, "beverages"),
            source("takeoutContainers", "Takeout Orders", "orders per week", 0.25, "packaging"),
        ],
        (TrackerKind::Pfas, _) => vec![
            source("dentalFloss", "Dental Floss", "uses per week", 0.05, "personal-care"),
            source("toiletPaper", "Toilet Paper", "rolls per week", 0.02, "household"),
            source("sweatResistantClothing", "Sweat/Water Resistant Clothing", "wears per week", 0.012, "clothing"),
            source("tapWater", "Tap Water", "glasses per week", 0.001, "beverages"),
            source("nonStickPans", "Non-Stick Pans", "uses per week", 0.03, "kitchen"),
        ],
    }
}

pub fn preset_bands(kind: TrackerKind, preset: Preset) -> Vec<RiskBand> {
    match (kind, preset) {
        (TrackerKind::Microplastic, _) => vec![
            band("Low", 0.0, Some(5.0)),
            band("Normal", 5.0, Some(20.0)),
            band("High", 20.0, Some(90.0)),
            band("Extreme", 90.0, None),
        ],
        (TrackerKind::Pfas, Preset::Standard) => vec![
            band("Low", 0.0, Some(0.07)),
            band("Normal", 0.07, Some(0.2)),
            band("High", 0.2, Some(0.5)),
            band("Extreme", 0.5, None),
        ],
        (TrackerKind::Pfas, Preset::ClientLegacy) => vec![
            band("Low", 0.0, Some(0.02)),
            band("Normal", 0.02, Some(0.1)),
            band("High", 0.1, Some(1.0)),
            band("Extreme", 1.0, None),
        ],
    }
}
