use tracing::trace;

use crate::catalog::{RiskBand, RiskBands};
use crate::error::CoreError;

/// First band whose `[min, max)` holds `score`.
pub fn classify_risk(score: f64, bands: &RiskBands) -> Result<&RiskBand, CoreError> {
    if !score.is_finite() || score < 0.0 {
        return Err(CoreError::InvalidScore(score));
    }

    let band = bands
        .bands()
        .iter()
        .find(|band| band.contains(score))
        .ok_or(CoreError::InvalidScore(score))?;
    trace!(score, tier = %band.label, "classified score");
    Ok(band)
}

/// Whether `label` is one of the two highest tiers.
pub fn is_elevated(label: &str, bands: &RiskBands) -> bool {
    match bands.rank_of(label) {
        Some(rank) => rank + 2 >= bands.bands().len() && rank > 0,
        None => false,
    }
}
