use crate::error::CoreError;
use crate::models::HistogramBin;

/// Share of the population strictly below `user_value`, rounded to a whole
/// percent. `Ok(None)` when the histogram holds nobody.
pub fn percentile_rank(user_value: f64, histogram: &[HistogramBin]) -> Result<Option<u8>, CoreError> {
    let mut total: i64 = 0;
    let mut below: i64 = 0;

    for bin in histogram {
        if bin.count < 0 {
            return Err(CoreError::NegativeHistogramCount {
                value: bin.value,
                count: bin.count,
            });
        }
        total = total.checked_add(bin.count).ok_or(CoreError::HistogramOverflow)?;
        if bin.value < user_value {
            below = below.checked_add(bin.count).ok_or(CoreError::HistogramOverflow)?;
        }
    }

    if total == 0 {
        return Ok(None);
    }

    Ok(Some((100.0 * below as f64 / total as f64).round() as u8))
}
