use crate::catalog::SourceCatalog;
use crate::models::{round_to, SourceContribution, SourceCounts};

/// Largest weekly count a single source can contribute.
pub const MAX_COUNT: f64 = 1_000_000.0;

/// Counts that are missing, negative or not finite contribute nothing;
/// larger counts are capped at [`MAX_COUNT`].
pub fn sanitize_count(value: Option<f64>) -> f64 {
    match value {
        Some(count) if count.is_finite() && count > 0.0 => count.min(MAX_COUNT),
        _ => 0.0,
    }
}

/// Weighted sum of `counts` over every catalog source, rounded to `decimals`.
/// Keys outside the catalog are ignored.
pub fn compute_total_score(counts: &SourceCounts, catalog: &SourceCatalog, decimals: u32) -> f64 {
    let total: f64 = catalog
        .sources()
        .iter()
        .map(|source| sanitize_count(counts.get(&source.key).copied()) * source.weight_per_unit)
        .sum();
    round_to(total, decimals)
}

/// Per-source contributions, largest first.
pub fn source_breakdown(
    counts: &SourceCounts,
    catalog: &SourceCatalog,
    decimals: u32,
) -> Vec<SourceContribution> {
    let mut contributions: Vec<SourceContribution> = catalog
        .sources()
        .iter()
        .map(|source| {
            let count = sanitize_count(counts.get(&source.key).copied());
            SourceContribution {
                key: source.key.clone(),
                label: source.label.clone(),
                count,
                contribution: round_to(count * source.weight_per_unit, decimals),
                percentage: 0,
            }
        })
        .collect();

    let total: f64 = contributions.iter().map(|c| c.contribution).sum();
    if total > 0.0 {
        for item in contributions.iter_mut() {
            item.percentage = (item.contribution / total * 100.0).round() as u32;
        }
    }

    contributions.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    contributions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{preset_sources, Preset, SourceDefinition};
    use crate::models::TrackerKind;
    use proptest::prelude::*;

    fn counts(pairs: &[(&str, f64)]) -> SourceCounts {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn microplastic() -> SourceCatalog {
        SourceCatalog::new(preset_sources(TrackerKind::Microplastic, Preset::Standard)).unwrap()
    }

    #[test]
    fn weighted_sum_rounds_to_two_places() {
        let two_sources = SourceCatalog::new(vec![
            SourceDefinition {
                key: "bottledWater".into(),
                label: "Bottles".into(),
                unit: "bottles".into(),
                weight_per_unit: 0.2,
                category: "beverages".into(),
            },
            SourceDefinition {
                key: "seafood".into(),
                label: "Seafood".into(),
                unit: "meals".into(),
                weight_per_unit: 0.35,
                category: "food".into(),
            },
        ])
        .unwrap();
        let total = compute_total_score(
            &counts(&[("bottledWater", 10.0), ("seafood", 2.0)]),
            &two_sources,
            2,
        );
        assert_eq!(total, 2.7);
    }

    #[test]
    fn malformed_counts_contribute_zero() {
        let total = compute_total_score(
            &counts(&[
                ("bottledWater", f64::NAN),
                ("seafood", -4.0),
                ("salt", f64::INFINITY),
                ("teaBags", 10.0),
                ("notASource", 1000.0),
            ]),
            &microplastic(),
            2,
        );
        assert_eq!(total, 1.0);
    }

    #[test]
    fn huge_counts_are_capped_and_total_stays_finite() {
        assert_eq!(sanitize_count(Some(1e308)), MAX_COUNT);
        let catalog = microplastic();
        let total = compute_total_score(
            &counts(&[("bottledWater", 1e307), ("salt", 1e308)]),
            &catalog,
            2,
        );
        assert!(total.is_finite());
        let capped = compute_total_score(
            &counts(&[("bottledWater", MAX_COUNT), ("salt", MAX_COUNT)]),
            &catalog,
            2,
        );
        assert_eq!(total, capped);
    }

    #[test]
    fn pfas_keeps_three_decimals() {
        let catalog = SourceCatalog::new(preset_sources(TrackerKind::Pfas, Preset::Standard)).unwrap();
        let total = compute_total_score(
            &counts(&[("tapWater", 7.0), ("sweatResistantClothing", 1.0)]),
            &catalog,
            3,
        );
        assert_eq!(total, 0.019);
    }

    #[test]
    fn breakdown_sorts_by_contribution_and_shares_sum_near_100() {
        let breakdown = source_breakdown(
            &counts(&[("bottledWater", 10.0), ("seafood", 2.0), ("salt", 1.0)]),
            &microplastic(),
            2,
        );
        assert_eq!(breakdown[0].key, "bottledWater");
        assert_eq!(breakdown[0].contribution, 2.0);
        assert_eq!(breakdown[1].key, "seafood");
        let shares: u32 = breakdown.iter().map(|c| c.percentage).sum();
        assert!((99..=101).contains(&shares));
    }

    #[test]
    fn breakdown_of_empty_week_has_zero_shares() {
        let breakdown = source_breakdown(&SourceCounts::new(), &microplastic(), 2);
        assert_eq!(breakdown.len(), microplastic().sources().len());
        assert!(breakdown.iter().all(|c| c.percentage == 0 && c.contribution == 0.0));
    }

    proptest! {
        #[test]
        fn raising_one_count_never_lowers_the_score(
            base in proptest::collection::vec(0u32..50, 11),
            index in 0usize..11,
            bump in 1u32..50,
        ) {
            let catalog = microplastic();
            let keys: Vec<String> = catalog.sources().iter().map(|s| s.key.clone()).collect();
            let before: SourceCounts = keys.iter().cloned().zip(base.iter().map(|v| *v as f64)).collect();
            let mut after = before.clone();
            *after.get_mut(&keys[index]).unwrap() += bump as f64;
            prop_assert!(compute_total_score(&after, &catalog, 2) >= compute_total_score(&before, &catalog, 2));
        }
    }
}
