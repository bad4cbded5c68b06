//! Circuit capacity estimation.
//!
//! Each direction is trimmed at a percentile of its own samples and the
//! remainder averaged. The trim discards every sample at or above the
//! percentile value, so a direction whose samples all tie (or that has a
//! single sample) produces `0`.

use crate::models::{CapacityEstimate, DirectionSeries};

/// Value at fraction `q` (0.0–1.0) of an ascending slice, linearly
/// interpolated between the two nearest ranks.
///
/// Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q.clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(last);
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Values strictly below the `percentile`th percentile of the series, in
/// ascending order.
pub fn trim_outliers(series: &DirectionSeries, percentile: u8) -> Vec<f64> {
    let mut sorted: Vec<f64> = series.values().collect();
    sorted.sort_by(f64::total_cmp);

    let q = f64::from(percentile.min(100)) / 100.0;
    match quantile(&sorted, q) {
        Some(threshold) => sorted.into_iter().filter(|v| *v < threshold).collect(),
        None => Vec::new(),
    }
}

/// Mean of the trimmed series, rounded to two decimals.
///
/// Empty input, or an empty trimmed set, yields `0.0`.
pub fn trimmed_mean(series: &DirectionSeries, percentile: u8) -> f64 {
    let kept = trim_outliers(series, percentile);
    if kept.is_empty() {
        return 0.0;
    }
    round2(kept.iter().sum::<f64>() / kept.len() as f64)
}

/// Estimate circuit capacity from its download and upload series.
///
/// Download maps to `ingress_mbps`, upload to `egress_mbps`. When
/// `ceiling_mbps` is set, components above it are lowered to it.
pub fn estimate(
    download: &DirectionSeries,
    upload: &DirectionSeries,
    percentile: u8,
    ceiling_mbps: Option<f64>,
) -> CapacityEstimate {
    if download.is_empty() && upload.is_empty() {
        return CapacityEstimate::ZERO;
    }

    CapacityEstimate {
        ingress_mbps: trimmed_mean(download, percentile),
        egress_mbps: trimmed_mean(upload, percentile),
    }
    .clamped(ceiling_mbps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn series(values: &[f64]) -> DirectionSeries {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| Sample {
                timestamp: start + Duration::minutes(5 * i as i64),
                value,
            })
            .collect()
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let sorted = [10.0, 20.0, 30.0, 1000.0];
        assert_eq!(quantile(&sorted, 0.0), Some(10.0));
        assert_eq!(quantile(&sorted, 1.0), Some(1000.0));
        assert_eq!(quantile(&sorted, 0.5), Some(25.0));
        let p95 = quantile(&sorted, 0.95).unwrap();
        assert!((p95 - 854.5).abs() < 1e-9, "p95 = {p95}");
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[7.0], 0.95), Some(7.0));
    }

    #[test]
    fn outlier_is_dropped_and_ties_zero_a_direction() {
        let est = estimate(
            &series(&[10.0, 20.0, 30.0, 1000.0]),
            &series(&[5.0, 5.0, 5.0, 5.0]),
            95,
            None,
        );
        assert_eq!(
            est,
            CapacityEstimate {
                ingress_mbps: 20.0,
                egress_mbps: 0.0
            }
        );
    }

    #[test]
    fn ceiling_applies_after_trim() {
        let est = estimate(
            &series(&[10.0, 20.0, 30.0, 1000.0]),
            &series(&[5.0, 5.0, 5.0, 5.0]),
            95,
            Some(15.0),
        );
        assert_eq!(est.ingress_mbps, 15.0);
        assert_eq!(est.egress_mbps, 0.0);
    }

    #[test]
    fn empty_pair_is_zero() {
        let est = estimate(&series(&[]), &series(&[]), 95, Some(10.0));
        assert_eq!(est, CapacityEstimate::ZERO);
    }

    #[test]
    fn one_empty_direction_still_estimates_the_other() {
        let est = estimate(&series(&[]), &series(&[2.0, 4.0, 6.0, 100.0]), 95, None);
        assert_eq!(est.ingress_mbps, 0.0);
        assert_eq!(est.egress_mbps, 4.0);
    }

    #[test]
    fn single_sample_is_discarded() {
        assert_eq!(trimmed_mean(&series(&[42.0]), 95), 0.0);
    }

    #[test]
    fn full_percentile_still_excludes_the_maximum() {
        assert_eq!(trimmed_mean(&series(&[1.0, 2.0, 3.0]), 100), 1.5);
    }

    #[test]
    fn mean_is_rounded_to_two_decimals() {
        // p99 of [1, 1, 2, 100] ≈ 97.06; kept [1, 1, 2] → 1.333…
        assert_eq!(trimmed_mean(&series(&[1.0, 100.0, 1.0, 2.0]), 99), 1.33);
    }

    #[test]
    fn estimate_is_idempotent() {
        let down = series(&[12.5, 13.1, 11.9, 80.0, 12.2]);
        let up = series(&[3.1, 2.9, 3.3, 9.0]);
        assert_eq!(
            estimate(&down, &up, 90, Some(50.0)),
            estimate(&down, &up, 90, Some(50.0))
        );
    }

    proptest! {
        #[test]
        fn proptest_trim_never_keeps_values_at_or_above_threshold(
            values in prop::collection::vec(0.0f64..10_000.0, 1..64),
            percentile in 1u8..=99,
        ) {
            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);
            let threshold = quantile(&sorted, f64::from(percentile) / 100.0).unwrap();

            let kept = trim_outliers(&series(&values), percentile);
            prop_assert!(kept.iter().all(|v| *v < threshold));
            prop_assert!(kept.len() < values.len());

            let mean = trimmed_mean(&series(&values), percentile);
            if kept.is_empty() {
                prop_assert_eq!(mean, 0.0);
            } else {
                // Two-decimal rounding may lift the mean by at most 0.005.
                prop_assert!(mean <= threshold + 0.005);
            }
        }

        #[test]
        fn proptest_estimate_respects_ceiling(
            down in prop::collection::vec(0.0f64..5_000.0, 0..32),
            up in prop::collection::vec(0.0f64..5_000.0, 0..32),
            ceiling in 1.0f64..2_000.0,
        ) {
            let unclamped = estimate(&series(&down), &series(&up), 95, None);
            let clamped = estimate(&series(&down), &series(&up), 95, Some(ceiling));

            prop_assert!(clamped.ingress_mbps >= 0.0 && clamped.egress_mbps >= 0.0);
            for (raw, out) in [
                (unclamped.ingress_mbps, clamped.ingress_mbps),
                (unclamped.egress_mbps, clamped.egress_mbps),
            ] {
                if raw > ceiling {
                    prop_assert_eq!(out, ceiling);
                } else {
                    prop_assert_eq!(out, raw);
                }
            }
        }
    }
}
