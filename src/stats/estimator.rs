//! Point estimate + standard error for one race on one day.
//!
//! Dispatch on the number of polls:
//!
//! - `N == 1`: the margin itself; SE is `sqrt(1 / sample_size)`, or a fixed
//!   constant when the only poll is the pseudo-poll
//! - `N == 2`: the mean; SE is `pop_std / sqrt(2)` floored at `two_poll_floor`
//! - `N >= 3`: median with `SE = MAD / 0.6745 / sqrt(N)` (falling back to
//!   `pop_std / sqrt(N)` when the MAD is zero), or mean with `pop_std / sqrt(N)`
//!
//! `0.6745` is the standard normal's 75th percentile, which turns a MAD into a
//! robust standard-deviation estimate.

use serde::Serialize;

use crate::domain::{Affiliation, CenterMode, EstimatorConfig, PollRecord};
use crate::error::PollError;

/// Converts a median absolute deviation to a normal-equivalent std dev.
pub const MAD_TO_STD: f64 = 0.6745;

/// A point estimate with its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub point: f64,
    pub standard_error: f64,
}

/// Estimate the race margin from the selected polls.
///
/// Bias correction (if configured) is applied to each observed poll's margin
/// before dispatch.
pub fn estimate(polls: &[PollRecord], config: &EstimatorConfig) -> Result<Estimate, PollError> {
    match polls {
        [] => Err(PollError::InsufficientData),
        [only] => Ok(single_poll(only, config)),
        _ => {
            let margins: Vec<f64> = polls.iter().map(|p| corrected_margin(p, config)).collect();
            estimate_margins(&margins, config)
        }
    }
}

/// Estimate from bare margins (`N >= 2`).
///
/// A single margin carries no sample size, so it is rejected here; use
/// [`estimate`] for the one-poll path.
pub fn estimate_margins(margins: &[f64], config: &EstimatorConfig) -> Result<Estimate, PollError> {
    match margins.len() {
        0 | 1 => Err(PollError::InsufficientData),
        2 => Ok(two_polls(margins, config.two_poll_floor)),
        _ => Ok(central(margins, config.mode)),
    }
}

/// Margin after shifting partisan polls per the configured correction.
pub fn corrected_margin(poll: &PollRecord, config: &EstimatorConfig) -> f64 {
    if poll.is_assumption() {
        return poll.margin;
    }
    match poll.affiliation {
        Some(aff) if config.bias.corrects(aff) => match aff {
            Affiliation::PartyA => poll.margin - config.bias_amount,
            Affiliation::PartyB => poll.margin + config.bias_amount,
        },
        _ => poll.margin,
    }
}

fn single_poll(poll: &PollRecord, config: &EstimatorConfig) -> Estimate {
    if poll.is_assumption() {
        return Estimate {
            point: poll.margin,
            standard_error: config.assumption_se,
        };
    }
    let n = f64::from(poll.sample_size.max(1));
    Estimate {
        point: corrected_margin(poll, config),
        standard_error: (1.0 / n).sqrt(),
    }
}

fn two_polls(margins: &[f64], floor: f64) -> Estimate {
    let n = margins.len() as f64;
    Estimate {
        point: mean(margins),
        standard_error: (population_std(margins) / n.sqrt()).max(floor),
    }
}

fn central(margins: &[f64], mode: CenterMode) -> Estimate {
    let root_n = (margins.len() as f64).sqrt();
    match mode {
        CenterMode::Median => {
            let point = median(margins);
            let deviations: Vec<f64> = margins.iter().map(|m| (m - point).abs()).collect();
            let mad = median(&deviations);
            let mut standard_error = mad / MAD_TO_STD / root_n;
            if standard_error == 0.0 {
                standard_error = population_std(margins) / root_n;
            }
            Estimate {
                point,
                standard_error,
            }
        }
        CenterMode::Mean => Estimate {
            point: mean(margins),
            standard_error: population_std(margins) / root_n,
        },
    }
}

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median, averaging the two middle values for an even count.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Standard deviation with divisor `N`.
pub fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::BiasCorrection;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 9, day).unwrap()
    }

    fn poll(margin: f64, sample_size: u32) -> PollRecord {
        PollRecord::new(margin, d(1), d(3), sample_size, "Quinnipiac", None)
    }

    #[test]
    fn empty_sample_is_rejected() {
        let cfg = EstimatorConfig::default();
        assert_eq!(estimate(&[], &cfg), Err(PollError::InsufficientData));
        assert_eq!(estimate_margins(&[], &cfg), Err(PollError::InsufficientData));
    }

    #[test]
    fn single_real_poll_uses_sample_size() {
        let est = estimate(&[poll(4.0, 400)], &EstimatorConfig::default()).unwrap();
        assert_eq!(est.point, 4.0);
        assert!((est.standard_error - 0.05).abs() < 1e-12);
    }

    #[test]
    fn single_pseudo_poll_uses_fixed_se() {
        let p = PollRecord::assumption(-4.0, d(1));
        let est = estimate(&[p], &EstimatorConfig::default()).unwrap();
        assert_eq!(est.point, -4.0);
        assert_eq!(est.standard_error, 0.05);
    }

    #[test]
    fn two_polls_respect_floor() {
        let cfg = EstimatorConfig::default();
        let est = estimate_margins(&[10.0, 10.0], &cfg).unwrap();
        assert_eq!(est.point, 10.0);
        assert_eq!(est.standard_error, 3.0);

        let est = estimate_margins(&[-5.0, 15.0], &cfg).unwrap();
        assert_eq!(est.point, 5.0);
        // pop std = 10, / sqrt(2) ~= 7.07
        assert!((est.standard_error - 10.0 / 2f64.sqrt()).abs() < 1e-12);

        for pair in [[0.0, 1.0], [-3.0, -2.5], [40.0, 41.0]] {
            assert!(estimate_margins(&pair, &cfg).unwrap().standard_error >= 3.0);
        }
    }

    #[test]
    fn median_mode_three_polls() {
        let est = estimate_margins(&[5.0, 7.0, 6.0], &EstimatorConfig::default()).unwrap();
        assert_eq!(est.point, 6.0);
        let expected = 1.0 / MAD_TO_STD / 3f64.sqrt();
        assert!((est.standard_error - expected).abs() < 1e-12);
        assert!((est.standard_error - 0.8556).abs() < 1e-3);
    }

    #[test]
    fn zero_mad_falls_back_to_population_std() {
        let cfg = EstimatorConfig::default();
        let est = estimate_margins(&[3.0, 3.0, 3.0, 3.0], &cfg).unwrap();
        assert_eq!(est.point, 3.0);
        assert_eq!(est.standard_error, 0.0);

        // Majority identical -> MAD is zero but the spread is not.
        let margins = [2.0, 2.0, 2.0, 9.0, -4.0];
        let est = estimate_margins(&margins, &cfg).unwrap();
        let expected = population_std(&margins) / 5f64.sqrt();
        assert!((est.standard_error - expected).abs() < 1e-12);
        assert!(est.standard_error > 0.0);
    }

    #[test]
    fn median_mode_se_is_non_negative() {
        let cfg = EstimatorConfig::default();
        let sets: [&[f64]; 4] = [
            &[-1.0, 0.0, 1.0],
            &[12.0, -8.0, 3.5, 3.5],
            &[0.5, 0.5, 0.5],
            &[-20.0, -19.0, -30.0, -2.0, 7.0, 1.0],
        ];
        for set in sets {
            assert!(estimate_margins(set, &cfg).unwrap().standard_error >= 0.0);
        }
    }

    #[test]
    fn mean_mode_uses_population_std() {
        let cfg = EstimatorConfig {
            mode: CenterMode::Mean,
            ..EstimatorConfig::default()
        };
        let est = estimate_margins(&[1.0, 2.0, 6.0], &cfg).unwrap();
        assert!((est.point - 3.0).abs() < 1e-12);
        let expected = (14.0f64 / 3.0).sqrt() / 3f64.sqrt();
        assert!((est.standard_error - expected).abs() < 1e-12);
    }

    #[test]
    fn even_median_averages_middle_pair() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn bias_correction_shifts_partisan_margins() {
        let cfg = EstimatorConfig {
            bias: BiasCorrection::Both,
            ..EstimatorConfig::default()
        };
        let mut a = poll(5.0, 500);
        a.affiliation = Some(Affiliation::PartyA);
        let mut b = poll(-5.0, 500);
        b.affiliation = Some(Affiliation::PartyB);
        assert_eq!(corrected_margin(&a, &cfg), 2.0);
        assert_eq!(corrected_margin(&b, &cfg), -2.0);

        let only_a = EstimatorConfig {
            bias: BiasCorrection::A,
            ..cfg
        };
        assert_eq!(corrected_margin(&b, &only_a), -5.0);

        // The correction reaches the single-poll path too.
        let est = estimate(&[a], &cfg).unwrap();
        assert_eq!(est.point, 2.0);
    }

    #[test]
    fn pseudo_poll_is_never_corrected() {
        let cfg = EstimatorConfig {
            bias: BiasCorrection::Both,
            ..EstimatorConfig::default()
        };
        let p = PollRecord::assumption(6.0, d(1));
        assert_eq!(corrected_margin(&p, &cfg), 6.0);
    }
}
