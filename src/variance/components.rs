//! Variance components and signal-to-noise ratio.
//!
//! Between-cycle variance σ²ᵤ, within-cycle variance σ²ₑ and the SNR
//! σ̂ᵤ/σ̂ₑ follow the maximum-likelihood form of the balanced one-way
//! random-effects model, where the between-group mean square carries the
//! correction factor β = a/(a−1).
//!
//! # References
//!
//! - Searle, Casella & McCulloch (1992), *Variance Components*, §3.7
//!   (ML estimators for the balanced one-way classification).
//! - Burdick, Borror & Montgomery (2005), *Design and Analysis of Gauge R&R
//!   Studies*, ASA-SIAM.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::anova::{decompose, BalancedAnova, LocationAnova};
use super::report::EstimateTable;
use crate::design::BalancedTensor;
use crate::error::{MsaError, Result};

/// What to do when a location has no within-cycle variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneracyPolicy {
    /// Mark the location's estimate as degenerate and report an infinite
    /// (or zero) SNR.
    #[default]
    Flag,
    /// Abort the whole run with [`MsaError::DegenerateDesign`].
    Fail,
}

/// Variance estimate for one location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarianceEstimate {
    /// Location identifier.
    pub location: u32,
    /// Between-cycle variance, ≥ 0.
    pub sigma2_u: f64,
    /// Within-cycle variance, ≥ 0.
    pub sigma2_e: f64,
    /// Signal-to-noise ratio, ≥ 0. `+∞` only for degenerate locations.
    #[serde(rename = "SNR")]
    pub snr: f64,
    /// `true` when the within-cycle mean square is zero.
    pub degenerate: bool,
}

/// Maximum-likelihood variance component estimator.
///
/// # Examples
///
/// ```
/// use u_msa::design::{reshape, Design, Measurement};
/// use u_msa::variance::VarianceEstimator;
///
/// let design = Design::new(3, 2).unwrap();
/// let values = [[9.8, 10.2], [11.1, 10.7], [9.0, 9.4]];
/// let records: Vec<Measurement> = values
///     .iter()
///     .enumerate()
///     .flat_map(|(d, day)| {
///         day.iter().enumerate().map(move |(s, &v)| {
///             Measurement::new(d as u32 + 1, s as u32 + 1, 1, v)
///         })
///     })
///     .collect();
///
/// let tensor = reshape(&records, design, &[1]).unwrap();
/// let table = VarianceEstimator::new().estimate(&tensor).unwrap();
/// let est = table.get(1).unwrap();
/// assert!(est.sigma2_u > est.sigma2_e);
/// assert!(est.snr > 1.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct VarianceEstimator {
    policy: DegeneracyPolicy,
}

impl VarianceEstimator {
    /// Estimator with the default [`DegeneracyPolicy::Flag`] policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the degeneracy policy.
    pub fn with_policy(mut self, policy: DegeneracyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Configured degeneracy policy.
    pub fn policy(&self) -> DegeneracyPolicy {
        self.policy
    }

    /// Estimates σ²ᵤ, σ²ₑ and SNR for every location of `tensor`.
    ///
    /// # Errors
    ///
    /// [`MsaError::NumericRange`] if a location's sums of squares overflow,
    /// and [`MsaError::DegenerateDesign`] for the first degenerate location
    /// when the policy is [`DegeneracyPolicy::Fail`].
    pub fn estimate(&self, tensor: &BalancedTensor) -> Result<EstimateTable> {
        self.estimate_from(&decompose(tensor)?)
    }

    /// Estimates every location of an existing decomposition, in order.
    ///
    /// # Errors
    ///
    /// As [`estimate_location`](Self::estimate_location).
    pub fn estimate_from(&self, anovas: &[LocationAnova]) -> Result<EstimateTable> {
        let records = anovas
            .iter()
            .map(|la| self.estimate_location(la.location, &la.anova))
            .collect::<Result<Vec<_>>>()?;
        Ok(EstimateTable::new(records))
    }

    /// Estimates the components of a single location from its ANOVA.
    ///
    /// # Algorithm
    ///
    /// With β = a/(a−1):
    ///
    /// - σ²ᵤ = max(0, (MS_u/β − MS_e) / r)
    /// - σ²ₑ = min(SS_t/(a·r), MS_e)
    /// - SNR = √max(0, (MS_u/(β·MS_e) − 1) / r)
    ///
    /// A location is degenerate when every day holds identical values
    /// (MS_e exactly 0): σ²ₑ = 0, σ²ᵤ = MS_u/(β·r), and SNR is `+∞` unless
    /// all observations are equal, in which case everything is 0.
    ///
    /// # Errors
    ///
    /// - [`MsaError::DegenerateDesign`] if the location is degenerate and the
    ///   policy is [`DegeneracyPolicy::Fail`].
    /// - [`MsaError::NumericRange`] if the mean squares are not finite, or
    ///   MS_e is not positive for a non-degenerate location.
    pub fn estimate_location(&self, location: u32, anova: &BalancedAnova) -> Result<VarianceEstimate> {
        let a = anova.n_groups as f64;
        let r = anova.group_size as f64;
        let beta = a / (a - 1.0);
        let ms_u = anova.ms_between;
        let ms_e = anova.ms_within;

        if !ms_u.is_finite() || !ms_e.is_finite() || !anova.ss_total.is_finite() {
            return Err(MsaError::NumericRange { location });
        }

        if anova.within_constant {
            if self.policy == DegeneracyPolicy::Fail {
                return Err(MsaError::DegenerateDesign { location });
            }
            let no_signal = anova.constant;
            warn!(location, ms_between = ms_u, "within-cycle mean square is zero");
            return Ok(VarianceEstimate {
                location,
                sigma2_u: if no_signal { 0.0 } else { (ms_u / beta / r).max(0.0) },
                sigma2_e: 0.0,
                snr: if no_signal { 0.0 } else { f64::INFINITY },
                degenerate: true,
            });
        }

        if ms_e <= 0.0 {
            return Err(MsaError::NumericRange { location });
        }

        let sigma2_u = ((ms_u / beta - ms_e) / r).max(0.0);
        let sigma2_e = (anova.ss_total / (a * r)).min(ms_e).max(0.0);
        let snr = ((ms_u / (beta * ms_e) - 1.0) / r).max(0.0).sqrt();
        if !(sigma2_u.is_finite() && snr.is_finite()) {
            return Err(MsaError::NumericRange { location });
        }

        Ok(VarianceEstimate {
            location,
            sigma2_u,
            sigma2_e,
            snr,
            degenerate: false,
        })
    }
}

/// Estimates every location of `tensor` with the default estimator.
///
/// Shorthand for `VarianceEstimator::new().estimate(tensor)`.
pub fn estimate(tensor: &BalancedTensor) -> Result<EstimateTable> {
    VarianceEstimator::new().estimate(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{reshape, Design, Measurement};

    /// Builds a single-location tensor from `values[day][sample]`.
    fn tensor_from(values: &[Vec<f64>]) -> BalancedTensor {
        let design = Design::new(values.len() as u32, values[0].len() as u32).unwrap();
        let mut records = Vec::new();
        for (d, day) in values.iter().enumerate() {
            for (s, &v) in day.iter().enumerate() {
                records.push(Measurement::new(d as u32 + 1, s as u32 + 1, 1, v));
            }
        }
        reshape(&records, design, &[1]).unwrap()
    }

    // -----------------------------------------------------------------------
    // Concrete scenarios (a = 5, r = 3)
    // -----------------------------------------------------------------------

    #[test]
    fn constant_location_has_zero_components() {
        let t = tensor_from(&vec![vec![10.0; 3]; 5]);
        let est = estimate(&t).unwrap();
        let e = est.get(1).unwrap();
        assert_eq!(e.sigma2_u, 0.0);
        assert_eq!(e.sigma2_e, 0.0);
        assert_eq!(e.snr, 0.0);
        assert!(e.degenerate);
    }

    #[test]
    fn noiseless_days_give_population_variance_of_day_means() {
        let values: Vec<Vec<f64>> = (1..=5).map(|d| vec![f64::from(d); 3]).collect();
        let est = estimate(&tensor_from(&values)).unwrap();
        let e = est.get(1).unwrap();
        // population variance of [1, 2, 3, 4, 5] is 2
        assert!((e.sigma2_u - 2.0).abs() < 1e-12, "sigma2_u = {}", e.sigma2_u);
        assert_eq!(e.sigma2_e, 0.0);
        assert!(e.degenerate);
        assert!(e.snr.is_infinite() && e.snr > 0.0);
    }

    #[test]
    fn fail_policy_rejects_degenerate_location() {
        let values: Vec<Vec<f64>> = (1..=5).map(|d| vec![f64::from(d); 3]).collect();
        let t = tensor_from(&values);
        let res = VarianceEstimator::new()
            .with_policy(DegeneracyPolicy::Fail)
            .estimate(&t);
        assert!(matches!(res, Err(MsaError::DegenerateDesign { location: 1 })));
    }

    // -----------------------------------------------------------------------
    // Hand-computed example
    // -----------------------------------------------------------------------

    /// a = 3, r = 2, days [1,3], [4,6], [7,9]
    ///
    /// MS_u = 18, MS_e = 2, SS_t = 42, β = 1.5
    /// σ²ᵤ = (18/1.5 − 2)/2 = 5
    /// σ²ₑ = min(42/6, 2) = 2
    /// SNR = √((18/(1.5·2) − 1)/2) = √2.5
    #[test]
    fn hand_computed_components() {
        let t = tensor_from(&[vec![1.0, 3.0], vec![4.0, 6.0], vec![7.0, 9.0]]);
        let est = estimate(&t).unwrap();
        let e = est.get(1).unwrap();
        assert!((e.sigma2_u - 5.0).abs() < 1e-12, "sigma2_u = {}", e.sigma2_u);
        assert!((e.sigma2_e - 2.0).abs() < 1e-12, "sigma2_e = {}", e.sigma2_e);
        assert!((e.snr - 2.5_f64.sqrt()).abs() < 1e-12, "snr = {}", e.snr);
        assert!(!e.degenerate);
    }

    #[test]
    fn sigma2_e_is_capped_by_total_spread() {
        // Identical days: SS_u = 0 so SS_t/(a·r) = SS_e/(a·r) < MS_e.
        let t = tensor_from(&[vec![1.0, 3.0], vec![1.0, 3.0], vec![1.0, 3.0]]);
        let est = estimate(&t).unwrap();
        let e = est.get(1).unwrap();
        // SS_e = 6, MS_e = 2, SS_t/(a·r) = 1
        assert!((e.sigma2_e - 1.0).abs() < 1e-12, "sigma2_e = {}", e.sigma2_e);
        assert_eq!(e.sigma2_u, 0.0);
        assert_eq!(e.snr, 0.0);
    }

    #[test]
    fn noise_dominated_location_clamps_to_zero() {
        // Day means nearly equal, large within-day spread.
        let t = tensor_from(&[
            vec![0.0, 10.0, 5.0],
            vec![9.0, 1.0, 5.2],
            vec![4.8, 0.5, 9.9],
            vec![10.0, 0.1, 4.9],
        ]);
        let est = estimate(&t).unwrap();
        let e = est.get(1).unwrap();
        assert_eq!(e.sigma2_u, 0.0);
        assert_eq!(e.snr, 0.0);
        assert!(e.sigma2_e > 0.0);
    }

    #[test]
    fn snr_grows_with_between_day_spread() {
        let base = [vec![0.9, 1.1], vec![1.9, 2.1], vec![2.9, 3.1]];
        let wide: Vec<Vec<f64>> = base
            .iter()
            .enumerate()
            .map(|(i, d)| d.iter().map(|v| v + 3.0 * i as f64).collect())
            .collect();
        let narrow_snr = estimate(&tensor_from(&base)).unwrap().get(1).unwrap().snr;
        let wide_snr = estimate(&tensor_from(&wide)).unwrap().get(1).unwrap().snr;
        assert!(wide_snr > narrow_snr, "{wide_snr} <= {narrow_snr}");
    }

    // -----------------------------------------------------------------------
    // Numeric range
    // -----------------------------------------------------------------------

    #[test]
    fn small_noise_on_large_offset_is_estimated() {
        let values: Vec<Vec<f64>> = (1..=5)
            .map(|d| {
                [0.0, 1e-7, 0.0]
                    .iter()
                    .map(|n| 1e6 + f64::from(d) * 1e-6 + n)
                    .collect()
            })
            .collect();
        let est = estimate(&tensor_from(&values)).unwrap();
        let e = est.get(1).unwrap();
        assert!(!e.degenerate);
        assert!(e.sigma2_e > 0.0, "sigma2_e = {}", e.sigma2_e);
        assert!(e.sigma2_u > 0.0, "sigma2_u = {}", e.sigma2_u);
        assert!(e.snr.is_finite() && e.snr > 1.0, "snr = {}", e.snr);
    }

    #[test]
    fn overflowing_location_is_an_error_not_a_zero() {
        let t = tensor_from(&[vec![1e160, 3e160], vec![4e160, 6e160], vec![7e160, 9e160]]);
        let res = estimate(&t);
        assert!(matches!(res, Err(MsaError::NumericRange { location: 1 })));

        let t = tensor_from(&[vec![1.7e308, 1.6e308], vec![-1.7e308, 1.0]]);
        assert!(matches!(estimate(&t), Err(MsaError::NumericRange { location: 1 })));
    }

    #[test]
    fn non_finite_mean_squares_are_rejected() {
        let t = tensor_from(&[vec![1.0, 3.0], vec![4.0, 6.0], vec![7.0, 9.0]]);
        let mut la = decompose(&t).unwrap().remove(0);
        la.anova.ms_between = f64::NAN;
        let res = VarianceEstimator::new().estimate_location(la.location, &la.anova);
        assert!(matches!(res, Err(MsaError::NumericRange { location: 1 })));
    }

    #[test]
    fn estimate_from_matches_estimate() {
        let t = tensor_from(&[vec![1.0, 3.0], vec![4.0, 6.0], vec![7.0, 9.0]]);
        let anovas = decompose(&t).unwrap();
        let est = VarianceEstimator::new();
        let a = est.estimate_from(&anovas).unwrap();
        let b = est.estimate(&t).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::design::{reshape, Design, Measurement};
    use proptest::prelude::*;

    fn build(a: u32, r: u32, l: u32, values: &[f64]) -> BalancedTensor {
        let design = Design::new(a, r).unwrap();
        let locations: Vec<u32> = (1..=l).collect();
        let mut records = Vec::with_capacity(values.len());
        let mut it = values.iter();
        for d in 1..=a {
            for s in 1..=r {
                for &loc in &locations {
                    records.push(Measurement::new(d, s, loc, *it.next().unwrap()));
                }
            }
        }
        reshape(&records, design, &locations).unwrap()
    }

    fn design_strategy() -> impl Strategy<Value = (u32, u32, u32, Vec<f64>)> {
        (2u32..=6, 2u32..=4, 1u32..=4).prop_flat_map(|(a, r, l)| {
            (
                Just(a),
                Just(r),
                Just(l),
                proptest::collection::vec(-1e3_f64..1e3, (a * r * l) as usize),
            )
        })
    }

    proptest! {
        #[test]
        fn estimates_are_non_negative((a, r, l, values) in design_strategy()) {
            let table = estimate(&build(a, r, l, &values)).unwrap();
            prop_assert_eq!(table.len(), l as usize);
            for e in table.iter() {
                prop_assert!(e.sigma2_u >= 0.0, "sigma2_u = {}", e.sigma2_u);
                prop_assert!(e.sigma2_e >= 0.0, "sigma2_e = {}", e.sigma2_e);
                prop_assert!(e.snr >= 0.0, "snr = {}", e.snr);
                prop_assert!(!e.snr.is_nan());
            }
        }

        #[test]
        fn scaling_multiplies_variances_by_k_squared(
            (a, r, l, values) in design_strategy(),
            k in 0.1_f64..10.0,
        ) {
            let tensor = build(a, r, l, &values);
            let scaled = tensor.map_values(|v| v * k).unwrap();
            let base = decompose(&tensor).unwrap();
            let e0 = estimate(&tensor).unwrap();
            let e1 = estimate(&scaled).unwrap();
            for ((x, y), la) in e0.iter().zip(e1.iter()).zip(base.iter()) {
                let k2 = k * k;
                let tol = 1e-9 * k2 * (1.0 + la.anova.ms_between + la.anova.ms_within);
                prop_assert!(
                    (y.sigma2_u - k2 * x.sigma2_u).abs() <= tol,
                    "sigma2_u: {} vs {}", y.sigma2_u, k2 * x.sigma2_u
                );
                prop_assert!(
                    (y.sigma2_e - k2 * x.sigma2_e).abs() <= tol,
                    "sigma2_e: {} vs {}", y.sigma2_e, k2 * x.sigma2_e
                );
                prop_assert!(
                    (y.snr - x.snr).abs() <= 1e-6 * (1.0 + x.snr),
                    "snr: {} vs {}", y.snr, x.snr
                );
            }
        }
    }
}
