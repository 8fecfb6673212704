//! Balanced one-way random-effects ANOVA.
//!
//! # References
//!
//! - Fisher (1925). "Statistical Methods for Research Workers".
//! - Searle, Casella & McCulloch (1992), *Variance Components*, §3.3.

use tracing::debug;
use u_numflow::special;
use u_numflow::stats;

use crate::design::BalancedTensor;
use crate::error::{MsaError, Result};

/// Sums of squares and mean squares of a balanced one-way layout.
///
/// `a` groups (days) of `r` observations (samples) each.
#[derive(Debug, Clone)]
pub struct BalancedAnova {
    /// Number of groups, `a`.
    pub n_groups: usize,
    /// Observations per group, `r`.
    pub group_size: usize,
    /// Group (day) means, in group order.
    pub group_means: Vec<f64>,
    /// Mean of the group means.
    pub grand_mean: f64,
    /// SS_u = r · Σ (ȳᵢ − ȳ)².
    pub ss_between: f64,
    /// SS_e = Σᵢⱼ (yᵢⱼ − ȳᵢ)².
    pub ss_within: f64,
    /// SS_t = Σᵢⱼ (yᵢⱼ − ȳ)².
    pub ss_total: f64,
    /// a − 1.
    pub df_between: usize,
    /// a(r − 1).
    pub df_within: usize,
    /// MS_u = SS_u / (a − 1).
    pub ms_between: f64,
    /// MS_e = SS_e / (a(r − 1)).
    pub ms_within: f64,
    /// F = MS_u / MS_e; infinite when only the within-group variation is
    /// zero, zero when every observation is identical.
    pub f_statistic: f64,
    /// Upper-tail probability of `f_statistic` under H₀: σ²ᵤ = 0.
    pub p_value: f64,
    /// Every group holds identical values, so SS_e and MS_e are exactly 0.
    pub within_constant: bool,
    /// Every observation is identical, so all sums of squares are exactly 0.
    pub constant: bool,
}

impl BalancedAnova {
    /// Total number of observations, `a·r`.
    pub fn n_total(&self) -> usize {
        self.n_groups * self.group_size
    }

    fn is_finite(&self) -> bool {
        self.grand_mean.is_finite()
            && self.group_means.iter().all(|m| m.is_finite())
            && self.ss_between.is_finite()
            && self.ss_within.is_finite()
            && self.ss_total.is_finite()
            && self.ms_between.is_finite()
            && self.ms_within.is_finite()
    }
}

/// ANOVA of one location column of a [`BalancedTensor`].
#[derive(Debug, Clone)]
pub struct LocationAnova {
    /// Location identifier.
    pub location: u32,
    /// Decomposition over days.
    pub anova: BalancedAnova,
}

/// Balanced one-way ANOVA: groups are days, members are samples.
///
/// # Algorithm
///
/// Group means ȳᵢ and grand mean ȳ (mean of group means) are computed with
/// compensated summation, then
/// SS_u = r·Σ(ȳᵢ−ȳ)², SS_e = Σ(yᵢⱼ−ȳᵢ)², SS_t = Σ(yᵢⱼ−ȳ)²,
/// MS_u = SS_u/(a−1), MS_e = SS_e/(a(r−1)).
///
/// Zero variation is decided on the data, not on the rounded sums: groups
/// whose values are all identical give SS_e = 0 exactly, and a fully
/// constant layout gives SS_u = SS_e = SS_t = 0 exactly.
///
/// # Returns
///
/// `None` if fewer than 2 groups, any group has fewer than 2 observations,
/// groups differ in size, any value is non-finite, or a mean or sum of
/// squares leaves the `f64` range (overflow, or within-group differences
/// too small to square).
///
/// # Examples
///
/// ```
/// use u_msa::variance::balanced_anova;
///
/// let day1 = [1.0, 2.0, 3.0];
/// let day2 = [4.0, 5.0, 6.0];
/// let r = balanced_anova(&[&day1, &day2]).unwrap();
/// assert!((r.grand_mean - 3.5).abs() < 1e-12);
/// assert!((r.ss_between - 13.5).abs() < 1e-12);
/// assert!((r.ss_within - 4.0).abs() < 1e-12);
/// ```
pub fn balanced_anova(groups: &[&[f64]]) -> Option<BalancedAnova> {
    let a = groups.len();
    if a < 2 {
        return None;
    }
    let r = groups[0].len();
    if r < 2 {
        return None;
    }
    if groups.iter().any(|g| g.len() != r) {
        return None;
    }

    // stats::mean rejects non-finite input
    let group_means: Vec<f64> = groups
        .iter()
        .map(|g| stats::mean(g))
        .collect::<Option<_>>()?;
    let grand_mean = stats::mean(&group_means)?;

    let within_constant = groups.iter().all(|g| g.iter().all(|&x| x == g[0]));
    let constant = within_constant && groups.iter().all(|g| g[0] == groups[0][0]);

    let df_between = a - 1;
    let df_within = a * (r - 1);

    let (ss_between, ss_within, ss_total) = if constant {
        (0.0, 0.0, 0.0)
    } else {
        let between_terms: Vec<f64> = group_means
            .iter()
            .map(|&gm| (gm - grand_mean).powi(2))
            .collect();
        let ss_between = r as f64 * stats::kahan_sum(&between_terms);

        let ss_within = if within_constant {
            0.0
        } else {
            let within_terms: Vec<f64> = groups
                .iter()
                .zip(group_means.iter())
                .flat_map(|(g, &gm)| g.iter().map(move |&x| (x - gm).powi(2)))
                .collect();
            stats::kahan_sum(&within_terms)
        };

        let total_terms: Vec<f64> = groups
            .iter()
            .flat_map(|g| g.iter().map(|&x| (x - grand_mean).powi(2)))
            .collect();
        (ss_between, ss_within, stats::kahan_sum(&total_terms))
    };

    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;

    // distinct values whose squared deviations underflow to zero
    if !within_constant && ms_within <= 0.0 {
        return None;
    }

    let (f_statistic, p_value) = if constant {
        (0.0, 1.0)
    } else if within_constant {
        (f64::INFINITY, 0.0)
    } else {
        let f = ms_between / ms_within;
        let p = 1.0 - special::f_distribution_cdf(f, df_between as f64, df_within as f64);
        (f, p)
    };

    let anova = BalancedAnova {
        n_groups: a,
        group_size: r,
        group_means,
        grand_mean,
        ss_between,
        ss_within,
        ss_total,
        df_between,
        df_within,
        ms_between,
        ms_within,
        f_statistic,
        p_value,
        within_constant,
        constant,
    };
    anova.is_finite().then_some(anova)
}

/// Decomposes every location column of `tensor`, in location order.
///
/// Day blocks are looked up by their `(day, sample)` keys.
///
/// # Errors
///
/// [`MsaError::NumericRange`] for the first location whose means or sums of
/// squares cannot be represented as finite `f64`.
pub fn decompose(tensor: &BalancedTensor) -> Result<Vec<LocationAnova>> {
    let design = tensor.design();
    tensor
        .locations()
        .iter()
        .enumerate()
        .map(|(j, &location)| {
            let days: Vec<Vec<f64>> = (1..=design.days())
                .map(|day| tensor.day_values(day, j))
                .collect::<Option<_>>()
                .ok_or(MsaError::NumericRange { location })?;
            let refs: Vec<&[f64]> = days.iter().map(Vec::as_slice).collect();
            let anova = balanced_anova(&refs).ok_or(MsaError::NumericRange { location })?;
            debug!(
                location,
                ms_between = anova.ms_between,
                ms_within = anova.ms_within,
                "location decomposed"
            );
            Ok(LocationAnova { location, anova })
        })
        .collect()
}
