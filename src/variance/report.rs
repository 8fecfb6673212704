//! Per-location estimate table.

use std::fmt;

use serde::Serialize;

use super::components::VarianceEstimate;

/// SNR reference line drawn on the location chart.
pub const DEFAULT_SNR_REFERENCE: f64 = 2.0;

/// Variance estimates for every location, in location order.
///
/// This is the hand-off point to presenters: iterate it, or take
/// [`snr_series`](Self::snr_series) for a `(location, SNR)` plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EstimateTable {
    estimates: Vec<VarianceEstimate>,
}

impl EstimateTable {
    pub(crate) fn new(estimates: Vec<VarianceEstimate>) -> Self {
        Self { estimates }
    }

    /// Number of locations.
    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    /// `true` if no location was estimated.
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// Iterates estimates in location order.
    pub fn iter(&self) -> std::slice::Iter<'_, VarianceEstimate> {
        self.estimates.iter()
    }

    /// Estimates as a slice.
    pub fn as_slice(&self) -> &[VarianceEstimate] {
        &self.estimates
    }

    /// Estimate for a location identifier.
    pub fn get(&self, location: u32) -> Option<&VarianceEstimate> {
        self.estimates.iter().find(|e| e.location == location)
    }

    /// `(location, SNR)` pairs in location order.
    pub fn snr_series(&self) -> Vec<(u32, f64)> {
        self.estimates.iter().map(|e| (e.location, e.snr)).collect()
    }

    /// Locations whose SNR reaches `reference`.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_msa::design::{reshape, Design, Measurement};
    /// use u_msa::variance::{estimate, DEFAULT_SNR_REFERENCE};
    ///
    /// let design = Design::new(2, 2).unwrap();
    /// let records = vec![
    ///     Measurement::new(1, 1, 1, 1.0), Measurement::new(1, 2, 1, 1.2),
    ///     Measurement::new(2, 1, 1, 9.0), Measurement::new(2, 2, 1, 9.1),
    /// ];
    /// let table = estimate(&reshape(&records, design, &[1]).unwrap()).unwrap();
    /// assert_eq!(table.above_reference(DEFAULT_SNR_REFERENCE), vec![1]);
    /// ```
    pub fn above_reference(&self, reference: f64) -> Vec<u32> {
        self.estimates
            .iter()
            .filter(|e| e.snr >= reference)
            .map(|e| e.location)
            .collect()
    }

    /// Locations flagged as degenerate (zero within-cycle variance).
    pub fn degenerate_locations(&self) -> Vec<u32> {
        self.estimates
            .iter()
            .filter(|e| e.degenerate)
            .map(|e| e.location)
            .collect()
    }

    /// Consumes the table into its records.
    pub fn into_vec(self) -> Vec<VarianceEstimate> {
        self.estimates
    }
}

impl<'a> IntoIterator for &'a EstimateTable {
    type Item = &'a VarianceEstimate;
    type IntoIter = std::slice::Iter<'a, VarianceEstimate>;

    fn into_iter(self) -> Self::IntoIter {
        self.estimates.iter()
    }
}

impl fmt::Display for EstimateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>8} {:>14} {:>14} {:>10}",
            "location", "sigma2_u", "sigma2_e", "SNR"
        )?;
        for e in &self.estimates {
            let mark = if e.degenerate { " *" } else { "" };
            writeln!(
                f,
                "{:>8} {:>14.6e} {:>14.6e} {:>10.4}{}",
                e.location, e.sigma2_u, e.sigma2_e, e.snr, mark
            )?;
        }
        if self.estimates.iter().any(|e| e.degenerate) {
            writeln!(f, "* zero within-cycle variance")?;
        }
        Ok(())
    }
}
