//! Balanced two-stage nested measurement designs.
//!
//! A study measures `r` samples in each of `a` production cycles (days), and
//! every sample is measured at the same `L` locations. This module holds the
//! design constants, the raw long-format record, and the reshaper that turns
//! records into a [`BalancedTensor`].
//!
//! # Types
//!
//! - [`Design`] — validated design constants (`a ≥ 2`, `r ≥ 2`)
//! - [`Measurement`] — one observation at a (day, sample, location) triple
//! - [`BalancedTensor`] — `(a·r) × L` matrix in day-major, sample-minor order
//!
//! # References
//!
//! - Montgomery (2019), *Introduction to Statistical Quality Control*, 8th ed.,
//!   Chapter 8.7 (gauge and measurement system capability studies).
//! - Searle, Casella & McCulloch (1992), *Variance Components*, Chapter 3.

mod tensor;

pub use tensor::{reshape, BalancedTensor};

use serde::{Deserialize, Serialize};

use crate::error::{MsaError, Result};

/// Design constants of a balanced one-way random-effects study.
///
/// # Examples
///
/// ```
/// use u_msa::design::Design;
///
/// let design = Design::new(5, 3).unwrap();
/// assert_eq!(design.cells(), 15);
///
/// // One day leaves no between-day degrees of freedom.
/// assert!(Design::new(1, 3).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Design {
    days: u32,
    samples_per_day: u32,
}

impl Design {
    /// Creates a design with `days` cycles and `samples_per_day` replicates.
    ///
    /// # Errors
    ///
    /// [`MsaError::InvalidDesignParameters`] if either constant is below 2,
    /// since the between-day (`a-1`) or within-day (`a(r-1)`) degrees of
    /// freedom would vanish.
    pub fn new(days: u32, samples_per_day: u32) -> Result<Self> {
        if days < 2 {
            return Err(MsaError::invalid_design(format!(
                "at least 2 days are required, got {days}"
            )));
        }
        if samples_per_day < 2 {
            return Err(MsaError::invalid_design(format!(
                "at least 2 samples per day are required, got {samples_per_day}"
            )));
        }
        Ok(Self {
            days,
            samples_per_day,
        })
    }

    /// Number of days (`a`).
    pub fn days(&self) -> u32 {
        self.days
    }

    /// Number of samples per day (`r`).
    pub fn samples_per_day(&self) -> u32 {
        self.samples_per_day
    }

    /// Number of (day, sample) cells, `a·r`.
    pub fn cells(&self) -> usize {
        self.days as usize * self.samples_per_day as usize
    }

    /// Between-day degrees of freedom, `a - 1`.
    pub fn df_between(&self) -> usize {
        self.days as usize - 1
    }

    /// Within-day degrees of freedom, `a(r - 1)`.
    pub fn df_within(&self) -> usize {
        self.days as usize * (self.samples_per_day as usize - 1)
    }

    /// Row index of `(day, sample)` in day-major order, or `None` if the
    /// pair lies outside the design. Days and samples are 1-based.
    pub fn cell_index(&self, day: u32, sample: u32) -> Option<usize> {
        if !(1..=self.days).contains(&day) || !(1..=self.samples_per_day).contains(&sample) {
            return None;
        }
        Some((day as usize - 1) * self.samples_per_day as usize + (sample as usize - 1))
    }

    /// Iterates the `(day, sample)` pairs in canonical day-major order.
    pub fn cells_iter(&self) -> impl Iterator<Item = (u32, u32)> {
        let r = self.samples_per_day;
        (1..=self.days).flat_map(move |d| (1..=r).map(move |s| (d, s)))
    }
}

/// One raw observation of a single measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Production cycle, 1-based.
    pub day: u32,
    /// Replicate within the cycle, 1-based.
    pub sample: u32,
    /// Measurement site identifier.
    pub location: u32,
    /// Measured value.
    pub value: f64,
}

impl Measurement {
    /// Convenience constructor.
    pub fn new(day: u32, sample: u32, location: u32, value: f64) -> Self {
        Self {
            day,
            sample,
            location,
            value,
        }
    }
}
