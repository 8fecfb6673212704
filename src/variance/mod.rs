//! Variance components of a balanced nested design.
//!
//! Each location is analysed on its own as a one-way random-effects model
//! `y_ds = μ + u_d + e_ds`, with `u_d ~ (0, σ²ᵤ)` the cycle (day) effect and
//! `e_ds ~ (0, σ²ₑ)` the replicate noise.
//!
//! # Pipeline
//!
//! - [`balanced_anova`] / [`decompose`] — day means, grand mean, SS and MS
//! - [`VarianceEstimator`] — σ²ᵤ, σ²ₑ and SNR with non-negativity clamping
//! - [`EstimateTable`] — per-location records for presentation
//!
//! # References
//!
//! - Montgomery (2019), *Introduction to Statistical Quality Control*, 8th ed.,
//!   Chapter 8.
//! - Searle, Casella & McCulloch (1992), *Variance Components*.

mod anova;
mod components;
mod report;

pub use anova::{balanced_anova, decompose, BalancedAnova, LocationAnova};
pub use components::{estimate, DegeneracyPolicy, VarianceEstimate, VarianceEstimator};
pub use report::{EstimateTable, DEFAULT_SNR_REFERENCE};
