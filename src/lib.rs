//! # u-msa
//!
//! Measurement system analysis for balanced two-stage nested designs:
//! repeated measurements of `r` samples in each of `a` production cycles,
//! taken at a fixed set of locations.
//!
//! For every location the crate decomposes the observed variation into a
//! between-cycle component σ²ᵤ and a within-cycle (noise) component σ²ₑ,
//! and derives a signal-to-noise ratio telling how well cycle-to-cycle
//! changes stand out from measurement noise.
//!
//! ## Modules
//!
//! - [`design`] — design constants, raw records, and the balanced tensor
//! - [`variance`] — balanced ANOVA, variance components, SNR, result table
//! - [`io`] — long-format CSV tables with one column per channel
//! - [`config`] — TOML study configuration
//! - [`study`] — end-to-end driver, one report per channel
//! - [`error`] — error taxonomy
//!
//! ## Example
//!
//! ```
//! use u_msa::design::{reshape, Design, Measurement};
//! use u_msa::variance::estimate;
//!
//! let design = Design::new(5, 3).unwrap();
//! let records: Vec<Measurement> = design
//!     .cells_iter()
//!     .map(|(day, sample)| Measurement::new(day, sample, 1, 10.0))
//!     .collect();
//!
//! let table = estimate(&reshape(&records, design, &[1]).unwrap()).unwrap();
//! let e = table.get(1).unwrap();
//! assert_eq!((e.sigma2_u, e.sigma2_e, e.snr), (0.0, 0.0, 0.0));
//! ```
//!
//! ## Design Philosophy
//!
//! - **Explicit keys**: observations are placed by (day, sample, location),
//!   never by row position
//! - **Fail loudly**: incomplete grids and non-finite values are errors,
//!   degenerate locations are flagged, NaN is never emitted
//! - **Numerical stability**: compensated sums from `u-numflow`

pub mod config;
pub mod design;
pub mod error;
pub mod io;
pub mod study;
pub mod variance;

pub use error::{MsaError, Result};
