//! Study configuration.
//!
//! Loaded from TOML; every key is optional and falls back to the layout of a
//! 5-day, 3-sample, 14-location surface texture study.
//!
//! ```toml
//! days = 5
//! samples_per_day = 3
//! locations = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
//! channels = ["sa", "sz"]
//! location_column = "location"
//! degeneracy = "flag"
//! snr_reference = 2.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::design::Design;
use crate::error::{MsaError, Result};
use crate::variance::{DegeneracyPolicy, DEFAULT_SNR_REFERENCE};

/// Options recognised by a study run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    /// Number of production cycles, `a`.
    #[serde(default = "StudyConfig::default_days")]
    pub days: u32,
    /// Replicates per cycle, `r`.
    #[serde(default = "StudyConfig::default_samples_per_day")]
    pub samples_per_day: u32,
    /// Location identifiers in output order.
    #[serde(default = "StudyConfig::default_locations")]
    pub locations: Vec<u32>,
    /// Value columns to analyse, each independently.
    #[serde(default = "StudyConfig::default_channels")]
    pub channels: Vec<String>,
    /// Column holding the location id. `None` means positional: the k-th
    /// row of a (day, sample) cell is location k.
    #[serde(default)]
    pub location_column: Option<String>,
    /// Handling of zero within-cycle variance.
    #[serde(default)]
    pub degeneracy: DegeneracyPolicy,
    /// SNR reference line for the summary.
    #[serde(default = "StudyConfig::default_snr_reference")]
    pub snr_reference: f64,
}

impl StudyConfig {
    fn default_days() -> u32 {
        5
    }
    fn default_samples_per_day() -> u32 {
        3
    }
    fn default_locations() -> Vec<u32> {
        (1..=14).collect()
    }
    fn default_channels() -> Vec<String> {
        vec!["sa".to_string()]
    }
    fn default_snr_reference() -> f64 {
        DEFAULT_SNR_REFERENCE
    }

    /// Parses a TOML document.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_msa::config::StudyConfig;
    ///
    /// let cfg = StudyConfig::from_toml_str("days = 4\nchannels = [\"sz\"]").unwrap();
    /// assert_eq!(cfg.days, 4);
    /// assert_eq!(cfg.samples_per_day, 3);
    /// assert_eq!(cfg.channels, vec!["sz"]);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| MsaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Validated design constants.
    pub fn design(&self) -> Result<Design> {
        Design::new(self.days, self.samples_per_day)
    }

    /// Sets locations to `1..=count`.
    pub fn with_location_count(mut self, count: u32) -> Self {
        self.locations = (1..=count).collect();
        self
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            days: Self::default_days(),
            samples_per_day: Self::default_samples_per_day(),
            locations: Self::default_locations(),
            channels: Self::default_channels(),
            location_column: None,
            degeneracy: DegeneracyPolicy::default(),
            snr_reference: Self::default_snr_reference(),
        }
    }
}
