//! End-to-end study: table → per-channel variance estimates.

use serde::Serialize;
use tracing::{debug, info_span};

use crate::config::StudyConfig;
use crate::design::{reshape, Design};
use crate::error::Result;
use crate::io::SurfaceData;
use crate::variance::{decompose, EstimateTable, LocationAnova, VarianceEstimator};

/// Result of analysing one measurement channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    /// Value column the estimates were computed from.
    pub channel: String,
    /// Per-location variance components and SNR.
    pub estimates: EstimateTable,
    /// Per-location ANOVA behind the estimates.
    #[serde(skip)]
    pub anova: Vec<LocationAnova>,
}

impl ChannelReport {
    /// Locations whose SNR reaches `reference`.
    pub fn above_reference(&self, reference: f64) -> Vec<u32> {
        self.estimates.above_reference(reference)
    }
}

/// A configured variance-component study.
///
/// # Examples
///
/// ```
/// use u_msa::config::StudyConfig;
/// use u_msa::io::SurfaceData;
/// use u_msa::study::Study;
///
/// let mut csv = String::from("day,sample,sa\n");
/// for day in 1..=3 {
///     for sample in 1..=2 {
///         let v = day as f64 + 0.1 * sample as f64;
///         csv.push_str(&format!("{day},{sample},{v}\n"));
///     }
/// }
///
/// let config = StudyConfig {
///     days: 3,
///     samples_per_day: 2,
///     locations: vec![1],
///     ..StudyConfig::default()
/// };
/// let study = Study::new(config).unwrap();
/// let data = SurfaceData::from_reader(csv.as_bytes(), None).unwrap();
/// let reports = study.analyze(&data).unwrap();
/// assert_eq!(reports[0].channel, "sa");
/// assert!(reports[0].estimates.get(1).unwrap().snr > 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct Study {
    config: StudyConfig,
    design: Design,
    estimator: VarianceEstimator,
}

impl Study {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// [`MsaError::InvalidDesignParameters`](crate::error::MsaError::InvalidDesignParameters)
    /// if `days < 2` or `samples_per_day < 2`.
    pub fn new(config: StudyConfig) -> Result<Self> {
        let design = config.design()?;
        let estimator = VarianceEstimator::new().with_policy(config.degeneracy);
        Ok(Self {
            config,
            design,
            estimator,
        })
    }

    /// Configuration in effect.
    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Validated design constants.
    pub fn design(&self) -> Design {
        self.design
    }

    /// Analyses one channel.
    ///
    /// # Errors
    ///
    /// Any loader, reshaping or estimation error for this channel.
    pub fn analyze_channel(&self, data: &SurfaceData, channel: &str) -> Result<ChannelReport> {
        let span = info_span!("channel", channel);
        let _guard = span.enter();

        let records = data.measurements(channel)?;
        let tensor = reshape(&records, self.design, &self.config.locations)?;
        let anova = decompose(&tensor)?;
        let estimates = self.estimator.estimate_from(&anova)?;
        debug!(
            locations = estimates.len(),
            above_reference = estimates.above_reference(self.config.snr_reference).len(),
            "channel estimated"
        );
        Ok(ChannelReport {
            channel: channel.to_string(),
            estimates,
            anova,
        })
    }

    /// Analyses every configured channel independently, in configured order.
    ///
    /// Fails on the first channel that fails; no partial reports are
    /// returned.
    pub fn analyze(&self, data: &SurfaceData) -> Result<Vec<ChannelReport>> {
        self.config
            .channels
            .iter()
            .map(|channel| self.analyze_channel(data, channel))
            .collect()
    }
}
