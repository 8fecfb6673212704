//! Error types for measurement system analysis.

use std::fmt;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MsaError>;

/// Errors raised while loading, reshaping, or estimating a nested design.
#[derive(Error, Debug)]
pub enum MsaError {
    /// Design constants or the location list cannot support the estimator
    /// (fewer than 2 days or samples, empty or duplicated locations).
    #[error("invalid design parameters: {reason}")]
    InvalidDesignParameters {
        /// Human-readable description of the violated precondition.
        reason: String,
    },

    /// A (day, sample) cell does not hold exactly one value per location.
    #[error("incomplete design at day {day}, sample {sample}: {defect}")]
    IncompleteDesign {
        /// Day (cycle) of the offending cell.
        day: u32,
        /// Sample (replicate) of the offending cell.
        sample: u32,
        /// What is wrong with the cell.
        defect: CellDefect,
    },

    /// A measurement value is NaN or infinite.
    #[error("non-finite value at day {day}, sample {sample}, location {location}")]
    NonFiniteValue {
        /// Day of the offending record.
        day: u32,
        /// Sample of the offending record.
        sample: u32,
        /// Location of the offending record.
        location: u32,
    },

    /// Within-group variance is zero at a location, so the SNR is undefined.
    #[error("degenerate design at location {location}: within-cycle mean square is zero")]
    DegenerateDesign {
        /// Location whose replicates are all identical within every day.
        location: u32,
    },

    /// Means or sums of squares at a location fall outside the finite
    /// `f64` range, although every input value is finite.
    #[error("sums of squares at location {location} exceed the f64 range")]
    NumericRange {
        /// Location whose decomposition overflowed.
        location: u32,
    },

    /// A required column is absent from the input table.
    #[error("missing column '{column}' (available: {available:?})")]
    MissingColumn {
        /// Requested column name.
        column: String,
        /// Header names found in the input.
        available: Vec<String>,
    },

    /// A cell could not be parsed as the expected type.
    #[error("line {line}, column '{column}': cannot parse '{value}'")]
    Parse {
        /// 1-based line number (the header is line 1).
        line: u64,
        /// Column name.
        column: String,
        /// Raw cell content.
        value: String,
    },

    /// Malformed delimited input.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A file could not be read.
    #[error("cannot read '{path}': {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML configuration.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Defect found in a single (day, sample) cell during reshaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellDefect {
    /// Number of records differs from the number of locations.
    Count {
        /// Number of configured locations.
        expected: usize,
        /// Number of records matched to the cell.
        found: usize,
    },
    /// The cell has the right size but lacks this location.
    MissingLocation(u32),
    /// The cell holds more than one record for this location.
    DuplicateLocation(u32),
}

impl fmt::Display for CellDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellDefect::Count { expected, found } => {
                write!(f, "expected {expected} location values, found {found}")
            }
            CellDefect::MissingLocation(loc) => write!(f, "location {loc} is missing"),
            CellDefect::DuplicateLocation(loc) => write!(f, "location {loc} appears more than once"),
        }
    }
}

impl MsaError {
    pub(crate) fn invalid_design(reason: impl Into<String>) -> Self {
        MsaError::InvalidDesignParameters {
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors caused by the shape or content of the data
    /// rather than by configuration or I/O.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            MsaError::IncompleteDesign { .. }
                | MsaError::NonFiniteValue { .. }
                | MsaError::DegenerateDesign { .. }
                | MsaError::NumericRange { .. }
                | MsaError::Parse { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_design_names_the_cell() {
        let err = MsaError::IncompleteDesign {
            day: 3,
            sample: 2,
            defect: CellDefect::Count {
                expected: 14,
                found: 13,
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("day 3"), "{msg}");
        assert!(msg.contains("sample 2"), "{msg}");
        assert!(msg.contains("expected 14"), "{msg}");
        assert!(err.is_data_error());
    }

    #[test]
    fn degenerate_design_names_the_location() {
        let msg = MsaError::DegenerateDesign { location: 7 }.to_string();
        assert!(msg.contains("location 7"), "{msg}");
    }

    #[test]
    fn numeric_range_is_a_data_error() {
        let err = MsaError::NumericRange { location: 3 };
        assert!(err.is_data_error());
        assert!(err.to_string().contains("location 3"), "{err}");
    }

    #[test]
    fn config_errors_are_not_data_errors() {
        assert!(!MsaError::invalid_design("a < 2").is_data_error());
    }
}
