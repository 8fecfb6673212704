//! Long-format surface measurement tables.
//!
//! The input is delimited text with a header row, one row per location per
//! (day, sample), and one value column per measurement channel:
//!
//! ```text
//! day,sample,sa,sz
//! 1,1,0.412,3.91
//! 1,1,0.398,3.77
//! ...
//! ```
//!
//! Location identity comes from an explicit column when one is named,
//! otherwise from row position inside each (day, sample) cell.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::design::Measurement;
use crate::error::{MsaError, Result};

/// Parsed key columns plus the raw channel columns of a measurement table.
#[derive(Debug, Clone)]
pub struct SurfaceData {
    headers: Vec<String>,
    keys: Vec<RowKey>,
    rows: Vec<csv::StringRecord>,
}

#[derive(Debug, Clone, Copy)]
struct RowKey {
    line: u64,
    day: u32,
    sample: u32,
    location: u32,
}

impl SurfaceData {
    /// Reads a table from any reader.
    ///
    /// `location_column` names the location id column; `None` assigns
    /// locations 1, 2, … in file order within each (day, sample) cell.
    ///
    /// # Errors
    ///
    /// - [`MsaError::MissingColumn`] if `day`, `sample` or the location
    ///   column is absent.
    /// - [`MsaError::Parse`] if a key cell is not a non-negative integer.
    /// - [`MsaError::Csv`] for malformed input.
    ///
    /// # Examples
    ///
    /// ```
    /// use u_msa::io::SurfaceData;
    ///
    /// let text = "day,sample,sa\n1,1,0.5\n1,1,0.7\n1,2,0.6\n";
    /// let data = SurfaceData::from_reader(text.as_bytes(), None).unwrap();
    /// let sa = data.measurements("sa").unwrap();
    /// assert_eq!(sa.len(), 3);
    /// assert_eq!(sa[1].location, 2);
    /// assert_eq!(sa[2].location, 1);
    /// ```
    pub fn from_reader<R: Read>(reader: R, location_column: Option<&str>) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let day_idx = column_index(&headers, "day")?;
        let sample_idx = column_index(&headers, "sample")?;
        let loc_idx = location_column
            .map(|name| column_index(&headers, name))
            .transpose()?;

        let mut positional: HashMap<(u32, u32), u32> = HashMap::new();
        let mut keys = Vec::new();
        let mut rows = Vec::new();

        for (i, result) in rdr.records().enumerate() {
            let record = result?;
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(i as u64 + 2);
            let day = parse_cell::<u32>(&record, &headers, day_idx, line)?;
            let sample = parse_cell::<u32>(&record, &headers, sample_idx, line)?;
            let location = match loc_idx {
                Some(idx) => parse_cell::<u32>(&record, &headers, idx, line)?,
                None => {
                    let next = positional.entry((day, sample)).or_insert(0);
                    *next += 1;
                    *next
                }
            };
            keys.push(RowKey {
                line,
                day,
                sample,
                location,
            });
            rows.push(record);
        }

        debug!(rows = rows.len(), columns = headers.len(), "read surface table");
        Ok(Self {
            headers,
            keys,
            rows,
        })
    }

    /// Reads a table from a file.
    pub fn from_path(path: impl AsRef<Path>, location_column: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MsaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file, location_column)
    }

    /// Header names in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` if the table has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Extracts the records of one measurement channel.
    ///
    /// # Errors
    ///
    /// - [`MsaError::MissingColumn`] if `channel` is not a header.
    /// - [`MsaError::Parse`] if a value is not a number.
    pub fn measurements(&self, channel: &str) -> Result<Vec<Measurement>> {
        let idx = column_index(&self.headers, channel)?;
        self.keys
            .iter()
            .zip(self.rows.iter())
            .map(|(key, record)| {
                let value = parse_cell::<f64>(record, &self.headers, idx, key.line)?;
                Ok(Measurement::new(key.day, key.sample, key.location, value))
            })
            .collect()
    }
}

fn column_index(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| MsaError::MissingColumn {
            column: name.to_string(),
            available: headers.to_vec(),
        })
}

fn parse_cell<T: std::str::FromStr>(
    record: &csv::StringRecord,
    headers: &[String],
    idx: usize,
    line: u64,
) -> Result<T> {
    let raw = record.get(idx).unwrap_or("");
    raw.parse::<T>().map_err(|_| MsaError::Parse {
        line,
        column: headers[idx].clone(),
        value: raw.to_string(),
    })
}
