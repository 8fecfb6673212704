//! Long-format records to balanced `(a·r) × L` tensor.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{Design, Measurement};
use crate::error::{CellDefect, MsaError, Result};

/// Measurements arranged as one row per (day, sample) cell and one column
/// per location.
///
/// Rows follow the canonical day-major enumeration
/// `(1,1), (1,2), …, (1,r), (2,1), …`; columns follow the location order
/// passed to [`reshape`]. Every cell is complete and every value is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedTensor {
    design: Design,
    locations: Vec<u32>,
    /// Row-major, `design.cells()` rows of `locations.len()` values.
    values: Vec<f64>,
}

/// Arranges long-format records into a [`BalancedTensor`].
///
/// Each record is placed by its explicit `(day, sample, location)` key, so
/// the input order is irrelevant. Records whose day or sample lies outside
/// the design are skipped with a warning.
///
/// # Errors
///
/// - [`MsaError::InvalidDesignParameters`] if `locations` is empty or holds
///   duplicates.
/// - [`MsaError::NonFiniteValue`] if any in-design value is NaN or infinite.
/// - [`MsaError::IncompleteDesign`] for the first cell (in day-major order)
///   whose record count differs from `locations.len()`, or that lacks or
///   repeats a location.
///
/// # Examples
///
/// ```
/// use u_msa::design::{reshape, Design, Measurement};
///
/// let design = Design::new(2, 2).unwrap();
/// let mut records = Vec::new();
/// for day in 1..=2 {
///     for sample in 1..=2 {
///         for loc in 1..=3 {
///             records.push(Measurement::new(day, sample, loc, (day * 10 + loc) as f64));
///         }
///     }
/// }
///
/// let tensor = reshape(&records, design, &[1, 2, 3]).unwrap();
/// assert_eq!(tensor.row(2, 1).unwrap(), &[21.0, 22.0, 23.0]);
///
/// // Dropping a record leaves a hole in the grid.
/// records.pop();
/// assert!(reshape(&records, design, &[1, 2, 3]).is_err());
/// ```
pub fn reshape(
    records: &[Measurement],
    design: Design,
    locations: &[u32],
) -> Result<BalancedTensor> {
    if locations.is_empty() {
        return Err(MsaError::invalid_design("at least one location is required"));
    }
    let mut column_of: HashMap<u32, usize> = HashMap::with_capacity(locations.len());
    for (j, &loc) in locations.iter().enumerate() {
        if column_of.insert(loc, j).is_some() {
            return Err(MsaError::invalid_design(format!(
                "location {loc} is listed more than once"
            )));
        }
    }

    let n_loc = locations.len();
    let n_cells = design.cells();
    let mut slots: Vec<Option<f64>> = vec![None; n_cells * n_loc];
    let mut counts = vec![0usize; n_cells];
    let mut duplicates: Vec<Option<u32>> = vec![None; n_cells];
    let mut skipped = 0usize;

    for rec in records {
        let Some(cell) = design.cell_index(rec.day, rec.sample) else {
            skipped += 1;
            continue;
        };
        if !rec.value.is_finite() {
            return Err(MsaError::NonFiniteValue {
                day: rec.day,
                sample: rec.sample,
                location: rec.location,
            });
        }
        counts[cell] += 1;
        // Unknown locations only count towards the cell size.
        if let Some(&j) = column_of.get(&rec.location) {
            let slot = &mut slots[cell * n_loc + j];
            if slot.is_some() {
                duplicates[cell].get_or_insert(rec.location);
            } else {
                *slot = Some(rec.value);
            }
        }
    }

    if skipped > 0 {
        warn!(
            skipped,
            days = design.days(),
            samples_per_day = design.samples_per_day(),
            "records outside the design grid were ignored"
        );
    }

    let mut values = Vec::with_capacity(n_cells * n_loc);
    for (cell, (day, sample)) in design.cells_iter().enumerate() {
        if counts[cell] != n_loc {
            return Err(MsaError::IncompleteDesign {
                day,
                sample,
                defect: CellDefect::Count {
                    expected: n_loc,
                    found: counts[cell],
                },
            });
        }
        if let Some(loc) = duplicates[cell] {
            return Err(MsaError::IncompleteDesign {
                day,
                sample,
                defect: CellDefect::DuplicateLocation(loc),
            });
        }
        for (j, &loc) in locations.iter().enumerate() {
            match slots[cell * n_loc + j] {
                Some(v) => values.push(v),
                None => {
                    return Err(MsaError::IncompleteDesign {
                        day,
                        sample,
                        defect: CellDefect::MissingLocation(loc),
                    })
                }
            }
        }
    }

    debug!(
        cells = n_cells,
        locations = n_loc,
        records = records.len(),
        "reshaped measurements into balanced tensor"
    );

    Ok(BalancedTensor {
        design,
        locations: locations.to_vec(),
        values,
    })
}

impl BalancedTensor {
    /// Design constants the tensor was built for.
    pub fn design(&self) -> Design {
        self.design
    }

    /// Location identifiers in column order.
    pub fn locations(&self) -> &[u32] {
        &self.locations
    }

    /// Number of location columns.
    pub fn n_locations(&self) -> usize {
        self.locations.len()
    }

    /// Values of one (day, sample) cell in location order.
    pub fn row(&self, day: u32, sample: u32) -> Option<&[f64]> {
        let cell = self.design.cell_index(day, sample)?;
        let n = self.locations.len();
        Some(&self.values[cell * n..(cell + 1) * n])
    }

    /// Single value at `(day, sample)` for the location in column `loc_idx`.
    pub fn value(&self, day: u32, sample: u32, loc_idx: usize) -> Option<f64> {
        self.row(day, sample)?.get(loc_idx).copied()
    }

    /// The `r` replicate values of one day at column `loc_idx`, in sample
    /// order.
    pub fn day_values(&self, day: u32, loc_idx: usize) -> Option<Vec<f64>> {
        if loc_idx >= self.locations.len() {
            return None;
        }
        (1..=self.design.samples_per_day())
            .map(|sample| self.value(day, sample, loc_idx))
            .collect()
    }

    /// All `a·r` values of column `loc_idx` in day-major order.
    pub fn column(&self, loc_idx: usize) -> Option<Vec<f64>> {
        if loc_idx >= self.locations.len() {
            return None;
        }
        Some(
            self.values
                .chunks_exact(self.locations.len())
                .map(|row| row[loc_idx])
                .collect(),
        )
    }

    /// Returns a copy with every value passed through `f`.
    ///
    /// # Errors
    ///
    /// [`MsaError::NonFiniteValue`] if `f` produces NaN or infinity.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Result<Self> {
        let mut out = self.clone();
        let n = self.locations.len();
        for (i, v) in out.values.iter_mut().enumerate() {
            *v = f(*v);
            if !v.is_finite() {
                let (day, sample) = self.cell_key(i / n);
                return Err(MsaError::NonFiniteValue {
                    day,
                    sample,
                    location: self.locations[i % n],
                });
            }
        }
        Ok(out)
    }

    /// Expands the tensor back into long-format records, day-major then
    /// location order.
    pub fn flatten(&self) -> Vec<Measurement> {
        let n = self.locations.len();
        self.values
            .chunks_exact(n)
            .enumerate()
            .flat_map(|(cell, row)| {
                let (day, sample) = self.cell_key(cell);
                row.iter()
                    .zip(self.locations.iter())
                    .map(move |(&value, &location)| Measurement::new(day, sample, location, value))
            })
            .collect()
    }

    fn cell_key(&self, cell: usize) -> (u32, u32) {
        let r = self.design.samples_per_day() as usize;
        ((cell / r) as u32 + 1, (cell % r) as u32 + 1)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn key(m: &Measurement) -> (u32, u32, u32, u64) {
        (m.day, m.sample, m.location, m.value.to_bits())
    }

    proptest! {
        #[test]
        fn reshape_flatten_preserves_multiset(
            (a, r, l, values) in (2u32..=6, 2u32..=4, 1u32..=5).prop_flat_map(|(a, r, l)| {
                (
                    Just(a),
                    Just(r),
                    Just(l),
                    proptest::collection::vec(-1e3_f64..1e3, (a * r * l) as usize),
                )
            }),
            rotate in 0usize..64,
        ) {
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
            let mut input = records.clone();
            let k = rotate % input.len();
            input.rotate_left(k);

            let tensor = reshape(&input, design, &locations).unwrap();
            let mut back: Vec<_> = tensor.flatten().iter().map(key).collect();
            let mut orig: Vec<_> = records.iter().map(key).collect();
            back.sort_unstable();
            orig.sort_unstable();
            prop_assert_eq!(back, orig);
        }

        #[test]
        fn removing_any_record_is_detected(
            (a, r, l) in (2u32..=5, 2u32..=4, 1u32..=4),
            victim in 0usize..1000,
        ) {
            let design = Design::new(a, r).unwrap();
            let locations: Vec<u32> = (1..=l).collect();
            let mut records = Vec::new();
            for d in 1..=a {
                for s in 1..=r {
                    for &loc in &locations {
                        records.push(Measurement::new(d, s, loc, f64::from(d + s + loc)));
                    }
                }
            }
            let idx = victim % records.len();
            records.remove(idx);
            let is_incomplete = matches!(
                reshape(&records, design, &locations),
                Err(MsaError::IncompleteDesign { .. })
            );
            prop_assert!(is_incomplete);
        }
    }
}
