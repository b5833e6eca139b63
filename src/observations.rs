//! # Observed data tables
//!
//! Parsers and containers for the three observational inputs of a fit:
//!
//! * squared-visibility tables from interferometry (space-delimited, one record per
//!   baseline and spectral channel),
//! * broadband photometry (band, magnitude, error per line),
//! * the per-band calibration table (central wavelength and zero-point flux).
//!
//! Lines starting with `#` are comments; the first line of each table is a header.

use std::collections::HashMap;

use camino::Utf8Path;
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::atmosphere::spectra::VisibilityChannel;
use crate::constants::{Band, Centimeter, Meter, PhotometryRecords};
use crate::oblate_errors::OblateError;

/// One squared-visibility measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityPoint {
    /// Effective wavelength of the spectral channel, in m.
    pub wavelength: Meter,
    /// Bandwidth of the spectral channel, in m.
    pub bandwidth: Meter,
    pub visibility: f64,
    pub error: f64,
    /// Baseline coordinates in meters.
    pub u_meters: Meter,
    pub v_meters: Meter,
    /// Baseline coordinates in wavelengths (spatial frequency).
    pub u_cycles: f64,
    pub v_cycles: f64,
    /// Name of the calibrator star of this record.
    pub calibrator: String,
}

/// All visibility records of one target, sorted by wavelength.
#[derive(Debug, Clone, Default)]
pub struct VisibilitySet {
    pub points: Vec<VisibilityPoint>,
}

/// One spectral channel with the records observed through it.
#[derive(Debug, Clone)]
pub struct ChannelGroup {
    pub channel: VisibilityChannel,
    /// Indices into [`VisibilitySet::points`].
    pub point_indices: Vec<usize>,
}

impl VisibilitySet {
    /// Parse a visibility table.
    ///
    /// Columns: wavelength (um), bandwidth (um), visibility, error, u (m), v (m),
    /// u (wavelengths), v (wavelengths), calibrator.
    pub fn from_table(text: &str) -> Result<Self, OblateError> {
        let mut points = Vec::new();
        for (line_no, line) in text.lines().enumerate().skip(1) {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = trimmed.split_whitespace().collect();
            if cols.len() != 9 {
                return Err(OblateError::ParseVisibilityError {
                    line: line_no + 1,
                    reason: format!("expected 9 columns, found {}", cols.len()),
                });
            }
            let num = |i: usize| -> Result<f64, OblateError> {
                cols[i].parse().map_err(|_| OblateError::ParseVisibilityError {
                    line: line_no + 1,
                    reason: format!("bad number in column {}: {:?}", i + 1, cols[i]),
                })
            };
            points.push(VisibilityPoint {
                wavelength: num(0)? * 1e-6,
                bandwidth: num(1)? * 1e-6,
                visibility: num(2)?,
                error: num(3)?,
                u_meters: num(4)?,
                v_meters: num(5)?,
                u_cycles: num(6)?,
                v_cycles: num(7)?,
                calibrator: cols[8].to_owned(),
            });
        }
        points.sort_by_key(|p| OrderedFloat(p.wavelength));
        Ok(VisibilitySet { points })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, OblateError> {
        Self::from_table(&std::fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Group the records by their unique wavelengths, in ascending wavelength order.
    /// One image is synthesized per group.
    pub fn channel_groups(&self) -> Vec<ChannelGroup> {
        self.points
            .iter()
            .enumerate()
            .chunk_by(|&(_, p)| OrderedFloat(p.wavelength))
            .into_iter()
            .map(|(_, records)| {
                let records: Vec<(usize, &VisibilityPoint)> = records.collect();
                ChannelGroup {
                    channel: VisibilityChannel {
                        wavelength: records[0].1.wavelength,
                        bandwidth: records[0].1.bandwidth,
                    },
                    point_indices: records.into_iter().map(|(i, _)| i).collect(),
                }
            })
            .collect()
    }
}

/// One broadband magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotometricPoint {
    pub band: Band,
    pub magnitude: f64,
    pub error: f64,
}

/// The photometric records of one target, in file order.
#[derive(Debug, Clone, Default)]
pub struct PhotometrySet {
    pub points: PhotometryRecords,
}

impl PhotometrySet {
    /// Parse a photometry table: band, magnitude, error per line.
    pub fn from_table(text: &str) -> Result<Self, OblateError> {
        let mut points = PhotometryRecords::new();
        for (line_no, line) in text.lines().enumerate().skip(1) {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = trimmed.split_whitespace().collect();
            if cols.len() != 3 {
                return Err(OblateError::ParsePhotometryError {
                    line: line_no + 1,
                    reason: format!("expected 3 columns, found {}", cols.len()),
                });
            }
            let num = |i: usize| -> Result<f64, OblateError> {
                cols[i].parse().map_err(|_| OblateError::ParsePhotometryError {
                    line: line_no + 1,
                    reason: format!("bad number in column {}: {:?}", i + 1, cols[i]),
                })
            };
            points.push(PhotometricPoint {
                band: cols[0].to_owned(),
                magnitude: num(1)?,
                error: num(2)?,
            });
        }
        Ok(PhotometrySet { points })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, OblateError> {
        Self::from_table(&std::fs::read_to_string(path)?)
    }

    /// The bands present, in file order.
    pub fn bands(&self) -> Vec<Band> {
        self.points.iter().map(|p| p.band.clone()).collect()
    }
}

/// Calibration of one photometric band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandCalibration {
    /// Central wavelength in cm.
    pub central_wavelength: Centimeter,
    /// Zero-point flux in erg s^-1 cm^-2 cm^-1.
    pub zero_point_flux: f64,
}

/// Per-band central wavelengths and zero-point fluxes.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTable {
    bands: HashMap<Band, BandCalibration>,
}

impl CalibrationTable {
    /// Parse a calibration table: waveband, central wavelength (cm), zero-point flux.
    pub fn from_table(text: &str) -> Result<Self, OblateError> {
        let mut bands = HashMap::new();
        for (line_no, line) in text.lines().enumerate().skip(1) {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = trimmed.split_whitespace().collect();
            if cols.len() != 3 {
                return Err(OblateError::ParseTableError(
                    "calibration".to_owned(),
                    format!("line {}: expected 3 columns", line_no + 1),
                ));
            }
            let num = |i: usize| -> Result<f64, OblateError> {
                cols[i].parse().map_err(|_| {
                    OblateError::ParseTableError(
                        "calibration".to_owned(),
                        format!("line {}: bad number {:?}", line_no + 1, cols[i]),
                    )
                })
            };
            bands.insert(
                cols[0].to_owned(),
                BandCalibration {
                    central_wavelength: num(1)?,
                    zero_point_flux: num(2)?,
                },
            );
        }
        Ok(CalibrationTable { bands })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, OblateError> {
        Self::from_table(&std::fs::read_to_string(path)?)
    }

    pub fn get(&self, band: &str) -> Result<BandCalibration, OblateError> {
        self.bands.get(band).copied().ok_or_else(|| {
            OblateError::ParseTableError(
                "calibration".to_owned(),
                format!("no entry for band {band:?}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const VIS_TABLE: &str = "\
wl dwl vis vis_err u_m v_m u_l v_l cal
1.673 0.05 0.81 0.02 100.0 50.0 5.9e7 3.0e7 HD1
# a comment line
1.602 0.05 0.85 0.03 100.0 50.0 6.2e7 3.1e7 HD1
1.673 0.05 0.64 0.02 200.0 10.0 1.2e8 6.0e6 HD2
";

    #[test]
    fn visibility_table_is_sorted_and_grouped() {
        let set = VisibilitySet::from_table(VIS_TABLE).unwrap();
        assert_eq!(set.len(), 3);
        // Sorted by wavelength, micrometers converted to meters.
        assert_relative_eq!(set.points[0].wavelength, 1.602e-6);
        assert_relative_eq!(set.points[1].wavelength, 1.673e-6);

        let groups = set.channel_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].point_indices, vec![0]);
        assert_eq!(groups[1].point_indices, vec![1, 2]);
        assert_relative_eq!(groups[1].channel.bandwidth, 0.05e-6);
    }

    #[test]
    fn visibility_bad_column_count_names_the_line() {
        let bad = "header\n1.673 0.05 0.81\n";
        match VisibilitySet::from_table(bad) {
            Err(OblateError::ParseVisibilityError { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn photometry_and_calibration_round_trip() {
        let phot = PhotometrySet::from_table("band mag err\nV 5.32 0.03\nK 4.91 0.02\n").unwrap();
        assert_eq!(phot.bands(), vec!["V".to_owned(), "K".to_owned()]);
        assert_relative_eq!(phot.points[1].magnitude, 4.91);

        let cal = CalibrationTable::from_table(
            "waveband cwl zpf\nV 5.45e-5 2.17e7\nK 2.19e-4 1.41e6\n",
        )
        .unwrap();
        let v = cal.get("V").unwrap();
        assert_relative_eq!(v.central_wavelength, 5.45e-5);
        assert!(cal.get("H").is_err());
    }
}
