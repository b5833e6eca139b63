//! # Photometric filter curves
//!
//! Reads filter transmission tables, resamples them onto the atmosphere-grid wavelength
//! axis, and measures their full width at half maximum. The resampled curve and its
//! width together form one [`PhotometricChannel`] of the pre-integration plan.
//!
//! Filter tables are plain text with one header line, then wavelength in Angstrom and
//! fractional transmission per line, separated by tabs or spaces.

use camino::Utf8Path;

use crate::atmosphere::spectra::PhotometricChannel;
use crate::constants::Centimeter;
use crate::numeric::interp1_or_zero;
use crate::oblate_errors::OblateError;

/// One filter transmission curve on its native wavelength sampling (cm).
#[derive(Debug, Clone)]
pub struct FilterCurve {
    pub band: String,
    pub wavelength: Vec<Centimeter>,
    pub transmission: Vec<f64>,
    /// Central wavelength of the band in cm, used to normalize the resampled curve.
    pub central_wavelength: Centimeter,
}

impl FilterCurve {
    /// Parse a transmission table. The first line is a header and is skipped.
    pub fn from_table(
        band: &str,
        text: &str,
        central_wavelength: Centimeter,
    ) -> Result<Self, OblateError> {
        let mut wavelength = Vec::new();
        let mut transmission = Vec::new();
        for line in text.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            let mut cols = line.split_whitespace();
            let (w, t) = match (cols.next(), cols.next()) {
                (Some(w), Some(t)) => (w, t),
                _ => {
                    return Err(OblateError::InvalidFilterCurve(
                        band.to_owned(),
                        format!("short line: {line:?}"),
                    ))
                }
            };
            let w: f64 = w.parse().map_err(|_| {
                OblateError::InvalidFilterCurve(band.to_owned(), format!("bad wavelength {w:?}"))
            })?;
            let t: f64 = t.parse().map_err(|_| {
                OblateError::InvalidFilterCurve(band.to_owned(), format!("bad transmission {t:?}"))
            })?;
            wavelength.push(w / 1e8);
            transmission.push(t);
        }
        if wavelength.len() < 2 {
            return Err(OblateError::InvalidFilterCurve(
                band.to_owned(),
                "fewer than 2 samples".to_owned(),
            ));
        }
        Ok(FilterCurve {
            band: band.to_owned(),
            wavelength,
            transmission,
            central_wavelength,
        })
    }

    /// Load `<dir>/<band>.txt`.
    pub fn load(
        dir: &Utf8Path,
        band: &str,
        central_wavelength: Centimeter,
    ) -> Result<Self, OblateError> {
        let text = std::fs::read_to_string(dir.join(format!("{band}.txt")))?;
        Self::from_table(band, &text, central_wavelength)
    }

    /// Resample onto the grid wavelength axis, zero outside the tabulated support,
    /// normalized so the transmission at the central wavelength is 1.
    pub fn resample(&self, axis: &[f64]) -> Result<Vec<f64>, OblateError> {
        let mut resampled: Vec<f64> = axis
            .iter()
            .map(|&w| interp1_or_zero(&self.wavelength, &self.transmission, w))
            .collect();

        // Normalize by the transmission at the axis sample nearest the band center.
        let mut nearest = 0;
        let mut best = f64::INFINITY;
        for (i, &w) in axis.iter().enumerate() {
            let d = (w - self.central_wavelength).abs();
            if d < best {
                best = d;
                nearest = i;
            }
        }
        let center_trans = resampled.get(nearest).copied().unwrap_or(0.0);
        if center_trans <= 0.0 {
            return Err(OblateError::InvalidFilterCurve(
                self.band.clone(),
                "zero transmission at the central wavelength".to_owned(),
            ));
        }
        for v in &mut resampled {
            *v /= center_trans;
        }
        Ok(resampled)
    }

    /// Build the pre-integration channel for this band on the given wavelength axis.
    pub fn to_channel(&self, axis: &[f64]) -> Result<PhotometricChannel, OblateError> {
        let response = self.resample(axis)?;
        let fwhm = full_width_half_max(axis, &response, &self.band)?;
        Ok(PhotometricChannel {
            band: self.band.clone(),
            response,
            fwhm,
        })
    }
}

/// Full width at half maximum of a transmission curve.
///
/// Top-hat curves (nothing strictly between 0 and 1) are measured edge to edge;
/// otherwise the half-power wavelengths on either side of the peak are located on the
/// sampled curve directly, without sub-sample refinement.
pub fn full_width_half_max(
    wave: &[f64],
    transmission: &[f64],
    band: &str,
) -> Result<f64, OblateError> {
    let unusable = |reason: &str| {
        OblateError::InvalidFilterCurve(band.to_owned(), reason.to_owned())
    };

    let is_top_hat = !transmission.iter().any(|&t| t > 0.01 && t < 0.99);
    if is_top_hat {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for (&w, &t) in wave.iter().zip(transmission) {
            if t > 0.01 {
                lo = lo.min(w);
                hi = hi.max(w);
            }
        }
        if hi < lo {
            return Err(unusable("no transmission above 1 percent"));
        }
        return Ok(hi - lo);
    }

    // Peak wavelength: among the samples closest to unit transmission, take the middle
    // one so a flat-topped curve peaks at its center.
    let closest = transmission
        .iter()
        .map(|&t| (t - 1.0).powi(2))
        .fold(f64::INFINITY, f64::min);
    let peak_waves: Vec<f64> = wave
        .iter()
        .zip(transmission)
        .filter(|(_, &t)| (t - 1.0).powi(2) == closest)
        .map(|(&w, _)| w)
        .collect();
    let peak = peak_waves[peak_waves.len() / 2];

    let half_crossing = |keep: &dyn Fn(f64) -> bool| -> Option<f64> {
        let mut best = f64::INFINITY;
        let mut at = None;
        for (&w, &t) in wave.iter().zip(transmission) {
            if !keep(w) {
                continue;
            }
            let d = (t - 0.5).powi(2);
            if d < best {
                best = d;
                at = Some(w);
            }
        }
        at
    };

    let high = half_crossing(&|w| w > peak).ok_or_else(|| unusable("no samples above the peak"))?;
    let low = half_crossing(&|w| w < peak).ok_or_else(|| unusable("no samples below the peak"))?;

    Ok(high - low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn axis() -> Vec<f64> {
        (0..2001).map(|i| (5000.0 + i as f64) * 1e-8).collect()
    }

    #[test]
    fn top_hat_width_is_edge_to_edge() {
        let wave = axis();
        let trans: Vec<f64> = wave
            .iter()
            .map(|&w| {
                if (5500e-8..=6500e-8).contains(&w) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let fwhm = full_width_half_max(&wave, &trans, "tophat").unwrap();
        assert_relative_eq!(fwhm, 1000e-8, epsilon = 2e-8);
    }

    #[test]
    fn triangular_curve_half_power_width() {
        let wave = axis();
        let center = 6000e-8;
        let trans: Vec<f64> = wave
            .iter()
            .map(|&w| (1.0 - (w - center).abs() / 500e-8).max(0.0))
            .collect();
        // Half power at +-250 A for a triangle of half-width 500 A.
        let fwhm = full_width_half_max(&wave, &trans, "tri").unwrap();
        assert_relative_eq!(fwhm, 500e-8, epsilon = 3e-8);
    }

    #[test]
    fn parse_and_resample_normalizes_at_center() {
        let text = "wavelength\ttransmission\n5000\t0.0\n5500\t0.4\n6000\t0.8\n6500\t0.4\n7000\t0.0\n";
        let curve = FilterCurve::from_table("V", text, 6000e-8).unwrap();
        assert_eq!(curve.wavelength.len(), 5);
        let resampled = curve.resample(&axis()).unwrap();
        let peak = resampled.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(peak, 1.0, epsilon = 1e-3);
        // Outside the tabulated support the response is exactly zero.
        assert_eq!(resampled[0], 0.0);
    }

    #[test]
    fn malformed_table_is_rejected() {
        assert!(FilterCurve::from_table("V", "header\n5000\n", 6000e-8).is_err());
        assert!(FilterCurve::from_table("V", "header\nabc def\n", 6000e-8).is_err());
    }
}
