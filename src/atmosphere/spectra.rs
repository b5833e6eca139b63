//! # Atmosphere grid tables
//!
//! Types describing one rectangular grid of specific-intensity model spectra: the grid
//! key, the tabulated axes, the raw per-file table and the band-integrated tables that
//! are precomputed once per file at load time.
//!
//! ## Overview
//!
//! Each grid file holds the emergent specific intensity of one (Teff, log g) model as a
//! function of viewing cosine and wavelength. Because full spectra are only ever needed
//! for bolometric work, the photometric and interferometric evaluations integrate every
//! loaded file over their fixed passbands immediately, collapsing the wavelength axis to
//! one scalar per viewing cosine per channel. Subsequent queries then interpolate tiny
//! tables instead of 25500-sample spectra.

use crate::constants::{Meter, ANGSTROM_TO_CM, GRID_WAVELENGTH_STEP};
use crate::numeric::trapezoid_dx;

/// Identity of one grid file: effective temperature in Kelvin and log gravity in
/// tenths of dex. Integer fields so the key is hashable without float identity games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
    pub teff: u32,
    pub logg_tenths: u16,
}

impl GridKey {
    pub fn new(teff: f64, logg: f64) -> Self {
        GridKey {
            teff: teff.round() as u32,
            logg_tenths: (logg * 10.0).round() as u16,
        }
    }

    pub fn logg(&self) -> f64 {
        self.logg_tenths as f64 / 10.0
    }

    /// File stem of this grid point, e.g. `lte07000-4.00-0.0`.
    ///
    /// The sign slot between temperature and gravity carries a historical quirk of the
    /// published grids: `+` for log g = 0 and `-` everywhere else.
    pub fn file_stem(&self, metallicity_suffix: &str) -> String {
        let sign = if self.logg_tenths == 0 { '+' } else { '-' };
        format!(
            "lte{:05}{}{:.2}{}",
            self.teff,
            sign,
            self.logg(),
            metallicity_suffix
        )
    }
}

/// The tabulated axes shared by every file of one grid.
#[derive(Debug, Clone)]
pub struct GridAxes {
    /// Effective temperatures in Kelvin, ascending.
    pub teff: Vec<f64>,
    /// Log surface gravities in dex, ascending.
    pub logg: Vec<f64>,
    /// Viewing cosines, ascending, with a synthetic 0 prepended at index 0. The raw
    /// intensity rows are indexed by (mu index - 1); index 0 marks the dark limb.
    pub mu: Vec<f64>,
    /// Wavelengths in cm, one per spectral sample, ascending with a 1 Angstrom step.
    pub wavelength: Vec<f64>,
}

impl GridAxes {
    /// The standard axes of the published grids: an uneven temperature ladder (100 K
    /// steps through 7000 K, 200 K above) and 0.5 dex gravity steps.
    pub fn standard(file_mu: &[f64], n_wavelengths: usize) -> Self {
        let mut teff: Vec<f64> = (0..27).map(|i| 2300.0 + 100.0 * i as f64).collect();
        teff.extend((0..20).map(|i| 5100.0 + 100.0 * i as f64));
        teff.extend((0..25).map(|i| 7200.0 + 200.0 * i as f64));

        let logg: Vec<f64> = (0..13).map(|i| 0.5 * i as f64).collect();

        let mut mu = Vec::with_capacity(file_mu.len() + 1);
        mu.push(0.0);
        mu.extend_from_slice(file_mu);

        let wavelength: Vec<f64> = (0..n_wavelengths)
            .map(|i| (i as f64 + 500.0) * ANGSTROM_TO_CM)
            .collect();

        GridAxes {
            teff,
            logg,
            mu,
            wavelength,
        }
    }
}

/// Raw content of one grid file, as decoded by a [`super::loader::SpectraSource`].
#[derive(Debug, Clone)]
pub struct RawSpectra {
    /// Viewing cosines of the rows, ascending, without the synthetic zero.
    pub mu: Vec<f64>,
    /// One intensity spectrum per viewing cosine (erg s^-1 cm^-2 cm^-1 sr^-1).
    pub intensities: Vec<Vec<f64>>,
}

/// One photometric passband prepared for pre-integration: the response resampled onto
/// the grid wavelength axis and its full width at half maximum in cm.
#[derive(Debug, Clone)]
pub struct PhotometricChannel {
    pub band: String,
    pub response: Vec<f64>,
    pub fwhm: f64,
}

/// One interferometric spectral channel: a top-hat of width `bandwidth` centered on
/// `wavelength`, both in meters.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityChannel {
    pub wavelength: Meter,
    pub bandwidth: Meter,
}

/// The fixed passbands a grid file is integrated over when it is loaded.
#[derive(Debug, Clone, Default)]
pub struct PreintegrationPlan {
    pub photometric: Vec<PhotometricChannel>,
    pub visibility: Vec<VisibilityChannel>,
}

/// One loaded grid file: the raw table plus its band-integrated companions.
#[derive(Debug, Clone)]
pub struct GridEntry {
    /// Raw intensity rows, indexed by (mu index - 1).
    pub raw: Vec<Vec<f64>>,
    /// `phot[channel][mu_row]`: intensity integrated over each photometric passband.
    pub phot: Vec<Vec<f64>>,
    /// `vis[channel][mu_row]`: intensity integrated over each interferometric channel.
    pub vis: Vec<Vec<f64>>,
}

impl GridEntry {
    /// Integrate a freshly decoded file over every channel of the plan.
    pub fn from_raw(raw: RawSpectra, axes: &GridAxes, plan: &PreintegrationPlan) -> Self {
        let wav = &axes.wavelength;

        let phot = plan
            .photometric
            .iter()
            .map(|ch| {
                raw.intensities
                    .iter()
                    .map(|row| {
                        // Weight by the response, normalize by the passband width, and
                        // keep only the samples inside the response support.
                        let reduced: Vec<f64> = row
                            .iter()
                            .zip(&ch.response)
                            .filter(|(_, &resp)| resp > 0.0)
                            .map(|(&i, &resp)| i * resp / ch.fwhm / 1e8)
                            .collect();
                        trapezoid_dx(&reduced, GRID_WAVELENGTH_STEP)
                    })
                    .collect()
            })
            .collect();

        let vis = plan
            .visibility
            .iter()
            .map(|ch| {
                let lo = ch.wavelength - ch.bandwidth / 2.0;
                let hi = ch.wavelength + ch.bandwidth / 2.0;
                raw.intensities
                    .iter()
                    .map(|row| {
                        // Top-hat channel, half-open on the blue side. Grid wavelengths
                        // are cm; the channel bounds are meters.
                        let reduced: Vec<f64> = row
                            .iter()
                            .zip(wav)
                            .map(|(&i, &w)| {
                                let w_m = w / 100.0;
                                if w_m > lo && w_m <= hi {
                                    i / ch.bandwidth
                                } else {
                                    0.0
                                }
                            })
                            .filter(|&v| v > 0.0)
                            .collect();
                        trapezoid_dx(&reduced, GRID_WAVELENGTH_STEP)
                    })
                    .collect()
            })
            .collect();

        GridEntry {
            raw: raw.intensities,
            phot,
            vis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn file_stem_zero_gravity_quirk() {
        assert_eq!(
            GridKey::new(7000.0, 4.0).file_stem("-0.0"),
            "lte07000-4.00-0.0"
        );
        assert_eq!(
            GridKey::new(11800.0, 0.0).file_stem("-0.0"),
            "lte11800+0.00-0.0"
        );
        assert_eq!(
            GridKey::new(2300.0, 0.5).file_stem("-0.0"),
            "lte02300-0.50-0.0"
        );
    }

    #[test]
    fn standard_axes_shapes() {
        let axes = GridAxes::standard(&[0.1, 0.5, 1.0], 25500);
        assert_eq!(axes.teff.len(), 72);
        assert_eq!(axes.teff[0], 2300.0);
        assert_eq!(*axes.teff.last().unwrap(), 12000.0);
        // The ladder switches from 100 K to 200 K steps above 7000 K.
        assert_eq!(axes.teff[46], 7000.0);
        assert_eq!(axes.teff[47], 7200.0);
        assert_eq!(axes.logg.len(), 13);
        assert_eq!(axes.mu, vec![0.0, 0.1, 0.5, 1.0]);
        assert_relative_eq!(axes.wavelength[0], 500.0e-8);
        assert_relative_eq!(axes.wavelength[1] - axes.wavelength[0], 1e-8);
    }

    #[test]
    fn visibility_preintegration_scales_with_the_channel_width() {
        // The top-hat divides by the bandwidth in meters while the trapezoid runs over
        // the grid axis in cm, so a constant spectrum comes back as
        // level * in-band-width-in-cm / bandwidth-in-m. The constant cm/m factor
        // cancels later in the peak-normalized visibility image.
        let axes = GridAxes::standard(&[1.0], 2000);
        let raw = RawSpectra {
            mu: vec![1.0],
            intensities: vec![vec![3.0; 2000]],
        };
        let center_cm = axes.wavelength[1000];
        let bandwidth_m = 100.0e-8 / 100.0;
        let plan = PreintegrationPlan {
            photometric: vec![],
            visibility: vec![VisibilityChannel {
                wavelength: center_cm / 100.0,
                bandwidth: bandwidth_m,
            }],
        };
        let entry = GridEntry::from_raw(raw, &axes, &plan);
        assert_eq!(entry.vis.len(), 1);
        // 100 in-band samples, 99 trapezoid panels of 1 Angstrom each.
        let expected = 3.0 * 99.0 * GRID_WAVELENGTH_STEP / bandwidth_m;
        assert_relative_eq!(entry.vis[0][0], expected, epsilon = 1e-9);
    }
}
