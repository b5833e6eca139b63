//! # Broadband photometry synthesis
//!
//! Integrates the band intensity over the visible hemisphere to a model flux per
//! observed band, converts to magnitudes against the band zero points, and reduces the
//! flux-space residuals to a chi-square.
//!
//! The comparison happens in flux space: the observed magnitude is converted to a flux
//! through the zero point, and the magnitude error is propagated to a flux error.

use crate::atmosphere::AtmosphereCache;
use crate::constants::{Parsec, Radian, MU_LIMB_CUTOFF, N_FIT_PARAMS, PARSEC, R_SUN};
use crate::geometry::{RocheGeometry, SurfaceGrid};
use crate::numeric::trapezoid;
use crate::oblate_errors::OblateError;
use crate::observations::{CalibrationTable, PhotometrySet};

/// Result of one photometry synthesis, per observed band in record order.
#[derive(Debug, Clone)]
pub struct PhotometrySynthesis {
    pub chi_square: f64,
    /// Model flux in erg s^-1 cm^-2 cm^-1.
    pub model_fluxes: Vec<f64>,
    /// Model magnitude against the band zero point.
    pub model_magnitudes: Vec<f64>,
}

/// Synthesize model photometry for every observed band.
///
/// The cache's pre-integration plan must carry one photometric channel per observed
/// band, in record order. Samples closer than about two degrees to the limb are
/// excluded from the integral.
pub fn synthesize_photometry(
    grid: &SurfaceGrid,
    geometry: &RocheGeometry,
    inclination: Radian,
    distance: Parsec,
    observations: &PhotometrySet,
    calibration: &CalibrationTable,
    cache: &mut AtmosphereCache,
) -> Result<PhotometrySynthesis, OblateError> {
    let n_bands = observations.points.len();
    let n_colat = grid.colatitudes.len();

    let theta_r: Vec<f64> = grid
        .radii
        .iter()
        .map(|&r| r * R_SUN / (distance * PARSEC))
        .collect();

    // Inner integral over colatitude for each longitude, one running list per band.
    let mut per_phi: Vec<Vec<f64>> = vec![Vec::with_capacity(grid.longitudes.len()); n_bands];
    for &phi in &grid.longitudes {
        let mut per_colat: Vec<Vec<f64>> = vec![Vec::with_capacity(n_colat); n_bands];
        for (i, &colat) in grid.colatitudes.iter().enumerate() {
            let gravity = &grid.gravities[i];
            let mu = geometry.viewing_cosine(gravity, colat, phi, inclination);
            for (channel, col) in per_colat.iter_mut().enumerate() {
                if mu < MU_LIMB_CUTOFF {
                    col.push(0.0);
                } else {
                    let intensity = cache.photometric_intensity(
                        grid.temperatures[i],
                        gravity.magnitude.log10(),
                        mu,
                        channel,
                    )?;
                    col.push(intensity * theta_r[i].powi(2) * mu * colat.sin());
                }
            }
        }
        for (channel, col) in per_colat.iter().enumerate() {
            per_phi[channel].push(trapezoid(col, &grid.colatitudes));
        }
    }

    let mut model_fluxes = Vec::with_capacity(n_bands);
    let mut model_magnitudes = Vec::with_capacity(n_bands);
    let mut chi = 0.0;
    for (channel, point) in observations.points.iter().enumerate() {
        let flux = trapezoid(&per_phi[channel], &grid.longitudes);
        let zpf = calibration.get(&point.band)?.zero_point_flux;

        model_fluxes.push(flux);
        model_magnitudes.push(-2.5 * (flux / zpf).log10());

        let observed_flux = zpf * 10f64.powf(-0.4 * point.magnitude);
        let flux_error = point.error * zpf * 0.4 * std::f64::consts::LN_10
            * 10f64.powf(-0.4 * point.magnitude);
        chi += (flux - observed_flux).powi(2) / flux_error.powi(2);
    }

    let dof = n_bands as f64 - N_FIT_PARAMS - 1.0;
    Ok(PhotometrySynthesis {
        chi_square: chi / dof,
        model_fluxes,
        model_magnitudes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::loader::SpectraSource;
    use crate::atmosphere::spectra::{GridKey, PhotometricChannel, PreintegrationPlan, RawSpectra};
    use crate::observations::PhotometricPoint;
    use approx::assert_relative_eq;

    struct FlatSource;

    impl SpectraSource for FlatSource {
        fn fetch(&self, _key: GridKey) -> Result<RawSpectra, OblateError> {
            Ok(RawSpectra {
                mu: vec![0.1, 0.5, 1.0],
                intensities: vec![vec![1.0e10; 200]; 3],
            })
        }
    }

    fn cache_with_one_band() -> AtmosphereCache {
        // One flat passband over the whole tabulated wavelength range (200 samples).
        let plan = PreintegrationPlan {
            photometric: vec![PhotometricChannel {
                band: "V".to_owned(),
                response: vec![1.0; 200],
                fwhm: 100.0e-8,
            }],
            visibility: vec![],
        };
        AtmosphereCache::new(Box::new(FlatSource), plan).unwrap()
    }

    #[test]
    fn exact_match_gives_zero_chi_square() {
        let mut cache = cache_with_one_band();
        let geom = RocheGeometry::new(2.0, 2.5, 0.0);
        let grid = SurfaceGrid::build(&geom, 9000.0, 0.25, 41, 41);
        let calibration =
            CalibrationTable::from_table("waveband cwl zpf\nV 5.45e-5 2.17e7\n").unwrap();

        // First pass: learn the model magnitude.
        let mut obs = PhotometrySet::default();
        obs.points.push(PhotometricPoint {
            band: "V".to_owned(),
            magnitude: 5.0,
            error: 0.02,
        });
        let first = synthesize_photometry(
            &grid,
            &geom,
            1.0,
            10.0,
            &obs,
            &calibration,
            &mut cache,
        )
        .unwrap();
        assert!(first.model_fluxes[0] > 0.0);

        // Feed the model magnitude back as the observation: residual must vanish.
        obs.points[0].magnitude = first.model_magnitudes[0];
        let second = synthesize_photometry(
            &grid,
            &geom,
            1.0,
            10.0,
            &obs,
            &calibration,
            &mut cache,
        )
        .unwrap();
        assert_relative_eq!(second.chi_square, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_calibration_band_is_an_error() {
        let mut cache = cache_with_one_band();
        let geom = RocheGeometry::new(2.0, 2.5, 0.0);
        let grid = SurfaceGrid::build(&geom, 9000.0, 0.25, 21, 21);
        let calibration = CalibrationTable::from_table("waveband cwl zpf\n").unwrap();
        let mut obs = PhotometrySet::default();
        obs.points.push(PhotometricPoint {
            band: "V".to_owned(),
            magnitude: 5.0,
            error: 0.02,
        });
        assert!(synthesize_photometry(
            &grid,
            &geom,
            1.0,
            10.0,
            &obs,
            &calibration,
            &mut cache
        )
        .is_err());
    }
}
