//! # Bolometric and apparent luminosity
//!
//! The tabulated spectra cover a finite wavelength range, so the integrals are split in
//! three: the tabulated mid range, and blackbody extensions on the short- and
//! long-wavelength sides at the local effective temperature.
//!
//! * The bolometric luminosity integrates the emergent intensity over viewing cosine,
//!   wavelength and the whole surface.
//! * The apparent luminosity integrates the observed flux over the visible hemisphere
//!   and scales it back to a luminosity through the distance, so an anisotropic
//!   (gravity-darkened, oblate) star shows the difference between the two.

use crate::atmosphere::AtmosphereCache;
use crate::constants::{
    Parsec, Radian, C_LIGHT, H_PLANCK, K_BOLTZ, L_SUN, MU_LIMB_CUTOFF, PARSEC, R_SUN,
};
use crate::geometry::{RocheGeometry, SurfaceGrid};
use crate::numeric::trapezoid;
use crate::oblate_errors::OblateError;

/// Both luminosities, in solar units.
#[derive(Debug, Clone, Copy)]
pub struct LuminositySynthesis {
    pub bolometric: f64,
    pub apparent: f64,
}

/// Short-wavelength blackbody extension: 100 to 499 Angstrom, 1 Angstrom steps, in cm.
fn low_wavelengths() -> Vec<f64> {
    (0..400).map(|i| (i as f64 + 100.0) / 1e8).collect()
}

/// Long-wavelength blackbody extension: 26000 to 75990 Angstrom, 10 Angstrom steps.
fn high_wavelengths() -> Vec<f64> {
    (0..5000).map(|i| (i as f64 * 10.0 + 26000.0) / 1e8).collect()
}

/// Planck specific intensity at temperature `t` for each wavelength (cm).
fn planck(wavelengths: &[f64], t: f64) -> Vec<f64> {
    wavelengths
        .iter()
        .map(|&w| {
            2.0 * H_PLANCK * C_LIGHT * C_LIGHT / w.powi(5)
                / ((H_PLANCK * C_LIGHT / K_BOLTZ / t / w).exp() - 1.0)
        })
        .collect()
}

/// Compute the bolometric and apparent luminosities of the model star.
pub fn synthesize_luminosity(
    grid: &SurfaceGrid,
    geometry: &RocheGeometry,
    inclination: Radian,
    distance: Parsec,
    cache: &mut AtmosphereCache,
) -> Result<LuminositySynthesis, OblateError> {
    let lo_wav = low_wavelengths();
    let hi_wav = high_wavelengths();
    let mu_axis = cache.axes().mu.clone();
    let wav_axis = cache.axes().wavelength.clone();
    let n_wav = wav_axis.len();

    // ---- Bolometric: integrate over viewing cosine, wavelength, then the surface.
    let mut mid_integrand = Vec::with_capacity(grid.colatitudes.len());
    let mut lo_integrand = Vec::with_capacity(grid.colatitudes.len());
    let mut hi_integrand = Vec::with_capacity(grid.colatitudes.len());
    for (i, &colat) in grid.colatitudes.iter().enumerate() {
        let teff = grid.temperatures[i];
        let logg = grid.gravities[i].magnitude.log10();

        // mu-weighted spectra, one per tabulated viewing cosine.
        let weighted: Vec<Vec<f64>> = mu_axis
            .iter()
            .map(|&mu| {
                let spectrum = cache.spectrum(teff, logg, mu)?;
                Ok(spectrum.iter().map(|v| v * mu).collect())
            })
            .collect::<Result<_, OblateError>>()?;

        // Emergent flux density per wavelength; the first tabulated wavelength is
        // zeroed, matching the historical treatment of the grid's leading sample.
        let mut i_lam = vec![0.0; n_wav];
        let mut column = vec![0.0; mu_axis.len()];
        for (l, value) in i_lam.iter_mut().enumerate().skip(1) {
            for (k, row) in weighted.iter().enumerate() {
                column[k] = row[l];
            }
            *value = trapezoid(&column, &mu_axis);
        }

        let surface_weight = (grid.radii[i] * R_SUN).powi(2) * colat.sin();
        let two_pi = 2.0 * std::f64::consts::PI;
        mid_integrand.push(trapezoid(&i_lam, &wav_axis) * two_pi * surface_weight);
        lo_integrand.push(trapezoid(&planck(&lo_wav, teff), &lo_wav) * two_pi * surface_weight);
        hi_integrand.push(trapezoid(&planck(&hi_wav, teff), &hi_wav) * two_pi * surface_weight);
    }
    let two_pi = 2.0 * std::f64::consts::PI;
    let bolometric = (trapezoid(&lo_integrand, &grid.colatitudes)
        + trapezoid(&mid_integrand, &grid.colatitudes)
        + trapezoid(&hi_integrand, &grid.colatitudes))
        * two_pi
        / L_SUN;

    // ---- Apparent: flux from the visible hemisphere, scaled back by the distance.
    let theta_r: Vec<f64> = grid
        .radii
        .iter()
        .map(|&r| r * R_SUN / (distance * PARSEC))
        .collect();

    let mut mid_phi = Vec::with_capacity(grid.longitudes.len());
    let mut lo_phi = Vec::with_capacity(grid.longitudes.len());
    let mut hi_phi = Vec::with_capacity(grid.longitudes.len());
    for &phi in &grid.longitudes {
        let mut mid_col = Vec::with_capacity(grid.colatitudes.len());
        let mut lo_col = Vec::with_capacity(grid.colatitudes.len());
        let mut hi_col = Vec::with_capacity(grid.colatitudes.len());
        for (i, &colat) in grid.colatitudes.iter().enumerate() {
            let mu = geometry.viewing_cosine(&grid.gravities[i], colat, phi, inclination);
            if mu < MU_LIMB_CUTOFF {
                mid_col.push(0.0);
                lo_col.push(0.0);
                hi_col.push(0.0);
                continue;
            }
            let teff = grid.temperatures[i];
            let logg = grid.gravities[i].magnitude.log10();
            let weight = theta_r[i].powi(2) * mu * colat.sin();

            let spectrum = cache.spectrum(teff, logg, mu)?;
            let observed: Vec<f64> = spectrum.iter().map(|v| v * weight).collect();
            mid_col.push(trapezoid(&observed, &wav_axis));

            // Blackbody wings are isotropic, hence the extra factor of two relative to
            // the mu-resolved tabulated range.
            let lo_bb: Vec<f64> = planck(&lo_wav, teff)
                .iter()
                .map(|v| v * weight * 2.0)
                .collect();
            lo_col.push(trapezoid(&lo_bb, &lo_wav));
            let hi_bb: Vec<f64> = planck(&hi_wav, teff)
                .iter()
                .map(|v| v * weight * 2.0)
                .collect();
            hi_col.push(trapezoid(&hi_bb, &hi_wav));
        }
        mid_phi.push(trapezoid(&mid_col, &grid.colatitudes));
        lo_phi.push(trapezoid(&lo_col, &grid.colatitudes));
        hi_phi.push(trapezoid(&hi_col, &grid.colatitudes));
    }

    let flux = trapezoid(&lo_phi, &grid.longitudes)
        + trapezoid(&mid_phi, &grid.longitudes)
        + trapezoid(&hi_phi, &grid.longitudes);
    let apparent = 4.0 * std::f64::consts::PI * flux * (distance * PARSEC).powi(2) / L_SUN;

    Ok(LuminositySynthesis {
        bolometric,
        apparent,
    })
}
