//! # Gravity-darkening exponent from rotation
//!
//! Solves for the gravity-darkening exponent of a Roche-model star as a function of its
//! fractional angular velocity, following the two-dimensional flux model of
//! Espinosa Lara & Rieutord (2011). The exponent is recovered from the ratio of the
//! pole-to-equator flux contrast to the effective-gravity contrast.
//!
//! ## Overview
//!
//! The surface is sampled at 50 colatitudes from pole to equator. At each colatitude the
//! dimensionless Roche radius is solved from the equipotential condition, then the flux
//! characteristic angle is solved from the transcendental flux-transport equation. The
//! exponent follows from the endpoint fluxes.

use roots::{find_root_brent, SimpleConvergency};

use crate::oblate_errors::OblateError;

const N_COLATITUDES: usize = 50;

/// Dimensionless Roche equipotential residual at radius `r` for a given `sin^2(theta)`.
fn roche_residual(r: f64, omega_k: f64, sin2_theta: f64) -> f64 {
    1.0 / omega_k.powi(2) * (1.0 / r - 1.0) + 0.5 * (r.powi(2) * sin2_theta - 1.0)
}

/// Residual of the flux characteristic equation at candidate angle `x`.
///
/// The function `cos x + ln tan(x/2)` is monotonically increasing on (0, pi), so the
/// root is bracketed between the surface colatitude and pi.
fn flux_angle_residual(x: f64, omega_k: f64, cos_theta: f64, ln_tan_half: f64, r: f64) -> f64 {
    x.cos() + (x / 2.0).tan().ln()
        - cos_theta
        - ln_tan_half
        - omega_k.powi(2) * r.powi(3) * cos_theta.powi(3) / 3.0
}

/// Compute the gravity-darkening exponent for fractional angular velocity `lomg`.
///
/// Arguments
/// -----------------
/// * `lomg`: angular velocity as a fraction of the critical (breakup) angular velocity,
///   in `[0, 1)`.
///
/// Return
/// ----------
/// * The exponent beta such that `Teff ~ g^beta`, or an [`OblateError`] if one of the
///   nested root searches fails to bracket.
///
/// A non-rotating star returns the classical von Zeipel value 0.25 exactly.
pub fn beta_from_rotation(lomg: f64) -> Result<f64, OblateError> {
    if lomg == 0.0 {
        return Ok(0.25);
    }

    // Convert the velocity ratio to the Keplerian angular-velocity ratio.
    let omega_k = (6.0 / lomg * (lomg.asin() / 3.0).sin() - 2.0).sqrt();

    let mut conv = SimpleConvergency {
        eps: 1e-10,
        max_iter: 200,
    };

    let thetas: Vec<f64> = (0..N_COLATITUDES)
        .map(|i| std::f64::consts::PI * i as f64 / (N_COLATITUDES - 1) as f64 / 2.0)
        .collect();

    // Dimensionless surface radius at each colatitude. The pole is exactly 1 by
    // construction; elsewhere the residual changes sign on [0.5, 1.0001].
    let mut rtild = vec![1.0; N_COLATITUDES];
    for (i, &theta) in thetas.iter().enumerate().skip(1) {
        let sin2 = theta.sin().powi(2);
        rtild[i] = find_root_brent(
            0.5,
            1.0001,
            |r| roche_residual(r, omega_k, sin2),
            &mut conv,
        )?;
    }

    // Flux characteristic angle at the interior colatitudes. The residual is strictly
    // negative at theta itself and diverges to +inf toward pi.
    let mut tht = vec![0.0; N_COLATITUDES];
    for i in 1..N_COLATITUDES - 1 {
        let theta = thetas[i];
        let cos_theta = theta.cos();
        let ln_tan_half = (theta / 2.0).tan().ln();
        let r = rtild[i];
        tht[i] = find_root_brent(
            theta,
            std::f64::consts::PI - 1e-9,
            |x| flux_angle_residual(x, omega_k, cos_theta, ln_tan_half, r),
            &mut conv,
        )?;
    }
    tht[N_COLATITUDES - 1] = std::f64::consts::PI / 2.0;

    // Dimensionless effective gravity along the surface.
    let fl1: Vec<f64> = thetas
        .iter()
        .zip(&rtild)
        .map(|(&theta, &r)| {
            (1.0 / r.powi(4)
                + theta.sin().powi(2) * (omega_k.powi(4) * r.powi(2) - 2.0 * omega_k.powi(2) / r))
                .sqrt()
        })
        .collect();

    // Surface flux, with the removable singularities at the pole and equator handled
    // by their closed-form limits.
    let last = N_COLATITUDES - 1;
    let mut flux = vec![0.0; N_COLATITUDES];
    for i in 0..N_COLATITUDES {
        flux[i] = if i == 0 {
            (1.0 / rtild[0].powi(4)).sqrt()
                * (2.0 * omega_k.powi(2) * rtild[0].powi(3) / 3.0).exp()
        } else if i == last {
            (1.0 / rtild[last].powi(4) + omega_k.powi(4) * rtild[last].powi(2)
                - 2.0 * omega_k.powi(2) / rtild[last])
                .sqrt()
                / (1.0 - omega_k.powi(2) * rtild[last].powi(3)).powf(2.0 / 3.0)
        } else {
            (tht[i].tan() / thetas[i].tan()).powi(2) * fl1[i]
        };
    }

    Ok((flux[last] / flux[0]).ln() / (fl1[last] / fl1[0]).ln() / 4.0)
}
