//! # Roche surface geometry of a rapidly-rotating star
//!
//! This module builds the oblate stellar surface from the free parameters of the model:
//! equatorial radius, equatorial rotation velocity, polar effective temperature,
//! inclination and on-sky position angle.
//!
//! ## Overview
//!
//! The star is a rigidly-rotating Roche equipotential. From the equatorial radius and
//! velocity the polar radius, the rotation rate relative to breakup, the angular
//! velocity and the polar gravity follow in closed form. The local radius, effective
//! gravity vector and effective temperature are functions of colatitude only; the
//! viewing cosine additionally depends on longitude and on the inclination.
//!
//! All lengths are in solar radii, temperatures in Kelvin, gravities in cgs.
//!
//! ## See also
//!
//! * [`gravity_darkening`] for the rotation-dependent temperature exponent.

pub mod gravity_darkening;

use crate::constants::{
    Kelvin, KmPerSec, Radian, SolarMass, SolarRadius, KM_TO_CM, M_SUN, NEWTON_G, R_SUN,
};

/// Free parameters of the oblate model, the quantities adjusted by the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StellarParameters {
    /// Equatorial radius in solar radii.
    pub equatorial_radius: SolarRadius,
    /// Equatorial rotation velocity in km/s.
    pub equatorial_velocity: KmPerSec,
    /// Inclination of the rotation axis in radians (pi/2 is equator-on).
    pub inclination: Radian,
    /// Polar effective temperature in Kelvin.
    pub polar_temperature: Kelvin,
    /// On-sky position angle of the rotation axis in radians.
    pub position_angle: Radian,
}

/// Local effective gravity, split into its spherical components (cgs).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gravity {
    /// Radial component; negative points toward the stellar center.
    pub radial: f64,
    /// Tangential (colatitudinal) component.
    pub tangential: f64,
    /// Vector magnitude.
    pub magnitude: f64,
}

/// Derived Roche quantities of one model star.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RocheGeometry {
    /// Stellar mass in solar masses.
    pub mass: SolarMass,
    /// Equatorial radius in solar radii.
    pub equatorial_radius: SolarRadius,
    /// Polar radius in solar radii.
    pub polar_radius: SolarRadius,
    /// Angular velocity relative to the critical (breakup) angular velocity.
    pub rotation_fraction: f64,
    /// Angular velocity in rad/s.
    pub angular_velocity: f64,
    /// Polar surface gravity in cgs.
    pub polar_gravity: f64,
}

impl RocheGeometry {
    /// Derive the Roche quantities from mass, equatorial radius and equatorial velocity.
    ///
    /// Arguments
    /// -----------------
    /// * `mass`: stellar mass in solar masses.
    /// * `equatorial_radius`: in solar radii.
    /// * `equatorial_velocity`: in km/s. Zero yields a sphere.
    pub fn new(
        mass: SolarMass,
        equatorial_radius: SolarRadius,
        equatorial_velocity: KmPerSec,
    ) -> Self {
        let v = equatorial_velocity * KM_TO_CM;
        let gm_over_rsun = NEWTON_G * M_SUN / R_SUN;

        let polar_radius = 1.0 / (1.0 / equatorial_radius + v * v / (2.0 * gm_over_rsun * mass));
        let w0 = v * v * polar_radius / (2.0 * gm_over_rsun * mass);
        let rotation_fraction = (27.0 / 4.0 * w0 * (1.0 - w0).powi(2)).sqrt();

        let omega_crit =
            (8.0 / 27.0 * NEWTON_G * mass * M_SUN / (polar_radius * R_SUN).powi(3)).sqrt();
        let angular_velocity = rotation_fraction * omega_crit;
        let polar_gravity = NEWTON_G * mass * M_SUN / (polar_radius * R_SUN).powi(2);

        RocheGeometry {
            mass,
            equatorial_radius,
            polar_radius,
            rotation_fraction,
            angular_velocity,
            polar_gravity,
        }
    }

    /// Surface radius at colatitude `colat`, in solar radii.
    ///
    /// The closed-form Roche radius has removable singularities at the poles and for a
    /// non-rotating star; both limits are the polar radius.
    pub fn radius_at(&self, colat: Radian) -> SolarRadius {
        let s = colat.sin();
        if self.rotation_fraction == 0.0 || s.abs() < 1e-12 {
            return self.polar_radius;
        }
        let ls = self.rotation_fraction * s;
        3.0 * self.polar_radius / ls * ((std::f64::consts::PI + ls.acos()) / 3.0).cos()
    }

    /// Effective gravity vector at colatitude `colat` and surface radius `radius`.
    pub fn gravity_at(&self, colat: Radian, radius: SolarRadius) -> Gravity {
        let (s, c) = (colat.sin(), colat.cos());
        let r_cm = radius * R_SUN;
        let radial =
            -NEWTON_G * self.mass * M_SUN / (r_cm * r_cm) + r_cm * (self.angular_velocity * s).powi(2);
        let tangential = r_cm * self.angular_velocity.powi(2) * s * c;
        Gravity {
            radial,
            tangential,
            magnitude: radial.hypot(tangential),
        }
    }

    /// Cosine of the angle between the local surface normal and the line of sight.
    ///
    /// The normal is antiparallel to the effective gravity, so both gravity components
    /// enter. Positive means the element faces the observer.
    pub fn viewing_cosine(
        &self,
        gravity: &Gravity,
        colat: Radian,
        phi: Radian,
        inclination: Radian,
    ) -> f64 {
        let (s, c) = (colat.sin(), colat.cos());
        let (si, ci) = (inclination.sin(), inclination.cos());
        let cp = phi.cos();
        1.0 / gravity.magnitude
            * (-gravity.radial * (s * si * cp + c * ci) - gravity.tangential * (si * cp * c - s * ci))
    }

    /// Local effective temperature from the gravity-darkening law
    /// `T = T_p (g / g_p)^beta`.
    pub fn effective_temperature(&self, polar_temperature: Kelvin, beta: f64, gravity: f64) -> Kelvin {
        polar_temperature * (gravity / self.polar_gravity).powf(beta)
    }
}

/// The discretized surface: per-colatitude radius, gravity and temperature.
///
/// Longitude-dependent quantities (coordinates, viewing cosines) are recomputed from
/// these samples by the projector and the integrators.
#[derive(Debug, Clone)]
pub struct SurfaceGrid {
    pub colatitudes: Vec<Radian>,
    pub longitudes: Vec<Radian>,
    pub radii: Vec<SolarRadius>,
    pub gravities: Vec<Gravity>,
    pub temperatures: Vec<Kelvin>,
}

impl SurfaceGrid {
    /// Sample the surface on a regular (colatitude, longitude) grid.
    ///
    /// Arguments
    /// -----------------
    /// * `geometry`: the Roche quantities of the star.
    /// * `polar_temperature`: in Kelvin.
    /// * `beta`: gravity-darkening exponent.
    /// * `n_colat`: number of colatitude samples, covering `[0, pi]` inclusive.
    /// * `n_phi`: number of longitude samples, covering `[0, 2 pi]` inclusive.
    pub fn build(
        geometry: &RocheGeometry,
        polar_temperature: Kelvin,
        beta: f64,
        n_colat: usize,
        n_phi: usize,
    ) -> Self {
        let colatitudes: Vec<f64> = (0..n_colat)
            .map(|i| std::f64::consts::PI * i as f64 / (n_colat - 1) as f64)
            .collect();
        let longitudes: Vec<f64> = (0..n_phi)
            .map(|j| 2.0 * std::f64::consts::PI * j as f64 / (n_phi - 1) as f64)
            .collect();

        let radii: Vec<f64> = colatitudes.iter().map(|&t| geometry.radius_at(t)).collect();
        let gravities: Vec<Gravity> = colatitudes
            .iter()
            .zip(&radii)
            .map(|(&t, &r)| geometry.gravity_at(t, r))
            .collect();
        let temperatures: Vec<f64> = gravities
            .iter()
            .map(|g| geometry.effective_temperature(polar_temperature, beta, g.magnitude))
            .collect();

        SurfaceGrid {
            colatitudes,
            longitudes,
            radii,
            gravities,
            temperatures,
        }
    }

    /// Mean surface radius over colatitude, in solar radii (trapezoid average).
    pub fn mean_radius(&self) -> SolarRadius {
        crate::numeric::trapezoid(&self.radii, &self.colatitudes) / std::f64::consts::PI
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_velocity_is_a_sphere() {
        let geom = RocheGeometry::new(2.0, 2.5, 0.0);
        assert_relative_eq!(geom.polar_radius, 2.5);
        assert_eq!(geom.rotation_fraction, 0.0);
        for i in 0..9 {
            let colat = std::f64::consts::PI * i as f64 / 8.0;
            assert_relative_eq!(geom.radius_at(colat), 2.5, epsilon = 1e-12);
            let g = geom.gravity_at(colat, 2.5);
            assert_relative_eq!(g.magnitude, geom.polar_gravity, epsilon = 1e-6);
            assert_eq!(g.tangential, 0.0);
        }
    }

    #[test]
    fn rotation_flattens_the_poles() {
        let geom = RocheGeometry::new(2.0, 2.5, 200.0);
        assert!(geom.polar_radius < geom.equatorial_radius);
        assert!(geom.rotation_fraction > 0.0 && geom.rotation_fraction < 1.0);
        // The Roche radius recovers the equatorial radius at colat = pi/2.
        assert_relative_eq!(
            geom.radius_at(std::f64::consts::FRAC_PI_2),
            geom.equatorial_radius,
            epsilon = 1e-9
        );
        // Equatorial gravity is reduced by the centrifugal term.
        let g_eq = geom.gravity_at(std::f64::consts::FRAC_PI_2, geom.equatorial_radius);
        assert!(g_eq.magnitude < geom.polar_gravity);
    }

    #[test]
    fn substellar_point_faces_observer() {
        let geom = RocheGeometry::new(2.0, 2.5, 150.0);
        let colat = std::f64::consts::FRAC_PI_2;
        let r = geom.radius_at(colat);
        let g = geom.gravity_at(colat, r);
        // Equator-on view, phi = 0 points along the line of sight.
        let mu = geom.viewing_cosine(&g, colat, 0.0, std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(mu, 1.0, epsilon = 1e-9);
        // The far side faces away.
        let mu_back = geom.viewing_cosine(&g, colat, std::f64::consts::PI, std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(mu_back, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn gravity_darkening_cools_the_equator() {
        let geom = RocheGeometry::new(2.0, 2.5, 200.0);
        let grid = SurfaceGrid::build(&geom, 9000.0, 0.25, 51, 51);
        let t_pole = grid.temperatures[0];
        let t_eq = grid.temperatures[25];
        assert_relative_eq!(t_pole, 9000.0, epsilon = 1e-6);
        assert!(t_eq < t_pole);
    }
}
