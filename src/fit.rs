//! # Fit objective
//!
//! [`evaluate`] is the function an outer optimizer calls repeatedly: from one free
//! parameter vector it derives the surface, synthesizes whatever the mode flags enable,
//! and reduces everything to a single chi-square. Apart from the growing atmosphere
//! cache it has no state between calls.
//!
//! ## Failure policy
//!
//! A failed visibility synthesis (out-of-grid query, stalled surface inversion or a
//! degenerate silhouette) does not abort the evaluation: the visibility term degrades
//! to the sentinel chi-square and photometry is still computed, so an outer optimizer
//! keeps moving. I/O failures propagate, since they invalidate any fit result.

use std::time::Instant;

use crate::config::GravityDarkening;
use crate::constants::CHI2_SENTINEL;
use crate::evolution::{estimate_age_mass, TargetObservables, TrackSet};
use crate::geometry::gravity_darkening::beta_from_rotation;
use crate::geometry::{RocheGeometry, StellarParameters, SurfaceGrid};
use crate::luminosity::synthesize_luminosity;
use crate::numeric::trapezoid;
use crate::oblate::Oblate;
use crate::oblate_errors::OblateError;
use crate::photometry::synthesize_photometry;
use crate::projection::project_disk;
use crate::visibility::{synthesize_visibilities, VisibilityScene};

/// Derived physical quantities of one evaluation, zero-filled when not computed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Extras {
    /// Bolometric luminosity in solar units.
    pub bolometric_luminosity: f64,
    /// Apparent (observer-facing) luminosity in solar units.
    pub apparent_luminosity: f64,
    /// Mean surface radius in solar radii.
    pub mean_radius: f64,
    /// Polar radius in solar radii.
    pub polar_radius: f64,
    /// Equatorial effective temperature in Kelvin.
    pub equatorial_temperature: f64,
    /// Colatitude-averaged effective temperature in Kelvin.
    pub mean_temperature: f64,
    /// log10 of the polar surface gravity (cgs).
    pub polar_log_gravity: f64,
    /// log10 of the equatorial surface gravity (cgs).
    pub equatorial_log_gravity: f64,
    /// log10 of the colatitude-averaged surface gravity (cgs).
    pub mean_log_gravity: f64,
    /// Age from the evolutionary-track match, in Gyr.
    pub age: f64,
    /// Initial mass from the track match, in solar masses.
    pub mass: f64,
    /// Initial rotation rate (omega over critical) from the track match.
    pub initial_rotation: f64,
}

/// Everything one call to [`evaluate`] produces.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Combined chi-square, the optimizer's objective.
    pub chi_square: f64,
    pub visibility_chi_square: f64,
    pub photometry_chi_square: f64,
    /// Image pixels that landed on the star, summed over spectral channels.
    pub grid_points: usize,
    /// Model visibility per observed record, in record order.
    pub model_visibilities: Vec<f64>,
    /// Model magnitude per observed band, in record order.
    pub model_magnitudes: Vec<f64>,
    pub extras: Extras,
}

/// Evaluate the model against the observations held by `model`.
pub fn evaluate(
    model: &mut Oblate,
    params: &StellarParameters,
) -> Result<Evaluation, OblateError> {
    let started = Instant::now();
    let mode = model.config.mode;

    let geometry = RocheGeometry::new(
        model.config.mass,
        params.equatorial_radius,
        params.equatorial_velocity,
    );
    let beta = match mode.gravity_darkening {
        GravityDarkening::Fixed(b) => b,
        GravityDarkening::ComputedFromRotation => beta_from_rotation(geometry.rotation_fraction)?,
    };
    let grid = SurfaceGrid::build(
        &geometry,
        params.polar_temperature,
        beta,
        model.config.colatitude_steps,
        model.config.longitude_steps,
    );

    let mut evaluation = Evaluation::default();
    fill_geometry_extras(&mut evaluation.extras, &geometry, &grid, params, beta);

    if mode.visibilities {
        if mode.verbose && mode.gpu_transform && !model.backend.is_accelerated() {
            println!("GPU transform requested but no accelerated backend is installed; using the CPU transform");
        }
        let result = project_disk(
            &grid,
            &geometry,
            params.inclination,
            params.position_angle,
            model.config.distance,
        )
        .and_then(|disk| {
            let scene = VisibilityScene {
                geometry: &geometry,
                inclination: params.inclination,
                position_angle: params.position_angle,
                polar_temperature: params.polar_temperature,
                beta,
                distance: model.config.distance,
                silhouette: &disk.silhouette,
                image_size: model.config.image_size,
                pixel_scale: model.config.pixel_scale,
            };
            synthesize_visibilities(
                &scene,
                &model.visibilities,
                &mut model.cache,
                model.backend.as_mut(),
            )
        });
        match result {
            Ok(vis) => {
                evaluation.visibility_chi_square = vis.chi_square;
                evaluation.grid_points = vis.grid_points;
                evaluation.model_visibilities = vis.model;
            }
            Err(
                err @ (OblateError::OutOfDomain { .. }
                | OblateError::ConvergenceFailure(_)
                | OblateError::DegenerateSilhouette),
            ) => {
                println!("visibility synthesis failed ({err}); using the sentinel chi-square");
                evaluation.visibility_chi_square = CHI2_SENTINEL;
            }
            Err(err) => return Err(err),
        }
    }

    if mode.photometry {
        let phot = synthesize_photometry(
            &grid,
            &geometry,
            params.inclination,
            model.config.distance,
            &model.photometry,
            &model.calibration,
            &mut model.cache,
        )?;
        evaluation.photometry_chi_square = phot.chi_square;
        evaluation.model_magnitudes = phot.model_magnitudes;
    }

    evaluation.chi_square = evaluation.visibility_chi_square + evaluation.photometry_chi_square;

    if mode.luminosity || mode.age {
        let lum = synthesize_luminosity(
            &grid,
            &geometry,
            params.inclination,
            model.config.distance,
            &mut model.cache,
        )?;
        evaluation.extras.bolometric_luminosity = lum.bolometric;
        evaluation.extras.apparent_luminosity = lum.apparent;

        if mode.age {
            let evolution = model.config.evolution.clone().ok_or_else(|| {
                OblateError::InvalidTrackFile(
                    "age estimation requested without an evolution configuration".to_owned(),
                )
            })?;
            let tracks = model.tracks.get_or_try_init(|| {
                TrackSet::load(
                    &evolution.track_dir,
                    &evolution.metallicity,
                    &evolution.masses,
                    &evolution.omegas,
                )
            })?;
            let target = TargetObservables {
                luminosity: lum.bolometric,
                radius: grid.mean_radius(),
                velocity: params.equatorial_velocity,
            };
            let estimate = estimate_age_mass(
                tracks,
                &target,
                model.config.mass,
                evolution.age_guess,
                geometry.rotation_fraction,
                mode.verbose,
            );
            evaluation.extras.age = estimate.age;
            evaluation.extras.mass = estimate.mass;
            evaluation.extras.initial_rotation = estimate.omega;
        }
    }

    if mode.verbose {
        println!(
            "Chi^2: {} (V: {}, P: {}). Params: [{}, {}, {}, {}, {}]. Time: {:.2} s",
            evaluation.chi_square,
            evaluation.visibility_chi_square,
            evaluation.photometry_chi_square,
            params.equatorial_radius,
            params.equatorial_velocity,
            params.inclination.to_degrees(),
            params.polar_temperature,
            params.position_angle.to_degrees(),
            started.elapsed().as_secs_f64()
        );
    }

    Ok(evaluation)
}

fn fill_geometry_extras(
    extras: &mut Extras,
    geometry: &RocheGeometry,
    grid: &SurfaceGrid,
    params: &StellarParameters,
    beta: f64,
) {
    let equator = std::f64::consts::FRAC_PI_2;
    let g_eq = geometry.gravity_at(equator, geometry.radius_at(equator));

    extras.mean_radius = grid.mean_radius();
    extras.polar_radius = geometry.polar_radius;
    extras.equatorial_temperature =
        geometry.effective_temperature(params.polar_temperature, beta, g_eq.magnitude);
    extras.mean_temperature =
        trapezoid(&grid.temperatures, &grid.colatitudes) / std::f64::consts::PI;
    extras.polar_log_gravity = geometry.polar_gravity.log10();
    extras.equatorial_log_gravity = g_eq.magnitude.log10();

    let magnitudes: Vec<f64> = grid.gravities.iter().map(|g| g.magnitude).collect();
    extras.mean_log_gravity =
        (trapezoid(&magnitudes, &grid.colatitudes) / std::f64::consts::PI).log10();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::loader::SpectraSource;
    use crate::atmosphere::spectra::{
        GridKey, PhotometricChannel, PreintegrationPlan, RawSpectra, VisibilityChannel,
    };
    use crate::atmosphere::AtmosphereCache;
    use crate::config::{EvalMode, FixedConfig};
    use crate::observations::{CalibrationTable, PhotometricPoint, PhotometrySet, VisibilitySet};
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

    fn photometry_model() -> Oblate {
        let plan = PreintegrationPlan {
            photometric: vec![PhotometricChannel {
                band: "V".to_owned(),
                response: vec![1.0; 200],
                fwhm: 100.0e-8,
            }],
            visibility: vec![],
        };
        let cache = AtmosphereCache::new(Box::new(FlatSource), plan).unwrap();

        let mut photometry = PhotometrySet::default();
        photometry.points.push(PhotometricPoint {
            band: "V".to_owned(),
            magnitude: 5.0,
            error: 0.02,
        });
        let calibration =
            CalibrationTable::from_table("waveband cwl zpf\nV 5.45e-5 2.17e7\n").unwrap();

        let mut config = FixedConfig::new(2.0, 10.0, EvalMode::try_from("p").unwrap());
        config.colatitude_steps = 41;
        config.longitude_steps = 41;
        Oblate::from_parts(config, cache, VisibilitySet::default(), photometry, calibration)
    }

    fn sphere_params() -> StellarParameters {
        StellarParameters {
            equatorial_radius: 2.0,
            equatorial_velocity: 0.0,
            inclination: std::f64::consts::FRAC_PI_2,
            polar_temperature: 8000.0,
            position_angle: 0.0,
        }
    }

    #[test]
    fn photometry_only_evaluation_matches_its_own_model() {
        let mut model = photometry_model();
        let params = sphere_params();

        let first = evaluate(&mut model, &params).unwrap();
        assert!(first.model_magnitudes.len() == 1);
        assert_eq!(first.visibility_chi_square, 0.0);

        // Feed the model magnitude back: the residual must vanish.
        model.photometry.points[0].magnitude = first.model_magnitudes[0];
        let second = evaluate(&mut model, &params).unwrap();
        assert_relative_eq!(second.chi_square, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn geometry_extras_are_filled_for_a_sphere() {
        let mut model = photometry_model();
        let eval = evaluate(&mut model, &sphere_params()).unwrap();
        let x = eval.extras;
        assert_relative_eq!(x.polar_radius, 2.0, epsilon = 1e-12);
        assert_relative_eq!(x.mean_radius, 2.0, epsilon = 1e-9);
        assert_relative_eq!(x.equatorial_temperature, 8000.0, epsilon = 1e-6);
        assert_relative_eq!(x.polar_log_gravity, x.equatorial_log_gravity, epsilon = 1e-9);
        // Nothing else was requested.
        assert_eq!(x.bolometric_luminosity, 0.0);
        assert_eq!(x.age, 0.0);
    }

    #[test]
    fn disk_larger_than_the_field_still_evaluates() {
        let plan = PreintegrationPlan {
            photometric: vec![],
            visibility: vec![VisibilityChannel {
                wavelength: 6.0e-8,
                bandwidth: 2.0e-9,
            }],
        };
        let cache = AtmosphereCache::new(Box::new(FlatSource), plan).unwrap();
        let visibilities = VisibilitySet::from_table(
            "wl dwl vis err u_m v_m u_l v_l cal\n0.06 0.002 0.8 0.02 10.0 5.0 1.6e8 8.3e7 HD1\n",
        )
        .unwrap();

        let mut config = FixedConfig::new(2.0, 10.0, EvalMode::try_from("v").unwrap());
        config.colatitude_steps = 41;
        config.longitude_steps = 41;
        config.image_size = 64;
        // The field of view covers only half the stellar diameter, so every rasterizer
        // march runs into an image edge instead of off the star.
        let diameter =
            2.0 * 2.0 * crate::constants::R_SUN / (10.0 * crate::constants::PARSEC);
        config.pixel_scale = 6.0e-8 / (0.5 * diameter);
        let mut model = Oblate::from_parts(
            config,
            cache,
            visibilities,
            PhotometrySet::default(),
            CalibrationTable::default(),
        );

        let eval = evaluate(&mut model, &sphere_params()).unwrap();
        assert!(eval.grid_points > 0);
        assert!(eval.model_visibilities[0].is_finite());
        assert!(eval.chi_square.is_finite());
    }

    #[test]
    fn out_of_grid_temperature_degrades_visibilities_to_the_sentinel() {
        let mut model = photometry_model();
        model.config.mode = EvalMode::try_from("v").unwrap();
        model.config.image_size = 64;
        // Half the image spans about twice the stellar disk.
        model.config.pixel_scale = 3.3;
        model.visibilities = VisibilitySet::from_table(
            "wl dwl vis err u_m v_m u_l v_l cal\n0.06 0.002 0.8 0.02 10.0 5.0 1.6e8 8.3e7 HD1\n",
        )
        .unwrap();

        let mut params = sphere_params();
        // Far hotter than the atmosphere grid covers.
        params.polar_temperature = 50_000.0;
        let eval = evaluate(&mut model, &params).unwrap();
        assert_eq!(eval.visibility_chi_square, CHI2_SENTINEL);
        assert_eq!(eval.chi_square, CHI2_SENTINEL);
    }
}
