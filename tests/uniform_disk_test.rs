mod common;

use common::{uniform_disk_visibility, visibility_set, UniformSource};
use oblate::atmosphere::spectra::{PreintegrationPlan, VisibilityChannel};
use oblate::atmosphere::AtmosphereCache;
use oblate::config::{EvalMode, FixedConfig};
use oblate::constants::{PARSEC, R_SUN};
use oblate::geometry::StellarParameters;
use oblate::observations::{CalibrationTable, PhotometrySet};
use oblate::Oblate;

/// A star with zero rotation and angle-independent intensity is a uniform disk, so the
/// synthesized visibilities must follow the closed-form Bessel curve.
#[test]
fn zero_rotation_star_reproduces_the_uniform_disk_curve() {
    let radius = 2.0; // solar radii
    let distance = 10.0; // pc
    let diameter = 2.0 * radius * R_SUN / (distance * PARSEC);
    let wavelength = 6.0e-8; // m, inside the synthetic grid's wavelength axis
    let bandwidth = 2.0e-9;

    // Sample the curve well inside the first null of the Airy pattern.
    let first_null = 3.8317 / (std::f64::consts::PI * diameter);
    let fractions = [0.15, 0.22, 0.30, 0.38, 0.45, 0.52, 0.58, 0.65];
    let samples: Vec<(f64, f64, f64)> = fractions
        .iter()
        .enumerate()
        .map(|(k, &f)| {
            let s = f * first_null;
            let angle = 0.7 * k as f64;
            (
                s * angle.cos(),
                s * angle.sin(),
                uniform_disk_visibility(diameter, s),
            )
        })
        .collect();
    let observations = visibility_set(wavelength, bandwidth, &samples, 0.02);

    let plan = PreintegrationPlan {
        photometric: vec![],
        visibility: vec![VisibilityChannel {
            wavelength,
            bandwidth,
        }],
    };
    let cache = AtmosphereCache::new(Box::new(UniformSource::new()), plan).unwrap();

    let mut config = FixedConfig::new(2.0, distance, EvalMode::try_from("v").unwrap());
    config.image_size = 1024;
    // The field of view spans twenty-four stellar diameters: the disk is still over
    // forty pixels across, and the first null sits near thirty frequency bins so the
    // sampling offset of half a bin stays small against the curve.
    config.pixel_scale = wavelength / (24.0 * diameter);
    config.colatitude_steps = 81;
    config.longitude_steps = 81;

    let mut model = Oblate::from_parts(
        config,
        cache,
        observations,
        PhotometrySet::default(),
        CalibrationTable::default(),
    );

    let params = StellarParameters {
        equatorial_radius: radius,
        equatorial_velocity: 0.0,
        inclination: std::f64::consts::FRAC_PI_2,
        polar_temperature: 8000.0,
        position_angle: 0.0,
    };
    let eval = model.evaluate(&params).unwrap();

    assert!(eval.grid_points > 1000, "disk rasterized to {} pixels", eval.grid_points);
    assert_eq!(eval.model_visibilities.len(), 8);
    for (&(_, _, oracle), modeled) in samples.iter().zip(&eval.model_visibilities) {
        assert!(
            (modeled - oracle).abs() < 0.05,
            "model {modeled} vs uniform disk {oracle}"
        );
    }
    assert!(eval.chi_square >= 0.0);
    assert!(eval.chi_square < 50.0, "chi^2 = {}", eval.chi_square);
}
