//! Shared helpers for the integration tests: synthetic atmosphere sources, observation
//! builders and the closed-form uniform-disk visibility oracle.
#![allow(dead_code)]

use oblate::atmosphere::loader::SpectraSource;
use oblate::atmosphere::spectra::{GridKey, RawSpectra};
use oblate::oblate_errors::OblateError;
use oblate::observations::{VisibilityPoint, VisibilitySet};

/// Atmosphere source whose intensity is the same at every grid point, viewing angle and
/// wavelength, so the star radiates like a uniform disk.
pub struct UniformSource {
    pub level: f64,
    pub n_wavelengths: usize,
}

impl UniformSource {
    pub fn new() -> Self {
        UniformSource {
            level: 1.0e10,
            n_wavelengths: 200,
        }
    }
}

impl Default for UniformSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectraSource for UniformSource {
    fn fetch(&self, _key: GridKey) -> Result<RawSpectra, OblateError> {
        Ok(RawSpectra {
            mu: vec![0.1, 0.3, 0.5, 0.7, 0.9, 1.0],
            intensities: vec![vec![self.level; self.n_wavelengths]; 6],
        })
    }
}

/// Build a single-channel visibility set from (u, v, visibility) samples in cycles.
pub fn visibility_set(
    wavelength_m: f64,
    bandwidth_m: f64,
    samples: &[(f64, f64, f64)],
    error: f64,
) -> VisibilitySet {
    let mut set = VisibilitySet::default();
    for &(u, v, vis) in samples {
        set.points.push(VisibilityPoint {
            wavelength: wavelength_m,
            bandwidth: bandwidth_m,
            visibility: vis,
            error,
            u_meters: u * wavelength_m,
            v_meters: v * wavelength_m,
            u_cycles: u,
            v_cycles: v,
            calibrator: "CAL".to_owned(),
        });
    }
    set
}

/// Bessel function of the first kind, order one (Abramowitz & Stegun 9.4.4/9.4.6).
pub fn bessel_j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.0 {
        let t = (x / 3.0) * (x / 3.0);
        x * (0.5
            + t * (-0.562_499_85
                + t * (0.210_935_73
                    + t * (-0.039_542_89
                        + t * (0.004_433_19 + t * (-0.000_317_61 + t * 0.000_011_09))))))
    } else {
        let t = 3.0 / ax;
        let f1 = 0.797_884_56
            + t * (0.000_001_56
                + t * (0.016_596_67
                    + t * (0.000_171_05
                        + t * (-0.002_495_11 + t * (0.001_136_53 + t * -0.000_200_33)))));
        let theta1 = ax - 2.356_194_49
            + t * (0.124_996_12
                + t * (0.000_056_50
                    + t * (-0.006_378_79
                        + t * (0.000_743_48 + t * (0.000_798_24 + t * -0.000_291_66)))));
        let j = f1 * theta1.cos() / ax.sqrt();
        if x < 0.0 {
            -j
        } else {
            j
        }
    }
}

/// Closed-form visibility amplitude of a uniform disk of angular diameter
/// `diameter_rad`, at spatial frequency `cycles` (cycles per radian).
pub fn uniform_disk_visibility(diameter_rad: f64, cycles: f64) -> f64 {
    let x = std::f64::consts::PI * diameter_rad * cycles;
    if x.abs() < 1e-12 {
        return 1.0;
    }
    (2.0 * bessel_j1(x) / x).abs()
}
