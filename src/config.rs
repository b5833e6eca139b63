//! # Evaluation configuration
//!
//! [`FixedConfig`] carries everything about an evaluation that is *not* part of the free
//! parameter vector: stellar mass, distance, grid resolution, image resolution and the
//! [`EvalMode`] flags. [`EvalMode`] is parsed from a compact mode string whose
//! single-character flags are recognized independently:
//!
//! | flag | meaning                                        |
//! |------|------------------------------------------------|
//! | `v`  | compute interferometric visibilities           |
//! | `p`  | compute photometry                             |
//! | `L`  | compute bolometric/apparent luminosity         |
//! | `a`  | run the nested age/mass solver (implies `L`)   |
//! | `g`  | request the GPU Fourier backend                |
//! | `o`  | verbose per-evaluation summary                 |
//! | `z`  | fixed von Zeipel gravity darkening (beta 0.25) |
//! | `r`  | gravity darkening computed from rotation       |

use crate::constants::{Parsec, SolarMass};
use crate::oblate_errors::OblateError;

/// How the gravity-darkening exponent beta is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GravityDarkening {
    /// Fixed exponent (0.25 is the classical von Zeipel value).
    Fixed(f64),
    /// Solved from the rotation rate by the Roche-surface shooting method.
    ComputedFromRotation,
}

/// Independent on/off switches for the pieces of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalMode {
    pub visibilities: bool,
    pub photometry: bool,
    pub luminosity: bool,
    pub age: bool,
    pub gpu_transform: bool,
    pub verbose: bool,
    pub gravity_darkening: GravityDarkening,
}

impl Default for EvalMode {
    fn default() -> Self {
        EvalMode {
            visibilities: false,
            photometry: false,
            luminosity: false,
            age: false,
            gpu_transform: false,
            verbose: false,
            gravity_darkening: GravityDarkening::Fixed(0.25),
        }
    }
}

impl TryFrom<&str> for EvalMode {
    type Error = OblateError;

    /// Parse a mode string, one independent flag per character.
    fn try_from(mode: &str) -> Result<Self, Self::Error> {
        let mut out = EvalMode::default();
        for c in mode.chars() {
            match c {
                'v' => out.visibilities = true,
                'p' => out.photometry = true,
                'L' => out.luminosity = true,
                'a' => out.age = true,
                'g' => out.gpu_transform = true,
                'o' => out.verbose = true,
                'z' => out.gravity_darkening = GravityDarkening::Fixed(0.25),
                'r' => out.gravity_darkening = GravityDarkening::ComputedFromRotation,
                other => return Err(OblateError::InvalidModeFlag(other)),
            }
        }
        Ok(out)
    }
}

/// Configuration of the nested age/mass estimation (only used when the `a` flag is on).
#[derive(Debug, Clone)]
pub struct EvolutionConfig {
    /// Directory holding the evolutionary-track history files.
    pub track_dir: camino::Utf8PathBuf,
    /// Internal metallicity tag of the track set (e.g. "Z0.0111").
    pub metallicity: String,
    /// Masses available in the track set, in solar masses.
    pub masses: Vec<f64>,
    /// Initial rotation rates available in the track set (omega/omega_crit).
    pub omegas: Vec<f64>,
    /// Starting guess for the age, in Gyr.
    pub age_guess: f64,
}

/// Fixed (non-fitted) inputs of an evaluation.
#[derive(Debug, Clone)]
pub struct FixedConfig {
    /// Stellar mass in solar masses.
    pub mass: SolarMass,
    /// Distance to the star in parsecs.
    pub distance: Parsec,
    /// Number of colatitude samples of the surface grid.
    pub colatitude_steps: usize,
    /// Number of longitude samples of the surface grid.
    pub longitude_steps: usize,
    /// Side length in pixels of the square visibility image (even).
    pub image_size: usize,
    /// Externally supplied pixel scale so the disk occupies a useful image fraction.
    pub pixel_scale: f64,
    /// Evaluation mode flags.
    pub mode: EvalMode,
    /// Nested age/mass solver inputs, when the age flag is on.
    pub evolution: Option<EvolutionConfig>,
}

impl FixedConfig {
    pub fn new(mass: SolarMass, distance: Parsec, mode: EvalMode) -> Self {
        FixedConfig {
            mass,
            distance,
            colatitude_steps: 101,
            longitude_steps: 101,
            image_size: 4096,
            pixel_scale: 1.0,
            mode,
            evolution: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_flags_are_independent() {
        let mode = EvalMode::try_from("vpo").unwrap();
        assert!(mode.visibilities);
        assert!(mode.photometry);
        assert!(mode.verbose);
        assert!(!mode.luminosity);
        assert_eq!(mode.gravity_darkening, GravityDarkening::Fixed(0.25));

        let mode = EvalMode::try_from("Lar").unwrap();
        assert!(mode.luminosity);
        assert!(mode.age);
        assert_eq!(
            mode.gravity_darkening,
            GravityDarkening::ComputedFromRotation
        );
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(matches!(
            EvalMode::try_from("vx"),
            Err(OblateError::InvalidModeFlag('x'))
        ));
    }
}
