//! # Constants and type definitions for oblate
//!
//! This module centralizes the **physical constants**, **unit conversions**, and **common type
//! definitions** used throughout the `oblate` library.
//!
//! ## Overview
//!
//! - Astrophysical constants in cgs units (the unit system of the whole pipeline)
//! - Core type aliases used across the crate
//! - Container types for observation records
//!
//! These definitions are used by all main modules, including the geometry engine, the
//! atmosphere grid, and the visibility/photometry integrators.

use smallvec::SmallVec;

// -------------------------------------------------------------------------------------------------
// Physical constants (cgs)
// -------------------------------------------------------------------------------------------------

/// Newton's gravitational constant in cm^3 g^-1 s^-2
pub const NEWTON_G: f64 = 6.67384e-8;

/// Solar radius in cm
pub const R_SUN: f64 = 6.955e10;

/// Solar mass in g
pub const M_SUN: f64 = 1.988435e33;

/// Solar luminosity in erg/s
pub const L_SUN: f64 = 3.839e33;

/// One parsec in cm
pub const PARSEC: f64 = 3.08567758e18;

/// Planck's constant in erg s
pub const H_PLANCK: f64 = 6.626e-27;

/// Speed of light in cm/s
pub const C_LIGHT: f64 = 3e10;

/// Boltzmann constant in erg/K
pub const K_BOLTZ: f64 = 1.381e-16;

/// Centimeters per kilometer, for the km/s -> cm/s velocity conversion
pub const KM_TO_CM: f64 = 1e5;

/// Centimeters per Angstrom (the atmosphere grid wavelength step is 1 A)
pub const ANGSTROM_TO_CM: f64 = 1e-8;

/// Fixed wavelength differential of the atmosphere grid, in cm
pub const GRID_WAVELENGTH_STEP: f64 = 1e-8;

/// Viewing cosines below this are treated as the synthetic zero-intensity boundary
pub const MU_ZERO_BOUND: f64 = 1e-10;

/// Photometric limb cutoff: samples with mu below this (~2 degrees from the limb)
/// contribute zero flux to avoid grazing-angle extrapolation artifacts
pub const MU_LIMB_CUTOFF: f64 = 0.034962;

/// Sentinel chi-square returned when a visibility image cannot be synthesized
pub const CHI2_SENTINEL: f64 = 1e8;

/// Number of free parameters of the fit (used in the degrees-of-freedom convention)
pub const N_FIT_PARAMS: f64 = 5.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in radians
pub type Radian = f64;
/// Temperature in Kelvin
pub type Kelvin = f64;
/// Length in solar radii
pub type SolarRadius = f64;
/// Mass in solar masses
pub type SolarMass = f64;
/// Distance in parsecs
pub type Parsec = f64;
/// Velocity in km/s
pub type KmPerSec = f64;
/// Length in meters (interferometric baselines and wavelengths)
pub type Meter = f64;
/// Length in centimeters (spectra and fluxes are cgs)
pub type Centimeter = f64;
/// Photometric band name (e.g. "V", "K")
pub type Band = String;

/// A small, inline-optimized container for the photometric records of a single target.
pub type PhotometryRecords = SmallVec<[crate::observations::PhotometricPoint; 8]>;
