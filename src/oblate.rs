//! # Oblate façade
//!
//! [`Oblate`] bundles everything one fit needs: the fixed configuration, the observed
//! data, the atmosphere cache with its pre-integration plan, the Fourier backend and
//! the lazily-loaded evolutionary tracks. An outer optimizer keeps one `Oblate` and
//! calls [`Oblate::evaluate`] per parameter vector; the atmosphere cache grows across
//! calls, everything else is read-only.
//!
//! ## Usage
//!
//! ```no_run
//! use camino::Utf8Path;
//! use oblate::config::{EvalMode, FixedConfig};
//! use oblate::geometry::StellarParameters;
//! use oblate::Oblate;
//!
//! # fn main() -> Result<(), oblate::oblate_errors::OblateError> {
//! let mode = EvalMode::try_from("vp")?;
//! let mut model = Oblate::from_files(
//!     FixedConfig::new(2.2, 16.5, mode),
//!     "-0.0",
//!     Utf8Path::new("data/target.vis"),
//!     Utf8Path::new("data/target.phot"),
//!     Utf8Path::new("data/zeropoints.txt"),
//!     Utf8Path::new("data/filters"),
//! )?;
//! let eval = model.evaluate(&StellarParameters {
//!     equatorial_radius: 2.85,
//!     equatorial_velocity: 270.0,
//!     inclination: 1.55,
//!     polar_temperature: 8450.0,
//!     position_angle: 0.7,
//! })?;
//! println!("chi^2 = {}", eval.chi_square);
//! # Ok(()) }
//! ```

use camino::Utf8Path;
use once_cell::sync::OnceCell;

use crate::atmosphere::loader::{SpectraSource, TieredSource};
use crate::atmosphere::spectra::PreintegrationPlan;
use crate::atmosphere::AtmosphereCache;
use crate::config::FixedConfig;
use crate::env_state::OblateEnv;
use crate::evolution::TrackSet;
use crate::filters::FilterCurve;
use crate::fit::{self, Evaluation};
use crate::geometry::StellarParameters;
use crate::oblate_errors::OblateError;
use crate::observations::{CalibrationTable, PhotometrySet, VisibilitySet};
use crate::visibility::{CpuFft, FourierBackend};

/// One fitting session: configuration, observations and the shared caches.
pub struct Oblate {
    pub(crate) config: FixedConfig,
    pub(crate) visibilities: VisibilitySet,
    pub(crate) photometry: PhotometrySet,
    pub(crate) calibration: CalibrationTable,
    pub(crate) cache: AtmosphereCache,
    pub(crate) backend: Box<dyn FourierBackend>,
    pub(crate) tracks: OnceCell<TrackSet>,
}

impl Oblate {
    /// Build a session from an atmosphere source and the parsed observations.
    ///
    /// The pre-integration plan is derived here: one photometric channel per observed
    /// band (its filter curve loaded from `filter_dir` and resampled onto the grid
    /// wavelength axis) and one interferometric channel per unique observed wavelength.
    ///
    /// Arguments
    /// -----------------
    /// * `config`: the fixed evaluation inputs.
    /// * `source`: where atmosphere grid files come from.
    /// * `visibilities`, `photometry`, `calibration`: the observed data.
    /// * `filter_dir`: directory of per-band transmission tables (`<band>.txt`).
    pub fn new(
        config: FixedConfig,
        source: Box<dyn SpectraSource>,
        visibilities: VisibilitySet,
        photometry: PhotometrySet,
        calibration: CalibrationTable,
        filter_dir: &Utf8Path,
    ) -> Result<Self, OblateError> {
        let axes = AtmosphereCache::probe_axes(source.as_ref())?;

        let mut plan = PreintegrationPlan::default();
        for point in &photometry.points {
            let band = calibration.get(&point.band)?;
            let curve = FilterCurve::load(filter_dir, &point.band, band.central_wavelength)?;
            plan.photometric.push(curve.to_channel(&axes.wavelength)?);
        }
        plan.visibility = visibilities
            .channel_groups()
            .into_iter()
            .map(|g| g.channel)
            .collect();

        let cache = AtmosphereCache::new(source, plan)?;
        Ok(Self::from_parts(
            config,
            cache,
            visibilities,
            photometry,
            calibration,
        ))
    }

    /// Convenience constructor reading every observational input from disk and using
    /// the tiered local/remote atmosphere source.
    pub fn from_files(
        config: FixedConfig,
        metallicity_suffix: &str,
        visibility_path: &Utf8Path,
        photometry_path: &Utf8Path,
        calibration_path: &Utf8Path,
        filter_dir: &Utf8Path,
    ) -> Result<Self, OblateError> {
        let source = TieredSource::new(metallicity_suffix, None, None, OblateEnv::new())?;
        Self::new(
            config,
            Box::new(source),
            VisibilitySet::load(visibility_path)?,
            PhotometrySet::load(photometry_path)?,
            CalibrationTable::load(calibration_path)?,
            filter_dir,
        )
    }

    /// Assemble a session from an already-built cache.
    ///
    /// The cache's pre-integration plan must match the observations: one photometric
    /// channel per photometry record and one interferometric channel per unique
    /// visibility wavelength, both in record order.
    pub fn from_parts(
        config: FixedConfig,
        cache: AtmosphereCache,
        visibilities: VisibilitySet,
        photometry: PhotometrySet,
        calibration: CalibrationTable,
    ) -> Self {
        Oblate {
            config,
            visibilities,
            photometry,
            calibration,
            cache,
            backend: Box::new(CpuFft::new()),
            tracks: OnceCell::new(),
        }
    }

    /// Replace the Fourier backend (e.g. with a GPU implementation).
    pub fn set_backend(&mut self, backend: Box<dyn FourierBackend>) {
        self.backend = backend;
    }

    pub fn config(&self) -> &FixedConfig {
        &self.config
    }

    pub fn atmosphere(&self) -> &AtmosphereCache {
        &self.cache
    }

    /// Evaluate one free parameter vector. See [`fit::evaluate`].
    pub fn evaluate(&mut self, params: &StellarParameters) -> Result<Evaluation, OblateError> {
        fit::evaluate(self, params)
    }
}
