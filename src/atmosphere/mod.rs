//! # Model-atmosphere intensity grid
//!
//! Specific intensities of the star come from a rectangular grid of model-atmosphere
//! files indexed by effective temperature and log surface gravity, each tabulating
//! intensity against viewing cosine and wavelength.
//!
//! ## Overview
//!
//! [`AtmosphereCache`] is the single entry point. It resolves files through a
//! [`loader::SpectraSource`] (in-memory cache, then local directory, then the remote
//! archive), pre-integrates every loaded file over the fixed passbands of the current
//! evaluation, and answers point queries by trilinear interpolation in
//! (Teff, log g, mu).
//!
//! ## Usage
//!
//! ```no_run
//! use oblate::atmosphere::loader::{SpectraSource, TieredSource};
//! use oblate::atmosphere::spectra::PreintegrationPlan;
//! use oblate::atmosphere::AtmosphereCache;
//! use oblate::env_state::OblateEnv;
//!
//! # fn main() -> Result<(), oblate::oblate_errors::OblateError> {
//! let source = TieredSource::new("-0.0", None, None, OblateEnv::new())?;
//! let mut cache = AtmosphereCache::new(Box::new(source), PreintegrationPlan::default())?;
//! let spectrum = cache.spectrum(8750.0, 4.1, 0.77)?;
//! # Ok(()) }
//! ```

pub mod interpolate;
pub mod loader;
pub mod spectra;

use std::collections::HashMap;

use interpolate::{apply_mu, bilinear, mu_weight, LinearMix};
use loader::SpectraSource;
use spectra::{GridAxes, GridEntry, GridKey, PreintegrationPlan};

use crate::numeric::bracket;
use crate::oblate_errors::OblateError;

/// Grid point used to discover the axes when the cache starts empty.
const REFERENCE_TEFF: f64 = 7000.0;
const REFERENCE_LOGG: f64 = 4.0;

/// In-memory cache of loaded grid files with trilinear point queries.
///
/// Loaded entries are kept for the lifetime of the cache, so repeated queries inside
/// one fit touch each file at most once.
pub struct AtmosphereCache {
    axes: GridAxes,
    plan: PreintegrationPlan,
    entries: HashMap<GridKey, GridEntry>,
    source: Box<dyn SpectraSource>,
}

impl AtmosphereCache {
    /// Open the cache and derive the grid axes from a reference file.
    ///
    /// Arguments
    /// -----------------
    /// * `source`: where grid files come from.
    /// * `plan`: the passbands every loaded file is pre-integrated over.
    pub fn new(
        source: Box<dyn SpectraSource>,
        plan: PreintegrationPlan,
    ) -> Result<Self, OblateError> {
        let reference = GridKey::new(REFERENCE_TEFF, REFERENCE_LOGG);
        let raw = source.fetch(reference)?;
        let n_wavelengths = raw.intensities.last().map_or(0, Vec::len);
        let axes = GridAxes::standard(&raw.mu, n_wavelengths);

        let mut entries = HashMap::new();
        entries.insert(reference, GridEntry::from_raw(raw, &axes, &plan));

        Ok(AtmosphereCache {
            axes,
            plan,
            entries,
            source,
        })
    }

    /// Derive the grid axes from the reference file without building a cache.
    ///
    /// Used when the pre-integration plan itself depends on the wavelength axis (filter
    /// resampling); the later [`AtmosphereCache::new`] refetch hits the source's cache.
    pub fn probe_axes(source: &dyn SpectraSource) -> Result<GridAxes, OblateError> {
        let raw = source.fetch(GridKey::new(REFERENCE_TEFF, REFERENCE_LOGG))?;
        let n_wavelengths = raw.intensities.last().map_or(0, Vec::len);
        Ok(GridAxes::standard(&raw.mu, n_wavelengths))
    }

    pub fn axes(&self) -> &GridAxes {
        &self.axes
    }

    pub fn plan(&self) -> &PreintegrationPlan {
        &self.plan
    }

    /// Number of grid files currently resident.
    pub fn loaded_files(&self) -> usize {
        self.entries.len()
    }

    /// Full intensity spectrum at (`teff`, `logg`, `mu`), one value per wavelength.
    pub fn spectrum(&mut self, teff: f64, logg: f64, mu: f64) -> Result<Vec<f64>, OblateError> {
        let n = self.axes.wavelength.len();
        self.interpolate(teff, logg, mu, |e, row| e.raw[row].clone(), n)
    }

    /// Intensity integrated over photometric passband `channel` of the plan.
    pub fn photometric_intensity(
        &mut self,
        teff: f64,
        logg: f64,
        mu: f64,
        channel: usize,
    ) -> Result<f64, OblateError> {
        self.interpolate(teff, logg, mu, move |e, row| e.phot[channel][row], 0)
    }

    /// Intensity integrated over interferometric channel `channel` of the plan.
    pub fn visibility_intensity(
        &mut self,
        teff: f64,
        logg: f64,
        mu: f64,
        channel: usize,
    ) -> Result<f64, OblateError> {
        self.interpolate(teff, logg, mu, move |e, row| e.vis[channel][row], 0)
    }

    fn ensure(&mut self, key: GridKey) -> Result<(), OblateError> {
        if !self.entries.contains_key(&key) {
            let raw = self.source.fetch(key)?;
            self.entries
                .insert(key, GridEntry::from_raw(raw, &self.axes, &self.plan));
        }
        Ok(())
    }

    fn entry(&self, key: GridKey) -> Result<&GridEntry, OblateError> {
        self.entries
            .get(&key)
            .ok_or_else(|| OblateError::GridFileNotFound(format!("{key:?}")))
    }

    /// The one interpolation routine behind every query flavor: bracket the query on
    /// each axis, load the four corner files, weight their rows by the viewing cosine
    /// and mix the corners bilinearly in (Teff, log g).
    fn interpolate<V: LinearMix>(
        &mut self,
        teff: f64,
        logg: f64,
        mu: f64,
        get_row: impl Fn(&GridEntry, usize) -> V,
        zero_len: usize,
    ) -> Result<V, OblateError> {
        let tb = bracket(&self.axes.teff, teff, "teff")?;
        let gb = bracket(&self.axes.logg, logg, "logg")?;
        let weight = mu_weight(&self.axes.mu, mu)?;

        let keys = [
            GridKey::new(tb.lo, gb.lo),
            GridKey::new(tb.lo, gb.hi),
            GridKey::new(tb.hi, gb.lo),
            GridKey::new(tb.hi, gb.hi),
        ];
        for key in keys {
            self.ensure(key)?;
        }

        let (e_ll, e_lh) = (self.entry(keys[0])?, self.entry(keys[1])?);
        let (e_hl, e_hh) = (self.entry(keys[2])?, self.entry(keys[3])?);
        let ll = apply_mu(&weight, |r| get_row(e_ll, r), zero_len);
        let lh = apply_mu(&weight, |r| get_row(e_lh, r), zero_len);
        let hl = apply_mu(&weight, |r| get_row(e_hl, r), zero_len);
        let hh = apply_mu(&weight, |r| get_row(e_hh, r), zero_len);

        Ok(bilinear(&ll, &lh, &hl, &hh, &tb, &gb, teff, logg))
    }
}
