//! # Evolutionary-track age and mass estimation
//!
//! Given the bolometric luminosity, mean radius and equatorial velocity of the fitted
//! star, search a grid of rotating stellar-evolution tracks for the initial mass, age
//! and initial rotation rate that reproduce them.
//!
//! ## Overview
//!
//! Tracks are tabulated per (initial mass, initial omega) pair as history files. A
//! query point is evaluated by interpolating each bracketing track in age, then across
//! omega, then across mass. The inverse distance between the predicted and target
//! observables is maximized with the downhill simplex, wrapped in a restart loop that
//! nudges or resets a stalled search and gives up (returning zeros) after a fixed
//! number of rounds.

use std::collections::HashMap;

use camino::Utf8Path;
use ordered_float::OrderedFloat;
use rand::Rng;

use crate::numeric::bracket;
use crate::oblate_errors::OblateError;
use crate::simplex;

/// One evolutionary track: per-timestep quantities, all parallel vectors.
#[derive(Debug, Clone, Default)]
pub struct Track {
    /// Age in Gyr.
    pub age: Vec<f64>,
    /// log10(Teff / K).
    pub log_teff: Vec<f64>,
    /// log10(L / Lsun).
    pub log_lum: Vec<f64>,
    /// log10(R / Rsun).
    pub log_rad: Vec<f64>,
    /// log10(Rp / Rsun).
    pub log_polar_rad: Vec<f64>,
    /// Equatorial velocity in km/s.
    pub velocity: Vec<f64>,
    /// Current angular rotation rate over critical.
    pub omega_now: Vec<f64>,
}

impl Track {
    /// Parse one history file.
    ///
    /// Lines have 17 space-separated columns; the first line and the repeated header
    /// rows inside the file are skipped, as are rows with a non-positive polar radius.
    pub fn from_table(text: &str) -> Result<Self, OblateError> {
        let mut track = Track::default();
        for line in text.lines().skip(1) {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() != 17 || cols[1] == "2" || cols[1] == "star_age" {
                continue;
            }
            let num = |i: usize| -> Result<f64, OblateError> {
                cols[i].parse().map_err(|_| {
                    OblateError::InvalidTrackFile(format!("bad number {:?} in {line:?}", cols[i]))
                })
            };
            let log_rad = num(5)?;
            let rp_ratio = num(13)?;
            if rp_ratio * 10f64.powf(log_rad) <= 0.0 {
                continue;
            }
            track.age.push(num(1)? * 1e-9);
            track.log_teff.push(num(3)?);
            track.log_lum.push(num(4)?);
            track.log_rad.push(log_rad);
            track
                .log_polar_rad
                .push((rp_ratio * 10f64.powf(log_rad)).log10());
            track.velocity.push(num(14)?);
            track.omega_now.push(num(15)?);
        }
        if track.age.is_empty() {
            return Err(OblateError::InvalidTrackFile(
                "no usable rows".to_owned(),
            ));
        }
        Ok(track)
    }
}

/// Quantities predicted by the track grid at one (mass, age, omega) query.
#[derive(Debug, Clone, Copy)]
pub struct TrackPoint {
    pub log_lum: f64,
    pub log_rad: f64,
    pub log_polar_rad: f64,
    pub velocity: f64,
    pub omega_now: f64,
}

/// The observables the age/mass search tries to reproduce.
#[derive(Debug, Clone, Copy)]
pub struct TargetObservables {
    /// Bolometric luminosity in solar units.
    pub luminosity: f64,
    /// Mean radius in solar radii.
    pub radius: f64,
    /// Equatorial velocity in km/s.
    pub velocity: f64,
}

/// Outcome of the age/mass search. All zeros signals a timed-out search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeMassEstimate {
    /// Age in Gyr.
    pub age: f64,
    /// Initial mass in solar masses.
    pub mass: f64,
    /// Initial rotation rate over critical.
    pub omega: f64,
}

/// The full track grid of one metallicity.
#[derive(Debug, Clone)]
pub struct TrackSet {
    masses: Vec<f64>,
    omegas: Vec<f64>,
    tracks: HashMap<(OrderedFloat<f64>, OrderedFloat<f64>), Track>,
}

/// Format a float the way the track file names spell it: one decimal for integral
/// values, the shortest representation otherwise.
fn float_tag(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

impl TrackSet {
    /// Load every `{metallicity}_M{mass}_w{omega}` file of the grid from `dir`.
    pub fn load(
        dir: &Utf8Path,
        metallicity: &str,
        masses: &[f64],
        omegas: &[f64],
    ) -> Result<Self, OblateError> {
        let mut tracks = HashMap::new();
        for &m in masses {
            for &w in omegas {
                let name = format!("{metallicity}_M{}_w{}", float_tag(m), float_tag(w));
                let text = std::fs::read_to_string(dir.join(&name))?;
                tracks.insert((OrderedFloat(m), OrderedFloat(w)), Track::from_table(&text)?);
            }
        }
        Ok(TrackSet {
            masses: masses.to_vec(),
            omegas: omegas.to_vec(),
            tracks,
        })
    }

    /// Build a set from already-parsed tracks (used by tests and embedders).
    pub fn from_tracks(
        masses: Vec<f64>,
        omegas: Vec<f64>,
        tracks: Vec<(f64, f64, Track)>,
    ) -> Self {
        TrackSet {
            masses,
            omegas,
            tracks: tracks
                .into_iter()
                .map(|(m, w, t)| ((OrderedFloat(m), OrderedFloat(w)), t))
                .collect(),
        }
    }

    fn track(&self, mass: f64, omega: f64) -> Result<&Track, OblateError> {
        self.tracks
            .get(&(OrderedFloat(mass), OrderedFloat(omega)))
            .ok_or_else(|| {
                OblateError::InvalidTrackFile(format!("no track for M={mass}, w={omega}"))
            })
    }

    /// Interpolate one track in age, with the degenerate on-node branch.
    fn at_age(track: &Track, age: f64) -> Result<TrackPoint, OblateError> {
        let mut lo = None;
        let mut hi = None;
        for (i, &a) in track.age.iter().enumerate() {
            if a <= age {
                lo = Some(i);
            }
            if a >= age && hi.is_none() {
                hi = Some(i);
            }
        }
        let (lo, hi) = match (lo, hi) {
            (Some(l), Some(h)) => (l, h),
            _ => {
                return Err(OblateError::OutOfDomain {
                    axis: "age",
                    value: age,
                    min: track.age.first().copied().unwrap_or(f64::NAN),
                    max: track.age.last().copied().unwrap_or(f64::NAN),
                })
            }
        };
        let pick = |v: &[f64]| -> f64 {
            if track.age[hi] != track.age[lo] {
                v[lo] + (v[hi] - v[lo]) * (age - track.age[lo]) / (track.age[hi] - track.age[lo])
            } else {
                v[lo]
            }
        };
        Ok(TrackPoint {
            log_lum: pick(&track.log_lum),
            log_rad: pick(&track.log_rad),
            log_polar_rad: pick(&track.log_polar_rad),
            velocity: pick(&track.velocity),
            omega_now: pick(&track.omega_now),
        })
    }

    /// Trilinear prediction at (`mass`, `age`, `omega`): age within each bracketing
    /// track, then across omega, then across mass.
    pub fn predict(&self, mass: f64, age: f64, omega: f64) -> Result<TrackPoint, OblateError> {
        let mb = bracket(&self.masses, mass, "mass")?;
        let wb = bracket(&self.omegas, omega, "omega")?;

        let corner = |m: f64, w: f64| -> Result<TrackPoint, OblateError> {
            Self::at_age(self.track(m, w)?, age)
        };
        let ll = corner(mb.lo, wb.lo)?;
        let lh = corner(mb.lo, wb.hi)?;
        let hl = corner(mb.hi, wb.lo)?;
        let hh = corner(mb.hi, wb.hi)?;

        let mix = |a: &TrackPoint, b: &TrackPoint, t: f64| TrackPoint {
            log_lum: a.log_lum + (b.log_lum - a.log_lum) * t,
            log_rad: a.log_rad + (b.log_rad - a.log_rad) * t,
            log_polar_rad: a.log_polar_rad + (b.log_polar_rad - a.log_polar_rad) * t,
            velocity: a.velocity + (b.velocity - a.velocity) * t,
            omega_now: a.omega_now + (b.omega_now - a.omega_now) * t,
        };

        let (low, high) = if wb.hi != wb.lo {
            let t = (omega - wb.lo) / (wb.hi - wb.lo);
            (mix(&ll, &lh, t), mix(&hl, &hh, t))
        } else {
            (ll, hl)
        };
        Ok(if mb.hi != mb.lo {
            mix(&low, &high, (mass - mb.lo) / (mb.hi - mb.lo))
        } else {
            low
        })
    }

    /// Inverse distance between the prediction at `params = [mass, age, omega]` and
    /// the target. Failed predictions (outside the grid) score a flat 1e-5.
    pub fn match_quality(&self, params: &[f64], target: &TargetObservables) -> f64 {
        match self.predict(params[0], params[1], params[2]) {
            Ok(p) => {
                let dl = target.luminosity - 10f64.powf(p.log_lum);
                let dr = target.radius - 10f64.powf(p.log_rad);
                let dv = target.velocity - p.velocity;
                1.0 / (dl * dl + dr * dr + dv * dv).sqrt()
            }
            Err(_) => 1.0 / 1e5,
        }
    }
}

const MATCH_GOF_TARGET: f64 = 1e-7;
const MATCH_MAX_ROUNDS: usize = 300;

/// Search the track grid for the (age, mass, omega) reproducing the target.
///
/// The simplex is restarted until the goodness of fit drops below 1e-7. Every five
/// stalled rounds one parameter is nudged by 0.1 in a random direction; after ten
/// nudges the search restarts from the initial guess. After 300 rounds the search
/// gives up and returns all zeros.
pub fn estimate_age_mass(
    tracks: &TrackSet,
    target: &TargetObservables,
    guess_mass: f64,
    guess_age: f64,
    guess_omega: f64,
    verbose: bool,
) -> AgeMassEstimate {
    let start = [guess_mass, guess_age, guess_omega];
    let scale = [0.3, 0.3, 0.3];
    let mut params = start.to_vec();
    let mut rng = rand::rng();

    let mut since_nudge = 0usize;
    let mut nudges = 0usize;
    let mut rounds = 0usize;
    loop {
        let result = simplex::maximize(&params, &scale, 1e-10, 1e-10, 1000, |p| {
            tracks.match_quality(p, target)
        });
        let gof = 1.0 / result.value;
        params = result.position;
        if verbose {
            println!(
                "{} rounds till timeout. GoF: {gof}, Mass: {}, Age: {}, Omg: {}",
                MATCH_MAX_ROUNDS - rounds,
                params[0],
                params[1],
                params[2]
            );
        }
        if gof < MATCH_GOF_TARGET {
            return AgeMassEstimate {
                age: params[1],
                mass: params[0],
                omega: params[2],
            };
        }

        since_nudge += 1;
        rounds += 1;
        if since_nudge == 5 {
            if nudges == 10 {
                params.copy_from_slice(&start);
                nudges = 0;
            } else {
                let which = rng.random_range(0..3);
                let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
                params[which] += sign * 0.1;
                nudges += 1;
            }
            since_nudge = 0;
        }
        if rounds == MATCH_MAX_ROUNDS {
            println!("age/mass search took too long, returning zeros");
            return AgeMassEstimate {
                age: 0.0,
                mass: 0.0,
                omega: 0.0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Tracks whose stored logs are affine in (mass, age, omega), so trilinear
    /// interpolation is exact everywhere on the grid.
    fn affine_set() -> TrackSet {
        let masses = vec![1.5, 2.0, 2.5, 3.0];
        let omegas = vec![0.0, 0.25, 0.5, 0.75];
        let ages: Vec<f64> = (0..9).map(|i| 0.5 * i as f64).collect();
        let mut tracks = Vec::new();
        for &m in &masses {
            for &w in &omegas {
                let mut t = Track::default();
                for &a in &ages {
                    t.age.push(a);
                    t.log_teff.push(3.8);
                    t.log_lum.push(0.10 * m + 0.20 * a + 0.05 * w);
                    t.log_rad.push(0.30 * m - 0.10 * a + 0.02 * w);
                    t.log_polar_rad.push(0.30 * m - 0.10 * a);
                    t.velocity.push(100.0 * w + 5.0 * a);
                    t.omega_now.push(w);
                }
                tracks.push((m, w, t));
            }
        }
        TrackSet::from_tracks(masses, omegas, tracks)
    }

    #[test]
    fn prediction_is_exact_for_affine_tracks() {
        let set = affine_set();
        let (m, a, w) = (2.3, 1.7, 0.4);
        let p = set.predict(m, a, w).unwrap();
        assert_relative_eq!(p.log_lum, 0.10 * m + 0.20 * a + 0.05 * w, epsilon = 1e-12);
        assert_relative_eq!(p.velocity, 100.0 * w + 5.0 * a, epsilon = 1e-10);
    }

    #[test]
    fn out_of_grid_query_scores_the_floor() {
        let set = affine_set();
        let target = TargetObservables {
            luminosity: 2.0,
            radius: 2.0,
            velocity: 50.0,
        };
        assert_relative_eq!(set.match_quality(&[10.0, 1.0, 0.2], &target), 1.0 / 1e5);
        assert_relative_eq!(set.match_quality(&[2.0, 99.0, 0.2], &target), 1.0 / 1e5);
    }

    #[test]
    fn recovers_a_point_on_the_grid() {
        let set = affine_set();
        let (m, a, w) = (2.3, 1.7, 0.4);
        let truth = set.predict(m, a, w).unwrap();
        let target = TargetObservables {
            luminosity: 10f64.powf(truth.log_lum),
            radius: 10f64.powf(truth.log_rad),
            velocity: truth.velocity,
        };
        let est = estimate_age_mass(&set, &target, 2.0, 1.5, 0.3, false);
        assert_relative_eq!(est.mass, m, epsilon = 5e-2);
        assert_relative_eq!(est.age, a, epsilon = 5e-2);
        assert_relative_eq!(est.omega, w, epsilon = 5e-2);
    }

    #[test]
    fn track_parser_skips_headers_and_collapsed_rows() {
        let mut text = String::from("header line\n");
        // A repeated in-file header and a row with non-positive polar radius.
        text.push_str("x star_age x x x x x x x x x x x x x x x\n");
        let mut row = vec!["0"; 17];
        row[1] = "3.0e9";
        row[3] = "3.9";
        row[4] = "1.2";
        row[5] = "0.3";
        row[13] = "0.95";
        row[14] = "180.0";
        row[15] = "0.6";
        text.push_str(&row.join(" "));
        text.push('\n');
        row[13] = "0.0";
        text.push_str(&row.join(" "));
        text.push('\n');

        let track = Track::from_table(&text).unwrap();
        assert_eq!(track.age.len(), 1);
        assert_relative_eq!(track.age[0], 3.0);
        assert_relative_eq!(track.log_polar_rad[0], (0.95f64 * 10f64.powf(0.3)).log10());
    }
}
