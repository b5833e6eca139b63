//! Corner interpolation shared by every grid query.
//!
//! One routine serves the full-spectrum, photometric and interferometric flavors: the
//! value type only has to support linear mixing. Full spectra mix whole wavelength
//! vectors; the pre-integrated flavors mix scalars.

use crate::constants::MU_ZERO_BOUND;
use crate::numeric::Bracket;
use crate::oblate_errors::OblateError;

/// A value that can be linearly combined: a scalar intensity or a whole spectrum.
pub(crate) trait LinearMix: Clone {
    /// The all-zero value (`len` is the spectrum length; scalars ignore it).
    fn zero(len: usize) -> Self;
    fn scaled(&self, k: f64) -> Self;
    /// `self + (other - self) * t`
    fn lerp(&self, other: &Self, t: f64) -> Self;
    fn add(&self, other: &Self) -> Self;
}

impl LinearMix for f64 {
    fn zero(_len: usize) -> Self {
        0.0
    }
    fn scaled(&self, k: f64) -> Self {
        self * k
    }
    fn lerp(&self, other: &Self, t: f64) -> Self {
        self + (other - self) * t
    }
    fn add(&self, other: &Self) -> Self {
        self + other
    }
}

impl LinearMix for Vec<f64> {
    fn zero(len: usize) -> Self {
        vec![0.0; len]
    }
    fn scaled(&self, k: f64) -> Self {
        self.iter().map(|v| v * k).collect()
    }
    fn lerp(&self, other: &Self, t: f64) -> Self {
        self.iter()
            .zip(other)
            .map(|(a, b)| a + (b - a) * t)
            .collect()
    }
    fn add(&self, other: &Self) -> Self {
        self.iter().zip(other).map(|(a, b)| a + b).collect()
    }
}

/// How a query viewing cosine maps onto the tabulated rows.
///
/// The tabulated axis carries a synthetic zero at index 0 standing for the dark limb,
/// so row indices are axis indices shifted down by one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum MuWeight {
    /// The query sits at the dark limb itself: the intensity is identically zero.
    Zero,
    /// Between the dark limb and the first tabulated row: scale the first row down.
    Scaled { row: usize, factor: f64 },
    /// Between two tabulated rows.
    Lerp { lo_row: usize, hi_row: usize, t: f64 },
    /// Exactly on a tabulated row.
    Exact { row: usize },
}

/// Resolve the viewing-cosine weighting for `mu` against the tabulated axis.
///
/// The query is rounded to 4 decimals for bracketing; anything below the zero bound is
/// pinned to the synthetic dark-limb boundary.
pub(crate) fn mu_weight(mu_axis: &[f64], mu: f64) -> Result<MuWeight, OblateError> {
    let rounded = (mu * 1e4).round() / 1e4;

    let (mlo, mlo_idx) = if mu < MU_ZERO_BOUND {
        (0.0, 0)
    } else {
        let mut found = None;
        for (i, &v) in mu_axis.iter().enumerate() {
            if v <= rounded {
                found = Some((v, i));
            }
        }
        found.ok_or(OblateError::OutOfDomain {
            axis: "mu",
            value: mu,
            min: mu_axis.first().copied().unwrap_or(f64::NAN),
            max: mu_axis.last().copied().unwrap_or(f64::NAN),
        })?
    };

    let (mhi, mhi_idx) = mu_axis
        .iter()
        .enumerate()
        .find(|(_, &v)| v >= rounded)
        .map(|(i, &v)| (v, i))
        .ok_or(OblateError::OutOfDomain {
            axis: "mu",
            value: mu,
            min: mu_axis.first().copied().unwrap_or(f64::NAN),
            max: mu_axis.last().copied().unwrap_or(f64::NAN),
        })?;

    Ok(if mlo != mhi {
        if mlo == 0.0 {
            MuWeight::Scaled {
                row: mhi_idx - 1,
                factor: (mu - mlo) / (mhi - mlo),
            }
        } else {
            MuWeight::Lerp {
                lo_row: mlo_idx - 1,
                hi_row: mhi_idx - 1,
                t: (mu - mlo) / (mhi - mlo),
            }
        }
    } else if mlo == 0.0 {
        MuWeight::Zero
    } else {
        MuWeight::Exact { row: mlo_idx - 1 }
    })
}

/// Apply a [`MuWeight`] to the rows of one grid file.
pub(crate) fn apply_mu<V: LinearMix>(
    weight: &MuWeight,
    get_row: impl Fn(usize) -> V,
    zero_len: usize,
) -> V {
    match *weight {
        MuWeight::Zero => V::zero(zero_len),
        MuWeight::Scaled { row, factor } => get_row(row).scaled(factor),
        MuWeight::Lerp { lo_row, hi_row, t } => get_row(lo_row).lerp(&get_row(hi_row), t),
        MuWeight::Exact { row } => get_row(row),
    }
}

/// Bilinear combination of the four (Teff, log g) corner values, degenerating to
/// linear or identity when the query sits on a grid line or node.
pub(crate) fn bilinear<V: LinearMix>(
    ll: &V,
    lh: &V,
    hl: &V,
    hh: &V,
    tb: &Bracket,
    gb: &Bracket,
    teff: f64,
    logg: f64,
) -> V {
    let (tlo, thi) = (tb.lo, tb.hi);
    let (glo, ghi) = (gb.lo, gb.hi);
    if thi != tlo && ghi != glo {
        let norm = (thi - tlo) * (ghi - glo);
        ll.scaled((thi - teff) * (ghi - logg) / norm)
            .add(&lh.scaled((thi - teff) * (logg - glo) / norm))
            .add(&hl.scaled((teff - tlo) * (ghi - logg) / norm))
            .add(&hh.scaled((teff - tlo) * (logg - glo) / norm))
    } else if thi != tlo {
        ll.lerp(hl, (teff - tlo) / (thi - tlo))
    } else if ghi != glo {
        ll.lerp(lh, (logg - glo) / (ghi - glo))
    } else {
        ll.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::bracket;
    use approx::assert_relative_eq;

    const MU_AXIS: [f64; 4] = [0.0, 0.1, 0.5, 1.0];

    #[test]
    fn mu_below_first_row_scales_toward_zero() {
        match mu_weight(&MU_AXIS, 0.05).unwrap() {
            MuWeight::Scaled { row, factor } => {
                assert_eq!(row, 0);
                assert_relative_eq!(factor, 0.5);
            }
            other => panic!("unexpected weight {other:?}"),
        }
    }

    #[test]
    fn mu_at_dark_limb_is_zero() {
        assert_eq!(mu_weight(&MU_AXIS, 0.0).unwrap(), MuWeight::Zero);
        assert_eq!(mu_weight(&MU_AXIS, 1e-12).unwrap(), MuWeight::Zero);
    }

    #[test]
    fn mu_on_and_between_rows() {
        assert_eq!(
            mu_weight(&MU_AXIS, 0.5).unwrap(),
            MuWeight::Exact { row: 1 }
        );
        match mu_weight(&MU_AXIS, 0.3).unwrap() {
            MuWeight::Lerp { lo_row, hi_row, t } => {
                assert_eq!((lo_row, hi_row), (0, 1));
                assert_relative_eq!(t, 0.5);
            }
            other => panic!("unexpected weight {other:?}"),
        }
    }

    #[test]
    fn bilinear_degenerates_on_grid_lines() {
        let tb = bracket(&[7000.0, 7200.0], 7100.0, "teff").unwrap();
        let gb = bracket(&[4.0, 4.5], 4.0, "logg").unwrap();
        // On the logg grid line, only the temperature direction mixes.
        let v = bilinear(&1.0, &100.0, &3.0, &100.0, &tb, &gb, 7100.0, 4.0);
        assert_relative_eq!(v, 2.0);

        let gb = bracket(&[4.0, 4.5], 4.25, "logg").unwrap();
        let v = bilinear(&1.0, &2.0, &3.0, &4.0, &tb, &gb, 7100.0, 4.25);
        assert_relative_eq!(v, 2.5);
    }

    #[test]
    fn vector_mixing_matches_scalar() {
        let a = vec![1.0, 2.0];
        let b = vec![3.0, 6.0];
        let mixed = a.lerp(&b, 0.25);
        assert_relative_eq!(mixed[0], 1.5);
        assert_relative_eq!(mixed[1], 3.0);
        assert_eq!(Vec::<f64>::zero(3), vec![0.0; 3]);
    }
}
