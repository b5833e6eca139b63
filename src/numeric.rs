//! Small shared numerical helpers: trapezoid integration, 1-D linear interpolation,
//! and the monotonic-axis bracket search used by every lookup table in the crate.

use crate::oblate_errors::OblateError;

/// Trapezoid rule over samples `y` at abscissae `x` (not necessarily uniform).
pub(crate) fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    debug_assert_eq!(y.len(), x.len());
    let mut sum = 0.0;
    for i in 1..y.len() {
        sum += 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]);
    }
    sum
}

/// Trapezoid rule with a fixed differential `dx`.
pub(crate) fn trapezoid_dx(y: &[f64], dx: f64) -> f64 {
    let mut sum = 0.0;
    for i in 1..y.len() {
        sum += 0.5 * (y[i] + y[i - 1]) * dx;
    }
    sum
}

/// Linear interpolation of `(xs, ys)` at `x`. Outside the support the value is 0.
/// `xs` must be monotonically increasing.
pub(crate) fn interp1_or_zero(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    if xs.is_empty() || x < xs[0] || x > xs[xs.len() - 1] {
        return 0.0;
    }
    match xs.partition_point(|&v| v <= x) {
        0 => ys[0],
        i if i >= xs.len() => ys[xs.len() - 1],
        i => {
            let (x0, x1) = (xs[i - 1], xs[i]);
            if x1 == x0 {
                ys[i - 1]
            } else {
                ys[i - 1] + (ys[i] - ys[i - 1]) * (x - x0) / (x1 - x0)
            }
        }
    }
}

/// A bracketing pair on a monotonically increasing axis.
///
/// `lo` is the largest grid value <= query, `hi` the smallest grid value >= query.
/// When the query sits exactly on a grid point, `lo == hi`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bracket {
    pub lo_idx: usize,
    pub hi_idx: usize,
    pub lo: f64,
    pub hi: f64,
}

/// Locate the bracketing grid values around `query` on a monotonic axis.
///
/// The query is rounded to 4 decimals before comparison so that values sitting on a
/// grid point up to floating noise select the degenerate `lo == hi` bracket.
///
/// Return
/// ----------
/// * The [`Bracket`], or [`OblateError::OutOfDomain`] if the query falls strictly
///   outside the tabulated range.
pub(crate) fn bracket(axis: &[f64], query: f64, name: &'static str) -> Result<Bracket, OblateError> {
    let rounded = (query * 1e4).round() / 1e4;
    let out_of_domain = || OblateError::OutOfDomain {
        axis: name,
        value: query,
        min: axis.first().copied().unwrap_or(f64::NAN),
        max: axis.last().copied().unwrap_or(f64::NAN),
    };
    if axis.is_empty() {
        return Err(out_of_domain());
    }

    let mut lo_idx = None;
    let mut hi_idx = None;
    for (i, &v) in axis.iter().enumerate() {
        if v <= rounded {
            lo_idx = Some(i);
        }
        if v >= rounded && hi_idx.is_none() {
            hi_idx = Some(i);
        }
    }
    let (lo_idx, hi_idx) = match (lo_idx, hi_idx) {
        (Some(l), Some(h)) => (l, h),
        _ => return Err(out_of_domain()),
    };
    Ok(Bracket {
        lo_idx,
        hi_idx,
        lo: axis[lo_idx],
        hi: axis[hi_idx],
    })
}
