//! # Projection of the stellar surface onto the sky
//!
//! Turns the surface grid into observer-frame sky coordinates and extracts the closed
//! silhouette of the visible disk.
//!
//! ## Overview
//!
//! Each grid sample is placed at its angular position (radians on the sky), tilted by
//! the inclination and rotated by the position angle. Samples on the observer's side of
//! the sky plane with an outward-facing normal are the "above" set; their convex hull,
//! walked into a closed polygon, is the stellar silhouette used by the visibility
//! rasterizer to decide which image pixels lie on the star.

use nalgebra::{Matrix3, Vector3};
use ordered_float::OrderedFloat;

use crate::constants::{Parsec, Radian, PARSEC, R_SUN};
use crate::geometry::{RocheGeometry, SurfaceGrid};
use crate::oblate_errors::OblateError;

/// A point on the sky, in radians relative to the stellar center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPoint {
    pub x: f64,
    pub y: f64,
}

/// One visible surface sample in observer coordinates.
#[derive(Debug, Clone, Copy)]
pub struct ProjectedSample {
    pub x: Radian,
    pub y: Radian,
    /// Line-of-sight coordinate; non-negative for the near side.
    pub z: Radian,
    pub colat_index: usize,
    pub phi_index: usize,
    pub mu: f64,
}

/// The visible disk: its samples and its closed silhouette (first vertex repeated
/// at the end).
#[derive(Debug, Clone)]
pub struct ProjectedDisk {
    pub above: Vec<ProjectedSample>,
    pub silhouette: Vec<SkyPoint>,
}

/// Project the surface grid and extract the visible-disk silhouette.
///
/// Arguments
/// -----------------
/// * `grid`: the sampled surface.
/// * `geometry`: the Roche quantities, for the viewing cosines.
/// * `inclination`, `position_angle`: viewing orientation in radians.
/// * `distance`: in parsecs, converting linear radii to angles.
///
/// Return
/// ----------
/// * The [`ProjectedDisk`], or [`OblateError::DegenerateSilhouette`] when fewer than
///   three distinct points face the observer.
pub fn project_disk(
    grid: &SurfaceGrid,
    geometry: &RocheGeometry,
    inclination: Radian,
    position_angle: Radian,
    distance: Parsec,
) -> Result<ProjectedDisk, OblateError> {
    let (si, ci) = (inclination.sin(), inclination.cos());
    let (spa, cpa) = (position_angle.sin(), position_angle.cos());

    // Tilt by the inclination, then rotate in the sky plane.
    #[rustfmt::skip]
    let tilt = Matrix3::new(
        1.0, 0.0, 0.0,
        0.0, si, -ci,
        0.0, ci, si,
    );
    #[rustfmt::skip]
    let spin = Matrix3::new(
        cpa, -spa, 0.0,
        spa, cpa, 0.0,
        0.0, 0.0, 1.0,
    );
    let to_sky = spin * tilt;

    let mut above = Vec::new();
    for (i, &colat) in grid.colatitudes.iter().enumerate() {
        let theta_r = grid.radii[i] * R_SUN / (distance * PARSEC);
        let (sc, cc) = (colat.sin(), colat.cos());
        for (j, &phi) in grid.longitudes.iter().enumerate() {
            let sky =
                to_sky * Vector3::new(theta_r * sc * phi.sin(), theta_r * cc, theta_r * sc * phi.cos());
            let (x, y, tz) = (sky.x, sky.y, sky.z);

            let mu = geometry.viewing_cosine(&grid.gravities[i], colat, phi, inclination);
            if tz >= 0.0 && mu > 0.0 {
                above.push(ProjectedSample {
                    x,
                    y,
                    z: tz,
                    colat_index: i,
                    phi_index: j,
                    mu,
                });
            }
        }
    }

    let points: Vec<SkyPoint> = above.iter().map(|s| SkyPoint { x: s.x, y: s.y }).collect();
    let silhouette = convex_hull_closed(&points)?;

    Ok(ProjectedDisk { above, silhouette })
}

/// Convex hull of a point set as a closed polygon (first vertex repeated last).
///
/// Monotone-chain construction; collinear boundary points are dropped.
pub fn convex_hull_closed(points: &[SkyPoint]) -> Result<Vec<SkyPoint>, OblateError> {
    let mut sorted: Vec<SkyPoint> = points.to_vec();
    sorted.sort_by_key(|p| (OrderedFloat(p.x), OrderedFloat(p.y)));
    sorted.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    if sorted.len() < 3 {
        return Err(OblateError::DegenerateSilhouette);
    }

    let cross = |o: &SkyPoint, a: &SkyPoint, b: &SkyPoint| -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    let mut lower: Vec<SkyPoint> = Vec::new();
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<SkyPoint> = Vec::new();
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    let mut hull = lower;
    hull.extend(upper);
    if hull.len() < 3 {
        return Err(OblateError::DegenerateSilhouette);
    }
    hull.push(hull[0]);
    Ok(hull)
}

/// Ray-crossing point-in-polygon test against a closed polygon.
pub fn point_in_polygon(polygon: &[SkyPoint], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > y) != (pj.y > y) && x < (pj.x - pi.x) * (y - pi.y) / (pj.y - pi.y) + pi.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}
