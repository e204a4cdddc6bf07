//! Applying a resampled warp field to the points it is anchored at.

use anyhow::{ensure, Result};
use nalgebra::{RealField, SVector};
use rayon::prelude::*;

use crate::transform::WarpTransform;

/// Move every point by its own transform: `out[i] = transforms[i](points[i])`.
///
/// Typically called right after resampling a sparse warp field onto a dense
/// cloud, with the dense cloud as both the new support and `points`.
pub fn warp_points<T, const D: usize, X>(
    transforms: &[X],
    points: &[SVector<T, D>],
) -> Result<Vec<SVector<T, D>>>
where
    T: RealField + Copy,
    X: WarpTransform<T, D>,
{
    ensure!(
        transforms.len() == points.len(),
        "warp field has {} transforms but {} points were given",
        transforms.len(),
        points.len()
    );
    Ok(transforms
        .par_iter()
        .zip(points.par_iter())
        .map(|(t, p)| t.transform_point(p))
        .collect())
}
