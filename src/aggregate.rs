//! Weighted blending of transforms.
//!
//! Linear parts and translations are averaged componentwise with the supplied
//! weights. For [`TransformMode::Isometry`] transforms the averaged linear
//! part is generally not orthogonal (the mean of two rotations shrinks toward
//! the origin), so it is replaced by its orthogonal polar factor:
//!
//! ```text
//! A = U·Σ·Vᵀ   →   U·Vᵀ
//! ```
//!
//! which is the orthogonal matrix closest to `A` in the Frobenius norm.
//!
//! A total weight of exactly zero (no candidates, or all weights zero) yields
//! the identity transform in both modes.

use nalgebra::{DMatrix, RealField, SMatrix, SVector};
use crate::transform::{TransformMode, WarpTransform};

/// Running weighted sums for one output transform.
#[derive(Debug, Clone)]
pub struct TransformAccumulator<T: RealField + Copy, const D: usize> {
    linear: SMatrix<T, D, D>,
    translation: SVector<T, D>,
    total_weight: T,
}

impl<T: RealField + Copy, const D: usize> Default for TransformAccumulator<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RealField + Copy, const D: usize> TransformAccumulator<T, D> {
    pub fn new() -> Self {
        Self {
            linear: SMatrix::zeros(),
            translation: SVector::zeros(),
            total_weight: T::zero(),
        }
    }

    /// Add `weight × transform` to the running sums.
    ///
    /// `weight` must be finite and non-negative. A zero weight is accepted and
    /// contributes nothing.
    pub fn push<X: WarpTransform<T, D>>(&mut self, weight: T, transform: &X) {
        debug_assert!(
            weight >= T::zero() && weight.is_finite(),
            "weights must be finite and non-negative, got {weight:?}"
        );
        self.total_weight += weight;
        self.linear += transform.linear() * weight;
        self.translation += transform.translation() * weight;
    }

    /// Sum of all weights pushed so far.
    pub fn total_weight(&self) -> T {
        self.total_weight
    }

    /// Normalize the sums into a transform of type `X`.
    pub fn finish<X: WarpTransform<T, D>>(self) -> X {
        if self.total_weight == T::zero() {
            return X::identity();
        }
        let linear = self.linear / self.total_weight;
        let translation = self.translation / self.total_weight;
        match X::MODE {
            TransformMode::General => X::from_parts(linear, translation),
            TransformMode::Isometry => X::from_parts(nearest_orthogonal(&linear), translation),
        }
    }
}

/// Blend `(weight, transform)` pairs into one transform.
///
/// ```
/// use nalgebra::Vector2;
/// use warpfield::{aggregate_transforms, RigidTransform};
///
/// let a = RigidTransform::from_rotation_2d(0.0, Vector2::new(0.0, 0.0));
/// let b = RigidTransform::from_rotation_2d(std::f64::consts::FRAC_PI_2, Vector2::new(2.0, 0.0));
/// let blended: RigidTransform<f64, 2> = aggregate_transforms([(0.5, &a), (0.5, &b)]);
/// assert!((blended.angle() - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
/// assert!((blended.translation.x - 1.0).abs() < 1e-12);
/// ```
pub fn aggregate_transforms<'a, T, const D: usize, X, I>(candidates: I) -> X
where
    T: RealField + Copy,
    X: WarpTransform<T, D> + 'a,
    I: IntoIterator<Item = (T, &'a X)>,
{
    let mut acc = TransformAccumulator::new();
    for (weight, transform) in candidates {
        acc.push(weight, transform);
    }
    acc.finish()
}

/// Closest orthogonal matrix to `m` (Frobenius norm), `U·Vᵀ` from the SVD.
///
/// The result is orthogonal but not necessarily a proper rotation: when `m`
/// has a negative determinant (for example a nearly singular blend such as
/// `diag(0.6, -0.01)`) the projection is a reflection with determinant -1.
///
/// The SVD runs on a dynamically sized copy so this works for any `D`.
pub fn nearest_orthogonal<T: RealField + Copy, const D: usize>(
    m: &SMatrix<T, D, D>,
) -> SMatrix<T, D, D> {
    let svd = DMatrix::from_column_slice(D, D, m.as_slice()).svd(true, true);
    // svd(true, true) always computes both singular vector sets
    let u = svd.u.expect("U requested from SVD");
    let v_t = svd.v_t.expect("Vᵀ requested from SVD");
    let r = u * v_t;
    SMatrix::from_column_slice(r.as_slice())
}
