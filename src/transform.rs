//! Transform types carried by a warp field.
//!
//! A warp field stores one transform per support point. Every transform is a
//! linear part (a `D×D` matrix) followed by a translation:
//!
//! ```text
//! x' = A·x + t
//! ```
//!
//! Two flavors are provided, distinguished by [`TransformMode`]:
//!
//! - [`AffineTransform`] — `A` is an arbitrary (normally invertible) matrix.
//! - [`RigidTransform`] — `A` is orthogonal; the transform is a rigid motion.
//!
//! Blending code is written against the [`WarpTransform`] trait and branches on
//! [`WarpTransform::MODE`] where the two flavors differ.

use nalgebra::{
    DMatrix, Isometry2, Isometry3, RealField, Rotation2, Rotation3, SMatrix, SVector,
    UnitQuaternion,
};

use crate::aggregate::nearest_orthogonal;

/// Constraint placed on the linear part of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    /// Any linear map (affine, similarity, shear...).
    General,
    /// Orthogonal linear part only (rotation / reflection).
    Isometry,
}

/// A linear-plus-translation transform in `D` dimensions.
///
/// Implementors only store the two parts; everything else (identity, point
/// mapping, homogeneous form) is derived from them.
pub trait WarpTransform<T: RealField + Copy, const D: usize>: Clone + Send + Sync {
    /// Constraint on the linear part for this transform type.
    const MODE: TransformMode;

    /// Assemble a transform from its parts.
    ///
    /// No validation is performed. For [`TransformMode::Isometry`] types the
    /// caller is responsible for passing an orthogonal `linear`.
    fn from_parts(linear: SMatrix<T, D, D>, translation: SVector<T, D>) -> Self;

    /// The `D×D` linear part.
    fn linear(&self) -> &SMatrix<T, D, D>;

    /// The translation part.
    fn translation(&self) -> &SVector<T, D>;

    /// Mode tag of this transform; always equal to [`Self::MODE`].
    fn mode(&self) -> TransformMode {
        Self::MODE
    }

    /// Identity transform: identity linear part, zero translation.
    fn identity() -> Self {
        Self::from_parts(SMatrix::identity(), SVector::zeros())
    }

    /// Map a point: `linear · p + translation`.
    fn transform_point(&self, p: &SVector<T, D>) -> SVector<T, D> {
        self.linear() * p + self.translation()
    }

    /// Map a direction vector (translation is ignored).
    fn transform_vector(&self, v: &SVector<T, D>) -> SVector<T, D> {
        self.linear() * v
    }

    /// The `(D+1)×(D+1)` homogeneous matrix of this transform.
    fn to_homogeneous(&self) -> DMatrix<T> {
        let mut m = DMatrix::identity(D + 1, D + 1);
        let linear = self.linear();
        let translation = self.translation();
        for r in 0..D {
            for c in 0..D {
                m[(r, c)] = linear[(r, c)];
            }
            m[(r, D)] = translation[r];
        }
        m
    }
}

// ── General (affine) transforms ─────────────────────────────────────────────

/// Affine transform with an unconstrained linear part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform<T: RealField + Copy, const D: usize> {
    pub linear: SMatrix<T, D, D>,
    pub translation: SVector<T, D>,
}

impl<T: RealField + Copy, const D: usize> AffineTransform<T, D> {
    pub fn new(linear: SMatrix<T, D, D>, translation: SVector<T, D>) -> Self {
        Self {
            linear,
            translation,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: SVector<T, D>) -> Self {
        Self::new(SMatrix::identity(), translation)
    }

    /// Inverse transform, or `None` if the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.linear.try_inverse()?;
        let translation = -(inv * self.translation);
        Some(Self::new(inv, translation))
    }

    /// Compose with another transform: `(self ∘ other)(x) = self(other(x))`.
    pub fn compose(&self, other: &Self) -> Self {
        Self::new(
            self.linear * other.linear,
            self.linear * other.translation + self.translation,
        )
    }
}

impl<T: RealField + Copy, const D: usize> WarpTransform<T, D> for AffineTransform<T, D> {
    const MODE: TransformMode = TransformMode::General;

    fn from_parts(linear: SMatrix<T, D, D>, translation: SVector<T, D>) -> Self {
        Self::new(linear, translation)
    }

    fn linear(&self) -> &SMatrix<T, D, D> {
        &self.linear
    }

    fn translation(&self) -> &SVector<T, D> {
        &self.translation
    }
}

impl<T: RealField + Copy, const D: usize> From<RigidTransform<T, D>> for AffineTransform<T, D> {
    fn from(rigid: RigidTransform<T, D>) -> Self {
        Self::new(rigid.rotation, rigid.translation)
    }
}

// ── Rigid (isometry) transforms ─────────────────────────────────────────────

/// Rigid motion: orthogonal linear part plus translation.
///
/// The orthogonality of `rotation` is an invariant that the constructors in
/// this module maintain; [`WarpTransform::from_parts`] trusts its input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform<T: RealField + Copy, const D: usize> {
    pub rotation: SMatrix<T, D, D>,
    pub translation: SVector<T, D>,
}

impl<T: RealField + Copy, const D: usize> RigidTransform<T, D> {
    /// Build a rigid transform, projecting `linear` onto the nearest
    /// orthogonal matrix first.
    pub fn new_orthonormalized(linear: SMatrix<T, D, D>, translation: SVector<T, D>) -> Self {
        Self {
            rotation: nearest_orthogonal(&linear),
            translation,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: SVector<T, D>) -> Self {
        Self {
            rotation: SMatrix::identity(),
            translation,
        }
    }

    /// Inverse rigid motion. Always exists.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        let translation = -(rotation * self.translation);
        Self {
            rotation,
            translation,
        }
    }

    /// Compose with another rigid motion: `(self ∘ other)(x) = self(other(x))`.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }
}

impl<T: RealField + Copy> RigidTransform<T, 2> {
    /// Planar rotation by `angle` radians (counter-clockwise) followed by a translation.
    pub fn from_rotation_2d(angle: T, translation: SVector<T, 2>) -> Self {
        Self {
            rotation: Rotation2::new(angle).into_inner(),
            translation,
        }
    }

    pub fn from_isometry2(iso: &Isometry2<T>) -> Self {
        Self {
            rotation: iso.rotation.to_rotation_matrix().into_inner(),
            translation: iso.translation.vector,
        }
    }

    /// Rotation angle of the linear part, in radians.
    pub fn angle(&self) -> T {
        self.rotation[(1, 0)].atan2(self.rotation[(0, 0)])
    }
}

impl<T: RealField + Copy> RigidTransform<T, 3> {
    pub fn from_isometry3(iso: &Isometry3<T>) -> Self {
        Self {
            rotation: iso.rotation.to_rotation_matrix().into_inner(),
            translation: iso.translation.vector,
        }
    }

    /// Rotation part as a unit quaternion.
    pub fn quaternion(&self) -> UnitQuaternion<T> {
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(self.rotation))
    }

    pub fn to_isometry3(&self) -> Isometry3<T> {
        Isometry3::from_parts(self.translation.into(), self.quaternion())
    }
}

impl<T: RealField + Copy, const D: usize> WarpTransform<T, D> for RigidTransform<T, D> {
    const MODE: TransformMode = TransformMode::Isometry;

    fn from_parts(linear: SMatrix<T, D, D>, translation: SVector<T, D>) -> Self {
        Self {
            rotation: linear,
            translation,
        }
    }

    fn linear(&self) -> &SMatrix<T, D, D> {
        &self.rotation
    }

    fn translation(&self) -> &SVector<T, D> {
        &self.translation
    }
}
