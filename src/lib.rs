//! # warpfield
//!
//! Resampling of sparse **warp fields**: sets of rigid or affine transforms
//! anchored at support points.
//!
//! Deformable registration and non-rigid warping pipelines typically estimate
//! motion on a sparse set of control nodes and then need it somewhere else,
//! usually at every point of a dense cloud. `warpfield` moves a transform set
//! from its "old" support points to a set of "new" support points by blending
//! nearby old transforms with caller-chosen weights.
//!
//! ## Example
//!
//! ```
//! use nalgebra::Vector3;
//! use warpfield::{
//!     KdTreeIndex, NeighborhoodSpec, RbfWeight, RigidTransform, TransformResampler,
//! };
//!
//! // Sparse control nodes, each with a rigid motion
//! let nodes = vec![
//!     Vector3::new(0.0, 0.0, 0.0),
//!     Vector3::new(1.0, 0.0, 0.0),
//!     Vector3::new(0.0, 1.0, 0.0),
//! ];
//! let node_motion = vec![
//!     RigidTransform::from_translation(Vector3::new(0.1, 0.0, 0.0)),
//!     RigidTransform::from_translation(Vector3::new(0.0, 0.1, 0.0)),
//!     RigidTransform::from_translation(Vector3::new(0.0, 0.0, 0.1)),
//! ];
//!
//! // Dense points that should follow the nodes
//! let dense = vec![Vector3::new(0.2, 0.2, 0.0), Vector3::new(0.9, 0.1, 0.0)];
//!
//! let index = KdTreeIndex::new(&nodes);
//! let resampler = TransformResampler::new().with_weights(RbfWeight::new(0.5));
//! let dense_motion = resampler
//!     .resample_from_index(&index, &node_motion, &dense, &NeighborhoodSpec::knn(2))
//!     .unwrap();
//! assert_eq!(dense_motion.len(), dense.len());
//!
//! let moved = warpfield::warp_points(&dense_motion, &dense).unwrap();
//! assert_eq!(moved.len(), dense.len());
//! ```
//!
//! ## Algorithm
//!
//! For each new support point:
//!
//! 1. **Candidates** — take its neighborhood from a precomputed map, or query
//!    a [`SpatialIndex`] over the old support points.
//! 2. **Weights** — evaluate a [`WeightEvaluator`] per candidate.
//! 3. **Blend** — weighted mean of linear parts and of translations.
//! 4. **Project** — for rigid transforms, replace the mean linear part with
//!    the nearest orthogonal matrix (SVD polar factor).
//!
//! A zero total weight gives the identity transform for that slot.
//!
//! Slots are independent and are computed on the rayon thread pool unless
//! [`ResampleConfig`] says otherwise.

pub mod aggregate;
pub mod kdtree;
pub mod neighborhood;
pub mod resample;
pub mod transform;
pub mod warp;
pub mod weight;

pub use aggregate::{aggregate_transforms, nearest_orthogonal, TransformAccumulator};
pub use kdtree::{KdScalar, KdTreeIndex};
pub use neighborhood::{Neighbor, Neighborhood, NeighborhoodSpec, SpatialIndex};
pub use resample::{
    resample_transforms, resample_transforms_from_index, ResampleConfig, TransformResampler,
};
pub use transform::{AffineTransform, RigidTransform, TransformMode, WarpTransform};
pub use warp::warp_points;
pub use weight::{InverseDistanceWeight, RbfWeight, UniformWeight, WeightEvaluator};

// Commonly used types
pub type Rigid2 = RigidTransform<f64, 2>;
pub type Rigid3 = RigidTransform<f64, 3>;
pub type Affine2 = AffineTransform<f64, 2>;
pub type Affine3 = AffineTransform<f64, 3>;
pub type Point2 = nalgebra::Vector2<f64>;
pub type Point3 = nalgebra::Vector3<f64>;
