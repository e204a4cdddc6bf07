//! Candidate lists and the spatial-index seam.
//!
//! A [`Neighborhood`] is the ordered list of old support points that
//! contribute to one query, each tagged with a value (by convention the
//! squared Euclidean distance to the query). A slice of neighborhoods, one per
//! new support point, is a *neighborhood map*.
//!
//! Anything that can answer neighborhood queries over the old support points
//! implements [`SpatialIndex`]; [`KdTreeIndex`](crate::KdTreeIndex) is the
//! bundled implementation.

use nalgebra::{RealField, SVector};
use rayon::prelude::*;

/// One candidate of a neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<T> {
    /// Index into the old support set (and the old transform set).
    pub index: usize,
    /// Associated value, usually the squared distance to the query.
    pub value: T,
}

impl<T> Neighbor<T> {
    pub fn new(index: usize, value: T) -> Self {
        Self { index, value }
    }
}

/// Ordered candidate list for a single query.
pub type Neighborhood<T> = Vec<Neighbor<T>>;

/// Which neighbors a query should return.
///
/// A negative (or NaN) radius, or `k == 0`, selects nothing: searches with such
/// a spec return an empty neighborhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NeighborhoodSpec<T> {
    /// The `k` nearest points.
    Knn { k: usize },
    /// All points within `radius` (Euclidean distance, not squared).
    Radius { radius: T },
    /// At most `k` nearest points, restricted to those within `radius`.
    KnnInRadius { k: usize, radius: T },
}

impl<T: RealField + Copy> NeighborhoodSpec<T> {
    pub fn knn(k: usize) -> Self {
        Self::Knn { k }
    }

    pub fn radius(radius: T) -> Self {
        Self::Radius { radius }
    }

    pub fn knn_in_radius(k: usize, radius: T) -> Self {
        Self::KnnInRadius { k, radius }
    }

    /// `false` when no point can satisfy the spec (`k == 0`, or a radius
    /// that is negative or NaN).
    pub fn is_satisfiable(&self) -> bool {
        match *self {
            Self::Knn { k } => k > 0,
            Self::Radius { radius } => radius >= T::zero(),
            Self::KnnInRadius { k, radius } => k > 0 && radius >= T::zero(),
        }
    }

    /// Squared radius bound, if the spec has one.
    pub fn squared_radius(&self) -> Option<T> {
        match *self {
            Self::Knn { .. } => None,
            Self::Radius { radius } | Self::KnnInRadius { radius, .. } => Some(radius * radius),
        }
    }
}

/// Neighbor search over a fixed set of support points.
///
/// Implementations must be safe to query from many threads at once; the
/// resampler shares one index across all of its workers.
pub trait SpatialIndex<T: RealField + Copy, const D: usize>: Sync {
    /// Number of indexed support points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the neighbors of `query` according to `spec`.
    ///
    /// `out` is cleared first, then filled in ascending order of value.
    /// Every returned index must be `< self.len()`.
    fn search(&self, query: &SVector<T, D>, spec: &NeighborhoodSpec<T>, out: &mut Neighborhood<T>);

    /// Run [`search`](Self::search) for every query, producing a neighborhood map.
    fn search_all(
        &self,
        queries: &[SVector<T, D>],
        spec: &NeighborhoodSpec<T>,
    ) -> Vec<Neighborhood<T>> {
        queries
            .par_iter()
            .map(|q| {
                let mut nh = Neighborhood::new();
                self.search(q, spec, &mut nh);
                nh
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_radius() {
        assert_eq!(NeighborhoodSpec::<f64>::knn(4).squared_radius(), None);
        assert_eq!(NeighborhoodSpec::radius(3.0).squared_radius(), Some(9.0));
        assert_eq!(
            NeighborhoodSpec::knn_in_radius(2, 0.5).squared_radius(),
            Some(0.25)
        );
    }

    #[test]
    fn test_satisfiable() {
        assert!(NeighborhoodSpec::<f64>::knn(1).is_satisfiable());
        assert!(!NeighborhoodSpec::<f64>::knn(0).is_satisfiable());
        assert!(NeighborhoodSpec::radius(0.0).is_satisfiable());
        assert!(!NeighborhoodSpec::radius(-1.0).is_satisfiable());
        assert!(!NeighborhoodSpec::radius(f64::NAN).is_satisfiable());
        assert!(!NeighborhoodSpec::knn_in_radius(3, -0.5).is_satisfiable());
        assert!(!NeighborhoodSpec::knn_in_radius(0, 2.0).is_satisfiable());
    }
}
