//! k-d tree [`SpatialIndex`] over support points.
//!
//! Wraps a `kiddo` immutable k-d tree, built in one pass from the support
//! points. The immutable tree tolerates many points sharing a coordinate on
//! an axis (planar patches, duplicated points). Items stored in the tree are
//! the positions of the points in the slice the index was built from, so
//! search results index directly into the matching transform set. Values are
//! squared Euclidean distances.

use kiddo::float::kdtree::Axis;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::{RealField, SVector};
use tracing::debug;

use crate::neighborhood::{Neighbor, Neighborhood, NeighborhoodSpec, SpatialIndex};

/// Scalar types the k-d tree backend is available for (`f32`, `f64`).
pub trait KdScalar: RealField + Copy + Axis {
    #[doc(hidden)]
    type Tree<const D: usize>: Send + Sync;

    #[doc(hidden)]
    fn build_tree<const D: usize>(points: &[[Self; D]]) -> Self::Tree<D>;

    #[doc(hidden)]
    fn nearest_n<const D: usize>(
        tree: &Self::Tree<D>,
        query: &[Self; D],
        k: usize,
        out: &mut Neighborhood<Self>,
    );

    #[doc(hidden)]
    fn within<const D: usize>(
        tree: &Self::Tree<D>,
        query: &[Self; D],
        squared_radius: Self,
        out: &mut Neighborhood<Self>,
    );
}

macro_rules! impl_kd_scalar {
    ($t:ty) => {
        impl KdScalar for $t {
            type Tree<const D: usize> = ImmutableKdTree<$t, D>;

            fn build_tree<const D: usize>(points: &[[$t; D]]) -> Self::Tree<D> {
                ImmutableKdTree::new_from_slice(points)
            }

            fn nearest_n<const D: usize>(
                tree: &Self::Tree<D>,
                query: &[$t; D],
                k: usize,
                out: &mut Neighborhood<$t>,
            ) {
                out.extend(
                    tree.nearest_n::<SquaredEuclidean>(query, k)
                        .into_iter()
                        .map(|n| Neighbor::new(n.item as usize, n.distance)),
                );
            }

            fn within<const D: usize>(
                tree: &Self::Tree<D>,
                query: &[$t; D],
                squared_radius: $t,
                out: &mut Neighborhood<$t>,
            ) {
                out.extend(
                    tree.within::<SquaredEuclidean>(query, squared_radius)
                        .into_iter()
                        .map(|n| Neighbor::new(n.item as usize, n.distance)),
                );
            }
        }
    };
}

impl_kd_scalar!(f32);
impl_kd_scalar!(f64);

/// Spatial index backed by a k-d tree.
pub struct KdTreeIndex<T: KdScalar, const D: usize> {
    // kiddo cannot build a tree from zero points
    tree: Option<T::Tree<D>>,
    len: usize,
}

impl<T: KdScalar, const D: usize> KdTreeIndex<T, D> {
    /// Build an index over `points`. Point `i` is reported as index `i`.
    pub fn new(points: &[SVector<T, D>]) -> Self {
        let tree = if points.is_empty() {
            None
        } else {
            let coords: Vec<[T; D]> = points.iter().map(to_array).collect();
            Some(T::build_tree(&coords))
        };
        debug!("Built k-d tree over {} support points", points.len());
        Self {
            tree,
            len: points.len(),
        }
    }
}

impl<T: KdScalar, const D: usize> SpatialIndex<T, D> for KdTreeIndex<T, D> {
    fn len(&self) -> usize {
        self.len
    }

    fn search(&self, query: &SVector<T, D>, spec: &NeighborhoodSpec<T>, out: &mut Neighborhood<T>) {
        out.clear();
        let Some(tree) = &self.tree else {
            return;
        };
        if !spec.is_satisfiable() {
            return;
        }
        let q = to_array(query);
        match *spec {
            NeighborhoodSpec::Knn { k } => T::nearest_n(tree, &q, k.min(self.len), out),
            NeighborhoodSpec::Radius { radius } => T::within(tree, &q, radius * radius, out),
            NeighborhoodSpec::KnnInRadius { k, radius } => {
                let r2 = radius * radius;
                T::nearest_n(tree, &q, k.min(self.len), out);
                out.retain(|n| n.value <= r2);
            }
        }
    }
}

fn to_array<T: RealField + Copy, const D: usize>(p: &SVector<T, D>) -> [T; D] {
    std::array::from_fn(|i| p[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn grid_points() -> Vec<Vector3<f64>> {
        let mut pts = Vec::new();
        for x in 0..5 {
            for y in 0..4 {
                for z in 0..3 {
                    // slight jitter keeps distances distinct
                    let j = 0.013 * (x * 12 + y * 3 + z) as f64;
                    pts.push(Vector3::new(x as f64 + j, y as f64 - 0.5 * j, z as f64 + 0.25 * j));
                }
            }
        }
        pts
    }

    fn brute_force(points: &[Vector3<f64>], q: &Vector3<f64>) -> Vec<(usize, f64)> {
        let mut all: Vec<(usize, f64)> = points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, (p - q).norm_squared()))
            .collect();
        all.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        all
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let pts = grid_points();
        let index = KdTreeIndex::new(&pts);
        assert_eq!(index.len(), pts.len());

        let q = Vector3::new(1.7, 2.2, 0.9);
        let mut nh = Neighborhood::new();
        index.search(&q, &NeighborhoodSpec::knn(6), &mut nh);
        let expected = brute_force(&pts, &q);
        assert_eq!(nh.len(), 6);
        for (got, want) in nh.iter().zip(expected.iter()) {
            assert_eq!(got.index, want.0);
            assert!((got.value - want.1).abs() < 1e-12);
        }
    }

    #[test]
    fn test_radius_matches_brute_force() {
        let pts = grid_points();
        let index = KdTreeIndex::new(&pts);
        let q = Vector3::new(2.1, 1.4, 1.3);
        let radius = 1.37;

        let mut nh = Neighborhood::new();
        index.search(&q, &NeighborhoodSpec::radius(radius), &mut nh);
        let mut got: Vec<usize> = nh.iter().map(|n| n.index).collect();
        got.sort_unstable();
        let mut want: Vec<usize> = brute_force(&pts, &q)
            .into_iter()
            .filter(|(_, d)| *d <= radius * radius)
            .map(|(i, _)| i)
            .collect();
        want.sort_unstable();
        assert!(!want.is_empty());
        assert_eq!(got, want);
    }

    #[test]
    fn test_knn_in_radius_caps_both() {
        let pts = grid_points();
        let index = KdTreeIndex::new(&pts);
        let q = Vector3::new(0.1, 0.1, 0.1);
        let mut nh = Neighborhood::new();

        // radius is the binding constraint
        index.search(&q, &NeighborhoodSpec::knn_in_radius(50, 1.05), &mut nh);
        assert!(nh.iter().all(|n| n.value <= 1.05 * 1.05));
        let within = brute_force(&pts, &q)
            .into_iter()
            .filter(|(_, d)| *d <= 1.05 * 1.05)
            .count();
        assert_eq!(nh.len(), within);

        // k is the binding constraint
        index.search(&q, &NeighborhoodSpec::knn_in_radius(2, 100.0), &mut nh);
        assert_eq!(nh.len(), 2);
    }

    #[test]
    fn test_empty_and_zero_k() {
        let empty: KdTreeIndex<f64, 3> = KdTreeIndex::new(&[]);
        let mut nh = vec![Neighbor::new(7, 1.0)];
        empty.search(&Vector3::zeros(), &NeighborhoodSpec::knn(3), &mut nh);
        assert!(nh.is_empty());

        let index = KdTreeIndex::new(&grid_points());
        index.search(&Vector3::zeros(), &NeighborhoodSpec::knn(0), &mut nh);
        assert!(nh.is_empty());
    }

    #[test]
    fn test_search_all_matches_single_queries() {
        let pts = grid_points();
        let index = KdTreeIndex::new(&pts);
        let queries = vec![Vector3::new(0.5, 0.5, 0.5), Vector3::new(3.2, 2.9, 1.1)];
        let spec = NeighborhoodSpec::knn(4);
        let map = index.search_all(&queries, &spec);
        assert_eq!(map.len(), queries.len());
        for (q, nh) in queries.iter().zip(map.iter()) {
            let mut single = Neighborhood::new();
            index.search(q, &spec, &mut single);
            assert_eq!(&single, nh);
        }
    }

    #[test]
    fn test_negative_radius_is_empty() {
        let index = KdTreeIndex::new(&grid_points());
        let mut nh = Neighborhood::new();
        index.search(&Vector3::new(1.0, 1.0, 1.0), &NeighborhoodSpec::radius(-2.0), &mut nh);
        assert!(nh.is_empty());
        index.search(
            &Vector3::new(1.0, 1.0, 1.0),
            &NeighborhoodSpec::knn_in_radius(5, -2.0),
            &mut nh,
        );
        assert!(nh.is_empty());
    }

    #[test]
    fn test_planar_grid() {
        // every point shares z = 0, far more than one tree bucket
        let pts: Vec<Vector3<f64>> = (0..20)
            .flat_map(|x| (0..20).map(move |y| Vector3::new(x as f64, y as f64, 0.0)))
            .collect();
        let index = KdTreeIndex::new(&pts);
        assert_eq!(index.len(), 400);

        let q = Vector3::new(7.2, 11.9, 0.3);
        let mut nh = Neighborhood::new();
        index.search(&q, &NeighborhoodSpec::knn(1), &mut nh);
        assert_eq!(nh.len(), 1);
        assert_eq!(pts[nh[0].index], Vector3::new(7.0, 12.0, 0.0));

        index.search(&q, &NeighborhoodSpec::radius(1.5), &mut nh);
        let want = brute_force(&pts, &q)
            .into_iter()
            .filter(|(_, d)| *d <= 1.5 * 1.5)
            .count();
        assert_eq!(nh.len(), want);
    }

    #[test]
    fn test_duplicate_points() {
        let pts = vec![Vector3::new(1.0, 2.0, 3.0); 40];
        let index = KdTreeIndex::new(&pts);
        assert_eq!(index.len(), 40);

        let mut nh: Neighborhood<f64> = Neighborhood::new();
        index.search(&Vector3::new(1.0, 2.0, 3.5), &NeighborhoodSpec::knn(10), &mut nh);
        assert_eq!(nh.len(), 10);
        assert!(nh.iter().all(|n| n.index < 40 && (n.value - 0.25).abs() < 1e-12));

        index.search(&Vector3::new(1.0, 2.0, 3.0), &NeighborhoodSpec::radius(0.1), &mut nh);
        let mut got: Vec<usize> = nh.iter().map(|n| n.index).collect();
        got.sort_unstable();
        assert_eq!(got, (0..40).collect::<Vec<_>>());
    }
}
