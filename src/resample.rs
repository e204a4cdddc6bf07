//! Resampling a transform set onto new support points.
//!
//! For every new support point the resampler gathers a candidate list of old
//! transforms, weighs each candidate with a [`WeightEvaluator`], and blends
//! them with [`TransformAccumulator`]. Candidate lists come from one of two
//! places:
//!
//! 1. **Neighborhood map** — one precomputed [`Neighborhood`] per output slot
//!    ([`TransformResampler::resample_from_map`]).
//! 2. **Live queries** — a [`SpatialIndex`] over the old support points is
//!    searched for every new support point
//!    ([`TransformResampler::resample_from_index`]).
//!
//! Both paths funnel through the same per-slot blend, so identical candidate
//! lists give bit-identical output.
//!
//! Output slots are independent. When parallelism is enabled the slots are
//! distributed over the rayon thread pool; inputs are only ever read, each
//! slot is written by exactly one task, and live queries use a scratch
//! neighborhood private to each task.

use std::time::Instant;

use anyhow::{bail, ensure, Result};
use nalgebra::{RealField, SVector};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::aggregate::TransformAccumulator;
use crate::neighborhood::{Neighbor, Neighborhood, NeighborhoodSpec, SpatialIndex};
use crate::transform::WarpTransform;
use crate::weight::{UniformWeight, WeightEvaluator};

// ── Configuration ───────────────────────────────────────────────────────────

/// Execution parameters for a resampling call.
#[derive(Debug, Clone)]
pub struct ResampleConfig {
    /// Distribute output slots over the rayon thread pool. Default true.
    pub parallel: bool,
    /// Below this many output slots, run sequentially even when `parallel`
    /// is set. Default 64.
    pub min_parallel_len: usize,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel_len: 64,
        }
    }
}

impl ResampleConfig {
    /// Configuration that never spawns parallel work.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    fn use_parallel(&self, num_slots: usize) -> bool {
        self.parallel && num_slots >= self.min_parallel_len
    }
}

// ── Resampler ───────────────────────────────────────────────────────────────

/// Blends old transforms into a new transform set.
///
/// The resampler holds no state between calls; it only bundles the weighting
/// policy with the execution configuration.
///
/// ```
/// use nalgebra::Vector2;
/// use warpfield::{Neighbor, RbfWeight, RigidTransform, TransformResampler, WarpTransform};
///
/// let old = vec![
///     RigidTransform::from_rotation_2d(0.0, Vector2::new(0.0, 0.0)),
///     RigidTransform::from_rotation_2d(0.3, Vector2::new(1.0, 0.0)),
/// ];
/// let map = vec![
///     vec![Neighbor::new(0, 0.0), Neighbor::new(1, 1.0)],
///     vec![],
/// ];
/// let resampler = TransformResampler::new().with_weights(RbfWeight::new(1.0));
/// let new = resampler.resample_from_map(&old, &map).unwrap();
/// assert_eq!(new.len(), 2);
/// assert_eq!(new[1], RigidTransform::identity());
/// ```
#[derive(Debug, Clone)]
pub struct TransformResampler<W = UniformWeight> {
    weights: W,
    config: ResampleConfig,
}

impl TransformResampler<UniformWeight> {
    /// Resampler with uniform weights and the default configuration.
    pub fn new() -> Self {
        Self {
            weights: UniformWeight,
            config: ResampleConfig::default(),
        }
    }
}

impl Default for TransformResampler<UniformWeight> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> TransformResampler<W> {
    /// Replace the weighting policy.
    pub fn with_weights<V>(self, weights: V) -> TransformResampler<V> {
        TransformResampler {
            weights,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: ResampleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }

    pub fn weights(&self) -> &W {
        &self.weights
    }

    /// Resample using one precomputed candidate list per output slot.
    ///
    /// The result has `new_to_old.len()` transforms.
    pub fn resample_from_map<T, const D: usize, X>(
        &self,
        old_transforms: &[X],
        new_to_old: &[Neighborhood<T>],
    ) -> Result<Vec<X>>
    where
        T: RealField + Copy,
        X: WarpTransform<T, D>,
        W: WeightEvaluator<T>,
    {
        let mut new_transforms = Vec::new();
        self.resample_from_map_into(old_transforms, new_to_old, &mut new_transforms)?;
        Ok(new_transforms)
    }

    /// [`resample_from_map`](Self::resample_from_map) writing into an existing vector.
    ///
    /// Every candidate index is checked before any output is written; on error
    /// `new_transforms` is left untouched.
    pub fn resample_from_map_into<T, const D: usize, X>(
        &self,
        old_transforms: &[X],
        new_to_old: &[Neighborhood<T>],
        new_transforms: &mut Vec<X>,
    ) -> Result<()>
    where
        T: RealField + Copy,
        X: WarpTransform<T, D>,
        W: WeightEvaluator<T>,
    {
        let t0 = Instant::now();
        for (query, nh) in new_to_old.iter().enumerate() {
            check_neighborhood(query, nh, old_transforms.len())?;
        }

        let num_slots = new_to_old.len();
        new_transforms.clear();
        new_transforms.resize(num_slots, X::identity());

        let parallel = self.config.use_parallel(num_slots);
        if parallel {
            new_transforms
                .par_iter_mut()
                .zip(new_to_old.par_iter())
                .enumerate()
                .for_each(|(query, (slot, nh))| {
                    *slot = blend_neighborhood(&self.weights, query, old_transforms, nh);
                });
        } else {
            for (query, (slot, nh)) in new_transforms.iter_mut().zip(new_to_old).enumerate() {
                *slot = blend_neighborhood(&self.weights, query, old_transforms, nh);
            }
        }

        debug!(
            "Resampled {} -> {} transforms from neighborhood map ({}) in {:.2} ms",
            old_transforms.len(),
            num_slots,
            if parallel { "parallel" } else { "sequential" },
            elapsed_ms(t0)
        );
        Ok(())
    }

    /// Resample by querying `old_support` for every point of `new_support`.
    ///
    /// `old_support` must index exactly the support points of
    /// `old_transforms`, in the same order. The result has
    /// `new_support.len()` transforms.
    pub fn resample_from_index<T, const D: usize, X, S>(
        &self,
        old_support: &S,
        old_transforms: &[X],
        new_support: &[SVector<T, D>],
        spec: &NeighborhoodSpec<T>,
    ) -> Result<Vec<X>>
    where
        T: RealField + Copy,
        X: WarpTransform<T, D>,
        S: SpatialIndex<T, D> + ?Sized,
        W: WeightEvaluator<T>,
    {
        let mut new_transforms = Vec::new();
        self.resample_from_index_into(
            old_support,
            old_transforms,
            new_support,
            spec,
            &mut new_transforms,
        )?;
        Ok(new_transforms)
    }

    /// [`resample_from_index`](Self::resample_from_index) writing into an existing vector.
    ///
    /// If the index returns an out-of-range candidate the call fails and the
    /// contents of `new_transforms` are unspecified.
    pub fn resample_from_index_into<T, const D: usize, X, S>(
        &self,
        old_support: &S,
        old_transforms: &[X],
        new_support: &[SVector<T, D>],
        spec: &NeighborhoodSpec<T>,
        new_transforms: &mut Vec<X>,
    ) -> Result<()>
    where
        T: RealField + Copy,
        X: WarpTransform<T, D>,
        S: SpatialIndex<T, D> + ?Sized,
        W: WeightEvaluator<T>,
    {
        ensure!(
            old_support.len() == old_transforms.len(),
            "spatial index holds {} support points but {} old transforms were given",
            old_support.len(),
            old_transforms.len()
        );

        let t0 = Instant::now();
        let num_slots = new_support.len();
        new_transforms.clear();
        new_transforms.resize(num_slots, X::identity());

        let fill = |scratch: &mut Neighborhood<T>,
                    (query, (slot, point)): (usize, (&mut X, &SVector<T, D>))|
         -> Result<()> {
            old_support.search(point, spec, scratch);
            check_neighborhood(query, scratch, old_transforms.len())?;
            *slot = blend_neighborhood(&self.weights, query, old_transforms, scratch);
            Ok(())
        };

        let parallel = self.config.use_parallel(num_slots);
        if parallel {
            new_transforms
                .par_iter_mut()
                .zip(new_support.par_iter())
                .enumerate()
                .try_for_each_init(Neighborhood::new, fill)?;
        } else {
            let mut scratch = Neighborhood::new();
            for item in new_transforms.iter_mut().zip(new_support).enumerate() {
                fill(&mut scratch, item)?;
            }
        }

        debug!(
            "Resampled {} -> {} transforms from spatial index ({:?}, {}) in {:.2} ms",
            old_transforms.len(),
            num_slots,
            spec,
            if parallel { "parallel" } else { "sequential" },
            elapsed_ms(t0)
        );
        Ok(())
    }
}

// ── Convenience entry points ────────────────────────────────────────────────

/// Resample from a neighborhood map with the default configuration.
pub fn resample_transforms<T, const D: usize, X, W>(
    old_transforms: &[X],
    new_to_old: &[Neighborhood<T>],
    weights: W,
) -> Result<Vec<X>>
where
    T: RealField + Copy,
    X: WarpTransform<T, D>,
    W: WeightEvaluator<T>,
{
    TransformResampler::new()
        .with_weights(weights)
        .resample_from_map(old_transforms, new_to_old)
}

/// Resample by live spatial-index queries with the default configuration.
pub fn resample_transforms_from_index<T, const D: usize, X, S, W>(
    old_support: &S,
    old_transforms: &[X],
    new_support: &[SVector<T, D>],
    spec: &NeighborhoodSpec<T>,
    weights: W,
) -> Result<Vec<X>>
where
    T: RealField + Copy,
    X: WarpTransform<T, D>,
    S: SpatialIndex<T, D> + ?Sized,
    W: WeightEvaluator<T>,
{
    TransformResampler::new()
        .with_weights(weights)
        .resample_from_index(old_support, old_transforms, new_support, spec)
}

// ── Per-slot work ───────────────────────────────────────────────────────────

/// Blend one query's candidates. Indices must already be validated.
fn blend_neighborhood<T, const D: usize, X, W>(
    weights: &W,
    query: usize,
    old_transforms: &[X],
    neighbors: &[Neighbor<T>],
) -> X
where
    T: RealField + Copy,
    X: WarpTransform<T, D>,
    W: WeightEvaluator<T>,
{
    let mut acc = TransformAccumulator::new();
    for nb in neighbors {
        let w = weights.weight(query, nb.index, nb.value);
        acc.push(w, &old_transforms[nb.index]);
    }
    if acc.total_weight() == T::zero() {
        trace!(
            "Query {} has zero total weight over {} candidates; using identity",
            query,
            neighbors.len()
        );
    }
    acc.finish()
}

fn check_neighborhood<T>(query: usize, neighbors: &[Neighbor<T>], num_old: usize) -> Result<()> {
    if let Some(bad) = neighbors.iter().find(|nb| nb.index >= num_old) {
        bail!(
            "query {}: candidate index {} is out of range for {} old transforms",
            query,
            bad.index,
            num_old
        );
    }
    Ok(())
}

fn elapsed_ms(t0: Instant) -> f64 {
    t0.elapsed().as_secs_f64() * 1000.0
}
