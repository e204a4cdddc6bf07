//! Weight evaluators: how much each candidate contributes to a query.
//!
//! An evaluator maps `(query_index, candidate_index, value)` to a weight,
//! where `value` is whatever the neighborhood carries (squared distance for
//! [`SpatialIndex`](crate::SpatialIndex) results).
//!
//! Weights must be finite and lie in `[0, ∞)`. Zero means "ignore this
//! candidate". The aggregator does not sanitize weights; negative or
//! non-finite values produce meaningless transforms.

use nalgebra::RealField;

/// Weighting policy used by the resampler.
pub trait WeightEvaluator<T>: Sync {
    fn weight(&self, query: usize, candidate: usize, value: T) -> T;
}

/// Every candidate gets weight 1. The default policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformWeight;

impl<T: RealField + Copy> WeightEvaluator<T> for UniformWeight {
    fn weight(&self, _query: usize, _candidate: usize, _value: T) -> T {
        T::one()
    }
}

/// Gaussian (RBF) kernel on squared distance: `exp(-value / (2σ²))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RbfWeight<T> {
    pub sigma: T,
}

impl<T: RealField + Copy> RbfWeight<T> {
    pub fn new(sigma: T) -> Self {
        Self { sigma }
    }
}

impl<T: RealField + Copy> WeightEvaluator<T> for RbfWeight<T> {
    fn weight(&self, _query: usize, _candidate: usize, value: T) -> T {
        let two = T::one() + T::one();
        (-value / (two * self.sigma * self.sigma)).exp()
    }
}

/// Inverse distance on squared distance: `1 / (√value + ε)`.
///
/// `epsilon` keeps the weight finite when a candidate coincides with the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseDistanceWeight<T> {
    pub epsilon: T,
}

impl<T: RealField + Copy> InverseDistanceWeight<T> {
    pub fn new(epsilon: T) -> Self {
        Self { epsilon }
    }
}

impl<T: RealField + Copy> WeightEvaluator<T> for InverseDistanceWeight<T> {
    fn weight(&self, _query: usize, _candidate: usize, value: T) -> T {
        T::one() / (value.max(T::zero()).sqrt() + self.epsilon)
    }
}

impl<T, F> WeightEvaluator<T> for F
where
    F: Fn(usize, usize, T) -> T + Sync,
{
    fn weight(&self, query: usize, candidate: usize, value: T) -> T {
        self(query, candidate, value)
    }
}
