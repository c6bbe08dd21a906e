//! Frequency-weighted attribute generation.
//!
//! Samples values from previously observed value/count statistics instead of
//! pure randomness. Frequency informs *candidacy*, not sampling weight: the
//! bucket filter decides which observed values qualify, the final pick among
//! qualifying candidates is uniform.

use super::{RandomGenerator, ValueGenerator};
use crate::lookup::{StatsCache, StatsSource};
use crate::model::{AttrValue, ConstraintOp};
use crate::rng::RunRng;

/// Corpus-statistics generator with a pure-random fallback.
///
/// An unknown attribute, an empty candidate set, or a stats source failure
/// all degrade to the default generator — generation never aborts because a
/// collaborator is unreachable.
pub struct FrequencyGenerator<S> {
    stats: StatsCache<S>,
    fallback: RandomGenerator,
}

impl<S: StatsSource> FrequencyGenerator<S> {
    pub fn new(source: S) -> Self {
        Self { stats: StatsCache::new(source), fallback: RandomGenerator }
    }

    /// Observed values for `attribute` that satisfy `(op, operand)`.
    fn candidates(&self, attribute: &str, op: ConstraintOp, operand: &AttrValue) -> Vec<AttrValue> {
        let buckets = match self.stats.fetch_or_load(attribute) {
            Ok(buckets) => buckets,
            Err(err) => {
                tracing::warn!(attribute, %err, "stats lookup failed; degrading to random generation");
                return Vec::new();
            }
        };

        buckets
            .iter()
            .filter(|(value, _count)| match op {
                ConstraintOp::Any => true,
                ConstraintOp::StringContains => {
                    let needle = operand.as_str().unwrap_or_default();
                    value
                        .as_str()
                        .is_some_and(|s| s.split_whitespace().any(|tok| tok == needle))
                }
                ConstraintOp::LessThan => numeric_pair(value, operand).is_some_and(|(v, b)| v < b),
                ConstraintOp::LessThanOrEqual => {
                    numeric_pair(value, operand).is_some_and(|(v, b)| v <= b)
                }
                ConstraintOp::GreaterThan => {
                    numeric_pair(value, operand).is_some_and(|(v, b)| v > b)
                }
                ConstraintOp::GreaterThanOrEqual => {
                    numeric_pair(value, operand).is_some_and(|(v, b)| v >= b)
                }
                ConstraintOp::Equals => false,
            })
            .map(|(value, _count)| value.clone())
            .collect()
    }
}

fn numeric_pair(value: &AttrValue, operand: &AttrValue) -> Option<(f64, f64)> {
    Some((value.as_float()?, operand.as_float()?))
}

impl<S: StatsSource> ValueGenerator for FrequencyGenerator<S> {
    fn generate(
        &self,
        rng: &mut RunRng,
        attribute: &str,
        op: ConstraintOp,
        operand: &AttrValue,
        difficulty: f64,
    ) -> AttrValue {
        // EQUALS is verbatim regardless of corpus contents.
        if op == ConstraintOp::Equals {
            return operand.clone();
        }

        let candidates = self.candidates(attribute, op, operand);
        match rng.choose(&candidates) {
            Some(value) => value.clone(),
            None => self.fallback.generate(rng, attribute, op, operand, difficulty),
        }
    }
}
