//! Attribute value generation.
//!
//! `ValueGenerator` is the seam between the resolver and whatever produces
//! concrete attribute values. The default implementation is pure
//! pseudo-randomness; `FrequencyGenerator` biases choices toward values
//! observed in a prior corpus.

mod frequency;

pub use frequency::FrequencyGenerator;

use crate::model::{AttrValue, ConstraintOp};
use crate::rng::RunRng;

/// Produces a concrete value satisfying `(op, operand)` for an attribute.
///
/// Must be side-effect free and safely callable many times with different
/// operands for the same attribute: multiple constraints on one attribute
/// accumulate through [`AttrValue::combine`].
pub trait ValueGenerator {
    /// `difficulty` ∈ [0, 1] is a hook for implementations that bias how far
    /// values sit from constraint boundaries; the defaults ignore it.
    fn generate(
        &self,
        rng: &mut RunRng,
        attribute: &str,
        op: ConstraintOp,
        operand: &AttrValue,
        difficulty: f64,
    ) -> AttrValue;
}

/// Default generator: random values that satisfy the operator.
pub struct RandomGenerator;

impl ValueGenerator for RandomGenerator {
    fn generate(
        &self,
        rng: &mut RunRng,
        attribute: &str,
        op: ConstraintOp,
        operand: &AttrValue,
        _difficulty: f64,
    ) -> AttrValue {
        match op {
            ConstraintOp::Equals => operand.clone(),
            ConstraintOp::Any => AttrValue::Text(rng.token()),
            ConstraintOp::StringContains => {
                let needle = operand.as_str().unwrap_or_default();
                AttrValue::Text(format!("{} {} {}", rng.token(), needle, rng.token()))
            }
            ConstraintOp::LessThan
            | ConstraintOp::LessThanOrEqual
            | ConstraintOp::GreaterThan
            | ConstraintOp::GreaterThanOrEqual => {
                let Some(bound) = operand.as_float() else {
                    tracing::warn!(
                        attribute,
                        operand = %operand,
                        "non-numeric operand for ordering constraint; emitting fresh token"
                    );
                    return AttrValue::Text(rng.token());
                };
                AttrValue::Float(bounded_draw(rng, op, bound))
            }
        }
    }
}

/// Uniform draw from an interval anchored at `bound`, offset by one
/// significant-digit unit of the bound's magnitude so strict inequalities
/// stay strict.
fn bounded_draw(rng: &mut RunRng, op: ConstraintOp, bound: f64) -> f64 {
    let unit = sig_dig(bound);
    match op {
        ConstraintOp::LessThan => rng.uniform(0.0, bound - unit),
        ConstraintOp::LessThanOrEqual => rng.uniform(0.0, bound),
        ConstraintOp::GreaterThan => rng.uniform(bound + unit, bound + unit * 2.0),
        ConstraintOp::GreaterThanOrEqual => rng.uniform(bound, bound + unit),
        _ => unreachable!("bounded_draw only handles ordering operators"),
    }
}

/// Round a number to its most significant digit (123 → 100, 987 → 1000).
pub(crate) fn sig_dig(num: f64) -> f64 {
    if num == 0.0 {
        return 0.0;
    }
    let scale = 10f64.powf(num.abs().log10().floor());
    (num / scale).round() * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(op: ConstraintOp, operand: AttrValue) -> AttrValue {
        let mut rng = RunRng::from_seed(11);
        RandomGenerator.generate(&mut rng, "attr", op, &operand, 0.5)
    }

    #[test]
    fn test_sig_dig() {
        assert_eq!(sig_dig(123.0), 100.0);
        assert_eq!(sig_dig(987.0), 1000.0);
        assert_eq!(sig_dig(0.05), 0.05);
        assert_eq!(sig_dig(0.0), 0.0);
        assert_eq!(sig_dig(-123.0), -100.0);
    }

    #[test]
    fn test_equals_returns_operand_verbatim() {
        assert_eq!(
            generate(ConstraintOp::Equals, AttrValue::from("exact")),
            AttrValue::Text("exact".into())
        );
    }

    #[test]
    fn test_any_is_fresh_token() {
        let value = generate(ConstraintOp::Any, AttrValue::from(""));
        assert_eq!(value.as_str().unwrap().len(), 32);
    }

    #[test]
    fn test_string_contains_embeds_operand() {
        let value = generate(ConstraintOp::StringContains, AttrValue::from("needle"));
        let text = value.as_str().unwrap();
        assert!(text.split_whitespace().any(|tok| tok == "needle"));
    }

    #[test]
    fn test_ordering_ops_satisfy_their_operator() {
        let mut rng = RunRng::from_seed(42);
        for _ in 0..200 {
            let bound = 250.0;
            let operand = AttrValue::Float(bound);
            let lt = RandomGenerator
                .generate(&mut rng, "n", ConstraintOp::LessThan, &operand, 0.5)
                .as_float()
                .unwrap();
            assert!(lt < bound);

            let le = RandomGenerator
                .generate(&mut rng, "n", ConstraintOp::LessThanOrEqual, &operand, 0.5)
                .as_float()
                .unwrap();
            assert!(le <= bound);

            let gt = RandomGenerator
                .generate(&mut rng, "n", ConstraintOp::GreaterThan, &operand, 0.5)
                .as_float()
                .unwrap();
            assert!(gt > bound);

            let ge = RandomGenerator
                .generate(&mut rng, "n", ConstraintOp::GreaterThanOrEqual, &operand, 0.5)
                .as_float()
                .unwrap();
            assert!(ge >= bound);
        }
    }

    #[test]
    fn test_non_numeric_operand_degrades_to_token() {
        let value = generate(ConstraintOp::LessThan, AttrValue::from("not a number"));
        assert!(value.is_text());
    }
}
