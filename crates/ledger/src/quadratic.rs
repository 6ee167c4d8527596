//! The quadratic price of vote weight

use qv_common::Amount;

/// Voice credits required for `vote_weight`: `floor(v * v / 10^18)`.
///
/// The square is taken at full precision before scaling back down, so the
/// only rounding is the final truncation toward zero. Returns `None` when the
/// result does not fit in 256 bits.
pub fn quadratic_cost(vote_weight: &Amount) -> Option<Amount> {
    let weight = vote_weight.as_biguint();
    let squared = weight * weight;
    Amount::from_biguint(squared / Amount::scale().as_biguint())
}
