//! Authoritative dice-roll outcome generation
//!
//! Outcomes are decided here, once, by the server's RNG. Any tumbling-dice
//! visual a client shows must replay the face value it was given rather than
//! re-deriving it.

use rand::Rng;
use shared::DiceOutcome;

/// Rolls a single die with faces `1..=sides`, uniformly.
pub fn roll_one(rng: &mut impl Rng, sides: u32) -> DiceOutcome {
    debug_assert!(sides >= 1);
    DiceOutcome {
        sides,
        value: rng.gen_range(1..=sides),
    }
}

/// Rolls `count` independent dice. No seed sharing or correlation between
/// the draws beyond coming from the same RNG stream.
pub fn roll_set(rng: &mut impl Rng, count: usize, sides: u32) -> Vec<DiceOutcome> {
    (0..count).map(|_| roll_one(rng, sides)).collect()
}
