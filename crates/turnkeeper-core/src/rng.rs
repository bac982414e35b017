//! Seeded random streams.
//!
//! Each random effect gets its own stream derived from
//! `(game id, game seed, turn, context)`, so re-running a resolution (or
//! resuming it after a crash) replays exactly the same rolls.

use crate::types::TurnId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

pub fn stream(game_id: &str, seed: &str, turn: TurnId, context: &str) -> ChaCha8Rng {
    let turn = turn.to_string();
    let mut hasher = Sha256::new();
    for part in [game_id, seed, turn.as_str(), context] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest: [u8; 32] = hasher.finalize().into();
    ChaCha8Rng::from_seed(digest)
}

/// Uniform roll in `1..=100`.
pub fn roll_percent(rng: &mut ChaCha8Rng) -> u32 {
    rng.gen_range(1..=100)
}
