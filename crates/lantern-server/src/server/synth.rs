//! Synthesis seam between the pool subsystem and the puzzle engine.

use crate::server::store::PoolKey;
use lantern::Board;
use rand::Rng;

/// Produces one board for a pool key.
///
/// The pool, the dispatcher's cache-miss path, and tests all generate
/// through this trait; only [`PolicySynthesizer`] touches the engine.
/// Implementations must be pure apart from their seed draw: a failed call
/// returns an error and leaves nothing behind.
pub trait Synthesize: Send + Sync + 'static {
    fn synthesize(&self, key: &PoolKey) -> Result<Board, lantern::Error>;
}

/// Production synthesizer: difficulty-policy parameters plus a fresh
/// full-range 32-bit seed per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicySynthesizer;

impl Synthesize for PolicySynthesizer {
    fn synthesize(&self, key: &PoolKey) -> Result<Board, lantern::Error> {
        let width = key.width as usize;
        let height = key.height as usize;
        let params = key.difficulty.synthesis_params(width, height);
        let seed = rand::rng().random::<u32>();
        lantern::generate(width, height, u64::from(seed), &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern::{Difficulty, count_solutions};

    #[test]
    fn policy_synthesizer_honors_the_key() {
        let key = PoolKey {
            width: 5,
            height: 5,
            difficulty: Difficulty::Medium,
        };
        let board = PolicySynthesizer.synthesize(&key).expect("synthesis");
        assert_eq!(board.width(), 5);
        assert_eq!(board.height(), 5);
        assert_eq!(count_solutions(&board, 2), 1);
    }
}
