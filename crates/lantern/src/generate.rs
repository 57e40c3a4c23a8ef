//! Uniquely-solvable board synthesis.

use crate::error::{Error, Result};
use crate::solve::{count_solutions, solve};
use crate::{Board, Cell, Pos, SynthesisParams};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Upper bound on candidate layouts examined per call.
const MAX_ATTEMPTS: usize = 64;

/// Synthesize a uniquely-solvable board.
///
/// Starting from `params.start` walls, each attempt draws a random layout,
/// solves the wall-only board, and numbers every wall with its
/// light-neighbor count from that solution (counts above [`Cell::MAX_CLUE`]
/// leave the wall unnumbered). The candidate is accepted only if the clued
/// board has exactly one solution; otherwise the wall count grows by
/// `params.step` and a fresh layout is drawn.
///
/// Deterministic in `(width, height, seed, params)`. A failed call returns
/// [`Error::SynthesisExhausted`] and produces nothing.
pub fn generate(
    width: usize,
    height: usize,
    seed: u64,
    params: &SynthesisParams,
) -> Result<Board> {
    if width == 0 || height == 0 {
        return Err(Error::EmptyBoard);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    // leave at least one open cell so the board stays a puzzle
    let max_walls = width * height - 1;
    let mut walls = params.start.min(max_walls);
    for _ in 0..MAX_ATTEMPTS {
        let candidate = random_layout(width, height, walls, &mut rng)?;
        if let Some(solution) = solve(&candidate) {
            let clued = assign_clues(&candidate, &solution)?;
            if count_solutions(&clued, 2) == 1 {
                return Ok(clued);
            }
            // ambiguous: densify and try again
            walls = (walls + params.step.max(1)).min(max_walls);
        }
    }
    Err(Error::SynthesisExhausted {
        width,
        height,
        attempts: MAX_ATTEMPTS,
    })
}

fn random_layout(
    width: usize,
    height: usize,
    walls: usize,
    rng: &mut StdRng,
) -> Result<Board> {
    let mut order: Vec<usize> = (0..width * height).collect();
    order.shuffle(rng);
    let mut rows = vec![vec![Cell::Empty; width]; height];
    for &i in &order[..walls] {
        rows[i / width][i % width] = Cell::Barrier;
    }
    Board::from_rows(rows)
}

/// Number each wall with its light-neighbor count under `solution`.
fn assign_clues(board: &Board, solution: &[Pos]) -> Result<Board> {
    let mut rows = board.rows().to_vec();
    for pos in board.positions() {
        if board.get(pos) != Cell::Barrier {
            continue;
        }
        let count = board
            .neighbors(pos)
            .filter(|n| solution.binary_search(n).is_ok())
            .count() as u8;
        if count <= Cell::MAX_CLUE {
            rows[pos.y][pos.x] = Cell::Clue(count);
        }
    }
    Board::from_rows(rows)
}
