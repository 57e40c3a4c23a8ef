pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the puzzle engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A cell code outside the wire encoding.
    #[error("unknown cell code {0}")]
    UnknownCellCode(u8),

    /// A clue larger than an orthogonal neighborhood can satisfy.
    #[error("clue value {0} exceeds the maximum of 3")]
    ClueOutOfRange(u8),

    /// A board with no rows or no columns.
    #[error("board must have at least one row and one column")]
    EmptyBoard,

    /// Rows of differing lengths.
    #[error("board rows must all have the same length")]
    RaggedBoard,

    /// A coordinate outside the board.
    #[error("position ({x}, {y}) is outside the board")]
    OutOfBounds { x: usize, y: usize },

    /// A light aimed at a wall cell.
    #[error("cell ({x}, {y}) cannot hold a light")]
    BlockedCell { x: usize, y: usize },

    /// Synthesis ran out of candidate layouts without reaching uniqueness.
    #[error("synthesis exhausted after {attempts} attempts for a {width}x{height} board")]
    SynthesisExhausted {
        width: usize,
        height: usize,
        attempts: usize,
    },
}
