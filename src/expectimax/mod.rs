//! Depth-bounded expectiminimax over the 2048 game tree.
//!
//! Decision nodes take the best child over the player's valid moves; chance
//! nodes average over every empty cell receiving a 2 (p = 0.9) or a 4
//! (p = 0.1). Leaves are scored by [`static_heuristic`].
//!
//! Quick start
//! ```
//! use ai_2048_tas::engine::Board;
//! use ai_2048_tas::expectimax::{Expectiminimax, HeuristicParams};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//!
//! let params = HeuristicParams { depth: 3, ..Default::default() };
//! let mut ex = Expectiminimax::with_params(params);
//! assert!(ex.best_move(b0).is_some());
//! assert!(ex.last_stats().nodes > 0);
//! ```

use crate::engine::Board;
use crate::error::ParamError;

mod heuristic;
mod search;

pub use heuristic::{path_penalty, static_heuristic, SNAKE_PATH};
pub use search::{search, Expectiminimax};
pub(crate) use search::choose_move;

/// Hard cap on search depth; deeper requests are clamped.
pub const MAX_SEARCH_DEPTH: u32 = 10;

/// Knobs for the heuristic and the tree search.
///
/// Positional form (see [`HeuristicParams::from_slice`]):
/// `[depth, path_penalty, loss_penalty, score_factor]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicParams {
    /// Plies searched from the root, counting both decision and chance levels.
    pub depth: u32,
    /// Weight of the serpentine-path penalty.
    pub path_penalty: f64,
    /// Penalty for a board with no valid move; also the value of a stuck decision node.
    pub loss_penalty: f64,
    /// Weight of the in-game score.
    pub score_factor: f64,
    /// Evaluate root branches on the rayon pool.
    pub parallel: bool,
    /// Pick the depth from the number of empty cells (see
    /// [`HeuristicParams::depth_for`]); `depth` then acts as a cap.
    pub adaptive_depth: bool,
}

impl Default for HeuristicParams {
    fn default() -> Self {
        Self {
            depth: 5,
            path_penalty: 0.45,
            loss_penalty: 12.5,
            score_factor: 0.13,
            parallel: false,
            adaptive_depth: false,
        }
    }
}

impl HeuristicParams {
    /// Parse `[depth, path_penalty, loss_penalty, score_factor]`.
    pub fn from_slice(params: &[f64]) -> Result<Self, ParamError> {
        const NAMES: [&str; 4] = ["depth", "path_penalty", "loss_penalty", "score_factor"];
        let mut vals = [0.0; 4];
        for (i, slot) in vals.iter_mut().enumerate() {
            let v = *params
                .get(i)
                .ok_or(ParamError::Missing { index: i, name: NAMES[i] })?;
            if !v.is_finite() {
                return Err(ParamError::NotFinite { name: NAMES[i], value: v });
            }
            *slot = v;
        }
        if vals[0] < 1.0 {
            return Err(ParamError::OutOfRange { name: "depth", value: vals[0] });
        }
        Ok(Self {
            depth: vals[0] as u32,
            path_penalty: vals[1],
            loss_penalty: vals[2],
            score_factor: vals[3],
            ..Default::default()
        })
    }

    /// Depth actually used by the search.
    #[inline]
    pub fn effective_depth(&self) -> u32 { self.depth.min(MAX_SEARCH_DEPTH) }

    /// Root depth for `board`.
    ///
    /// Fixed at [`Self::effective_depth`] unless `adaptive_depth` is set, in
    /// which case crowded boards are searched deeper: 8 plies with no empty
    /// cell, 6 with at most 2, 4 with at most 8 and 3 otherwise, never above
    /// [`Self::effective_depth`].
    pub fn depth_for(&self, board: Board) -> u32 {
        let cap = self.effective_depth();
        if !self.adaptive_depth {
            return cap;
        }
        let scheduled = match board.count_empty() {
            0 => 8,
            1..=2 => 6,
            3..=8 => 4,
            _ => 3,
        };
        scheduled.min(cap)
    }
}

/// Node kind in the expectiminimax tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// The player picks the best valid move.
    Decision,
    /// The game places a random tile.
    Chance,
}

/// Per-branch value at the root.
///
/// - `ev` is the searched value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy)]
pub struct BranchEval {
    pub dir: crate::engine::Move,
    pub ev: f64,
    pub legal: bool,
}

/// Basic search stats for a single evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub nodes: u64,
    /// Root depth the evaluation ran at.
    pub depth: u32,
}
