//! Random and greedy playouts used as reward signals.
//!
//! Every playout forces a first move, then alternates random spawns with
//! follow-up moves until its stopping condition. The caller's board is
//! copied; it is never mutated.
//!
//! ```
//! use ai_2048_tas::engine::{Board, Move};
//! use ai_2048_tas::rollout::{Playout, WinCondition};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(9);
//! let b = Board::from_values(&[2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0);
//! // Reaching a 4 is immediate after merging the two 2s.
//! let out = Playout::UntilWin(WinCondition::Rank(2)).run(&b, Move::Left, &mut rng);
//! assert!(out.won);
//! assert_eq!(out.moves, 1);
//! ```

use rand::seq::SliceRandom;
use rand::Rng;

use crate::engine::{Board, Move, MAX_RANK};
use crate::expectimax::{self, HeuristicParams};

// Spreads per-playout seeds derived from one base draw.
pub(crate) const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Rank the first entry of [`WinCondition::TileCounts`] refers to (256).
pub const TILE_COUNTS_BASE_RANK: u8 = 8;

/// When a playout counts as won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinCondition {
    /// Any cell reaches this rank or higher.
    Rank(u8),
    /// `counts[i]` is the minimum number of tiles of exactly rank `8 + i`
    /// (256, 512, ... 32768); every entry must be met.
    TileCounts([u8; 8]),
}

impl WinCondition {
    pub fn is_met(&self, board: &Board) -> bool {
        match self {
            WinCondition::Rank(rank) => board.max_rank() >= *rank,
            WinCondition::TileCounts(counts) => {
                let hist = board.rank_histogram();
                counts
                    .iter()
                    .enumerate()
                    .all(|(i, &need)| hist[TILE_COUNTS_BASE_RANK as usize + i] >= need)
            }
        }
    }

    /// True if some board could satisfy the condition.
    pub fn is_reachable(&self) -> bool {
        match self {
            WinCondition::Rank(rank) => *rank <= MAX_RANK,
            WinCondition::TileCounts(counts) => counts.iter().map(|&c| c as u32).sum::<u32>() <= 16,
        }
    }
}

/// Playout policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Playout {
    /// Random moves until no move remains. Never won.
    UntilLoss,
    /// Random moves until the condition holds (won) or no move remains (lost).
    UntilWin(WinCondition),
    /// Random moves; won once this many moves were made without getting stuck.
    Horizon(u32),
    /// Each follow-up move maximizes a shallow expectiminimax value.
    ///
    /// Without a goal the game is played to the end and only the score matters.
    Greedy {
        depth: u32,
        params: HeuristicParams,
        goal: Option<WinCondition>,
    },
}

impl Playout {
    /// Greedy playout with a depth-3 search and default heuristic weights.
    pub fn greedy(goal: Option<WinCondition>) -> Self {
        Playout::Greedy { depth: 3, params: HeuristicParams::default(), goal }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Playout::UntilLoss => "until-loss",
            Playout::UntilWin(_) => "until-win",
            Playout::Horizon(_) => "horizon",
            Playout::Greedy { .. } => "greedy",
        }
    }

    /// Whether `won` can differ between runs, i.e. the playout is usable as a
    /// Bernoulli reward.
    pub fn has_reward_signal(&self) -> bool {
        match self {
            Playout::UntilLoss => false,
            Playout::UntilWin(_) | Playout::Horizon(_) => true,
            Playout::Greedy { goal, .. } => goal.is_some(),
        }
    }

    /// Play out the game from `board` after forcing `first`.
    ///
    /// A `first` move that does not change the board is a loss with zero moves
    /// and draws nothing from `rng`. `Horizon(0)` is won before any move.
    pub fn run<R: Rng + ?Sized>(&self, board: &Board, first: Move, rng: &mut R) -> PlayoutResult {
        let mut game = *board;
        if let Playout::Horizon(0) = self {
            return PlayoutResult { won: true, score: game.score(), moves: 0 };
        }
        if !game.apply_move(first) {
            return PlayoutResult { won: false, score: game.score(), moves: 0 };
        }
        let mut moves = 1u32;
        loop {
            if self.reached_goal(&game, moves) {
                return PlayoutResult { won: true, score: game.score(), moves };
            }
            game.spawn_random_tile(rng);
            let valid = game.valid_moves();
            if valid.is_empty() {
                return PlayoutResult { won: false, score: game.score(), moves };
            }
            let next = match self {
                Playout::Greedy { depth, params, .. } => {
                    let shallow = HeuristicParams { depth: *depth, parallel: false, ..*params };
                    expectimax::choose_move(game, &shallow).unwrap_or(valid.as_slice()[0])
                }
                _ => *valid.as_slice().choose(rng).unwrap_or(&first),
            };
            let moved = game.apply_move(next);
            debug_assert!(moved);
            moves += 1;
        }
    }

    fn reached_goal(&self, board: &Board, moves: u32) -> bool {
        match self {
            Playout::UntilLoss => false,
            Playout::UntilWin(cond) => cond.is_met(board),
            Playout::Horizon(horizon) => moves >= *horizon,
            Playout::Greedy { goal, .. } => goal.map_or(false, |g| g.is_met(board)),
        }
    }
}

/// Terminal outcome of one playout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayoutResult {
    /// The policy's stopping condition was met before the game got stuck.
    pub won: bool,
    /// Score of the final board.
    pub score: u64,
    /// Moves made, the forced first move included.
    pub moves: u32,
}

impl PlayoutResult {
    /// Bernoulli reward: 1 for a win, 0 otherwise.
    #[inline]
    pub fn reward(&self) -> u32 { self.won as u32 }
}
