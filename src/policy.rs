//! Call-level entry points over absolute tile values and positional parameters.
//!
//! Tiles must be 0 or powers of two up to 32768; other values are not checked
//! and give a meaningless board. `Ok(None)` means the board has no valid
//! move; callers should test for game over before asking.

use rand::Rng;

use crate::bandit::{BanditConfig, TrackAndStop};
use crate::engine::{Board, Move};
use crate::error::ParamError;
use crate::expectimax::{Expectiminimax, HeuristicParams};
use crate::montecarlo::{MeanScore, MonteCarloConfig};

/// Pick a move by expectiminimax search.
///
/// `params`: `[depth, path_penalty, loss_penalty, score_factor]`.
///
/// ```
/// use ai_2048_tas::engine::Move;
/// use ai_2048_tas::policy::choose_move_heuristic;
/// let tiles = [2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
/// let mv = choose_move_heuristic(&tiles, 0, &[3.0, 0.45, 12.5, 0.13]).unwrap();
/// assert!(mv.is_some());
/// assert_ne!(mv, Some(Move::Up));
/// ```
pub fn choose_move_heuristic(tiles: &[u32; 16], score: u64, params: &[f64]) -> Result<Option<Move>, ParamError> {
    let params = HeuristicParams::from_slice(params)?;
    let board = Board::from_values(tiles, score);
    Ok(Expectiminimax::with_params(params).best_move(board))
}

/// Pick a move by Track-and-Stop over random playouts.
///
/// `params`: `[confidence, max_trials, weight_tolerance, max_weight_iterations,
/// win_threshold, base_runs, (lookahead_horizon)]`, see [`BanditConfig::from_slice`].
pub fn choose_move_bandit<R: Rng + ?Sized>(
    tiles: &[u32; 16],
    score: u64,
    params: &[f64],
    rng: &mut R,
) -> Result<Option<Move>, ParamError> {
    let cfg = BanditConfig::from_slice(params)?;
    let board = Board::from_values(tiles, score);
    Ok(TrackAndStop::new(cfg)?.best_move(&board, rng))
}

/// Pick a move by mean playout score.
///
/// `params`: `[games, (greedy_depth)]`, see [`MonteCarloConfig::from_slice`].
pub fn choose_move_monte_carlo<R: Rng + ?Sized>(
    tiles: &[u32; 16],
    score: u64,
    params: &[f64],
    rng: &mut R,
) -> Result<Option<Move>, ParamError> {
    let cfg = MonteCarloConfig::from_slice(params)?;
    let board = Board::from_values(tiles, score);
    Ok(MeanScore::new(cfg)?.best_move(&board, rng))
}
