//! Move choice by mean playout score.
//!
//! Every valid move is followed by `games` playouts and scored by the mean
//! final score; the highest mean wins, ties going to the earlier move in
//! [`Move::ALL`] order. Any [`Playout`] works here, including the ones that
//! only report a score ([`Playout::UntilLoss`], goal-less greedy).
//!
//! ```
//! use ai_2048_tas::engine::Board;
//! use ai_2048_tas::montecarlo::{MeanScore, MonteCarloConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(5);
//! let board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let mc = MeanScore::new(MonteCarloConfig { games: 8, ..Default::default() }).unwrap();
//! let dir = mc.best_move(&board, &mut rng).unwrap();
//! assert!(board.valid_moves().contains(dir));
//! ```

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::engine::{Board, Move};
use crate::error::ParamError;
use crate::expectimax::HeuristicParams;
use crate::rollout::{Playout, SEED_STRIDE};

/// Settings for [`MeanScore`].
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloConfig {
    /// Playouts per valid move.
    pub games: u32,
    /// Policy for the moves after the forced one.
    pub playout: Playout,
    /// Run the playouts on the rayon pool.
    pub parallel: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self { games: 100, playout: Playout::UntilLoss, parallel: false }
    }
}

impl MonteCarloConfig {
    /// Parse `[games, (greedy_depth)]`.
    ///
    /// A positive second entry switches to goal-less greedy playouts searched
    /// that many plies deep; otherwise playouts are random until loss.
    pub fn from_slice(params: &[f64]) -> Result<Self, ParamError> {
        const NAMES: [&str; 2] = ["games", "greedy_depth"];
        let mut counts = [0u32; 2];
        for (i, slot) in counts.iter_mut().enumerate().take(params.len().max(1)) {
            let v = *params.get(i).ok_or(ParamError::Missing { index: i, name: NAMES[i] })?;
            if !v.is_finite() {
                return Err(ParamError::NotFinite { name: NAMES[i], value: v });
            }
            if v < 0.0 || v > u32::MAX as f64 || v.fract() != 0.0 {
                return Err(ParamError::OutOfRange { name: NAMES[i], value: v });
            }
            *slot = v as u32;
        }
        let playout = match counts[1] {
            0 => Playout::UntilLoss,
            depth => Playout::Greedy { depth, params: HeuristicParams::default(), goal: None },
        };
        let cfg = Self { games: counts[0], playout, ..Default::default() };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.games == 0 {
            return Err(ParamError::OutOfRange { name: "games", value: 0.0 });
        }
        Ok(())
    }
}

/// Mean playout score after one valid move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveScore {
    pub dir: Move,
    pub mean_score: f64,
    /// Playouts whose stopping condition was met.
    pub wins: u32,
}

/// Monte-Carlo chooser over mean playout scores.
#[derive(Debug, Clone)]
pub struct MeanScore {
    cfg: MonteCarloConfig,
}

impl MeanScore {
    pub fn new(cfg: MonteCarloConfig) -> Result<Self, ParamError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Move with the highest mean score, or `None` when the board has no valid move.
    pub fn best_move<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Move> {
        let scores = self.move_scores(board, rng);
        let mut best: Option<&MoveScore> = None;
        for s in &scores {
            match best {
                Some(b) if b.mean_score >= s.mean_score => {}
                _ => best = Some(s),
            }
        }
        best.map(|s| s.dir)
    }

    /// One entry per valid move, in [`Move::ALL`] order.
    ///
    /// Each playout runs on its own generator seeded from a single draw of
    /// `rng`, so the parallel and sequential paths agree.
    pub fn move_scores<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Vec<MoveScore> {
        let moves = board.valid_moves();
        if moves.is_empty() {
            return Vec::new();
        }
        let games = self.cfg.games as usize;
        let total = moves.len() * games;
        let base_seed: u64 = rng.gen();
        let play = |job: usize| -> (usize, u64, bool) {
            let arm = job / games;
            let mut sub = StdRng::seed_from_u64(base_seed.wrapping_add((job as u64).wrapping_mul(SEED_STRIDE)));
            let out = self.cfg.playout.run(board, moves.as_slice()[arm], &mut sub);
            (arm, out.score, out.won)
        };
        let results: Vec<(usize, u64, bool)> = if self.cfg.parallel {
            (0..total).into_par_iter().map(play).collect()
        } else {
            (0..total).map(play).collect()
        };

        let mut sums = vec![0u64; moves.len()];
        let mut wins = vec![0u32; moves.len()];
        for (arm, score, won) in results {
            sums[arm] += score;
            wins[arm] += won as u32;
        }
        let scores: Vec<MoveScore> = moves
            .iter()
            .zip(sums.iter().zip(wins.iter()))
            .map(|(dir, (&sum, &w))| MoveScore { dir, mean_score: sum as f64 / games as f64, wins: w })
            .collect();
        debug!(
            "mean-score: {} playouts ({}), {:?}",
            total,
            self.cfg.playout.name(),
            scores.iter().map(|s| (s.dir, s.mean_score)).collect::<Vec<_>>()
        );
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollout::WinCondition;

    fn start(seed: u64) -> (Board, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        (b, rng)
    }

    #[test]
    fn scores_every_valid_move() {
        let (b, mut rng) = start(1);
        let mc = MeanScore::new(MonteCarloConfig { games: 6, ..Default::default() }).unwrap();
        let scores = mc.move_scores(&b, &mut rng);
        let dirs: Vec<Move> = scores.iter().map(|s| s.dir).collect();
        assert_eq!(dirs, b.valid_moves().as_slice());
        assert!(scores.iter().all(|s| s.mean_score > 0.0));
        // Playouts to loss never count as wins.
        assert!(scores.iter().all(|s| s.wins == 0));
    }

    #[test]
    fn stuck_board_has_no_move() {
        let mut rng = StdRng::seed_from_u64(2);
        let mc = MeanScore::new(MonteCarloConfig { games: 4, ..Default::default() }).unwrap();
        let stuck = Board::from_raw(0x1212_2121_1212_2121, 0);
        assert!(mc.move_scores(&stuck, &mut rng).is_empty());
        assert_eq!(mc.best_move(&stuck, &mut rng), None);
    }

    #[test]
    fn parallel_matches_sequential() {
        let (b, _) = start(3);
        let seq = MonteCarloConfig { games: 5, ..Default::default() };
        let par = MonteCarloConfig { parallel: true, ..seq.clone() };
        let a = MeanScore::new(seq).unwrap().move_scores(&b, &mut StdRng::seed_from_u64(4));
        let c = MeanScore::new(par).unwrap().move_scores(&b, &mut StdRng::seed_from_u64(4));
        assert_eq!(a, c);
    }

    #[test]
    fn counts_wins_for_goal_playouts() {
        let (b, mut rng) = start(4);
        let cfg = MonteCarloConfig { games: 5, playout: Playout::Horizon(3), ..Default::default() };
        let scores = MeanScore::new(cfg).unwrap().move_scores(&b, &mut rng);
        assert!(scores.iter().all(|s| s.wins == 5));

        let cfg = MonteCarloConfig {
            games: 3,
            playout: Playout::UntilWin(WinCondition::Rank(15)),
            ..Default::default()
        };
        let scores = MeanScore::new(cfg).unwrap().move_scores(&b, &mut rng);
        assert!(scores.iter().all(|s| s.wins == 0));
    }

    #[test]
    fn picks_the_merge_on_a_crowded_board() {
        // Left/Right merge the 1024s; the final score dominates every playout.
        let b = Board::from_raw(0xaa12_2121_1212_2121, 0);
        let mut rng = StdRng::seed_from_u64(6);
        let mc = MeanScore::new(MonteCarloConfig { games: 4, ..Default::default() }).unwrap();
        let dir = mc.best_move(&b, &mut rng).unwrap();
        assert!(matches!(dir, Move::Left | Move::Right));
    }

    #[test]
    fn parses_positional_params() {
        let cfg = MonteCarloConfig::from_slice(&[40.0]).unwrap();
        assert_eq!(cfg.games, 40);
        assert_eq!(cfg.playout, Playout::UntilLoss);

        let cfg = MonteCarloConfig::from_slice(&[10.0, 2.0]).unwrap();
        assert!(matches!(cfg.playout, Playout::Greedy { depth: 2, goal: None, .. }));

        assert!(matches!(MonteCarloConfig::from_slice(&[]), Err(ParamError::Missing { index: 0, .. })));
        assert!(matches!(MonteCarloConfig::from_slice(&[0.0]), Err(ParamError::OutOfRange { name: "games", .. })));
        assert!(matches!(MonteCarloConfig::from_slice(&[2.5]), Err(ParamError::OutOfRange { name: "games", .. })));
    }
}
