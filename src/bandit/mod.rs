//! Track-and-Stop best-arm identification over playout rewards.
//!
//! Each valid move is an arm; pulling an arm runs one [`Playout`] after
//! forcing that move and scores 1 for a win, 0 otherwise. The loop samples
//! arms by forced exploration or D-tracking toward the optimal proportions
//! from [`WeightSolver`] and stops once a KL-based statistic separates the
//! empirical best arm at confidence `1 - confidence`.
//!
//! ```
//! use ai_2048_tas::bandit::{BanditConfig, TrackAndStop};
//! use ai_2048_tas::engine::Board;
//! use ai_2048_tas::rollout::{Playout, WinCondition};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let cfg = BanditConfig {
//!     max_trials: 200,
//!     playout: Playout::UntilWin(WinCondition::Rank(6)),
//!     ..Default::default()
//! };
//! let tas = TrackAndStop::new(cfg).unwrap();
//! let decision = tas.run(&board, &mut rng).unwrap();
//! assert!(board.valid_moves().contains(decision.dir));
//! assert!(decision.samples <= 200);
//! ```

use std::time::Duration;

use crate::error::ParamError;
use crate::rollout::{Playout, WinCondition};

mod kl;
mod track;
mod weights;

pub use kl::kl_bernoulli;
pub use track::{ArmStats, Decision, Identification, RewardSource, StopReason, TrackAndStop};
pub use weights::WeightSolver;

/// Settings for one Track-and-Stop invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BanditConfig {
    /// Error probability δ of the identified best arm, in (0, 1).
    pub confidence: f64,
    /// Sample budget, base runs included. When exhausted the empirical best is returned.
    pub max_trials: u32,
    /// Root-finding settings for the optimal weights.
    pub solver: WeightSolver,
    /// Reward source for each arm pull.
    pub playout: Playout,
    /// Pulls per arm before the round loop starts.
    pub base_runs: u32,
    /// Run the base pulls on the rayon pool.
    pub parallel: bool,
    /// Wall-clock guard for the whole invocation.
    pub time_budget: Option<Duration>,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            confidence: 0.05,
            max_trials: 1000,
            solver: WeightSolver::default(),
            playout: Playout::UntilWin(WinCondition::Rank(8)),
            base_runs: 4,
            parallel: false,
            time_budget: None,
        }
    }
}

const POSITIONAL_NAMES: [&str; 7] = [
    "confidence",
    "max_trials",
    "weight_tolerance",
    "max_weight_iterations",
    "win_threshold",
    "base_runs",
    "lookahead_horizon",
];

impl BanditConfig {
    /// Parse the positional form
    /// `[confidence, max_trials, weight_tolerance, max_weight_iterations, win_threshold, base_runs, (lookahead_horizon)]`.
    ///
    /// `win_threshold` is a whole rank (11 means a 2048 tile). With a seventh entry
    /// the playout is [`Playout::Horizon`] of that many moves and the threshold
    /// is ignored; otherwise it is [`Playout::UntilWin`] on the rank.
    pub fn from_slice(params: &[f64]) -> Result<Self, ParamError> {
        let get = |i: usize| -> Result<f64, ParamError> {
            let v = *params
                .get(i)
                .ok_or(ParamError::Missing { index: i, name: POSITIONAL_NAMES[i] })?;
            if !v.is_finite() {
                return Err(ParamError::NotFinite { name: POSITIONAL_NAMES[i], value: v });
            }
            Ok(v)
        };
        let count = |i: usize| -> Result<u32, ParamError> {
            let v = get(i)?;
            if v < 0.0 || v > u32::MAX as f64 {
                return Err(ParamError::OutOfRange { name: POSITIONAL_NAMES[i], value: v });
            }
            Ok(v as u32)
        };

        let confidence = get(0)?;
        let max_trials = count(1)?;
        let solver = WeightSolver::new(get(2)?, count(3)?);
        let threshold = get(4)?;
        let base_runs = count(5)?;
        let playout = if params.len() > 6 {
            Playout::Horizon(count(6)?)
        } else {
            if !(0.0..=crate::engine::MAX_RANK as f64).contains(&threshold) || threshold.fract() != 0.0 {
                return Err(ParamError::OutOfRange { name: POSITIONAL_NAMES[4], value: threshold });
            }
            Playout::UntilWin(WinCondition::Rank(threshold as u8))
        };

        let cfg = Self { confidence, max_trials, solver, playout, base_runs, ..Default::default() };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ParamError::OutOfRange { name: "confidence", value: self.confidence });
        }
        if !(self.solver.tolerance.is_finite() && self.solver.tolerance > 0.0) {
            return Err(ParamError::OutOfRange { name: "weight_tolerance", value: self.solver.tolerance });
        }
        if self.solver.max_iterations == 0 {
            return Err(ParamError::OutOfRange { name: "max_weight_iterations", value: 0.0 });
        }
        if !self.playout.has_reward_signal() {
            return Err(ParamError::NoRewardSignal(self.playout.name()));
        }
        let goal = match &self.playout {
            Playout::UntilWin(cond) => Some(cond),
            Playout::Greedy { goal, .. } => goal.as_ref(),
            _ => None,
        };
        if let Some(WinCondition::Rank(rank)) = goal {
            if *rank > crate::engine::MAX_RANK {
                return Err(ParamError::OutOfRange { name: "win_threshold", value: *rank as f64 });
            }
        }
        if let Some(cond @ WinCondition::TileCounts(_)) = goal {
            if !cond.is_reachable() {
                return Err(ParamError::OutOfRange { name: "tile_counts", value: 0.0 });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_threshold_form() {
        let cfg = BanditConfig::from_slice(&[0.1, 500.0, 1e-5, 50.0, 9.0, 3.0]).unwrap();
        assert_eq!(cfg.confidence, 0.1);
        assert_eq!(cfg.max_trials, 500);
        assert_eq!(cfg.solver, WeightSolver::new(1e-5, 50));
        assert_eq!(cfg.playout, Playout::UntilWin(WinCondition::Rank(9)));
        assert_eq!(cfg.base_runs, 3);
    }

    #[test]
    fn parses_horizon_form() {
        let cfg = BanditConfig::from_slice(&[0.1, 500.0, 1e-5, 50.0, 9.0, 3.0, 40.0]).unwrap();
        assert_eq!(cfg.playout, Playout::Horizon(40));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            BanditConfig::from_slice(&[0.1, 500.0, 1e-5]),
            Err(ParamError::Missing { index: 3, .. })
        ));
        assert!(matches!(
            BanditConfig::from_slice(&[1.5, 500.0, 1e-5, 50.0, 9.0, 3.0]),
            Err(ParamError::OutOfRange { name: "confidence", .. })
        ));
        assert!(matches!(
            BanditConfig::from_slice(&[0.1, -1.0, 1e-5, 50.0, 9.0, 3.0]),
            Err(ParamError::OutOfRange { name: "max_trials", .. })
        ));
        assert!(matches!(
            BanditConfig::from_slice(&[0.1, 500.0, 1e-5, 50.0, 16.0, 3.0]),
            Err(ParamError::OutOfRange { name: "win_threshold", .. })
        ));
        assert!(matches!(
            BanditConfig::from_slice(&[0.1, 500.0, 1e-5, 50.0, 8.7, 3.0]),
            Err(ParamError::OutOfRange { name: "win_threshold", .. })
        ));
        assert!(matches!(
            BanditConfig::from_slice(&[0.1, 500.0, 0.0, 50.0, 9.0, 3.0]),
            Err(ParamError::OutOfRange { name: "weight_tolerance", .. })
        ));
    }

    #[test]
    fn rejects_playouts_without_signal() {
        let cfg = BanditConfig { playout: Playout::UntilLoss, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ParamError::NoRewardSignal("until-loss")));
        let cfg = BanditConfig { playout: Playout::greedy(None), ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = BanditConfig {
            playout: Playout::UntilWin(WinCondition::TileCounts([9, 9, 0, 0, 0, 0, 0, 0])),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
