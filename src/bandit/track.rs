use std::time::Instant;

use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::engine::{Board, Move, MoveSet};
use crate::error::ParamError;
use crate::rollout::{Playout, SEED_STRIDE};

use super::kl::{kl_bernoulli, weighted_kl};
use super::BanditConfig;

/// Something that can be pulled for a 0/1 reward.
pub trait RewardSource: Sync {
    fn sample<R: Rng + ?Sized>(&self, arm: usize, rng: &mut R) -> u32;
}

/// Running statistics for one arm.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArmStats {
    pub n: u32,
    pub successes: u32,
    pub mean: f64,
}

impl ArmStats {
    #[inline]
    fn record(&mut self, reward: u32) {
        self.n += 1;
        self.successes += reward;
        self.mean = self.successes as f64 / self.n as f64;
    }
}

/// Why the sampling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Only one arm existed; nothing was sampled.
    SingleArm,
    /// The stopping statistic cleared its threshold.
    Confident,
    /// `max_trials` ran out; the empirical best was returned.
    MaxTrials,
    /// The wall-clock budget ran out; the empirical best was returned.
    TimeBudget,
}

/// Outcome of identification over abstract arms `0..k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub best: usize,
    pub samples: u64,
    pub reason: StopReason,
    pub arms: Vec<ArmStats>,
}

/// Outcome of identification over the valid moves of a board.
///
/// `arms[i]` belongs to `moves.as_slice()[i]`.
#[derive(Debug, Clone)]
pub struct Decision {
    pub dir: Move,
    pub moves: MoveSet,
    pub samples: u64,
    pub reason: StopReason,
    pub arms: Vec<ArmStats>,
}

/// Track-and-Stop (Garivier & Kaufmann, 2016) with D-tracking.
#[derive(Debug, Clone)]
pub struct TrackAndStop {
    cfg: BanditConfig,
}

struct PlayoutArms<'a> {
    board: &'a Board,
    moves: &'a [Move],
    playout: &'a Playout,
}

impl RewardSource for PlayoutArms<'_> {
    fn sample<R: Rng + ?Sized>(&self, arm: usize, rng: &mut R) -> u32 {
        self.playout.run(self.board, self.moves[arm], rng).reward()
    }
}

impl TrackAndStop {
    pub fn new(cfg: BanditConfig) -> Result<Self, ParamError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    #[inline]
    pub fn config(&self) -> &BanditConfig { &self.cfg }

    /// Identified best move, or `None` when the board has no valid move.
    pub fn best_move<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Move> {
        self.run(board, rng).map(|d| d.dir)
    }

    /// Run the full procedure with the valid moves of `board` as arms.
    pub fn run<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Decision> {
        let moves = board.valid_moves();
        if moves.is_empty() {
            return None;
        }
        let source = PlayoutArms { board, moves: moves.as_slice(), playout: &self.cfg.playout };
        let id = self.identify(moves.len(), &source, rng);
        Some(Decision {
            dir: moves.as_slice()[id.best],
            moves,
            samples: id.samples,
            reason: id.reason,
            arms: id.arms,
        })
    }

    /// Identify the best of `k >= 1` arms drawn from `source`.
    pub fn identify<S, R>(&self, k: usize, source: &S, rng: &mut R) -> Identification
    where
        S: RewardSource,
        R: Rng + ?Sized,
    {
        let mut arms = vec![ArmStats::default(); k];
        if k <= 1 {
            return Identification { best: 0, samples: 0, reason: StopReason::SingleArm, arms };
        }

        let started = Instant::now();
        let mut t = self.initialize(&mut arms, source, rng);
        let reason = loop {
            if t >= self.cfg.max_trials as u64 {
                break StopReason::MaxTrials;
            }
            if let Some(budget) = self.cfg.time_budget {
                if started.elapsed() >= budget {
                    warn!("track-and-stop: time budget {:?} exhausted after {} samples", budget, t);
                    break StopReason::TimeBudget;
                }
            }

            let leaders = leaders(&arms);
            let pick = if leaders.len() > 1 {
                // No valid statistic without separation: sample a leader.
                *leaders.choose(rng).unwrap_or(&leaders[0])
            } else {
                let best = leaders[0];
                let stat = stopping_statistic(&arms, best);
                let threshold = (2.0 * t as f64 * (k - 1) as f64 / self.cfg.confidence).ln();
                trace!("t={} best={} stat={:.4} threshold={:.4}", t, best, stat, threshold);
                if stat > threshold {
                    debug!(
                        "track-and-stop: arm {} confident after {} samples, means {:?}",
                        best,
                        t,
                        arms.iter().map(|a| a.mean).collect::<Vec<_>>()
                    );
                    return Identification { best, samples: t, reason: StopReason::Confident, arms };
                }
                match forced_arm(&arms, t) {
                    Some(arm) => arm,
                    None => {
                        let means: Vec<f64> = arms.iter().map(|a| a.mean).collect();
                        let w = self.cfg.solver.optimal_weights(&means);
                        tracking_arm(&w, &arms, t)
                    }
                }
            };

            let reward = source.sample(pick, rng);
            arms[pick].record(reward);
            t += 1;
        };

        let best = leaders(&arms)[0];
        debug!("track-and-stop: {:?} after {} samples, returning arm {}", reason, t, best);
        Identification { best, samples: t, reason, arms }
    }

    /// `base_runs` pulls per arm. Every pull gets its own generator seeded
    /// from a single draw of `rng`, so the parallel and sequential paths agree.
    fn initialize<S, R>(&self, arms: &mut [ArmStats], source: &S, rng: &mut R) -> u64
    where
        S: RewardSource,
        R: Rng + ?Sized,
    {
        let runs = self.cfg.base_runs as usize;
        let total = arms.len() * runs;
        if total == 0 {
            return 0;
        }
        let base_seed: u64 = rng.gen();
        let pull = |job: usize| -> (usize, u32) {
            let arm = job / runs;
            let mut sub = StdRng::seed_from_u64(base_seed.wrapping_add((job as u64).wrapping_mul(SEED_STRIDE)));
            (arm, source.sample(arm, &mut sub))
        };
        let rewards: Vec<(usize, u32)> = if self.cfg.parallel {
            (0..total).into_par_iter().map(pull).collect()
        } else {
            (0..total).map(pull).collect()
        };
        for (arm, reward) in rewards {
            arms[arm].record(reward);
        }
        total as u64
    }
}

/// Indices of every arm with the top mean, ascending.
fn leaders(arms: &[ArmStats]) -> Vec<usize> {
    let top = arms.iter().map(|a| a.mean).fold(f64::NEG_INFINITY, f64::max);
    (0..arms.len()).filter(|&i| arms[i].mean == top).collect()
}

/// `min_i n_b KL(mu_b, avg_i) + n_i KL(mu_i, avg_i)` over arms `i != best`,
/// with `avg_i` the midpoint of the two means.
fn stopping_statistic(arms: &[ArmStats], best: usize) -> f64 {
    let b = arms[best];
    arms.iter()
        .enumerate()
        .filter(|&(i, _)| i != best)
        .map(|(_, a)| {
            let avg = 0.5 * (b.mean + a.mean);
            weighted_kl(b.n as f64, kl_bernoulli(b.mean, avg)) + weighted_kl(a.n as f64, kl_bernoulli(a.mean, avg))
        })
        .fold(f64::INFINITY, f64::min)
}

/// Least-sampled arm if its count lags `sqrt(t) - 2`.
fn forced_arm(arms: &[ArmStats], t: u64) -> Option<usize> {
    let (idx, least) = arms
        .iter()
        .enumerate()
        .min_by_key(|(_, a)| a.n)
        .map(|(i, a)| (i, a.n))?;
    if (least as f64) < (t as f64).sqrt() - 2.0 { Some(idx) } else { None }
}

/// Arm whose sampled share lags its target weight the most.
fn tracking_arm(weights: &[f64], arms: &[ArmStats], t: u64) -> usize {
    let mut best = 0;
    let mut best_gap = f64::NEG_INFINITY;
    for (i, (w, a)) in weights.iter().zip(arms.iter()).enumerate() {
        let gap = w - a.n as f64 / t as f64;
        if gap > best_gap {
            best_gap = gap;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollout::WinCondition;

    struct Coins(Vec<f64>);

    impl RewardSource for Coins {
        fn sample<R: Rng + ?Sized>(&self, arm: usize, rng: &mut R) -> u32 {
            rng.gen_bool(self.0[arm]) as u32
        }
    }

    fn tas(cfg: BanditConfig) -> TrackAndStop {
        TrackAndStop::new(cfg).unwrap()
    }

    fn stats(n: u32, successes: u32) -> ArmStats {
        ArmStats { n, successes, mean: if n == 0 { 0.0 } else { successes as f64 / n as f64 } }
    }

    #[test]
    fn single_arm_returns_without_sampling() {
        // Column 0 holds 2,4,2,4 and nothing else: only Right moves anything.
        let mut ranks = [0u8; 16];
        ranks[0] = 1;
        ranks[4] = 2;
        ranks[8] = 1;
        ranks[12] = 2;
        let board = Board::from_ranks(&ranks, 0);
        assert_eq!(board.valid_moves().as_slice(), &[Move::Right]);

        let mut rng = StdRng::seed_from_u64(1);
        let d = tas(BanditConfig::default()).run(&board, &mut rng).unwrap();
        assert_eq!(d.dir, Move::Right);
        assert_eq!(d.reason, StopReason::SingleArm);
        assert_eq!(d.samples, 0);
        assert_eq!(d.arms[0].n, 0);
    }

    #[test]
    fn stuck_board_has_no_decision() {
        let mut rng = StdRng::seed_from_u64(1);
        let board = Board::from_raw(0x1212212112122121, 0);
        assert!(tas(BanditConfig::default()).run(&board, &mut rng).is_none());
    }

    #[test]
    fn finds_the_clear_best_coin() {
        let cfg = BanditConfig { confidence: 0.05, max_trials: 20_000, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(7);
        let id = tas(cfg).identify(3, &Coins(vec![0.9, 0.3, 0.2]), &mut rng);
        assert_eq!(id.reason, StopReason::Confident);
        assert_eq!(id.best, 0);
        assert!(id.samples < 20_000);
    }

    #[test]
    fn counts_add_up_and_means_are_exact() {
        let cfg = BanditConfig { max_trials: 300, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(8);
        let id = tas(cfg).identify(4, &Coins(vec![0.5, 0.52, 0.48, 0.5]), &mut rng);
        let pulled: u64 = id.arms.iter().map(|a| a.n as u64).sum();
        assert_eq!(pulled, id.samples);
        for a in &id.arms {
            assert_eq!(a.mean, a.successes as f64 / a.n as f64);
        }
    }

    #[test]
    fn budget_exhaustion_returns_empirical_best() {
        let cfg = BanditConfig { max_trials: 50, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(9);
        let id = tas(cfg).identify(3, &Coins(vec![0.0, 0.0, 0.0]), &mut rng);
        assert_eq!(id.reason, StopReason::MaxTrials);
        assert_eq!(id.samples, 50);
        assert_eq!(id.best, 0);
    }

    #[test]
    fn zero_time_budget_stops_immediately() {
        let cfg = BanditConfig { time_budget: Some(std::time::Duration::ZERO), ..Default::default() };
        let mut rng = StdRng::seed_from_u64(10);
        let id = tas(cfg).identify(2, &Coins(vec![0.5, 0.5]), &mut rng);
        assert_eq!(id.reason, StopReason::TimeBudget);
        assert_eq!(id.samples, 8);
    }

    #[test]
    fn parallel_init_matches_sequential() {
        let seq = BanditConfig { max_trials: 400, base_runs: 6, ..Default::default() };
        let par = BanditConfig { parallel: true, ..seq.clone() };
        let coins = Coins(vec![0.6, 0.4, 0.55]);
        let a = tas(seq).identify(3, &coins, &mut StdRng::seed_from_u64(11));
        let b = tas(par).identify(3, &coins, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn forced_exploration_picks_the_starved_arm() {
        let arms = [stats(10, 5), stats(1, 0), stats(10, 2)];
        assert_eq!(forced_arm(&arms, 21), Some(1));
        let arms = [stats(10, 5), stats(4, 0), stats(10, 2)];
        assert_eq!(forced_arm(&arms, 24), None);
    }

    #[test]
    fn tracking_follows_the_largest_deficit() {
        let arms = [stats(6, 5), stats(2, 0), stats(2, 1)];
        assert_eq!(tracking_arm(&[0.4, 0.3, 0.3], &arms, 10), 1);
        assert_eq!(tracking_arm(&[0.7, 0.15, 0.15], &arms, 10), 0);
    }

    #[test]
    fn statistic_grows_with_separation() {
        let close = [stats(20, 10), stats(20, 9)];
        let far = [stats(20, 18), stats(20, 2)];
        assert!(stopping_statistic(&far, 0) > stopping_statistic(&close, 0));
        assert!(stopping_statistic(&far, 0).is_finite());
    }

    #[test]
    fn playout_arms_on_a_real_board() {
        let mut rng = StdRng::seed_from_u64(12);
        let board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
        let cfg = BanditConfig {
            max_trials: 120,
            base_runs: 2,
            playout: Playout::Horizon(15),
            ..Default::default()
        };
        let d = tas(cfg).run(&board, &mut rng).unwrap();
        assert!(d.moves.contains(d.dir));
        assert_eq!(d.arms.len(), d.moves.len());
        // Fifteen moves from a near-empty board always survive.
        assert!(d.arms.iter().all(|a| a.successes == a.n));

        let cfg = BanditConfig {
            max_trials: 60,
            playout: Playout::UntilWin(WinCondition::Rank(5)),
            ..Default::default()
        };
        let d = tas(cfg).run(&board, &mut rng).unwrap();
        assert!(d.samples <= 60);
    }
}
