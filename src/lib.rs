//! ai-2048-tas: 2048 move selection by search and by best-arm identification
//!
//! This crate provides:
//! - A compact `Board` type (ranks packed in a `u64`, plus the running score)
//!   with exact move/merge rules, valid-move enumeration and random spawns
//! - Depth-bounded expectiminimax over a serpentine-path heuristic (`expectimax` module)
//! - Random, fixed-horizon and greedy playouts (`rollout` module)
//! - Track-and-Stop over playout rewards with optimal KL weights (`bandit` module)
//! - Mean-score Monte-Carlo move choice (`montecarlo` module)
//! - Positional-parameter entry points (`policy` module)
//!
//! Every random step takes a caller-supplied RNG, so a seeded `StdRng`
//! reproduces a whole game.
//!
//! Full loop
//! ```
//! use ai_2048_tas::engine::Board;
//! use ai_2048_tas::expectimax::{Expectiminimax, HeuristicParams};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let mut policy = Expectiminimax::with_params(HeuristicParams { depth: 2, ..Default::default() });
//! let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let mut moves = 0u32;
//! while !b.is_game_over() && moves < 4 {
//!     match policy.best_move(b) {
//!         Some(dir) => b = b.make_move(dir, &mut rng),
//!         None => break,
//!     }
//!     moves += 1;
//! }
//! assert!(moves > 0);
//! ```
//!
pub mod bandit;
pub mod engine;
pub mod error;
pub mod expectimax;
pub mod montecarlo;
pub mod policy;
pub mod rollout;
