use std::time::{Duration, Instant};

use ai_2048_tas::bandit::{BanditConfig, TrackAndStop, WeightSolver};
use ai_2048_tas::engine::{Board, Move};
use ai_2048_tas::expectimax::{Expectiminimax, HeuristicParams};
use ai_2048_tas::montecarlo::{MeanScore, MonteCarloConfig};
use ai_2048_tas::rollout::{Playout, WinCondition};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::{rngs::StdRng, SeedableRng};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyKind {
    Heuristic,
    Bandit,
    MonteCarlo,
}

#[derive(Debug, Parser)]
#[command(name = "ai-2048-tas", about = "Play 2048 with expectiminimax, Track-and-Stop or mean-score playouts")]
struct Args {
    /// Move-selection policy
    #[arg(long, value_enum, default_value_t = PolicyKind::Heuristic)]
    policy: PolicyKind,

    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: u32,

    /// Seed for the game RNG (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop a game after this many moves
    #[arg(long)]
    max_moves: Option<u64>,

    /// Search depth (heuristic policy)
    #[arg(long, default_value_t = 5)]
    depth: u32,

    /// Pick the depth from the number of empty cells, capped by --depth
    #[arg(long)]
    adaptive_depth: bool,

    #[arg(long, default_value_t = 0.45)]
    path_penalty: f64,

    #[arg(long, default_value_t = 12.5)]
    loss_penalty: f64,

    #[arg(long, default_value_t = 0.13)]
    score_factor: f64,

    /// Error probability δ (bandit policy)
    #[arg(long, default_value_t = 0.05)]
    confidence: f64,

    /// Playout budget per move (bandit policy)
    #[arg(long, default_value_t = 1000)]
    max_trials: u32,

    /// Playouts per arm before tracking starts (bandit policy)
    #[arg(long, default_value_t = 4)]
    base_runs: u32,

    /// Rank counted as a playout win, e.g. 8 for a 256 tile (bandit policy)
    #[arg(long, default_value_t = 8)]
    win_rank: u8,

    /// Use fixed-horizon survival playouts of this many moves instead of a win rank
    #[arg(long)]
    horizon: Option<u32>,

    /// Per-move wall-clock budget in milliseconds (bandit policy)
    #[arg(long)]
    budget_ms: Option<u64>,

    /// Playouts per move (monte-carlo policy)
    #[arg(long, default_value_t = 100)]
    mc_games: u32,

    /// Use greedy playouts searched this many plies deep (monte-carlo policy)
    #[arg(long)]
    greedy_depth: Option<u32>,

    /// Suppress the progress line
    #[arg(long)]
    quiet: bool,

    /// Print the final board of every game
    #[arg(long)]
    show_board: bool,
}

enum Chooser {
    Search(Expectiminimax),
    Bandit(TrackAndStop),
    MonteCarlo(MeanScore),
}

impl Chooser {
    fn next_move(&mut self, board: Board, rng: &mut StdRng) -> Option<Move> {
        match self {
            Chooser::Search(ex) => ex.best_move(board),
            Chooser::Bandit(tas) => tas.best_move(&board, rng),
            Chooser::MonteCarlo(mc) => mc.best_move(&board, rng),
        }
    }
}

struct GameSummary {
    score: u64,
    highest_tile: u32,
    moves: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let params = HeuristicParams {
        depth: args.depth,
        path_penalty: args.path_penalty,
        loss_penalty: args.loss_penalty,
        score_factor: args.score_factor,
        parallel: true,
        adaptive_depth: args.adaptive_depth,
    };
    let mut chooser = match args.policy {
        PolicyKind::Heuristic => Chooser::Search(Expectiminimax::with_params(params)),
        PolicyKind::Bandit => {
            let playout = match args.horizon {
                Some(h) => Playout::Horizon(h),
                None => Playout::UntilWin(WinCondition::Rank(args.win_rank)),
            };
            let cfg = BanditConfig {
                confidence: args.confidence,
                max_trials: args.max_trials,
                solver: WeightSolver::default(),
                playout,
                base_runs: args.base_runs,
                parallel: true,
                time_budget: args.budget_ms.map(Duration::from_millis),
            };
            Chooser::Bandit(TrackAndStop::new(cfg)?)
        }
        PolicyKind::MonteCarlo => {
            let playout = match args.greedy_depth {
                Some(depth) => Playout::Greedy { depth, params: HeuristicParams { parallel: false, ..params }, goal: None },
                None => Playout::UntilLoss,
            };
            let cfg = MonteCarloConfig { games: args.mc_games, playout, parallel: true };
            Chooser::MonteCarlo(MeanScore::new(cfg)?)
        }
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    info!("seed {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let pb = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new(args.games as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} games | {msg}")?
                .progress_chars("=>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let start = Instant::now();
    let mut summaries = Vec::with_capacity(args.games as usize);
    for game in 0..args.games {
        let summary = play_game(&mut chooser, &mut rng, args.max_moves, pb.as_ref(), args.show_board);
        info!(
            "game {}: score {} | highest tile {} | moves {}",
            game, summary.score, summary.highest_tile, summary.moves
        );
        summaries.push(summary);
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let games = summaries.len().max(1) as f64;
    let mean_score = summaries.iter().map(|s| s.score as f64).sum::<f64>() / games;
    let max_score = summaries.iter().map(|s| s.score).max().unwrap_or(0);
    let best_tile = summaries.iter().map(|s| s.highest_tile).max().unwrap_or(0);
    println!(
        "games: {} | mean score: {:.1} | max score: {} | best tile: {} | elapsed: {:.1}s",
        summaries.len(),
        mean_score,
        max_score,
        best_tile,
        start.elapsed().as_secs_f64()
    );
    let report = TileReport::from_tiles(summaries.iter().map(|s| s.highest_tile));
    println!("under 512: {}", report.under_512);
    for (tile, count) in REPORT_TILES.iter().zip(report.reached.iter()) {
        println!("reached {}: {}", tile, count);
    }
    Ok(())
}

const REPORT_TILES: [u32; 5] = [1024, 2048, 4096, 8192, 16384];

/// Games bucketed by their highest tile.
#[derive(Debug, Default, PartialEq)]
struct TileReport {
    under_512: usize,
    /// Games whose highest tile is at least `REPORT_TILES[i]`.
    reached: [usize; 5],
}

impl TileReport {
    fn from_tiles(tiles: impl Iterator<Item = u32>) -> Self {
        let mut report = TileReport::default();
        for tile in tiles {
            if tile < 512 {
                report.under_512 += 1;
            }
            for (slot, &threshold) in report.reached.iter_mut().zip(REPORT_TILES.iter()) {
                if tile >= threshold {
                    *slot += 1;
                }
            }
        }
        report
    }
}

fn play_game(
    chooser: &mut Chooser,
    rng: &mut StdRng,
    max_moves: Option<u64>,
    pb: Option<&ProgressBar>,
    show_board: bool,
) -> GameSummary {
    let mut board = Board::EMPTY.with_random_tile(rng).with_random_tile(rng);
    let mut moves = 0u64;
    while !board.is_game_over() {
        let Some(dir) = chooser.next_move(board, rng) else { break };
        board = board.make_move(dir, rng);
        moves += 1;
        if let Some(pb) = pb {
            if moves % 25 == 0 {
                pb.set_message(format!("moves: {} | score: {}", moves, board.score()));
            }
        }
        if max_moves.is_some_and(|limit| moves >= limit) {
            break;
        }
    }
    if show_board {
        println!("{}", board);
    }
    GameSummary { score: board.score(), highest_tile: board.highest_tile(), moves }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_report_counts_cumulatively() {
        let report = TileReport::from_tiles([256, 512, 1024, 2048, 4096, 16384].into_iter());
        assert_eq!(report.under_512, 1);
        assert_eq!(report.reached, [4, 3, 2, 1, 1]);
    }

    #[test]
    fn empty_report_is_zero() {
        assert_eq!(TileReport::from_tiles(std::iter::empty()), TileReport::default());
    }
}
