use ai_2048_tas::bandit::{BanditConfig, TrackAndStop, WeightSolver};
use ai_2048_tas::engine::{Board, Move};
use ai_2048_tas::expectimax::{Expectiminimax, HeuristicParams};
use ai_2048_tas::montecarlo::{MeanScore, MonteCarloConfig};
use ai_2048_tas::rollout::{Playout, WinCondition};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use rayon::ThreadPoolBuilder;
use std::hint::black_box;

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(7777);
    let mut boards = Vec::new();
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    for i in 0..32 {
        b = b.make_move(Move::ALL[i % 4], &mut rng);
        boards.push(b);
    }
    boards
}

fn bench_expectiminimax(c: &mut Criterion) {
    let boards = corpus();
    let seq = HeuristicParams { depth: 3, ..Default::default() };
    let mut ex = Expectiminimax::with_params(seq);
    c.bench_function("expectiminimax/seq_depth3", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards { acc += ex.state_value(bd); }
            black_box(acc)
        })
    });

    // Pin a small pool for stability
    let pool = ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let mut ex_par = Expectiminimax::with_params(HeuristicParams { parallel: true, ..seq });
    c.bench_function("expectiminimax/par_depth3", |bch| {
        bch.iter(|| pool.install(|| {
            let mut acc = 0.0;
            for &bd in &boards { acc += ex_par.state_value(bd); }
            black_box(acc)
        }))
    });
}

fn bench_weights(c: &mut Criterion) {
    let solver = WeightSolver::default();
    c.bench_function("weights/k4", |bch| {
        bch.iter(|| black_box(solver.optimal_weights(black_box(&[0.62, 0.55, 0.31, 0.12]))))
    });
}

fn bench_track_and_stop(c: &mut Criterion) {
    let boards = corpus();
    let cfg = BanditConfig {
        max_trials: 100,
        base_runs: 2,
        playout: Playout::UntilWin(WinCondition::Rank(6)),
        ..Default::default()
    };
    let tas = TrackAndStop::new(cfg).unwrap();
    c.bench_function("track_and_stop/100_trials", |bch| {
        let mut rng = StdRng::seed_from_u64(13);
        bch.iter(|| {
            let bd = boards[boards.len() / 2];
            black_box(tas.best_move(&bd, &mut rng))
        })
    });
}

fn bench_mean_score(c: &mut Criterion) {
    let boards = corpus();
    let mc = MeanScore::new(MonteCarloConfig { games: 20, ..Default::default() }).unwrap();
    c.bench_function("mean_score/20_games", |bch| {
        let mut rng = StdRng::seed_from_u64(17);
        bch.iter(|| {
            let bd = boards[boards.len() / 2];
            black_box(mc.best_move(&bd, &mut rng))
        })
    });
}

criterion_group!(decision, bench_expectiminimax, bench_weights, bench_track_and_stop, bench_mean_score);
criterion_main!(decision);
