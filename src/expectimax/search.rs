use rayon::prelude::*;

use crate::engine::{Board, Move};

use super::heuristic::static_heuristic;
use super::{BranchEval, HeuristicParams, Node, SearchStats, MAX_SEARCH_DEPTH};

/// Expectiminimax value of `board` searched `depth` plies deep.
///
/// `depth == 0` or a board with no valid move evaluates to
/// [`static_heuristic`] exactly. Depth is clamped to [`MAX_SEARCH_DEPTH`].
///
/// ```
/// use ai_2048_tas::engine::Board;
/// use ai_2048_tas::expectimax::{search, static_heuristic, HeuristicParams, Node};
/// let b = Board::from_values(&[2, 2, 4, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0);
/// let p = HeuristicParams::default();
/// assert_eq!(search(b, &p, Node::Decision, 0), static_heuristic(b, &p));
/// ```
pub fn search(board: Board, params: &HeuristicParams, node: Node, depth: u32) -> f64 {
    let mut nodes = 0u64;
    expectiminimax(board, params, node, depth.min(MAX_SEARCH_DEPTH), &mut nodes)
}

/// Expectiminimax move chooser.
///
/// Each valid root move is applied once and the resulting board is scored as
/// a chance node one ply shallower than `params.depth`. The highest score
/// wins; ties go to the earlier move in [`Move::ALL`] order.
pub struct Expectiminimax {
    params: HeuristicParams,
    stats: SearchStats,
}

impl Expectiminimax {
    pub fn new() -> Self { Self::with_params(HeuristicParams::default()) }

    pub fn with_params(params: HeuristicParams) -> Self {
        crate::engine::new();
        Self { params, stats: SearchStats::default() }
    }

    /// Compute the best move, or `None` when the board has no valid move.
    pub fn best_move(&mut self, board: Board) -> Option<Move> {
        let branches = self.branch_evals(board);
        pick_best(&branches)
    }

    /// Compute the searched value for each direction.
    ///
    /// Returns a fixed array in order: `[Up, Down, Left, Right]` and marks
    /// illegal moves as `legal=false`.
    ///
    /// ```
    /// use ai_2048_tas::engine::{Board, Move};
    /// use ai_2048_tas::expectimax::{Expectiminimax, HeuristicParams};
    /// // Up is a no-op while every tile sits in the top row.
    /// let b = Board::from_values(&[2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0);
    /// let mut ex = Expectiminimax::with_params(HeuristicParams { depth: 2, ..Default::default() });
    /// let branches = ex.branch_evals(b);
    /// assert_eq!(branches.len(), 4);
    /// assert!(!branches[0].legal); // Up
    /// assert!(branches[2].legal);  // Left
    /// ```
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let depth = self.params.depth_for(board);
        let (branches, nodes) = root_branches(board, &self.params, depth, self.params.parallel);
        self.stats = SearchStats { nodes, depth };
        branches
    }

    /// Value at the root decision node: the best legal branch value, or the
    /// static heuristic when no move is legal.
    pub fn state_value(&mut self, board: Board) -> f64 {
        let branches = self.branch_evals(board);
        branches
            .iter()
            .filter(|branch| branch.legal)
            .map(|branch| branch.ev)
            .fold(None, |acc: Option<f64>, ev| Some(acc.map_or(ev, |a| a.max(ev))))
            .unwrap_or_else(|| static_heuristic(board, &self.params))
    }

    /// Statistics collected from the last call to [`Self::best_move`],
    /// [`Self::branch_evals`] or [`Self::state_value`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }
}

impl Default for Expectiminimax { fn default() -> Self { Self::new() } }

/// Sequential root search without stats, used by greedy playouts.
pub(crate) fn choose_move(board: Board, params: &HeuristicParams) -> Option<Move> {
    let (branches, _) = root_branches(board, params, params.depth_for(board), false);
    pick_best(&branches)
}

fn pick_best(branches: &[BranchEval; 4]) -> Option<Move> {
    let mut best: Option<&BranchEval> = None;
    for branch in branches.iter().filter(|b| b.legal) {
        match best {
            Some(b) if b.ev >= branch.ev => {}
            _ => best = Some(branch),
        }
    }
    best.map(|b| b.dir)
}

fn root_branches(board: Board, params: &HeuristicParams, depth: u32, parallel: bool) -> ([BranchEval; 4], u64) {
    let child_depth = depth.saturating_sub(1);
    let eval = |dir: Move| -> (BranchEval, u64) {
        let mut child = board;
        if !child.apply_move(dir) {
            return (BranchEval { dir, ev: 0.0, legal: false }, 0);
        }
        let mut nodes = 0u64;
        let ev = expectiminimax(child, params, Node::Chance, child_depth, &mut nodes);
        (BranchEval { dir, ev, legal: true }, nodes)
    };
    let evaluated: Vec<(BranchEval, u64)> = if parallel {
        Move::ALL.par_iter().map(|&dir| eval(dir)).collect()
    } else {
        Move::ALL.iter().map(|&dir| eval(dir)).collect()
    };
    let mut out: [BranchEval; 4] = [
        BranchEval { dir: Move::Up, ev: 0.0, legal: false },
        BranchEval { dir: Move::Down, ev: 0.0, legal: false },
        BranchEval { dir: Move::Left, ev: 0.0, legal: false },
        BranchEval { dir: Move::Right, ev: 0.0, legal: false },
    ];
    let mut total = 0u64;
    for (i, (branch, nodes)) in evaluated.into_iter().enumerate() {
        out[i] = branch;
        total += nodes;
    }
    (out, total)
}

fn expectiminimax(board: Board, params: &HeuristicParams, node: Node, depth: u32, nodes: &mut u64) -> f64 {
    *nodes += 1;
    if depth == 0 || board.is_game_over() {
        return static_heuristic(board, params);
    }
    match node {
        Node::Decision => evaluate_decision(board, params, depth, nodes),
        Node::Chance => evaluate_chance(board, params, depth, nodes),
    }
}

fn evaluate_decision(board: Board, params: &HeuristicParams, depth: u32, nodes: &mut u64) -> f64 {
    let mut best: Option<f64> = None;
    for dir in board.valid_moves().iter() {
        let child = board.shift(dir);
        let score = expectiminimax(child, params, Node::Chance, depth - 1, nodes);
        best = Some(best.map_or(score, |b: f64| b.max(score)));
    }
    best.unwrap_or(params.loss_penalty)
}

fn evaluate_chance(board: Board, params: &HeuristicParams, depth: u32, nodes: &mut u64) -> f64 {
    let num_empty_tiles = board.count_empty();
    if num_empty_tiles == 0 {
        return static_heuristic(board, params);
    }
    let p2 = 0.9 / num_empty_tiles as f64;
    let p4 = 0.1 / num_empty_tiles as f64;
    let mut score = 0.0;
    let mut tiles_searched = 0;
    let mut tmp = board.raw();
    let mut insert_tile: u64 = 1;
    while tiles_searched < num_empty_tiles {
        if (tmp & 0xf) == 0 {
            let board2 = Board::from_raw(board.raw() | insert_tile, board.score());
            score += p2 * expectiminimax(board2, params, Node::Decision, depth - 1, nodes);
            let board4 = Board::from_raw(board.raw() | (insert_tile << 1), board.score());
            score += p4 * expectiminimax(board4, params, Node::Decision, depth - 1, nodes);
            tiles_searched += 1;
        }
        tmp >>= 4;
        insert_tile <<= 4;
    }
    score
}
