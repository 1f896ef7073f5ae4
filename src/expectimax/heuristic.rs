use crate::engine::{rank_to_value, Board};

use super::HeuristicParams;

/// Serpentine cell order: row 0 right-to-left, row 1 left-to-right, and so on.
pub const SNAKE_PATH: [usize; 16] = [3, 2, 1, 0, 4, 5, 6, 7, 11, 10, 9, 8, 12, 13, 14, 15];

/// Sum of positive drops in absolute tile value between consecutive cells of [`SNAKE_PATH`].
pub fn path_penalty(board: Board) -> f64 {
    let values: Vec<u32> = SNAKE_PATH
        .iter()
        .map(|&idx| rank_to_value(board.rank(idx)))
        .collect();
    values
        .windows(2)
        .map(|w| if w[0] > w[1] { (w[0] - w[1]) as f64 } else { 0.0 })
        .sum()
}

/// `score_factor * score - loss_penalty * [stuck] - path_penalty * path_penalty(board)`.
pub fn static_heuristic(board: Board, params: &HeuristicParams) -> f64 {
    let mut penalty = 0.0;
    if board.is_game_over() {
        penalty += params.loss_penalty;
    }
    penalty += params.path_penalty * path_penalty(board);
    params.score_factor * board.score() as f64 - penalty
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HeuristicParams {
        HeuristicParams { depth: 1, path_penalty: 2.0, loss_penalty: 100.0, score_factor: 0.5, ..Default::default() }
    }

    #[test]
    fn increasing_snake_has_no_penalty() {
        let mut ranks = [0u8; 16];
        for (step, &idx) in SNAKE_PATH.iter().enumerate() {
            ranks[idx] = step as u8;
        }
        assert_eq!(path_penalty(Board::from_ranks(&ranks, 0)), 0.0);
    }

    #[test]
    fn drops_along_path_are_summed_in_tile_values() {
        // Cell 3 (path start) holds 8, cell 2 holds 2: one drop of 6.
        let mut ranks = [0u8; 16];
        ranks[3] = 3;
        ranks[2] = 1;
        // Cell 2 -> 1 drops 2 -> 0.
        assert_eq!(path_penalty(Board::from_ranks(&ranks, 0)), 6.0 + 2.0);
    }

    #[test]
    fn heuristic_combines_terms() {
        let mut ranks = [0u8; 16];
        ranks[3] = 2;
        let b = Board::from_ranks(&ranks, 40);
        // drop 4 -> 0 after the first cell
        assert_eq!(static_heuristic(b, &params()), 0.5 * 40.0 - 2.0 * 4.0);
    }

    #[test]
    fn stuck_board_pays_loss_penalty() {
        let b = Board::from_raw(0x1212212112122121, 0);
        let p = HeuristicParams { path_penalty: 0.0, ..params() };
        assert_eq!(static_heuristic(b, &p), -100.0);
    }
}
