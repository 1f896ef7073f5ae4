use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// Enumeration order used everywhere a tie is broken by move order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(s)
    }
}

/// Largest rank a nibble can hold. Two tiles of this rank never merge.
pub const MAX_RANK: u8 = 15;

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

struct Stores {
    shift_left: Box<[u64]>,
    shift_right: Box<[u64]>,
    shift_up: Box<[u64]>,
    shift_down: Box<[u64]>,
    // Score gained by a line scanned toward index 0 (Left/Up) or index 3 (Right/Down).
    gain_front: Box<[Score]>,
    gain_back: Box<[Score]>,
}

type BoardRaw = u64;
type Line = u64;
type Tile = u64;
type Score = u64;

/// Packed 4x4 board: 16 ranks as 4-bit nibbles in a `u64`, plus the running score.
///
/// Cell 0 (top-left) lives in the most significant nibble; cells run row-major.
/// A rank `r >= 1` stands for the tile value `2^r`, rank 0 is an empty cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board {
    raw: BoardRaw,
    score: Score,
}

impl Board {
    /// A constant empty board (all zeros, score 0).
    pub const EMPTY: Board = Board { raw: 0, score: 0 };

    /// Construct a `Board` from its raw packed representation and a score.
    #[inline]
    pub fn from_raw(raw: BoardRaw, score: Score) -> Self { Board { raw, score } }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.raw }

    /// Build a board from 16 row-major ranks.
    ///
    /// Ranks above [`MAX_RANK`] are a caller contract violation; only the low
    /// nibble is kept.
    pub fn from_ranks(ranks: &[u8; 16], score: Score) -> Self {
        debug_assert!(ranks.iter().all(|&r| r <= MAX_RANK));
        let raw = ranks
            .iter()
            .fold(0u64, |acc, &r| (acc << 4) | (r as u64 & 0xf));
        Board { raw, score }
    }

    /// Build a board from 16 row-major absolute tile values (0 or a power of two).
    ///
    /// Values are not validated. A value that is not a power of two is rounded
    /// down to one (`floor(log2(value))`), and anything above 32768 saturates
    /// at [`MAX_RANK`].
    ///
    /// ```
    /// use ai_2048_tas::engine::Board;
    /// let b = Board::from_values(&[2, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2048], 12);
    /// assert_eq!(b.rank(0), 1);
    /// assert_eq!(b.rank(15), 11);
    /// assert_eq!(b.score(), 12);
    /// ```
    pub fn from_values(values: &[u32; 16], score: Score) -> Self {
        let mut ranks = [0u8; 16];
        for (slot, &v) in ranks.iter_mut().zip(values.iter()) {
            *slot = value_to_rank(v).min(MAX_RANK);
        }
        Board::from_ranks(&ranks, score)
    }

    /// Row-major ranks.
    pub fn to_ranks(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = self.rank(idx);
        }
        out
    }

    /// Row-major absolute tile values.
    pub fn to_values(self) -> [u32; 16] {
        let mut out = [0u32; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = rank_to_value(self.rank(idx));
        }
        out
    }

    /// Rank stored at `idx` (0..16, row-major).
    #[inline]
    pub fn rank(self, idx: usize) -> u8 { extract_tile(self.raw, idx) as u8 }

    /// Current score.
    #[inline]
    pub fn score(self) -> Score { self.score }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// The returned board carries the score increased by `2^r` for every merge
    /// that produced a tile of rank `r`.
    ///
    /// ```
    /// use ai_2048_tas::engine::{Board, Move};
    /// let b = Board::from_ranks(&[1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 0);
    /// let moved = b.shift(Move::Left);
    /// assert_eq!(&moved.to_ranks()[..4], &[2, 1, 0, 0]);
    /// assert_eq!(moved.score(), 4);
    /// ```
    #[inline]
    pub fn shift(self, dir: Move) -> Self {
        match dir {
            Move::Left | Move::Right => shift_rows(self, dir),
            Move::Up | Move::Down => shift_cols(self, dir),
        }
    }

    /// Apply `dir` in place. Returns whether any tile moved or merged.
    #[inline]
    pub fn apply_move(&mut self, dir: Move) -> bool {
        let next = self.shift(dir);
        let changed = next.raw != self.raw;
        *self = next;
        changed
    }

    /// True if `dir` changes the board.
    #[inline]
    pub fn is_valid_move(self, dir: Move) -> bool { self.shift(dir).raw != self.raw }

    /// Every direction that changes the board, in [`Move::ALL`] order.
    ///
    /// Works on copies; `self` is never touched.
    pub fn valid_moves(self) -> MoveSet {
        let mut set = MoveSet::new();
        for dir in Move::ALL {
            if self.is_valid_move(dir) {
                set.push(dir);
            }
        }
        set
    }

    /// Return true if no legal moves remain.
    ///
    /// ```
    /// use ai_2048_tas::engine::Board;
    /// // On an empty board, shifting in any direction doesn't change the board.
    /// assert!(Board::EMPTY.is_game_over());
    /// ```
    #[inline]
    pub fn is_game_over(self) -> bool { is_game_over(self) }

    /// Place a rank-1 (90%) or rank-2 (10%) tile on a uniformly chosen empty cell.
    ///
    /// Returns false, leaving the board untouched, when no cell is empty.
    pub fn spawn_random_tile<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let empty = count_empty(*self);
        if empty == 0 {
            return false;
        }
        let mut index = rng.gen_range(0..empty);
        let mut tmp = self.raw;
        let mut tile = generate_random_tile(rng);
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 { break; }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        self.raw |= tile;
        true
    }

    /// Builder-style [`Board::spawn_random_tile`].
    ///
    /// ```
    /// use ai_2048_tas::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(mut self, rng: &mut R) -> Self {
        self.spawn_random_tile(rng);
        self
    }

    /// Perform a move then insert a random tile if the move changed the board.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, direction: Move, rng: &mut R) -> Self {
        let moved = self.shift(direction);
        if moved.raw != self.raw { moved.with_random_tile(rng) } else { self }
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u64 { count_empty(self) }

    /// Highest rank on the board (0 for an empty board).
    pub fn max_rank(self) -> u8 {
        (0..16).map(|idx| self.rank(idx)).max().unwrap_or(0)
    }

    /// Highest tile value on the board.
    #[inline]
    pub fn highest_tile(self) -> u32 { rank_to_value(self.max_rank()) }

    /// Number of tiles of each rank; index 0 counts empty cells.
    pub fn rank_histogram(self) -> [u8; 16] {
        let mut hist = [0u8; 16];
        let mut tmp = self.raw;
        for _ in 0..16 {
            hist[(tmp & 0xf) as usize] += 1;
            tmp >>= 4;
        }
        hist
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x}, score={})", self.raw, self.score)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.to_ranks().iter().map(format_val).collect();
        writeln!(f, "score: {}", self.score)?;
        for (row, chunk) in cells.chunks(4).enumerate() {
            if row > 0 {
                writeln!(f, "-------------------------------")?;
            }
            writeln!(f, "{}|{}|{}|{}", chunk[0], chunk[1], chunk[2], chunk[3])?;
        }
        Ok(())
    }
}

/// Ordered set of up to four moves, kept in [`Move::ALL`] order.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MoveSet {
    moves: [Move; 4],
    len: usize,
}

impl MoveSet {
    pub fn new() -> Self { MoveSet { moves: [Move::Up; 4], len: 0 } }

    fn push(&mut self, dir: Move) {
        debug_assert!(self.len < 4);
        self.moves[self.len] = dir;
        self.len += 1;
    }

    #[inline]
    pub fn len(&self) -> usize { self.len }

    #[inline]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    #[inline]
    pub fn as_slice(&self) -> &[Move] { &self.moves[..self.len] }

    pub fn contains(&self, dir: Move) -> bool { self.as_slice().contains(&dir) }

    pub fn iter(&self) -> impl Iterator<Item = Move> + '_ { self.as_slice().iter().copied() }
}

impl Default for MoveSet { fn default() -> Self { Self::new() } }

impl fmt::Debug for MoveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Absolute value of a rank: `2^rank`, or 0 for rank 0.
#[inline]
pub fn rank_to_value(rank: u8) -> u32 {
    if rank == 0 { 0 } else { 1u32 << rank }
}

/// Rank of an absolute value: `floor(log2(value))`, or 0 for value 0.
#[inline]
pub fn value_to_rank(value: u32) -> u8 {
    if value == 0 { 0 } else { (31 - value.leading_zeros()) as u8 }
}

/// Initialize internal tables on first use. Safe to call multiple times.
pub fn new() {
    let _ = stores();
}

/// True if no move in any direction changes the board.
pub fn is_game_over(board: Board) -> bool {
    Move::ALL.iter().all(|&dir| !board.is_valid_move(dir))
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
/// Count the number of zero tiles.
pub fn count_empty(board: Board) -> u64 {
    16 - count_non_empty(board)
}

// Credit to Nneonneo
pub(crate) fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

pub(crate) fn extract_line(board: BoardRaw, line_idx: u64) -> Line {
    (board >> ((3 - line_idx) * 16)) & 0xffff
}

fn line_to_vec(line: Line) -> Vec<Tile> {
    (0..4).map(|tile_idx| line >> ((3 - tile_idx) * 4) & 0xf).collect()
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores { STORES.get_or_init(create_stores) }

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut shift_left = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_right = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_up = vec![0u64; LINE_TABLE_SIZE];
    let mut shift_down = vec![0u64; LINE_TABLE_SIZE];
    let mut gain_front = vec![0u64; LINE_TABLE_SIZE];
    let mut gain_back = vec![0u64; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let tiles = line_to_vec(val as u64);
        let (front, front_gain) = shift_vec_left(tiles.clone());
        let (back, back_gain) = shift_vec_right(tiles);
        shift_left[val] = vec_to_row(&front);
        shift_up[val] = vec_to_col(&front);
        shift_right[val] = vec_to_row(&back);
        shift_down[val] = vec_to_col(&back);
        gain_front[val] = front_gain;
        gain_back[val] = back_gain;
    }

    Stores {
        shift_left: shift_left.into_boxed_slice(),
        shift_right: shift_right.into_boxed_slice(),
        shift_up: shift_up.into_boxed_slice(),
        shift_down: shift_down.into_boxed_slice(),
        gain_front: gain_front.into_boxed_slice(),
        gain_back: gain_back.into_boxed_slice(),
    }
}

#[inline(always)]
fn table_entry(table: &[u64], idx: Line) -> u64 {
    debug_assert!((idx as usize) < LINE_TABLE_SIZE);
    table[idx as usize]
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> Tile { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

fn shift_rows(board: Board, move_dir: Move) -> Board {
    let s = stores();
    let (table, gains): (&[u64], &[Score]) = match move_dir {
        Move::Left => (&s.shift_left, &s.gain_front),
        _ => (&s.shift_right, &s.gain_back),
    };
    let (raw, gained) = (0..4).fold((0, 0), |(new_board, gained), row_idx| {
        let row_val = extract_line(board.raw, row_idx);
        let new_row_val = table_entry(table, row_val);
        (
            new_board | (new_row_val << (48 - (16 * row_idx))),
            gained + table_entry(gains, row_val),
        )
    });
    Board { raw, score: board.score + gained }
}

fn shift_cols(board: Board, move_dir: Move) -> Board {
    let transpose_board = transpose(board.raw);
    let s = stores();
    let (table, gains): (&[u64], &[Score]) = match move_dir {
        Move::Up => (&s.shift_up, &s.gain_front),
        _ => (&s.shift_down, &s.gain_back),
    };
    let (raw, gained) = (0..4).fold((0, 0), |(new_board, gained), col_idx| {
        let col_val = extract_line(transpose_board, col_idx);
        let new_col_val = table_entry(table, col_val);
        (
            new_board | (new_col_val << (12 - (4 * col_idx))),
            gained + table_entry(gains, col_val),
        )
    });
    Board { raw, score: board.score + gained }
}

fn vec_to_row(tiles: &[Tile]) -> Line {
    tiles[0] << 12 | tiles[1] << 8 | tiles[2] << 4 | tiles[3]
}

fn vec_to_col(tiles: &[Tile]) -> Line {
    tiles[0] << 48 | tiles[1] << 32 | tiles[2] << 16 | tiles[3]
}

fn shift_vec_right(vec: Vec<Tile>) -> (Vec<Tile>, Score) {
    let rev_vec: Vec<Tile> = vec.into_iter().rev().collect();
    let (shifted, gain) = shift_vec_left(rev_vec);
    (shifted.into_iter().rev().collect(), gain)
}

fn shift_vec_left(mut vec: Vec<Tile>) -> (Vec<Tile>, Score) {
    let mut gain = 0;
    for i in 0..vec.len() {
        gain += calculate_left_shift(&mut vec[i..]);
    }
    (vec, gain)
}

/// Pull the first tile of `slice` into slot 0 and merge it with the next
/// non-empty tile when the ranks match. Returns the score of that merge.
fn calculate_left_shift(slice: &mut [Tile]) -> Score {
    let mut acc = 0;
    let mut gain = 0;
    for idx in 0..slice.len() {
        let val = slice[idx];
        if acc != 0 && acc == val && acc < MAX_RANK as Tile {
            slice[idx] = 0;
            acc += 1;
            gain = 1 << acc;
            break;
        } else if acc != 0 && val != 0 {
            break;
        } else if acc == 0 && val != 0 {
            slice[idx] = 0;
            acc = val;
        };
    }
    slice[0] = acc;
    gain
}

fn count_non_empty(board: Board) -> u64 {
    let mut board_copy = board.raw;
    board_copy |= board_copy >> 1;
    board_copy |= board_copy >> 2;
    board_copy &= 0x1111111111111111;
    board_copy.count_ones() as u64
}

fn extract_tile(raw: BoardRaw, idx: usize) -> Tile {
    (raw >> ((15 - idx) * 4)) & 0xf
}

fn format_val(rank: &u8) -> String {
    match rank {
        0 => String::from("       "),
        &r => format!("{:^7}", rank_to_value(r)),
    }
}
