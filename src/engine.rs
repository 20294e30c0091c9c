use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Tile rank. 0 is an empty cell, rank `r` displays as `2^r`.
pub type Rank = u8;

/// Out-of-bounds neighbour value for the terminality check. Never equal to a rank.
const OUT_OF_BOUNDS: i16 = -1;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid direction: {0:?}")]
    InvalidDirection(String),
    #[error("no empty cell left to spawn into")]
    GridFull,
    #[error("invalid grid shape: {0}")]
    InvalidShape(&'static str),
}

/// A direction to move/merge tiles, named after the edge the tiles travel toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Canonical enumeration order. Search tie-breaks depend on it.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Unit step `(dx, dy)` toward the target edge. Row 0 is the top edge.
    #[inline]
    pub const fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = EngineError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::Up),
            1 => Ok(Direction::Down),
            2 => Ok(Direction::Left),
            3 => Ok(Direction::Right),
            other => Err(EngineError::InvalidDirection(other.to_string())),
        }
    }
}

impl FromStr for Direction {
    type Err = EngineError;

    /// Accepts `up`/`down`/`left`/`right` and the `w`/`s`/`a`/`d` keys, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "w" => Ok(Direction::Up),
            "down" | "s" => Ok(Direction::Down),
            "left" | "a" => Ok(Direction::Left),
            "right" | "d" => Ok(Direction::Right),
            _ => Err(EngineError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

/// Cell coordinates: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    #[inline]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// One tile travelling from `from` to `to` during a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: Position,
    pub to: Position,
    /// True when the tile merged into an equal tile at `to`.
    pub merged: bool,
}

/// Fixed-size board of tile ranks, stored row-major.
///
/// Dimensions are set at construction and never change. Cloning yields a fully
/// independent board, which is what the search relies on for branch isolation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Box<[Rank]>,
}

impl Grid {
    /// Create an empty `width x height` grid.
    ///
    /// Panics if either dimension is zero.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be non-zero");
        Self { width, height, cells: vec![0; width * height].into_boxed_slice() }
    }

    /// Build a grid from rows of ranks, top row first.
    ///
    /// ```
    /// use tile_merge::engine::{Grid, Position};
    /// let g = Grid::from_rows(&[[0u8, 1], [2, 0]]).unwrap();
    /// assert_eq!((g.width(), g.height()), (2, 2));
    /// assert_eq!(g.get(Position::new(0, 1)), 2);
    /// ```
    pub fn from_rows<R: AsRef<[Rank]>>(rows: &[R]) -> Result<Self, EngineError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        if height == 0 || width == 0 {
            return Err(EngineError::InvalidShape("grid must have at least one row and one column"));
        }
        if rows.iter().any(|r| r.as_ref().len() != width) {
            return Err(EngineError::InvalidShape("rows have different lengths"));
        }
        let cells: Vec<Rank> = rows.iter().flat_map(|r| r.as_ref().iter().copied()).collect();
        Ok(Self { width, height, cells: cells.into_boxed_slice() })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, pos: Position) -> usize {
        debug_assert!(pos.x < self.width && pos.y < self.height);
        pos.y * self.width + pos.x
    }

    /// Rank at `pos`. Panics when `pos` is outside the grid.
    #[inline]
    pub fn get(&self, pos: Position) -> Rank {
        self.cells[self.index(pos)]
    }

    #[inline]
    pub fn set(&mut self, pos: Position, rank: Rank) {
        let idx = self.index(pos);
        self.cells[idx] = rank;
    }

    /// Rank at signed coordinates, `None` when out of bounds.
    #[inline]
    pub fn checked_get(&self, x: isize, y: isize) -> Option<Rank> {
        let x = usize::try_from(x).ok().filter(|&x| x < self.width)?;
        let y = usize::try_from(y).ok().filter(|&y| y < self.height)?;
        Some(self.get(Position::new(x, y)))
    }

    /// All ranks in row-major order.
    #[inline]
    pub fn cells(&self) -> &[Rank] {
        &self.cells
    }

    /// The ranks of row `y`, left to right.
    pub fn row(&self, y: usize) -> &[Rank] {
        &self.cells[y * self.width..(y + 1) * self.width]
    }

    /// Every position in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let width = self.width;
        (0..self.height).flat_map(move |y| (0..width).map(move |x| Position::new(x, y)))
    }

    /// Empty positions in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = Position> + '_ {
        self.positions().filter(move |&p| self.get(p) == 0)
    }

    #[inline]
    pub fn count_empty(&self) -> usize {
        self.cells.iter().filter(|&&r| r == 0).count()
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.cells.len() - self.count_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count_empty() == 0
    }

    /// Highest rank on the grid, 0 for an empty grid.
    pub fn highest_rank(&self) -> Rank {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Displayed value of the tile at `pos` (0 if empty), e.g. 2, 4, 8, ...
    #[inline]
    pub fn tile_value(&self, pos: Position) -> u64 {
        tile_value(self.get(pos))
    }

    /// Clear every cell.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }

    /// Slide/merge in `direction`, returning the snapshot, new grid and transitions.
    #[inline]
    pub fn apply_move(&self, direction: Direction) -> MoveOutcome {
        apply_move(self, direction)
    }

    /// Slide/merge in `direction`, returning only the new grid. No randomness.
    #[inline]
    pub fn shift(&self, direction: Direction) -> Grid {
        shift(self, direction)
    }

    /// Insert a rank-1 (90%) or rank-2 (10%) tile into a uniformly chosen empty cell.
    ///
    /// ```
    /// use tile_merge::engine::Grid;
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let mut g = Grid::new(4, 4);
    /// g.spawn_random_tile(&mut rng).unwrap();
    /// g.spawn_random_tile(&mut rng).unwrap();
    /// assert_eq!(g.count_empty(), 14);
    /// ```
    #[inline]
    pub fn spawn_random_tile<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Position, EngineError> {
        spawn_random_tile(self, rng)
    }

    #[inline]
    pub fn legal_moves(&self) -> Vec<Direction> {
        legal_moves(self)
    }

    #[inline]
    pub fn can_move(&self) -> bool {
        can_move(self)
    }

    #[inline]
    pub fn is_game_over(&self) -> bool {
        !can_move(self)
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid({}x{} ", self.width, self.height)?;
        f.debug_list().entries((0..self.height).map(|y| self.row(y))).finish()?;
        f.write_str(")")
    }
}

impl fmt::Display for Grid {
    /// Boxed layout, each cell centred in a column sized to the widest value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self
            .cells
            .iter()
            .map(|&r| tile_value(r).max(1).to_string().len())
            .max()
            .unwrap_or(1)
            + 2;
        let border = format!("{}+", format!("+{}", "-".repeat(cell)).repeat(self.width));
        let padding = format!("{}|", format!("|{}", " ".repeat(cell)).repeat(self.width));
        writeln!(f, "{border}")?;
        for y in 0..self.height {
            writeln!(f, "{padding}")?;
            for &rank in self.row(y) {
                if rank == 0 {
                    write!(f, "|{:cell$}", "")?;
                } else {
                    write!(f, "|{:^cell$}", tile_value(rank))?;
                }
            }
            writeln!(f, "|")?;
            writeln!(f, "{padding}")?;
            writeln!(f, "{border}")?;
        }
        Ok(())
    }
}

/// Result of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The grid as it was before the move.
    pub previous: Grid,
    pub grid: Grid,
    /// Tile transitions in processing order.
    pub transitions: Vec<Transition>,
}

impl MoveOutcome {
    /// True if any tile slid or merged.
    #[inline]
    pub fn changed(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// Points earned: the displayed value of every tile produced by a merge.
    pub fn score_gained(&self) -> u64 {
        self.transitions
            .iter()
            .filter(|t| t.merged)
            .fold(0u64, |acc, t| acc.saturating_add(self.grid.tile_value(t.to)))
    }
}

/// Displayed value for a rank (0 for empty, saturating for absurd ranks).
#[inline]
pub fn tile_value(rank: Rank) -> u64 {
    if rank == 0 {
        0
    } else {
        1u64.checked_shl(u32::from(rank)).unwrap_or(u64::MAX)
    }
}

/// Slide/merge tiles of `grid` in `direction`. Deterministic, leaves `grid` untouched.
///
/// ```
/// use tile_merge::engine::{apply_move, Direction, Grid};
/// let g = Grid::from_rows(&[[1u8, 1, 2, 0]]).unwrap();
/// let out = apply_move(&g, Direction::Left);
/// assert_eq!(out.grid, Grid::from_rows(&[[2u8, 2, 0, 0]]).unwrap());
/// assert_eq!(out.previous, g);
/// ```
pub fn apply_move(grid: &Grid, direction: Direction) -> MoveOutcome {
    let mut next = grid.clone();
    let transitions = slide(&mut next, direction);
    MoveOutcome { previous: grid.clone(), grid: next, transitions }
}

/// Like [`apply_move`] but without the snapshot; used on the search hot path.
pub fn shift(grid: &Grid, direction: Direction) -> Grid {
    let mut next = grid.clone();
    slide(&mut next, direction);
    next
}

/// Position of the `k`-th cell of `line`, counting from the target edge.
#[inline]
fn line_cell(width: usize, height: usize, direction: Direction, line: usize, k: usize) -> Position {
    match direction {
        Direction::Up => Position::new(line, k),
        Direction::Down => Position::new(line, height - 1 - k),
        Direction::Left => Position::new(k, line),
        Direction::Right => Position::new(width - 1 - k, line),
    }
}

fn slide(grid: &mut Grid, direction: Direction) -> Vec<Transition> {
    let (width, height) = (grid.width, grid.height);
    let (lines, len) = match direction {
        Direction::Up | Direction::Down => (width, height),
        Direction::Left | Direction::Right => (height, width),
    };
    let cell = |line, k| line_cell(width, height, direction, line, k);
    let mut merged = vec![false; grid.cells.len()];
    let mut transitions = Vec::new();

    for line in 0..lines {
        // Nearest-to-edge tiles resolve first and get first claim on merge targets.
        for k in 1..len {
            let origin = cell(line, k);
            let rank = grid.get(origin);
            if rank == 0 {
                continue;
            }
            grid.set(origin, 0);

            let mut dest = cell(line, 0);
            let mut merge = false;
            for j in (0..k).rev() {
                let scanned = cell(line, j);
                let other = grid.get(scanned);
                if other == 0 {
                    continue;
                }
                if other == rank && !merged[grid.index(scanned)] {
                    dest = scanned;
                    merge = true;
                } else {
                    dest = cell(line, j + 1);
                }
                break;
            }

            if merge {
                let idx = grid.index(dest);
                grid.cells[idx] = rank.saturating_add(1);
                merged[idx] = true;
            } else {
                grid.set(dest, rank);
            }
            if merge || dest != origin {
                transitions.push(Transition { from: origin, to: dest, merged: merge });
            }
        }
    }
    transitions
}

/// True if moving in `direction` would change the grid.
pub fn is_legal(grid: &Grid, direction: Direction) -> bool {
    let (dx, dy) = direction.offset();
    grid.positions().any(|p| {
        let rank = grid.get(p);
        rank != 0
            && matches!(
                grid.checked_get(p.x as isize + dx, p.y as isize + dy),
                Some(n) if n == 0 || n == rank
            )
    })
}

/// Directions that would change the grid, in [`Direction::ALL`] order.
pub fn legal_moves(grid: &Grid) -> Vec<Direction> {
    Direction::ALL.into_iter().filter(|&d| is_legal(grid, d)).collect()
}

/// True while some cell is empty or has an equal 4-neighbour.
pub fn can_move(grid: &Grid) -> bool {
    let neighbour = |x: isize, y: isize| grid.checked_get(x, y).map_or(OUT_OF_BOUNDS, i16::from);
    grid.positions().any(|p| {
        let rank = grid.get(p);
        if rank == 0 {
            return true;
        }
        let (x, y) = (p.x as isize, p.y as isize);
        Direction::ALL.into_iter().any(|d| {
            let (dx, dy) = d.offset();
            neighbour(x + dx, y + dy) == i16::from(rank)
        })
    })
}

/// True if no move can change the grid any more.
#[inline]
pub fn is_game_over(grid: &Grid) -> bool {
    !can_move(grid)
}

/// Insert a random tile into a uniformly chosen empty cell and return its position.
///
/// Fails with [`EngineError::GridFull`] when there is no empty cell.
pub fn spawn_random_tile<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) -> Result<Position, EngineError> {
    let empty: Vec<Position> = grid.empty_cells().collect();
    let &pos = empty.choose(rng).ok_or(EngineError::GridFull)?;
    grid.set(pos, generate_random_rank(rng));
    Ok(pos)
}

fn generate_random_rank<R: Rng + ?Sized>(rng: &mut R) -> Rank {
    if rng.gen_range(0..10) < 9 {
        1
    } else {
        2
    }
}
