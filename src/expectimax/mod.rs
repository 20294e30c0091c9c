//! Expectimax move evaluator (single-threaded and parallel).
//!
//! This module provides two policy implementations:
//! - [`Expectimax`]: single-threaded expectimax.
//! - [`ExpectimaxParallel`]: rayon-based parallel expectimax over root moves.
//!
//! Both share the same surface and always pick the same direction for the same
//! grid and [`SearchConfig`].
//!
//! Search outline
//! - Exactly one legal move: returned immediately, nothing is simulated.
//! - Otherwise every legal direction is applied to its own copy of the grid and
//!   scored; the highest score wins, ties going to the earliest direction in
//!   [`Direction::ALL`] order.
//! - A score at depth `n > 0` is the mean over every (spawn, legal move) pair of
//!   the score at depth `n - 1`. Spawns are every empty cell with rank 1 and
//!   rank 2, unweighted. At depth 0 the grid's static value is used.
//!
//! Quick start
//! ```
//! use tile_merge::engine::Grid;
//! use tile_merge::expectimax::{Expectimax, ExpectimaxParallel, SearchConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let mut g = Grid::new(3, 3);
//! g.spawn_random_tile(&mut rng).unwrap();
//! g.spawn_random_tile(&mut rng).unwrap();
//!
//! let cfg = SearchConfig { depth: 1, ..SearchConfig::default() };
//! let mut ex = Expectimax::with_config(cfg.clone());
//! let mut ex_par = ExpectimaxParallel::with_config(cfg);
//! let m = ex.best_move(&g);
//! assert!(m.is_some());
//! assert_eq!(m, ex_par.best_move(&g));
//! ```

use crate::engine::{legal_moves, shift, Direction, Grid, Rank};

mod heuristic;
mod search_par;
mod search_seq;

pub use heuristic::static_value;
pub use search_par::ExpectimaxParallel;
pub use search_seq::Expectimax;

/// Ranks a hypothetical spawn can take.
const SPAWN_RANKS: [Rank; 2] = [1, 2];

/// Configurable knobs for Expectimax.
///
/// - `depth`: number of spawn/move plies below each root move.
/// - `cache_enabled`: memoize scores by `(grid, remaining depth)`. Never changes
///   the chosen move, only how many nodes are visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub depth: u32,
    pub cache_enabled: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { depth: 3, cache_enabled: false }
    }
}

/// Per-branch score at the root.
///
/// - `ev` is the score for taking `dir` from the current grid.
/// - `legal` is false when the move is a no-op for the current grid (`ev` is 0 then).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Direction,
    pub ev: f64,
    pub legal: bool,
}

/// Basic search stats.
///
/// `nodes` counts scored positions in the last evaluation, `peak_nodes` the
/// maximum seen since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
}

impl SearchStats {
    fn record(&mut self, nodes: u64) {
        self.nodes = nodes;
        self.peak_nodes = self.peak_nodes.max(nodes);
    }
}

/// A move-choosing strategy over a grid.
pub trait MovePolicy {
    /// Pick a direction, `None` when no direction changes the grid.
    fn best_move(&mut self, grid: &Grid) -> Option<Direction>;

    fn last_stats(&self) -> SearchStats;
}

impl MovePolicy for Expectimax {
    fn best_move(&mut self, grid: &Grid) -> Option<Direction> {
        Expectimax::best_move(self, grid)
    }

    fn last_stats(&self) -> SearchStats {
        Expectimax::last_stats(self)
    }
}

impl MovePolicy for ExpectimaxParallel {
    fn best_move(&mut self, grid: &Grid) -> Option<Direction> {
        ExpectimaxParallel::best_move(self, grid)
    }

    fn last_stats(&self) -> SearchStats {
        ExpectimaxParallel::last_stats(self)
    }
}

/// Score storage keyed by grid contents and remaining depth.
pub(crate) trait Memo {
    fn lookup(&self, grid: &Grid, depth: u32) -> Option<f64>;
    fn store(&mut self, grid: &Grid, depth: u32, score: f64);
}

/// Memo that remembers nothing.
pub(crate) struct NoMemo;

impl Memo for NoMemo {
    #[inline]
    fn lookup(&self, _grid: &Grid, _depth: u32) -> Option<f64> {
        None
    }

    #[inline]
    fn store(&mut self, _grid: &Grid, _depth: u32, _score: f64) {}
}

/// Chance-node score of `grid` with `depth` plies left.
///
/// Every branch gets its own grid copy; `grid` itself is never mutated.
pub(crate) fn expected_score<M: Memo>(grid: &Grid, depth: u32, memo: &mut M, nodes: &mut u64) -> f64 {
    *nodes += 1;
    if depth == 0 {
        return static_value(grid);
    }
    if let Some(score) = memo.lookup(grid, depth) {
        return score;
    }
    let mut sum = 0.0;
    let mut count = 0u64;
    for pos in grid.empty_cells() {
        for rank in SPAWN_RANKS {
            let mut spawned = grid.clone();
            spawned.set(pos, rank);
            for dir in legal_moves(&spawned) {
                sum += expected_score(&shift(&spawned, dir), depth - 1, memo, nodes);
                count += 1;
            }
        }
    }
    // Every spawn ends the game.
    let score = if count == 0 { 0.0 } else { sum / count as f64 };
    memo.store(grid, depth, score);
    score
}

/// Unscored root branches in canonical order, `legal` set from `legal`.
pub(crate) fn root_branches(legal: &[Direction]) -> [BranchEval; 4] {
    Direction::ALL.map(|dir| BranchEval { dir, ev: 0.0, legal: legal.contains(&dir) })
}

/// First legal branch with the highest score.
pub(crate) fn pick_best(branches: &[BranchEval]) -> Option<Direction> {
    let mut best: Option<&BranchEval> = None;
    for branch in branches.iter().filter(|b| b.legal) {
        if best.map_or(true, |cur| branch.ev > cur.ev) {
            best = Some(branch);
        }
    }
    best.map(|b| b.dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid<const W: usize>(rows: &[[Rank; W]]) -> Grid {
        Grid::from_rows(rows).unwrap()
    }

    #[test]
    fn test_pick_best_prefers_first_on_tie() {
        let branches = [
            BranchEval { dir: Direction::Up, ev: 9.0, legal: false },
            BranchEval { dir: Direction::Down, ev: 5.0, legal: true },
            BranchEval { dir: Direction::Left, ev: 7.0, legal: true },
            BranchEval { dir: Direction::Right, ev: 7.0, legal: true },
        ];
        assert_eq!(pick_best(&branches), Some(Direction::Left));
        assert_eq!(pick_best(&branches[..1]), None);
    }

    #[test]
    fn test_pick_best_accepts_zero_scores() {
        let branches = [
            BranchEval { dir: Direction::Up, ev: 0.0, legal: false },
            BranchEval { dir: Direction::Down, ev: 0.0, legal: true },
        ];
        assert_eq!(pick_best(&branches), Some(Direction::Down));
    }

    #[test]
    fn test_expected_score_depth_one_by_hand() {
        // [1, 0, 0] after moving left from [0, 1, 0]; seven (spawn, move) pairs.
        let mut nodes = 0;
        let score = expected_score(&grid(&[[1, 0, 0]]), 1, &mut NoMemo, &mut nodes);
        assert_eq!(score, 83.0 / 7.0);
        assert_eq!(nodes, 8);
    }

    #[test]
    fn test_expected_score_is_zero_when_every_spawn_ends_the_game() {
        // Either spawn into the last cell leaves no legal move.
        let g = grid(&[[1, 3], [4, 0]]);
        let mut nodes = 0;
        assert_eq!(expected_score(&g, 2, &mut NoMemo, &mut nodes), 0.0);
        assert_eq!(nodes, 1);
    }

    #[test]
    fn test_expected_score_leaves_input_untouched() {
        let g = grid(&[[1, 0], [0, 2]]);
        let before = g.clone();
        let mut nodes = 0;
        expected_score(&g, 2, &mut NoMemo, &mut nodes);
        assert_eq!(g, before);
    }
}
