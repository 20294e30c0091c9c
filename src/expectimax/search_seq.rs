use std::collections::HashMap;

use log::{debug, trace};

use crate::engine::{legal_moves, shift, Direction, Grid};

use super::heuristic;
use super::{expected_score, pick_best, root_branches, BranchEval, Memo, NoMemo, SearchConfig, SearchStats};

/// Per-depth score cache for a single evaluation.
struct TranspositionTable {
    levels: Vec<HashMap<Grid, f64>>,
}

impl TranspositionTable {
    fn new(depth: u32) -> Self {
        Self { levels: (0..=depth).map(|_| HashMap::new()).collect() }
    }
}

impl Memo for TranspositionTable {
    fn lookup(&self, grid: &Grid, depth: u32) -> Option<f64> {
        self.levels.get(depth as usize)?.get(grid).copied()
    }

    fn store(&mut self, grid: &Grid, depth: u32, score: f64) {
        if let Some(level) = self.levels.get_mut(depth as usize) {
            level.insert(grid.clone(), score);
        }
    }
}

/// Single-threaded Expectimax search.
pub struct Expectimax {
    cfg: SearchConfig,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self {
        Self::with_config(SearchConfig::default())
    }

    pub fn with_config(cfg: SearchConfig) -> Self {
        heuristic::warm();
        Self { cfg, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig {
        &self.cfg
    }

    /// Compute the best move, `None` when no move changes the grid.
    ///
    /// A single legal move is returned without searching (stats record zero nodes).
    ///
    /// Example
    /// ```
    /// use tile_merge::engine::{Direction, Grid};
    /// use tile_merge::expectimax::Expectimax;
    /// let g = Grid::from_rows(&[[1u8, 2], [0, 0]]).unwrap();
    /// let mut ex = Expectimax::new();
    /// assert_eq!(ex.best_move(&g), Some(Direction::Down));
    /// assert_eq!(ex.last_stats().nodes, 0);
    /// ```
    pub fn best_move(&mut self, grid: &Grid) -> Option<Direction> {
        let legal = legal_moves(grid);
        match legal.as_slice() {
            [] => {
                self.stats.record(0);
                debug!("expectimax: no legal move");
                None
            }
            [only] => {
                self.stats.record(0);
                Some(*only)
            }
            _ => {
                let branches = self.evaluate(grid, &legal);
                let best = pick_best(&branches);
                debug!("expectimax: best {:?} after {} nodes", best, self.stats.nodes);
                best
            }
        }
    }

    /// Score every direction (no normalization).
    ///
    /// Returns a fixed array in order `[Up, Down, Left, Right]`; illegal moves
    /// are marked `legal = false` with `ev = 0`.
    ///
    /// Example
    /// ```
    /// use tile_merge::engine::Grid;
    /// use tile_merge::expectimax::{Expectimax, SearchConfig};
    /// let g = Grid::from_rows(&[[1u8, 0], [0, 0]]).unwrap();
    /// let mut ex = Expectimax::with_config(SearchConfig { depth: 1, ..SearchConfig::default() });
    /// let branches = ex.branch_evals(&g);
    /// assert_eq!(branches.iter().filter(|b| b.legal).count(), 2);
    /// ```
    pub fn branch_evals(&mut self, grid: &Grid) -> [BranchEval; 4] {
        let legal = legal_moves(grid);
        self.evaluate(grid, &legal)
    }

    /// Value at the root: the best branch score, 0 when there is no legal move.
    pub fn state_value(&mut self, grid: &Grid) -> f64 {
        self.branch_evals(grid).iter().filter(|b| b.legal).map(|b| b.ev).fold(0.0, f64::max)
    }

    /// Statistics collected from the last call to [`Self::best_move`],
    /// [`Self::branch_evals`] or [`Self::state_value`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = SearchStats::default();
    }

    fn evaluate(&mut self, grid: &Grid, legal: &[Direction]) -> [BranchEval; 4] {
        let mut branches = root_branches(legal);
        let mut nodes = 0u64;
        if self.cfg.cache_enabled {
            let mut table = TranspositionTable::new(self.cfg.depth);
            self.score_branches(grid, &mut branches, &mut table, &mut nodes);
        } else {
            self.score_branches(grid, &mut branches, &mut NoMemo, &mut nodes);
        }
        self.stats.record(nodes);
        branches
    }

    fn score_branches<M: Memo>(&self, grid: &Grid, branches: &mut [BranchEval], memo: &mut M, nodes: &mut u64) {
        for branch in branches.iter_mut().filter(|b| b.legal) {
            branch.ev = expected_score(&shift(grid, branch.dir), self.cfg.depth, memo, nodes);
            trace!("expectimax: {} scored {}", branch.dir, branch.ev);
        }
    }
}

impl Default for Expectimax {
    fn default() -> Self {
        Self::new()
    }
}
