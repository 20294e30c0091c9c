use ahash::RandomState as AHasher;
use dashmap::DashMap;
use log::{debug, trace};
use rayon::prelude::*;

use crate::engine::{legal_moves, shift, Direction, Grid};

use super::heuristic;
use super::{expected_score, pick_best, root_branches, BranchEval, Memo, NoMemo, SearchConfig, SearchStats};

type SharedTable = Vec<DashMap<Grid, f64, AHasher>>;

/// Per-branch handle onto the table shared by all root branches.
struct SharedMemo<'a> {
    levels: &'a SharedTable,
}

impl Memo for SharedMemo<'_> {
    fn lookup(&self, grid: &Grid, depth: u32) -> Option<f64> {
        self.levels.get(depth as usize)?.get(grid).map(|entry| *entry)
    }

    fn store(&mut self, grid: &Grid, depth: u32, score: f64) {
        if let Some(level) = self.levels.get(depth as usize) {
            level.insert(grid.clone(), score);
        }
    }
}

/// Parallel Expectimax: root moves are scored on the rayon pool.
///
/// Each root branch owns its grid copy and node counter. With caching on, the
/// branches share a `DashMap` table; a cached score is bit-identical to the one
/// it replaces, so the chosen move matches [`super::Expectimax`] exactly.
pub struct ExpectimaxParallel {
    cfg: SearchConfig,
    stats: SearchStats,
}

impl ExpectimaxParallel {
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

    /// Compute the best move using parallel expectimax.
    ///
    /// Same short-circuit and tie-break rules as the sequential search.
    pub fn best_move(&mut self, grid: &Grid) -> Option<Direction> {
        let legal = legal_moves(grid);
        match legal.as_slice() {
            [] => {
                self.stats.record(0);
                debug!("expectimax-par: no legal move");
                None
            }
            [only] => {
                self.stats.record(0);
                Some(*only)
            }
            _ => {
                let (best, _) = self.best_move_with_branches(grid);
                best
            }
        }
    }

    /// Best move and all branch evaluations from a single search.
    pub fn best_move_with_branches(&mut self, grid: &Grid) -> (Option<Direction>, [BranchEval; 4]) {
        let branches = self.branch_evals(grid);
        let best = pick_best(&branches);
        debug!("expectimax-par: best {:?} after {} nodes", best, self.stats.nodes);
        (best, branches)
    }

    /// Score every direction in `[Up, Down, Left, Right]` order.
    pub fn branch_evals(&mut self, grid: &Grid) -> [BranchEval; 4] {
        let legal = legal_moves(grid);
        let mut branches = root_branches(&legal);
        let depth = self.cfg.depth;
        let table: Option<SharedTable> = self
            .cfg
            .cache_enabled
            .then(|| (0..=depth).map(|_| DashMap::with_hasher(AHasher::new())).collect());

        let scored: Vec<(f64, u64)> = branches[..]
            .par_iter()
            .map(|branch| {
                if !branch.legal {
                    return (0.0, 0);
                }
                let child = shift(grid, branch.dir);
                let mut nodes = 0u64;
                let ev = match &table {
                    Some(levels) => expected_score(&child, depth, &mut SharedMemo { levels }, &mut nodes),
                    None => expected_score(&child, depth, &mut NoMemo, &mut nodes),
                };
                (ev, nodes)
            })
            .collect();

        let mut total_nodes = 0u64;
        for (branch, (ev, nodes)) in branches.iter_mut().zip(scored) {
            branch.ev = ev;
            total_nodes += nodes;
            if branch.legal {
                trace!("expectimax-par: {} scored {}", branch.dir, ev);
            }
        }
        self.stats.record(total_nodes);
        branches
    }

    /// Value at the root: the best branch score, 0 when there is no legal move.
    pub fn state_value(&mut self, grid: &Grid) -> f64 {
        self.branch_evals(grid).iter().filter(|b| b.legal).map(|b| b.ev).fold(0.0, f64::max)
    }

    #[inline]
    pub fn last_stats(&self) -> SearchStats {
        self.stats
    }

    #[inline]
    pub fn reset_stats(&mut self) {
        self.stats = SearchStats::default();
    }
}

impl Default for ExpectimaxParallel {
    fn default() -> Self {
        Self::new()
    }
}
