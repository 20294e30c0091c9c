//! Built-in [`Controller`] implementations.
//!
//! Every controller declines restarts unless built with `with_restarts(n)`,
//! in which case it accepts the next `n` restart offers.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::engine::{legal_moves, Direction, Grid};
use crate::expectimax::{MovePolicy, SearchStats};
use crate::game::Controller;

#[derive(Debug, Clone, Copy, Default)]
struct Restarts(u64);

impl Restarts {
    fn take(&mut self) -> bool {
        if self.0 == 0 {
            return false;
        }
        self.0 -= 1;
        true
    }
}

/// Plays whatever the wrapped search policy picks.
pub struct SearchController<P> {
    policy: P,
    restarts: Restarts,
}

impl<P: MovePolicy> SearchController<P> {
    pub fn new(policy: P) -> Self {
        Self { policy, restarts: Restarts::default() }
    }

    pub fn with_restarts(mut self, restarts: u64) -> Self {
        self.restarts = Restarts(restarts);
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn last_stats(&self) -> SearchStats {
        self.policy.last_stats()
    }
}

impl<P: MovePolicy> Controller for SearchController<P> {
    fn next_direction(&mut self, grid: &Grid) -> Option<Direction> {
        self.policy.best_move(grid)
    }

    fn should_restart(&mut self) -> bool {
        self.restarts.take()
    }
}

/// Uniformly random direction, legal or not.
pub struct RandomController<R> {
    rng: R,
    restarts: Restarts,
}

impl<R: Rng> RandomController<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, restarts: Restarts::default() }
    }

    pub fn with_restarts(mut self, restarts: u64) -> Self {
        self.restarts = Restarts(restarts);
        self
    }
}

impl<R: Rng> Controller for RandomController<R> {
    fn next_direction(&mut self, _grid: &Grid) -> Option<Direction> {
        Direction::ALL.choose(&mut self.rng).copied()
    }

    fn should_restart(&mut self) -> bool {
        self.restarts.take()
    }
}

/// First legal direction from a fixed preference order.
pub struct PriorityController {
    order: [Direction; 4],
    restarts: Restarts,
}

impl PriorityController {
    /// Prefers Up, then Left, Right and finally Down.
    pub fn new() -> Self {
        Self::with_order([Direction::Up, Direction::Left, Direction::Right, Direction::Down])
    }

    pub fn with_order(order: [Direction; 4]) -> Self {
        Self { order, restarts: Restarts::default() }
    }

    pub fn with_restarts(mut self, restarts: u64) -> Self {
        self.restarts = Restarts(restarts);
        self
    }
}

impl Default for PriorityController {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller for PriorityController {
    fn next_direction(&mut self, grid: &Grid) -> Option<Direction> {
        let legal = legal_moves(grid);
        self.order.into_iter().find(|dir| legal.contains(dir))
    }

    fn should_restart(&mut self) -> bool {
        self.restarts.take()
    }
}

/// Replays a fixed list of directions, then stops.
pub struct ScriptedController {
    moves: VecDeque<Direction>,
    restarts: Restarts,
}

impl ScriptedController {
    pub fn new(moves: impl IntoIterator<Item = Direction>) -> Self {
        Self { moves: moves.into_iter().collect(), restarts: Restarts::default() }
    }

    pub fn with_restarts(mut self, restarts: u64) -> Self {
        self.restarts = Restarts(restarts);
        self
    }

    pub fn remaining(&self) -> usize {
        self.moves.len()
    }
}

impl Controller for ScriptedController {
    fn next_direction(&mut self, _grid: &Grid) -> Option<Direction> {
        self.moves.pop_front()
    }

    fn should_restart(&mut self) -> bool {
        self.restarts.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Rank;
    use crate::expectimax::{Expectimax, SearchConfig};
    use rand::{rngs::StdRng, SeedableRng};

    fn grid<const W: usize>(rows: &[[Rank; W]]) -> Grid {
        Grid::from_rows(rows).unwrap()
    }

    #[test]
    fn test_priority_controller_skips_illegal_directions() {
        let mut c = PriorityController::new();
        // Up and Left are blocked; Right is preferred over Down.
        assert_eq!(c.next_direction(&grid(&[[1, 0], [2, 0]])), Some(Direction::Right));
        assert_eq!(c.next_direction(&grid(&[[1, 2], [0, 0]])), Some(Direction::Down));
        assert_eq!(c.next_direction(&grid(&[[1, 2], [2, 1]])), None);
    }

    #[test]
    fn test_restart_budget() {
        let mut c = PriorityController::new().with_restarts(2);
        assert!(c.should_restart());
        assert!(c.should_restart());
        assert!(!c.should_restart());
        assert!(!ScriptedController::new(Vec::<Direction>::new()).should_restart());
    }

    #[test]
    fn test_scripted_controller_replays_in_order() {
        let g = Grid::new(2, 2);
        let mut c = ScriptedController::new([Direction::Left, Direction::Up]);
        assert_eq!(c.next_direction(&g), Some(Direction::Left));
        assert_eq!(c.remaining(), 1);
        assert_eq!(c.next_direction(&g), Some(Direction::Up));
        assert_eq!(c.next_direction(&g), None);
    }

    #[test]
    fn test_random_controller_is_reproducible() {
        let g = Grid::new(2, 2);
        let mut a = RandomController::new(StdRng::seed_from_u64(8));
        let mut b = RandomController::new(StdRng::seed_from_u64(8));
        let seq_a: Vec<_> = (0..32).map(|_| a.next_direction(&g)).collect();
        let seq_b: Vec<_> = (0..32).map(|_| b.next_direction(&g)).collect();
        assert_eq!(seq_a, seq_b);
        assert!(seq_a.iter().all(Option::is_some));
    }

    #[test]
    fn test_search_controller_delegates_to_policy() {
        let policy = Expectimax::with_config(SearchConfig { depth: 0, ..SearchConfig::default() });
        let mut c = SearchController::new(policy);
        assert_eq!(c.next_direction(&grid(&[[1, 1], [2, 0]])), Some(Direction::Left));
        assert!(c.last_stats().nodes > 0);
        assert_eq!(c.next_direction(&grid(&[[1, 2], [2, 1]])), None);
        assert_eq!(c.policy().config().depth, 0);
    }
}
