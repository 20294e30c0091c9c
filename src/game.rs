//! Game loop wiring the grid, engine and spawner to a controller and renderers.
//!
//! ```
//! use tile_merge::controller::PriorityController;
//! use tile_merge::game::{Game, GameConfig};
//! use tile_merge::render::NullRenderer;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let cfg = GameConfig { width: 3, height: 3, ..GameConfig::default() };
//! let mut game = Game::new(cfg, StdRng::seed_from_u64(5));
//! let summaries = game.run(&mut PriorityController::new(), &mut [&mut NullRenderer]).unwrap();
//! assert_eq!(summaries.len(), 1);
//! assert!(summaries[0].game_over);
//! ```

use log::info;
use rand::Rng;
use serde::Serialize;

use crate::engine::{apply_move, Direction, EngineError, Grid, Position, Rank, Transition};

/// Tiles placed on an empty grid when a game starts.
const STARTING_TILES: usize = 2;

/// Source of moves for the game loop.
pub trait Controller {
    /// Next direction to play, `None` to stop the loop (no move available or input closed).
    fn next_direction(&mut self, grid: &Grid) -> Option<Direction>;

    /// Asked once after each game over.
    fn should_restart(&mut self) -> bool;
}

/// Observer of game events.
pub trait Renderer {
    fn on_restart(&mut self, grid: &Grid);

    /// `grid` already includes the tile spawned after the move.
    fn on_move(&mut self, direction: Direction, grid: &Grid, previous: &Grid, transitions: &[Transition]);

    fn on_game_over(&mut self, grid: &Grid);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    /// Stop a game after this many grid-changing moves.
    pub max_moves: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { width: 4, height: 4, max_moves: None }
    }
}

/// Outcome of a single finished (or interrupted) game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GameSummary {
    pub moves: u64,
    pub score: u64,
    pub highest_rank: Rank,
    /// False when the loop stopped before the grid was stuck.
    pub game_over: bool,
}

/// Result of [`Game::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub direction: Direction,
    pub previous: Grid,
    pub transitions: Vec<Transition>,
    /// Where the new tile landed, `None` if the move changed nothing.
    pub spawned: Option<Position>,
    pub score_gained: u64,
}

/// A grid plus the randomness and counters of the game being played on it.
pub struct Game<R> {
    cfg: GameConfig,
    grid: Grid,
    rng: R,
    score: u64,
    moves: u64,
}

impl<R: Rng> Game<R> {
    /// Create a game with an empty grid. Call [`Self::restart`] or [`Self::run`] to start playing.
    pub fn new(cfg: GameConfig, rng: R) -> Self {
        let grid = Grid::new(cfg.width, cfg.height);
        Self { cfg, grid, rng, score: 0, moves: 0 }
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn config(&self) -> &GameConfig {
        &self.cfg
    }

    #[inline]
    pub fn score(&self) -> u64 {
        self.score
    }

    #[inline]
    pub fn moves(&self) -> u64 {
        self.moves
    }

    /// Clear the grid and counters, then place the starting tiles.
    pub fn restart(&mut self) {
        self.grid.reset();
        self.score = 0;
        self.moves = 0;
        for _ in 0..STARTING_TILES {
            if self.grid.spawn_random_tile(&mut self.rng).is_err() {
                break;
            }
        }
    }

    /// Apply `direction`, spawning a tile if anything moved.
    pub fn step(&mut self, direction: Direction) -> Result<Step, EngineError> {
        let outcome = apply_move(&self.grid, direction);
        let score_gained = outcome.score_gained();
        let spawned = if outcome.changed() {
            self.grid = outcome.grid;
            self.score = self.score.saturating_add(score_gained);
            self.moves += 1;
            Some(self.grid.spawn_random_tile(&mut self.rng)?)
        } else {
            None
        };
        Ok(Step { direction, previous: outcome.previous, transitions: outcome.transitions, spawned, score_gained })
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            moves: self.moves,
            score: self.score,
            highest_rank: self.grid.highest_rank(),
            game_over: self.grid.is_game_over(),
        }
    }

    /// Play until the controller stops or declines a restart; one summary per game.
    pub fn run(
        &mut self,
        controller: &mut dyn Controller,
        renderers: &mut [&mut dyn Renderer],
    ) -> Result<Vec<GameSummary>, EngineError> {
        let mut summaries = Vec::new();
        self.start(renderers);
        loop {
            if self.grid.is_game_over() {
                let summary = self.summary();
                info!("game over after {} moves, score {}", summary.moves, summary.score);
                for renderer in renderers.iter_mut() {
                    renderer.on_game_over(&self.grid);
                }
                summaries.push(summary);
                if controller.should_restart() {
                    self.start(renderers);
                    continue;
                }
                break;
            }
            if self.cfg.max_moves.is_some_and(|limit| self.moves >= limit) {
                info!("move limit reached after {} moves", self.moves);
                summaries.push(self.summary());
                break;
            }
            let Some(direction) = controller.next_direction(&self.grid) else {
                info!("controller stopped after {} moves", self.moves);
                summaries.push(self.summary());
                break;
            };
            let step = self.step(direction)?;
            for renderer in renderers.iter_mut() {
                renderer.on_move(direction, &self.grid, &step.previous, &step.transitions);
            }
        }
        Ok(summaries)
    }

    fn start(&mut self, renderers: &mut [&mut dyn Renderer]) {
        self.restart();
        info!("new game on a {}x{} grid", self.grid.width(), self.grid.height());
        for renderer in renderers.iter_mut() {
            renderer.on_restart(&self.grid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{PriorityController, ScriptedController, SearchController};
    use crate::expectimax::{Expectimax, SearchConfig};
    use rand::{rngs::StdRng, SeedableRng};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Restart(Grid),
        Move { direction: Direction, grid: Grid, previous: Grid, transitions: Vec<Transition> },
        GameOver(Grid),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl Renderer for Recorder {
        fn on_restart(&mut self, grid: &Grid) {
            self.events.push(Event::Restart(grid.clone()));
        }

        fn on_move(&mut self, direction: Direction, grid: &Grid, previous: &Grid, transitions: &[Transition]) {
            self.events.push(Event::Move {
                direction,
                grid: grid.clone(),
                previous: previous.clone(),
                transitions: transitions.to_vec(),
            });
        }

        fn on_game_over(&mut self, grid: &Grid) {
            self.events.push(Event::GameOver(grid.clone()));
        }
    }

    fn game(width: usize, height: usize, seed: u64) -> Game<StdRng> {
        Game::new(GameConfig { width, height, max_moves: None }, StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_restart_places_two_tiles() {
        let mut g = game(4, 4, 1);
        g.restart();
        assert_eq!(g.grid().tile_count(), 2);
        assert_eq!((g.score(), g.moves()), (0, 0));

        let mut tiny = game(1, 1, 1);
        tiny.restart();
        assert_eq!(tiny.grid().tile_count(), 1);
    }

    #[test]
    fn test_step_spawns_only_after_change() {
        let mut g = game(4, 4, 2);
        g.restart();
        let before = g.grid().clone();
        let dir = before.legal_moves()[0];
        let step = g.step(dir).unwrap();
        assert_eq!(step.previous, before);
        let pos = step.spawned.unwrap();
        let mut expected = before.shift(dir);
        assert_eq!(expected.get(pos), 0);
        expected.set(pos, g.grid().get(pos));
        assert_eq!(g.grid(), &expected);
        assert_eq!(g.moves(), 1);

        let mut stuck = Game::new(GameConfig { width: 2, height: 1, max_moves: None }, StdRng::seed_from_u64(3));
        stuck.restart();
        // Both cells are filled; if they differ nothing can move.
        if stuck.grid().is_game_over() {
            let step = stuck.step(Direction::Left).unwrap();
            assert_eq!(step.spawned, None);
            assert!(step.transitions.is_empty());
            assert_eq!(stuck.moves(), 0);
        }
    }

    #[test]
    fn test_run_reports_every_event() {
        let mut g = game(3, 3, 4);
        let mut recorder = Recorder::default();
        let summaries = g.run(&mut PriorityController::new(), &mut [&mut recorder]).unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = summaries[0];
        assert!(summary.game_over);

        let events = &recorder.events;
        assert!(matches!(events.first(), Some(Event::Restart(grid)) if grid.tile_count() == 2));
        assert!(matches!(events.last(), Some(Event::GameOver(grid)) if grid.is_game_over()));
        let moves: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Move { direction, grid, previous, transitions } => Some((direction, grid, previous, transitions)),
                _ => None,
            })
            .collect();
        assert_eq!(moves.len() as u64, summary.moves);
        let mut score = 0;
        for (direction, grid, previous, transitions) in moves {
            let outcome = apply_move(previous, *direction);
            assert_eq!(&outcome.transitions, transitions);
            assert!(outcome.changed());
            assert_eq!(grid.tile_count(), outcome.grid.tile_count() + 1);
            score += outcome.score_gained();
        }
        assert_eq!(summary.score, score);
    }

    #[test]
    fn test_run_restarts_when_asked() {
        let mut g = game(2, 2, 5);
        let mut recorder = Recorder::default();
        let mut controller = PriorityController::new().with_restarts(2);
        let summaries = g.run(&mut controller, &mut [&mut recorder]).unwrap();
        assert_eq!(summaries.len(), 3);
        assert!(summaries.iter().all(|s| s.game_over));
        let restarts = recorder.events.iter().filter(|e| matches!(e, Event::Restart(_))).count();
        let game_overs = recorder.events.iter().filter(|e| matches!(e, Event::GameOver(_))).count();
        assert_eq!((restarts, game_overs), (3, 3));
    }

    #[test]
    fn test_run_honours_move_limit() {
        let cfg = GameConfig { width: 3, height: 3, max_moves: Some(5) };
        let mut g = Game::new(cfg, StdRng::seed_from_u64(6));
        let policy = Expectimax::with_config(SearchConfig { depth: 1, ..SearchConfig::default() });
        let summaries = g.run(&mut SearchController::new(policy), &mut []).unwrap();
        assert_eq!(summaries, vec![GameSummary { game_over: false, ..g.summary() }]);
        assert_eq!(summaries[0].moves, 5);
    }

    #[test]
    fn test_illegal_scripted_move_changes_nothing() {
        let mut g = game(3, 3, 7);
        g.restart();
        let start = g.grid().clone();
        let illegal = Direction::ALL.into_iter().find(|&d| !start.legal_moves().contains(&d));
        let Some(illegal) = illegal else { return };
        let mut recorder = Recorder::default();
        let mut controller = ScriptedController::new([illegal]);
        // `run` restarts with the same seed, so the first grid matches `start`.
        let mut g = game(3, 3, 7);
        let summaries = g.run(&mut controller, &mut [&mut recorder]).unwrap();
        assert_eq!(summaries[0].moves, 0);
        assert!(!summaries[0].game_over);
        assert_eq!(
            recorder.events[1],
            Event::Move { direction: illegal, grid: start.clone(), previous: start, transitions: vec![] }
        );
    }
}
