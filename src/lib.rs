//! tile-merge: a sliding-tile merge puzzle engine + Expectimax policy
//!
//! This crate provides:
//! - A rectangular `Grid` of tile ranks with the move/merge engine, legality and
//!   terminality checks and the random spawner (`engine` module)
//! - An Expectimax evaluator (`expectimax` module) with single-threaded and parallel variants
//! - A game loop driven by pluggable controllers and renderers (`game`, `controller`, `render`)
//!
//! Quick start:
//! ```
//! use tile_merge::engine::{Direction, Grid};
//! use tile_merge::expectimax::{Expectimax, SearchConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic grid initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut g = Grid::new(4, 4);
//! g.spawn_random_tile(&mut rng).unwrap();
//! g.spawn_random_tile(&mut rng).unwrap();
//!
//! let outcome = g.apply_move(Direction::Left);
//! assert_eq!(outcome.grid.tile_count() + outcome.transitions.iter().filter(|t| t.merged).count(), 2);
//!
//! let mut ex = Expectimax::with_config(SearchConfig { depth: 1, ..SearchConfig::default() });
//! assert!(ex.best_move(&g).is_some());
//! ```
//!
//! Ranks rather than face values are stored: rank 0 is an empty cell and rank
//! `r` shows as `2^r`.
pub mod controller;
pub mod engine;
pub mod expectimax;
pub mod game;
pub mod render;
