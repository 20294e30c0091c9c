use std::io::{self, BufRead, Write};

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::json;

use tile_merge::controller::{PriorityController, RandomController, SearchController};
use tile_merge::engine::{tile_value, Direction, Grid};
use tile_merge::expectimax::{Expectimax, ExpectimaxParallel, SearchConfig};
use tile_merge::game::{Controller, Game, GameConfig, Renderer};
use tile_merge::render::{JsonRenderer, NullRenderer, TextRenderer};

#[derive(Parser, Debug)]
#[command(name = "tile-merge", version, about = "Play the sliding-tile merge puzzle in the terminal")]
struct Args {
    /// Grid width in cells
    #[arg(long, default_value_t = 4)]
    width: usize,
    /// Grid height in cells
    #[arg(long, default_value_t = 4)]
    height: usize,
    /// Who picks the moves
    #[arg(short, long, value_enum, default_value_t = ControllerKind::Search)]
    controller: ControllerKind,
    /// Expectimax depth below each root move
    #[arg(short, long, default_value_t = 3)]
    depth: u32,
    /// Memoize search scores within a decision
    #[arg(long)]
    cache: bool,
    /// Score root moves on the rayon pool
    #[arg(long)]
    parallel: bool,
    /// RNG seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,
    /// Games to play back to back (the human controller is asked instead)
    #[arg(short = 'n', long, default_value_t = 1)]
    games: u64,
    /// Stop a game after this many moves
    #[arg(long)]
    max_moves: Option<u64>,
    /// Emit newline-delimited JSON events instead of text
    #[arg(long)]
    json: bool,
    /// Print transitions above every grid
    #[arg(long)]
    transitions: bool,
    /// Only print the per-game summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ControllerKind {
    Search,
    Random,
    Priority,
    Human,
}

/// Reads directions typed on `input`, prompting on `out`.
struct HumanController<I, O> {
    input: I,
    out: O,
}

impl<I: BufRead, O: Write> HumanController<I, O> {
    fn new(input: I, out: O) -> Self {
        Self { input, out }
    }

    /// `None` on end of input or a broken stream.
    fn prompt(&mut self, prompt: &str) -> Option<String> {
        write!(self.out, "{prompt}").and_then(|()| self.out.flush()).ok()?;
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<I: BufRead, O: Write> Controller for HumanController<I, O> {
    fn next_direction(&mut self, _grid: &Grid) -> Option<Direction> {
        loop {
            let line = self.prompt("Move (w/a/s/d, q to quit): ")?;
            if line.eq_ignore_ascii_case("q") {
                return None;
            }
            match line.parse() {
                Ok(dir) => return Some(dir),
                Err(e) => {
                    let _ = writeln!(self.out, "{e}");
                }
            }
        }
    }

    fn should_restart(&mut self) -> bool {
        self.prompt("Restart? (Y/n): ").is_some_and(|answer| !answer.to_ascii_lowercase().starts_with('n'))
    }
}

fn build_controller(args: &Args, seed: u64) -> Box<dyn Controller> {
    let restarts = args.games - 1;
    let cfg = SearchConfig { depth: args.depth, cache_enabled: args.cache };
    match args.controller {
        ControllerKind::Search if args.parallel => {
            Box::new(SearchController::new(ExpectimaxParallel::with_config(cfg)).with_restarts(restarts))
        }
        ControllerKind::Search => Box::new(SearchController::new(Expectimax::with_config(cfg)).with_restarts(restarts)),
        ControllerKind::Random => {
            Box::new(RandomController::new(StdRng::seed_from_u64(seed.wrapping_add(1))).with_restarts(restarts))
        }
        ControllerKind::Priority => Box::new(PriorityController::new().with_restarts(restarts)),
        ControllerKind::Human => Box::new(HumanController::new(io::stdin().lock(), io::stdout())),
    }
}

fn build_renderer(args: &Args) -> Box<dyn Renderer> {
    if args.quiet {
        Box::new(NullRenderer)
    } else if args.json {
        Box::new(JsonRenderer::new(io::stdout()))
    } else {
        Box::new(TextRenderer::new(io::stdout()).with_transitions(args.transitions))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    ensure!(args.width > 0 && args.height > 0, "grid must be at least 1x1, got {}x{}", args.width, args.height);
    ensure!(args.games > 0, "--games must be at least 1");

    let seed = args.seed.unwrap_or_else(rand::random);
    info!("seed {seed}");

    let cfg = GameConfig { width: args.width, height: args.height, max_moves: args.max_moves };
    let mut game = Game::new(cfg, StdRng::seed_from_u64(seed));
    let mut controller = build_controller(&args, seed);
    let mut renderer = build_renderer(&args);

    let summaries = game.run(controller.as_mut(), &mut [renderer.as_mut()]).context("game loop failed")?;

    if args.json {
        let mut out = io::stdout().lock();
        serde_json::to_writer(&mut out, &json!({ "event": "summary", "seed": seed, "games": summaries }))?;
        writeln!(out)?;
    } else {
        for (i, s) in summaries.iter().enumerate() {
            let status = if s.game_over { "game over" } else { "stopped" };
            eprintln!(
                "Game {}: {status} | moves: {} | score: {} | highest tile: {}",
                i + 1,
                s.moves,
                s.score,
                tile_value(s.highest_rank)
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn human(input: &str) -> HumanController<Cursor<Vec<u8>>, Vec<u8>> {
        HumanController::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_human_controller_reprompts_on_bad_input() {
        let g = Grid::new(2, 2);
        let mut c = human("x\nleft\nW\n");
        assert_eq!(c.next_direction(&g), Some(Direction::Left));
        assert_eq!(c.next_direction(&g), Some(Direction::Up));
        assert_eq!(c.next_direction(&g), None);
        let prompts = String::from_utf8(c.out).unwrap();
        assert_eq!(prompts.matches("Move (").count(), 4);
    }

    #[test]
    fn test_human_controller_quit_and_restart() {
        let g = Grid::new(2, 2);
        assert_eq!(human("q\n").next_direction(&g), None);
        assert!(human("\n").should_restart());
        assert!(human("yes\n").should_restart());
        assert!(!human("No\n").should_restart());
        assert!(!human("").should_restart());
    }

    #[test]
    fn test_cli_parses_defaults() {
        let args = Args::parse_from(["tile-merge"]);
        assert_eq!((args.width, args.height, args.depth, args.games), (4, 4, 3, 1));
        assert_eq!(args.controller, ControllerKind::Search);
        let args = Args::parse_from(["tile-merge", "-c", "priority", "-n", "3", "--json"]);
        assert_eq!(args.controller, ControllerKind::Priority);
        assert!(args.json);
    }
}
