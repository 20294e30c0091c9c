use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use tile_merge::controller::SearchController;
use tile_merge::engine::{tile_value, EngineError};
use tile_merge::expectimax::{Expectimax, SearchConfig};
use tile_merge::game::{Game, GameConfig, GameSummary};

#[derive(Parser, Debug)]
#[command(name = "autoplay", version, about = "Play a batch of seeded expectimax games and report the results")]
struct Args {
    /// Number of games; game `i` uses seed `seed + i`
    #[arg(short = 'n', long, default_value_t = 16)]
    games: u64,
    /// First seed of the batch
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 4)]
    width: usize,
    #[arg(long, default_value_t = 4)]
    height: usize,
    /// Expectimax depth below each root move
    #[arg(short, long, default_value_t = 2)]
    depth: u32,
    /// Memoize search scores within a decision
    #[arg(long)]
    cache: bool,
    /// Stop each game after this many moves
    #[arg(long)]
    max_moves: Option<u64>,
    /// Write per-game results as JSON
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    out: Option<PathBuf>,
    /// Disable the progress bar
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Serialize)]
struct GameRecord {
    seed: u64,
    #[serde(flatten)]
    summary: GameSummary,
}

#[derive(Serialize)]
struct Report<'a> {
    width: usize,
    height: usize,
    depth: u32,
    cache: bool,
    games: &'a [GameRecord],
}

fn play(cfg: &GameConfig, search: &SearchConfig, seed: u64) -> Result<GameRecord, EngineError> {
    let mut game = Game::new(cfg.clone(), StdRng::seed_from_u64(seed));
    let mut controller = SearchController::new(Expectimax::with_config(search.clone()));
    let summaries = game.run(&mut controller, &mut [])?;
    let summary = summaries.into_iter().next().unwrap_or_else(|| game.summary());
    debug!("seed {seed}: {} moves, score {}", summary.moves, summary.score);
    Ok(GameRecord { seed, summary })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    ensure!(args.width > 0 && args.height > 0, "grid must be at least 1x1, got {}x{}", args.width, args.height);
    ensure!(args.games > 0, "--games must be at least 1");

    let cfg = GameConfig { width: args.width, height: args.height, max_moves: args.max_moves };
    let search = SearchConfig { depth: args.depth, cache_enabled: args.cache };
    info!("playing {} games on {}x{} at depth {}", args.games, args.width, args.height, args.depth);

    let pb = if args.quiet { ProgressBar::hidden() } else { ProgressBar::new(args.games) };
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} games ({eta})")
            .context("invalid progress template")?
            .progress_chars("=>-"),
    );

    let start = Instant::now();
    let records: Vec<GameRecord> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let r = play(&cfg, &search, args.seed.wrapping_add(i));
            pb.inc(1);
            r
        })
        .collect::<Result<Vec<_>, _>>()
        .context("game failed")?;
    pb.finish_and_clear();
    let elapsed = start.elapsed().as_secs_f64().max(1e-6);

    let total_moves: u64 = records.iter().map(|r| r.summary.moves).sum();
    let total_score: u64 = records.iter().map(|r| r.summary.score).sum();
    let best_score = records.iter().map(|r| r.summary.score).max().unwrap_or(0);
    let mut tiles: BTreeMap<u64, u64> = BTreeMap::new();
    for r in &records {
        *tiles.entry(tile_value(r.summary.highest_rank)).or_default() += 1;
    }

    println!("games: {}", records.len());
    println!("mean score: {:.1}", total_score as f64 / records.len() as f64);
    println!("best score: {best_score}");
    println!("moves: {total_moves} ({:.1} moves/sec)", total_moves as f64 / elapsed);
    println!("highest tile reached:");
    for (tile, count) in tiles.iter().rev() {
        println!("  {tile:>6}: {count}");
    }

    if let Some(path) = &args.out {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let report = Report { width: args.width, height: args.height, depth: args.depth, cache: args.cache, games: &records };
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .with_context(|| format!("writing {}", path.display()))?;
        eprintln!("Wrote {} games to {}", records.len(), path.display());
    }
    Ok(())
}
