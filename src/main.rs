use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing::{info, warn};

use car_nn_learning::draw::{draw_hud, render};
use car_nn_learning::evolution::Population;
use car_nn_learning::{Episode, ObstacleField, RunConfig};

const DEFAULT_WIDTH: u32 = 1500;
const DEFAULT_HEIGHT: u32 = 800;
const DEFAULT_MAX_STEPS: u64 = 3000;

#[derive(Parser, Debug)]
#[command(name = "car-nn-learning", version, about = "Evolve sensor-driven cars on a bitmap track")]
struct Cli {
    /// Track image; opaque white pixels are walls. A built-in ring track is used when omitted.
    #[arg(short, long)]
    map: Option<PathBuf>,
    /// JSON run configuration (`sim` and `evolution` sections).
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    generations: Option<u64>,
    #[arg(long)]
    population: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Step ceiling per generation; 0 disables it. Defaults to the config
    /// file's value, or 3000.
    #[arg(long)]
    max_steps: Option<u64>,
    /// Advance cars on all cores.
    #[arg(long)]
    parallel: bool,
    /// Write the best policy here (bincode).
    #[arg(long)]
    save_best: Option<PathBuf>,
    /// Write per-generation best fitness here (JSON).
    #[arg(long)]
    history: Option<PathBuf>,
    /// Render the champion's final frame to a PNG.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };
    apply_overrides(&mut config, &cli);
    config.validate().context("invalid configuration after CLI overrides")?;

    let field = match &cli.map {
        Some(path) => ObstacleField::load(path)
            .with_context(|| format!("loading map {}", path.display()))?,
        None => builtin_track(DEFAULT_WIDTH, DEFAULT_HEIGHT),
    };
    info!(
        width = field.width(),
        height = field.height(),
        obstacles = field.obstacle_count(),
        "track ready"
    );

    let seed = config.evolution.seed.unwrap_or(0x5EED_CA75_0000_0001);
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut population = Population::new(&mut rng, &config.evolution);

    for _ in 0..config.evolution.generations {
        population
            .run_generation(&field, &config.sim, &mut rng)
            .context("episode aborted")?;
    }

    let Some(champion) = population.champion().cloned() else {
        warn!("no generation was evaluated");
        return Ok(());
    };
    info!(
        generations = population.generation(),
        best = population.best_history().iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "evolution finished"
    );

    if let Some(path) = &cli.save_best {
        champion
            .save(path)
            .with_context(|| format!("saving policy to {}", path.display()))?;
        info!(path = %path.display(), "best policy saved");
    }
    if let Some(path) = &cli.history {
        let json = serde_json::to_string_pretty(population.best_history())?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = &cli.snapshot {
        let mut episode = Episode::new(&field, &config.sim, population.generation(), [champion]);
        let report = episode.run().context("replaying champion")?;
        let mut frame = render(&field, episode.cars());
        draw_hud(&mut frame, population.generation(), episode.alive_count());
        frame
            .save_png(path)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(path = %path.display(), steps = report.steps, "snapshot written");
    }
    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn apply_overrides(config: &mut RunConfig, cli: &Cli) {
    if let Some(generations) = cli.generations {
        config.evolution.generations = generations;
    }
    if let Some(population) = cli.population {
        config.evolution.population = population;
    }
    if cli.seed.is_some() {
        config.evolution.seed = cli.seed;
    }
    config.sim.max_steps = step_ceiling(cli.max_steps, config.sim.max_steps);
    config.sim.parallel |= cli.parallel;
}

/// An explicit flag wins over the config file, and 0 lifts the ceiling.
fn step_ceiling(flag: Option<u64>, from_file: Option<u64>) -> Option<u64> {
    match flag {
        Some(0) => None,
        Some(limit) => Some(limit),
        None => from_file.or(Some(DEFAULT_MAX_STEPS)),
    }
}

/// Rectangular ring road: outer wall plus a central island.
fn builtin_track(width: u32, height: u32) -> ObstacleField {
    let wall = 50;
    let (island_w, island_h) = (width / 2, height / 3);
    let (left, top) = ((width - island_w) / 2, (height - island_h) / 2);
    ObstacleField::from_fn(width, height, |x, y| {
        let outer = x < wall || y < wall || x >= width - wall || y >= height - wall;
        let island = (left..left + island_w).contains(&x) && (top..top + island_h).contains(&y);
        outer || island
    })
}
