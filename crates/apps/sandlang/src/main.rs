mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use glam::IVec2;
use script::WorldDefinition;
use sim::{Placement, SimConfig, Simulation, Snapshot, WorkerPool};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sandlang")]
#[command(about = "Run a Sandlang atom script headless", long_about = None)]
struct Args {
    /// Atom script to compile
    script: PathBuf,

    /// TOML config file; SANDLANG_* environment variables are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grid width in cells
    #[arg(long)]
    width: Option<u32>,

    /// Grid height in cells
    #[arg(long)]
    height: Option<u32>,

    /// Lock tile edge length
    #[arg(long)]
    tile_size: Option<u32>,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Worker pause between ticks, in nanoseconds
    #[arg(long)]
    update_delay_ns: Option<u64>,

    /// How long to run, in seconds
    #[arg(long, default_value = "5")]
    seconds: f64,

    /// Place material before starting, as TYPE@X,Y (name, alias or key)
    #[arg(long = "place", value_parser = parse_placement)]
    placements: Vec<PlacementArg>,

    /// Population report interval in milliseconds
    #[arg(long, default_value = "1000")]
    report_every_ms: u64,

    /// Print the final grid as text
    #[arg(long)]
    dump: bool,

    /// Write the final grid as an image
    #[arg(long)]
    png: Option<PathBuf>,

    /// Only compile the script and print a summary
    #[arg(long)]
    check: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct PlacementArg {
    material: String,
    at: IVec2,
}

fn parse_placement(raw: &str) -> Result<PlacementArg, String> {
    let (material, coords) = raw
        .split_once('@')
        .ok_or_else(|| format!("expected TYPE@X,Y, got `{raw}`"))?;
    let (x, y) = coords
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y after @, got `{coords}`"))?;
    let x = x.trim().parse().map_err(|_| format!("invalid x `{x}`"))?;
    let y = y.trim().parse().map_err(|_| format!("invalid y `{y}`"))?;
    if material.trim().is_empty() {
        return Err("missing material before @".into());
    }
    Ok(PlacementArg {
        material: material.trim().to_string(),
        at: IVec2::new(x, y),
    })
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SimConfig::from_env()?,
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(tile_size) = args.tile_size {
        config.tile_size = tile_size;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(delay) = args.update_delay_ns {
        config.update_delay_nanos = delay;
    }
    config.validate()?;
    Ok(config)
}

/// Resolve a material by placement key, then name, then alias
fn resolve_material(world: &WorldDefinition, placement: &mut Placement, material: &str) -> Option<u16> {
    let mut chars = material.chars();
    if let (Some(key), None) = (chars.next(), chars.next()) {
        if let Some(id) = placement.select_type(world, key) {
            return Some(id);
        }
    }
    let id = world
        .atom_by_name(material)
        .or_else(|| world.atom_by_alias(material))?
        .id;
    placement.select(id);
    Some(id)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let world = script::compile_file(&args.script)
        .with_context(|| format!("Failed to compile {}", args.script.display()))?;

    if args.check {
        print!("{}", output::summary(&world));
        return Ok(());
    }

    let config = load_config(&args)?;
    let world = Arc::new(world);
    let simulation = Arc::new(Simulation::new(Arc::clone(&world), config.clone())?);
    tracing::debug!("{} preload colors", world.preload_colors().count());

    let mut rng = sim::stream_rng(config.seed, config.workers as u64 + 1);
    let mut placement = Placement::new(&world);
    for arg in &args.placements {
        let Some(atom) = resolve_material(&world, &mut placement, &arg.material) else {
            bail!("Unknown material `{}`", arg.material);
        };
        let placed = simulation.place(arg.at, atom, &mut rng)?;
        tracing::info!(
            "Placed {} {} at {} (drag cool-down {})",
            placed,
            world.atom(atom).name,
            arg.at,
            placement.drag_cooldown(&world)
        );
    }

    let pool = WorkerPool::spawn(Arc::clone(&simulation))?;
    let run_for = Duration::from_secs_f64(args.seconds.max(0.0));
    let report_every = Duration::from_millis(args.report_every_ms.max(1));
    let started = Instant::now();
    let mut snapshot = Snapshot::default();

    while pool.is_running() && started.elapsed() < run_for {
        thread::sleep(report_every.min(run_for.saturating_sub(started.elapsed())));
        simulation.snapshot_into(&mut snapshot);
        let stats = pool.stats();
        tracing::info!(
            "{:>6.1}s ticks={} applied={} {}",
            started.elapsed().as_secs_f64(),
            stats.ticks,
            stats.applied,
            output::population_line(&world, &snapshot)
        );
    }

    let stats = pool.shutdown()?;
    simulation.snapshot_into(&mut snapshot);
    tracing::info!(
        "Finished: {} ticks, {} applications, {}",
        stats.ticks,
        stats.applied,
        output::population_line(&world, &snapshot)
    );

    if args.dump {
        print!("{}", output::dump(&world, &snapshot));
    }
    if let Some(path) = &args.png {
        output::save_png(&world, &snapshot, path, &mut rng)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Wrote {}", path.display());
    }

    Ok(())
}
