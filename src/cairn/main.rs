// Maintenance CLI for network snapshots.

use anyhow::{Context, bail};
use clap::Parser;
use itertools::Itertools;
use sentier::path_router::Step;
use sentier::snapshot::{export_topologies, import_paths, load_network, save_network};
use sentier::{Engine, EngineConfig, Network, PathId};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON engine configuration
    #[arg(long, env = "SENTIER_CONFIG")]
    config: Option<PathBuf>,
    /// Network snapshot to operate on
    #[arg(long, env = "SENTIER_SNAPSHOT", default_value = "sentier_network.bin")]
    snapshot: PathBuf,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Import a GeoJSON FeatureCollection of LineStrings as paths
    Import {
        geojson: PathBuf,
        /// Start from an empty network instead of the existing snapshot
        #[arg(long)]
        fresh: bool,
    },
    /// Restore the traversal order of every line topology
    Reorder,
    /// Write live topologies as a GeoJSON FeatureCollection
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Route through steps given as PATH_ID:POSITION
    Route {
        #[arg(required = true, num_args = 2..)]
        steps: Vec<String>,
    },
}

fn open_engine(snapshot: &Path, config: EngineConfig, fresh: bool) -> anyhow::Result<Engine> {
    let network = if fresh || !snapshot.exists() {
        Network::new()
    } else {
        load_network(snapshot)?
    };
    Ok(Engine::with_network(network, config))
}

fn parse_step(raw: &str) -> anyhow::Result<Step> {
    let Some((path, position)) = raw.split_once(':') else {
        bail!("step '{raw}' is not PATH_ID:POSITION");
    };
    let path: u64 = path.parse().with_context(|| format!("invalid path id in '{raw}'"))?;
    let position: f64 = position
        .parse()
        .with_context(|| format!("invalid position in '{raw}'"))?;
    Ok(Step::new(PathId(path), position))
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref())?;

    match args.cmd {
        Command::Import { geojson, fresh } => {
            let mut engine = open_engine(&args.snapshot, config, fresh)?;
            let source = std::fs::read_to_string(&geojson)
                .with_context(|| format!("reading {}", geojson.display()))?;
            let report = import_paths(&mut engine, &source)?;
            for (index, reason) in &report.failures {
                println!("feature {index}: {reason}");
            }
            save_network(engine.network(), &args.snapshot)?;
            println!(
                "imported {} paths, {} failures",
                report.imported.len(),
                report.failures.len()
            );
        }
        Command::Reorder => {
            let mut engine = open_engine(&args.snapshot, config, false)?;
            let report = engine.reorder_topologies();
            for failure in &report.failures {
                println!("topology {}: {}", failure.topology, failure.reason);
            }
            save_network(engine.network(), &args.snapshot)?;
            println!(
                "examined {}, reordered {}, failed {}",
                report.examined,
                report.reordered.len(),
                report.failures.len()
            );
        }
        Command::Export { output } => {
            let engine = open_engine(&args.snapshot, config, false)?;
            let collection = export_topologies(engine.network());
            info!(features = collection.features.len(), "exporting topologies");
            let text = serde_json::to_string_pretty(&collection)?;
            match output {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{text}"),
            }
        }
        Command::Route { steps } => {
            let engine = open_engine(&args.snapshot, config, false)?;
            let steps: Vec<Step> = steps.iter().map(|s| parse_step(s)).try_collect()?;
            let route = engine.route(&steps)?;
            for (index, leg) in route.legs.iter().enumerate() {
                let pieces = leg
                    .pieces
                    .iter()
                    .map(|p| format!("{}[{:.3}->{:.3}]", p.path, p.start, p.end))
                    .join(" ");
                println!("leg {index}: {pieces} ({:.1})", leg.length);
            }
            println!("total length {:.1}", route.length());
        }
    }
    Ok(())
}
