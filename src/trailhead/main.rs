// HTTP service over the trail network engine.

mod server;

use actix_web::middleware::DefaultHeaders;
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use clap::Parser;
use sentier::elevation::RasterDem;
use sentier::snapshot::{load_network, save_network};
use sentier::{Engine, EngineConfig, Network};
use server::SharedEngine;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// RON engine configuration
    #[arg(long, env = "SENTIER_CONFIG")]
    config: Option<PathBuf>,
    /// Network snapshot, loaded at startup and saved periodically
    #[arg(long, env = "SENTIER_SNAPSHOT")]
    snapshot: Option<PathBuf>,
    /// ESRI ASCII grid used as elevation model
    #[arg(long, env = "SENTIER_DEM")]
    dem: Option<PathBuf>,
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
    /// Seconds between two snapshot saves
    #[arg(long, default_value_t = 300)]
    autosave: u64,
}

fn autosave(engine: SharedEngine, path: PathBuf, every: Duration) {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let network = match engine.read() {
                Ok(engine) => engine.network().clone(),
                Err(_) => {
                    error!("engine lock poisoned, stopping autosave");
                    break;
                }
            };
            let target = path.clone();
            match tokio::task::spawn_blocking(move || save_network(&network, &target)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "autosave failed"),
                Err(e) => error!(error = %e, "autosave task panicked"),
            }
        }
    });
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref())?;
    let network = match &args.snapshot {
        Some(path) if path.exists() => load_network(path)?,
        _ => Network::new(),
    };
    let mut engine = Engine::with_network(network, config);
    if let Some(dem) = &args.dem {
        let raster = RasterDem::from_ascii_grid_file(dem)
            .with_context(|| format!("loading elevation model {}", dem.display()))?;
        engine = engine.with_dem(Arc::new(raster));
    }
    info!(paths = engine.network().path_count(), "engine ready");

    let engine: SharedEngine = Arc::new(RwLock::new(engine));
    if let Some(path) = &args.snapshot {
        autosave(
            Arc::clone(&engine),
            path.clone(),
            Duration::from_secs(args.autosave.max(1)),
        );
    }

    info!(address = %args.address, port = args.port, "starting trailhead");
    HttpServer::new(move || {
        App::new()
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Server", "Sentier")),
            )
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(Arc::clone(&engine)))
            .service(server::index)
            .service(server::route)
            .service(server::elevation_profile)
            .service(server::elevation_area)
            .service(server::place_topology)
            .service(server::reorder_topologies)
            .service(server::get_topology)
            .service(server::save_path)
            .service(server::merge_paths)
            .service(server::delete_path)
    })
    .bind((args.address.as_str(), args.port))?
    .run()
    .await?;
    Ok(())
}
