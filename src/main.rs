//! harborwave - a self-hosted personal music server.
//!
//! Thin process entry point: parses CLI args, resolves paths/config, wires
//! the library/transcoding/auth core into the HTTP layer, and runs the
//! Actix server. Almost everything interesting lives in `core`.

mod api;
mod client;
mod config;
mod core;
mod error;
mod models;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use api::AppState;
use config::{Paths, UserConfig};
use core::{LibraryManager, TranscodingCache};

#[derive(Parser, Debug)]
#[command(name = "harborwave")]
#[command(author = "harborwave contributors")]
#[command(version)]
#[command(about = "A self-hosted personal music server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0", global = true)]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 1970, global = true)]
    port: u16,

    /// Verbose (debug-level) logging
    #[arg(long, global = true)]
    debug: bool,

    /// Override the config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// CLI surface. `start` is the default when no subcommand is given.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server (default).
    Start,
    /// Signal a running server to stop.
    Stop,
    /// Report whether a server is running and whether the library is scanned.
    Status,
    /// Trigger a rescan of the configured music folder.
    Rescan,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(run(args))
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{level},lofty=warn,ffmpeg_sidecar=warn,notify=warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn run(args: Args) -> Result<()> {
    let paths = Paths::init(args.config)?;

    match args.command.unwrap_or(Command::Start) {
        Command::Start => start_server(args.host, args.port, paths).await,
        Command::Stop => cmd_stop(),
        Command::Status => cmd_status(&paths),
        Command::Rescan => cmd_rescan(&paths).await,
    }
}

/// Exit codes: 0 on success, non-zero when a precondition is unmet.
fn cmd_stop() -> Result<()> {
    tracing::warn!("stop is a supervisor-level concern; this process does not daemonize itself");
    std::process::exit(1);
}

fn cmd_status(paths: &Paths) -> Result<()> {
    let config = UserConfig::load()?;
    match &config.music_folder {
        Some(folder) => {
            println!("configured: {folder}");
            if paths.metadata_cache_path().exists() {
                println!("metadata cache: present");
                Ok(())
            } else {
                println!("metadata cache: missing (never scanned)");
                std::process::exit(1);
            }
        }
        None => {
            println!("not configured (NotConfigured)");
            std::process::exit(1);
        }
    }
}

async fn cmd_rescan(paths: &Paths) -> Result<()> {
    let config = UserConfig::load()?;
    let Some(folder) = config.music_folder.clone() else {
        eprintln!("no music folder configured");
        std::process::exit(1);
    };

    let library = LibraryManager::new(paths.metadata_cache_path());
    library.scan(PathBuf::from(folder))?;

    // The scan runs on a blocking worker; give it a moment and report once.
    // A long-lived supervisor would instead poll `current_library()`.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    info!("rescan triggered");
    Ok(())
}

async fn start_server(host: String, port: u16, paths: Arc<Paths>) -> Result<()> {
    info!("harborwave starting on {host}:{port}");

    if let Err(e) = core::ffmpeg::ensure_ffmpeg() {
        tracing::warn!("ffmpeg unavailable, transcoding will degrade to original quality: {e}");
    }

    let config = UserConfig::load()?;
    let library = LibraryManager::new(paths.metadata_cache_path());
    let transcoding = Arc::new(TranscodingCache::with_budget(
        paths.transcoded_cache_dir(),
        config.transcode_cache_budget_bytes,
    ));
    let auth = Arc::new(api::auth::AuthManager::load(paths.jwt_secret_path(), paths.paired_devices_path()));

    if let Some(folder) = config.music_folder.clone() {
        match library.scan(PathBuf::from(&folder)) {
            Ok(()) => info!("initial scan of {folder} started"),
            Err(e) => tracing::warn!("initial scan not started: {e}"),
        }

        if config.enable_watchdog {
            let library_for_watch = Arc::clone(&library);
            let root = PathBuf::from(folder);
            match core::watchdog::watch(root, move |changes| {
                library_for_watch.apply_changes(&changes);
            }) {
                Ok(debouncer) => {
                    // Leak the debouncer: it must outlive the process, and this
                    // is a long-lived singleton with no shutdown path today.
                    Box::leak(Box::new(debouncer));
                }
                Err(e) => tracing::warn!("failed to start filesystem watchdog: {e}"),
            }
        }
    } else {
        tracing::warn!("no music folder configured; set it via config.json before scanning");
    }

    let base_url = format!("http://{host}:{port}");
    let state = web_data(AppState {
        library,
        transcoding,
        auth,
        base_url,
    });

    use actix_cors::Cors;
    use actix_web::{middleware, App, HttpServer};

    let bind_addr = format!("{host}:{port}");
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(api::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("failed to bind {bind_addr}"))?
    .run()
    .await?;

    Ok(())
}

fn web_data(state: AppState) -> actix_web::web::Data<AppState> {
    actix_web::web::Data::new(state)
}
