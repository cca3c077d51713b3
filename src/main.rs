//! LED dance floor show runner.
//!
//! Drives the floor from playlists of effects. A small HTTP API lets the
//! crowd (or the DJ) pick effects, switch playlists, press buttons and queue
//! live requests from any device on the LAN.
//!
//! ## Architecture
//! - **Show thread** (std::thread): owns the playlists, menu and canvas
//! - **HTTP server** (tokio/axum): accepts API requests, sends commands via channel
//!
//! ## Rust concepts
//! - `#[tokio::main]` async entry point
//! - `std::thread::spawn` for the show thread
//! - `std::sync::mpsc` channel between async and sync worlds
//! - `Arc<Mutex<T>>` for shared status
//!
//! ## Usage
//! ```sh
//! ./target/release/led-dancefloor --playlist party.json --live --port 8080
//! ```

use clap::Parser;
use led_dancefloor::effects::builtin_catalog;
use led_dancefloor::error::FloorError;
use led_dancefloor::live::{LiveFeed, MentionRouter, StatusAcknowledger};
use led_dancefloor::model::{PlaylistCollection, Startup};
use led_dancefloor::server::{self, AppState};
use led_dancefloor::show::{
    DEFAULT_BRIGHTNESS, DEFAULT_FPS, FrameSink, HeadlessSink, PipeSink, Show, ShowStatus, run_show,
};
use led_dancefloor::{FloorSize, is_running, request_shutdown, setup_signal_handler};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// LED dance floor show runner
#[derive(Parser)]
#[command(name = "led-dancefloor")]
#[command(about = "Playlist scheduler and HTTP API for an interactive LED dance floor")]
#[command(version)]
struct Args {
    /// Run a single effect indefinitely
    #[arg(long)]
    effect: Option<String>,

    /// Playlist definition file (JSON); may be given more than once
    #[arg(long = "playlist")]
    playlists: Vec<PathBuf>,

    /// Number of rows on the floor
    #[arg(long, default_value = "18")]
    rows: u32,

    /// Number of columns on the floor
    #[arg(long, default_value = "24")]
    cols: u32,

    /// Frames per second
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: u32,

    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Run without the HTTP API
    #[arg(long)]
    no_server: bool,

    /// Accept live requests and add the live playlist
    #[arg(long)]
    live: bool,

    /// Effect the live playlist falls back to between requests
    #[arg(long, default_value = "DiscoFloor")]
    live_default: String,

    /// Our own handle, so mentions we send are not answered
    #[arg(long, default_value = "LED_Dance_Floor")]
    handle: String,

    /// Write raw RGB frames to this file or named pipe
    #[arg(long)]
    pipe: Option<PathBuf>,

    /// Output brightness (0-100)
    #[arg(long, default_value_t = DEFAULT_BRIGHTNESS, value_parser = clap::value_parser!(u8).range(0..=100))]
    brightness: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();
    let floor = FloorSize::new(args.rows, args.cols);

    tracing::info!("LED dance floor v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Floor: {}x{}", floor.cols, floor.rows);

    // Shared show status: the show thread writes, HTTP handlers read.
    let status = Arc::new(Mutex::new(ShowStatus::new()));

    let catalog = builtin_catalog();
    let mut model = PlaylistCollection::new(floor);
    model.register_catalog(&catalog);

    let live = if args.live {
        match LiveFeed::new(
            catalog.clone(),
            &args.live_default,
            floor,
            Box::new(StatusAcknowledger::new(status.clone())),
        ) {
            Ok(feed) => {
                let (playlist, handle) = feed.into_parts();
                let index = model.add_playlist(playlist);
                tracing::info!("Live requests enabled (playlist #{})", index);
                Some((index, handle))
            }
            Err(e) => {
                tracing::error!("Unable to start the live feed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let startup = Startup {
        effect: args.effect.clone(),
        playlist_files: args.playlists.clone(),
    };
    let started = match &live {
        Some((index, _)) if startup.effect.is_none() && startup.playlist_files.is_empty() => {
            model.select_playlist(*index).map(|_| ())
        }
        _ => model.bootstrap(&startup, 0),
    };
    match started {
        Ok(()) => {}
        Err(FloorError::UnknownEffect(name)) => {
            eprintln!("Unknown effect: {name}");
            eprintln!("Available effects: {}", catalog.names().join(", "));
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::error!("Unable to start the show: {}", e);
            return ExitCode::FAILURE;
        }
    }
    tracing::debug!("{}", model);

    let sink: Box<dyn FrameSink> = match &args.pipe {
        Some(path) => match PipeSink::open(path) {
            Ok(sink) => {
                tracing::info!("Writing frames to {}", path.display());
                Box::new(sink)
            }
            Err(e) => {
                tracing::error!("Unable to open {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(HeadlessSink::default()),
    };

    let running = match setup_signal_handler() {
        Ok(running) => running,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Create the channel for sending commands to the show thread.
    let (tx, rx) = mpsc::channel();

    // Spawn the show thread.
    let show = Show::new(model).with_brightness(args.brightness);
    let show_status = status.clone();
    let show_running = running.clone();
    let fps = args.fps;
    let show_handle = std::thread::spawn(move || {
        run_show(show, rx, show_status, sink, show_running.clone(), fps);
        request_shutdown(&show_running);
    });

    // With --no-server, `tx` stays alive until main returns so the show
    // thread only stops on Ctrl+C.
    if !args.no_server {
        let (mentions, live) = match live {
            Some((_, handle)) => (Some(MentionRouter::new(&args.handle)), Some(handle)),
            None => (None, None),
        };
        let app_state = AppState {
            command_tx: tx,
            status,
            catalog,
            live,
            mentions,
        };
        let app = server::create_router(app_state);

        // Start listening
        let addr = format!("0.0.0.0:{}", args.port);
        tracing::info!("Listening on http://{}", addr);
        tracing::info!("API Documentation: http://localhost:{}/docs", args.port);
        tracing::info!("Try: curl http://localhost:{}/api/v1/status", args.port);

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Failed to bind to {}: {}", addr, e);
                request_shutdown(&running);
                let _ = show_handle.join();
                return ExitCode::FAILURE;
            }
        };

        let server_running = running.clone();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while is_running(&server_running) {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                tracing::info!("Shutting down HTTP server");
            })
            .await;
        if let Err(e) = served {
            tracing::error!("Server error: {}", e);
            request_shutdown(&running);
        }
    }

    if show_handle.join().is_err() {
        tracing::error!("Show thread panicked");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
