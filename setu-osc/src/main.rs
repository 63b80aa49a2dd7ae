//! SetuOSC - OSC remote-control daemon
//!
//! ## Protocol Architecture
//!
//! - **UDP (port 11000)**: OSC commands; replies go to the sender's host on port 11001
//! - **TCP (port 11002)**: one-shot bulk requests (`GET_SONG_STRUCTURE`)
//!
//! Serves a demo session (a song plus tracks) so clients can be tested
//! without a host application.

mod session;

use crate::session::Song;
use setu_osc::component::{Access, ComponentApi, IndexLookup};
use setu_osc::config::GatewayConfig;
use setu_osc::error::{Error, Result};
use setu_osc::{BulkPayload, Gateway, GatewayHandle, HostObject, OscType};
use std::env;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "/etc/setu-osc.toml";

/// Tracks created in the demo session at startup
const DEMO_TRACK_COUNT: usize = 4;

/// Parse config path from command line arguments (program name excluded).
///
/// Supports:
/// - `setu-osc <path>` (positional)
/// - `setu-osc --config <path>` (flag-based)
/// - `setu-osc -c <path>` (short flag)
///
/// Returns `None` when no path is given.
fn parse_config_path(args: &[String]) -> Option<String> {
    args.iter()
        .position(|arg| arg == "--config" || arg == "-c")
        .and_then(|flag| args.get(flag + 1))
        .or_else(|| args.first().filter(|arg| !arg.starts_with('-')))
        .cloned()
}

/// Explicit paths must exist; the default path is optional
fn load_config(path: Option<&str>) -> Result<(GatewayConfig, String)> {
    match path {
        Some(path) => Ok((GatewayConfig::from_file(path)?, path.to_string())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Ok((
            GatewayConfig::from_file(DEFAULT_CONFIG_PATH)?,
            DEFAULT_CONFIG_PATH.to_string(),
        )),
        None => Ok((GatewayConfig::default(), "built-in defaults".to_string())),
    }
}

/// Register every address and bulk command of the demo session
fn register_all(handle: &GatewayHandle, song: &Arc<Song>) {
    let prefix = handle.prefix().to_string();

    handle.add_handler(&format!("{}/test", prefix), |_| {
        log::info!("Received test message");
        Ok(Some(vec![OscType::from("ok")]))
    });

    let reload_handle = handle.clone();
    let reload_song = Arc::clone(song);
    handle.add_handler(&format!("{}/api/reload", prefix), move |_| {
        log::info!("Reloading handlers");
        reload_handle.clear_listeners();
        reload_handle.clear_handlers();
        register_all(&reload_handle, &reload_song);
        Ok(Some(vec![OscType::from("ok")]))
    });

    let song_api = ComponentApi::new(handle.clone(), "song");
    let song_target: Arc<dyn HostObject> = song.clone();
    for property in ["tempo", "metronome"] {
        song_api.expose_property(Arc::clone(&song_target), property, Access::ReadWrite);
    }
    for property in ["is_playing", "num_tracks"] {
        song_api.expose_property(Arc::clone(&song_target), property, Access::ReadOnly);
    }
    for method in ["start_playing", "stop_playing", "continue_playing", "create_track"] {
        song_api.expose_method(Arc::clone(&song_target), method);
    }

    let lookup_song = Arc::clone(song);
    let tracks: IndexLookup = Arc::new(move |index: usize| {
        lookup_song
            .track(index)
            .map(|track| track as Arc<dyn HostObject>)
    });
    let track_api = ComponentApi::new(handle.clone(), "track");
    for property in ["name", "volume", "mute"] {
        track_api.expose_indexed_property(Arc::clone(&tracks), property, Access::ReadWrite);
    }

    let structure_song = Arc::clone(song);
    handle.add_tcp_handler("GET_SONG_STRUCTURE", move || {
        structure_song.structure().map(BulkPayload::Json)
    });

    log::info!(
        "Registered {} OSC handlers and {} TCP handlers",
        handle.dispatcher().len(),
        handle.bulk_registry().len()
    );
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let config_path = parse_config_path(&args);
    let (config, config_source) = load_config(config_path.as_deref())?;

    // Initialize logger (RUST_LOG overrides the configured level)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("SetuOSC v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_source);

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut gateway = Gateway::bind(&config)?;
    let handle = gateway.handle();

    let song = Arc::new(Song::new(DEMO_TRACK_COUNT));
    register_all(&handle, &song);

    if let Err(e) = handle.send(&config.startup_address(), &[]) {
        log::warn!("Failed to send startup notification: {}", e);
    }

    log::info!(
        "SetuOSC running (UDP {}, TCP {}). Press Ctrl-C to stop.",
        gateway.local_udp_addr()?,
        gateway.bulk_addr()
    );

    // Cooperative tick: drain pending datagrams, then idle until the next tick
    let tick = config.tick_interval();
    while running.load(Ordering::Relaxed) {
        gateway.process_pending();
        thread::sleep(tick);
    }

    log::info!("Shutting down...");
    gateway.shutdown();
    log::info!("SetuOSC stopped");
    Ok(())
}
