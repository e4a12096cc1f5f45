mod ipc;
mod protocol;
mod state;
mod surface;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use lanchat_core::{ChatError, InboundMessage, MemoryDirectory, PeerDirectory, Preferences};

use protocol::LoopbackProtocol;
use state::DaemonState;

/// Command-line arguments for the chat daemon.
struct Args {
    prefs_path: PathBuf,
    directory_path: PathBuf,
    socket_path: String,
}

fn parse_args() -> Args {
    let mut args = std::env::args().skip(1);
    let mut prefs_path = String::new();
    let mut directory_path = String::new();
    let mut socket_path = String::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--prefs" => prefs_path = args.next().unwrap_or_default(),
            "--directory" => directory_path = args.next().unwrap_or_default(),
            "--socket" => socket_path = args.next().unwrap_or_default(),
            _ => {}
        }
    }

    if prefs_path.is_empty() {
        prefs_path = dirs_fallback("lanchat/preferences.json");
    }
    if directory_path.is_empty() {
        directory_path = dirs_fallback("lanchat/peers.json");
    }
    if socket_path.is_empty() {
        socket_path = default_socket_path();
    }

    Args {
        prefs_path: PathBuf::from(prefs_path),
        directory_path: PathBuf::from(directory_path),
        socket_path,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    tracing::info!("lanchat-daemon starting");

    let args = parse_args();

    let preferences = Preferences::load(&args.prefs_path).expect("failed to load preferences");
    let directory = load_directory(&args.directory_path).expect("failed to load peer directory");

    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(1024);
    let state = Arc::new(DaemonState::new(
        preferences,
        directory,
        LoopbackProtocol::new(),
        inbound_tx,
    ));

    // Start the inbound loop
    let (inbound_shutdown_tx, inbound_shutdown_rx) = mpsc::channel(1);
    let inbound_loop = tokio::spawn(
        Arc::clone(&state.core).run_inbound_loop(inbound_rx, inbound_shutdown_rx),
    );

    // Start the IPC listener
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
    let ipc_shutdown_tx = shutdown_tx.clone();
    let ipc_state = Arc::clone(&state);
    let socket = args.socket_path.clone();
    tokio::spawn(async move {
        if let Err(e) = ipc::start_ipc_listener(&socket, ipc_state, shutdown_tx).await {
            tracing::error!(error = %e, path = %socket, "IPC unavailable, exiting");
            let _ = ipc_shutdown_tx.send(()).await;
        }
    });

    tracing::info!(
        socket = %args.socket_path,
        peers = state.directory.row_count(),
        "lanchat-daemon ready"
    );

    tokio::select! {
        _ = shutdown_rx.recv() => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    tracing::info!("lanchat-daemon shutting down");

    let _ = inbound_shutdown_tx.send(()).await;
    if let Err(e) = inbound_loop.await {
        tracing::warn!(error = %e, "inbound loop ended abnormally");
    }

    let _ = std::fs::remove_file(&args.socket_path);

    tracing::info!(
        sessions = state.core.registry().len(),
        dispatched = state.protocol.dispatched(),
        "lanchat-daemon stopped"
    );
}

/// Load the peer directory; a missing file means an empty directory.
fn load_directory(path: &Path) -> Result<MemoryDirectory, ChatError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no peer directory file, starting empty");
        return Ok(MemoryDirectory::new());
    }
    let json = std::fs::read_to_string(path)?;
    MemoryDirectory::from_json(&json)
}

fn dirs_fallback(subpath: &str) -> String {
    let base = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    format!("{base}/.config/{subpath}")
}

fn default_socket_path() -> String {
    let tmp = std::env::temp_dir();
    tmp.join("lanchat-daemon.sock")
        .to_string_lossy()
        .to_string()
}
