use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::mpsc;

use lanchat_core::messaging::FileRef;
use lanchat_core::session::TranscriptEntry;
use lanchat_core::{
    flags, DialogId, GroupEntry, InboundMessage, PacketId, PeerDirectory, PeerKey, PeerRecord,
    PreferencesProvider, Selection, SharedSession,
};

use crate::state::DaemonState;

/// JSON request from a front end to the chat daemon.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum IpcRequest {
    /// Open (or raise) the chat with a peer.
    OpenChat { peer_key: PeerKey, name: String },
    /// The chat surface for a peer was closed.
    CloseChat { peer_key: PeerKey },
    /// The chat surface for a peer was minimized.
    HideChat { peer_key: PeerKey },
    /// Hand a message to the inbound loop as if it came off the wire.
    Received {
        peer_key: PeerKey,
        speaker_name: String,
        text: String,
        /// Protocol flags; a plain chat message when absent.
        #[serde(default)]
        flags: Option<u32>,
    },
    /// Send `text` from the chat with `peer_key` to the given directory rows.
    Send {
        peer_key: PeerKey,
        rows: Vec<usize>,
        text: String,
        /// Falls back to `Preferences::sealed_by_default`.
        #[serde(default)]
        sealed: Option<bool>,
    },
    /// Queue a file or directory on a chat's next send.
    AttachFile { peer_key: PeerKey, path: PathBuf },
    /// Drop a queued attachment.
    DetachFile { peer_key: PeerKey, path: PathBuf },
    /// "Find next" in the peer directory.
    FindNext {
        query: String,
        dialog_id: u64,
        #[serde(default)]
        selection: Vec<usize>,
    },
    /// Select every peer in a group.
    SelectGroup { group: String },
    /// List the configured groups with their member counts.
    ListGroups,
    /// Replace the peer directory with a fresh listing.
    RefreshDirectory {
        #[serde(default)]
        peers: Vec<PeerRecord>,
    },
    /// Fetch a chat's transcript.
    Transcript { peer_key: PeerKey },
    /// Get daemon status.
    Status,
    /// Shut down the daemon.
    Shutdown,
}

/// JSON response from the chat daemon.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IpcResponse {
    /// Generic success.
    Ok,
    /// Packet ids of the dispatched requests, in recipient order.
    Sent { packet_ids: Vec<PacketId> },
    /// Directory rows to select.
    Selection { rows: Vec<usize> },
    Groups { groups: Vec<GroupEntry> },
    Transcript {
        title: String,
        entries: Vec<TranscriptEntry>,
        pending_attachments: usize,
    },
    Status {
        uptime_secs: u64,
        session_count: usize,
        hidden_sessions: usize,
        peer_count: usize,
        dispatched: u64,
        transfers: usize,
    },
    /// Error.
    Error { message: String },
}

/// Start the IPC listener on a Unix socket.
///
/// Reads newline-delimited JSON requests and writes one JSON response line
/// per request. Only returns if the socket cannot be bound.
pub async fn start_ipc_listener(
    socket_path: &str,
    state: Arc<DaemonState>,
    shutdown_tx: mpsc::Sender<()>,
) -> std::io::Result<()> {
    // Remove stale socket file if it exists
    let _ = std::fs::remove_file(socket_path);

    let listener = UnixListener::bind(socket_path)?;

    tracing::info!(path = %socket_path, "IPC listener started");

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let state = Arc::clone(&state);
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    let (reader, mut writer) = stream.into_split();
                    let mut lines = BufReader::new(reader).lines();

                    while let Ok(Some(line)) = lines.next_line().await {
                        let response = match serde_json::from_str::<IpcRequest>(&line) {
                            Ok(request) => {
                                handle_ipc_request(&state, request, &shutdown_tx).await
                            }
                            Err(e) => IpcResponse::Error {
                                message: format!("invalid request: {e}"),
                            },
                        };
                        if let Err(e) = write_response(&mut writer, &response).await {
                            tracing::warn!(error = %e, "failed to write IPC response");
                            break;
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "IPC accept error");
            }
        }
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &IpcResponse,
) -> std::io::Result<()> {
    let mut buf = serde_json::to_vec(response).unwrap_or_default();
    buf.push(b'\n');
    writer.write_all(&buf).await
}

pub async fn handle_ipc_request(
    state: &Arc<DaemonState>,
    request: IpcRequest,
    shutdown_tx: &mpsc::Sender<()>,
) -> IpcResponse {
    match request {
        IpcRequest::OpenChat { peer_key, name } => {
            state.core.open_chat(&peer_key, &name);
            let rows = state.search.lock().select_peer(peer_key.as_str());
            IpcResponse::Selection {
                rows: rows.into_iter().collect(),
            }
        }
        IpcRequest::CloseChat { peer_key } => {
            state.core.close_chat(&peer_key);
            IpcResponse::Ok
        }
        IpcRequest::HideChat { peer_key } => {
            if state.core.hide_chat(&peer_key) {
                IpcResponse::Ok
            } else {
                IpcResponse::Error {
                    message: format!("no open chat with {peer_key}"),
                }
            }
        }
        IpcRequest::Received {
            peer_key,
            speaker_name,
            text,
            flags: message_flags,
        } => {
            let message = InboundMessage {
                peer_key,
                speaker_name,
                text,
                flags: message_flags.unwrap_or(flags::SEND),
            };
            match state.inbound_tx.send(message).await {
                Ok(()) => IpcResponse::Ok,
                Err(_) => IpcResponse::Error {
                    message: "inbound loop is not running".to_string(),
                },
            }
        }
        IpcRequest::Send {
            peer_key,
            rows,
            text,
            sealed,
        } => {
            let session = match open_session(state, &peer_key) {
                Ok(s) => s,
                Err(e) => return e,
            };
            let recipients = state.core.recipients_for_rows(rows);
            let sealed =
                sealed.unwrap_or_else(|| state.preferences.preferences().sealed_by_default);
            let mut draft = text;
            let packet_ids = state.core.send(&session, &mut draft, &recipients, sealed);
            IpcResponse::Sent { packet_ids }
        }
        IpcRequest::AttachFile { peer_key, path } => {
            let session = match open_session(state, &peer_key) {
                Ok(s) => s,
                Err(e) => return e,
            };
            match FileRef::from_path(&path) {
                Ok(file) => {
                    session.lock().add_pending_attachment(file);
                    IpcResponse::Ok
                }
                Err(e) => IpcResponse::Error {
                    message: format!("cannot attach {}: {e}", path.display()),
                },
            }
        }
        IpcRequest::DetachFile { peer_key, path } => {
            let session = match open_session(state, &peer_key) {
                Ok(s) => s,
                Err(e) => return e,
            };
            if session.lock().remove_pending_attachment(&path) {
                IpcResponse::Ok
            } else {
                IpcResponse::Error {
                    message: format!("not attached: {}", path.display()),
                }
            }
        }
        IpcRequest::FindNext {
            query,
            dialog_id,
            selection,
        } => {
            let current: Selection = selection.into_iter().collect();
            let row = state
                .search
                .lock()
                .select_next(&query, DialogId::new(dialog_id), &current);
            IpcResponse::Selection {
                rows: row.into_iter().collect(),
            }
        }
        IpcRequest::SelectGroup { group } => {
            let rows = state.search.lock().select_group(&group);
            IpcResponse::Selection {
                rows: rows.into_iter().collect(),
            }
        }
        IpcRequest::ListGroups => IpcResponse::Groups {
            groups: state.search.lock().groups(),
        },
        IpcRequest::RefreshDirectory { peers } => {
            state.directory.clear();
            for peer in peers {
                state.directory.upsert(peer);
            }
            tracing::info!(peers = state.directory.row_count(), "peer directory refreshed");
            IpcResponse::Ok
        }
        IpcRequest::Transcript { peer_key } => {
            let session = match open_session(state, &peer_key) {
                Ok(s) => s,
                Err(e) => return e,
            };
            let session = session.lock();
            IpcResponse::Transcript {
                title: session.display_title().to_string(),
                entries: session.transcript().to_vec(),
                pending_attachments: session.pending_attachments().len(),
            }
        }
        IpcRequest::Status => IpcResponse::Status {
            uptime_secs: crate::protocol::timestamp_now_secs().saturating_sub(state.started_at),
            session_count: state.core.registry().len(),
            hidden_sessions: state.core.hidden_session_count(),
            peer_count: state.directory.row_count(),
            dispatched: state.protocol.dispatched(),
            transfers: state.transfers.len(),
        },
        IpcRequest::Shutdown => {
            tracing::info!("shutdown requested via IPC");
            let _ = shutdown_tx.send(()).await;
            IpcResponse::Ok
        }
    }
}

fn open_session(state: &DaemonState, peer_key: &PeerKey) -> Result<SharedSession, IpcResponse> {
    state.core.registry().lookup(peer_key).ok_or_else(|| IpcResponse::Error {
        message: format!("no open chat with {peer_key}"),
    })
}
