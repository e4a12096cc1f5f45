use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use lanchat_core::messaging::MemoryTransferManager;
use lanchat_core::transcript_log::FileTranscriptLog;
use lanchat_core::{
    ChatCollaborators, ChatCore, DirectorySearch, InboundMessage, MemoryDirectory, Preferences,
    PreferencesProvider, SharedPreferences,
};

use crate::protocol::{timestamp_now_secs, LoopbackProtocol};
use crate::surface::TracingSurface;

/// Central state for the chat daemon.
pub struct DaemonState {
    /// Session routing and sending.
    pub core: Arc<ChatCore>,
    /// Peers known to this host.
    pub directory: Arc<MemoryDirectory>,
    pub preferences: SharedPreferences,
    pub protocol: Arc<LoopbackProtocol>,
    pub transfers: Arc<MemoryTransferManager>,
    /// "Find next" state shared by every IPC client.
    pub search: Mutex<DirectorySearch>,
    /// Feeds the core's inbound loop.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    /// Unix timestamp when the daemon started.
    pub started_at: u64,
}

impl DaemonState {
    pub fn new(
        preferences: Preferences,
        directory: MemoryDirectory,
        protocol: LoopbackProtocol,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> Self {
        let preferences = SharedPreferences::new(preferences);
        let provider: Arc<dyn PreferencesProvider> = Arc::new(preferences.clone());
        let directory = Arc::new(directory);
        let protocol = Arc::new(protocol);
        let transfers = Arc::new(MemoryTransferManager::new());

        let core = Arc::new(ChatCore::new(ChatCollaborators {
            directory: directory.clone(),
            preferences: Arc::clone(&provider),
            protocol: protocol.clone(),
            transfers: transfers.clone(),
            surface: Arc::new(TracingSurface),
            log: Arc::new(FileTranscriptLog::new(Arc::clone(&provider))),
        }));
        let search = Mutex::new(DirectorySearch::new(directory.clone(), provider));

        Self {
            core,
            directory,
            preferences,
            protocol,
            transfers,
            search,
            inbound_tx,
            started_at: timestamp_now_secs(),
        }
    }
}
