pub mod registry;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::messaging::attachments::FileRef;
use crate::peer::PeerKey;
use crate::transcript_log::TranscriptLog;

pub use registry::SessionRegistry;

/// A session shared between the registry and whichever surface renders it.
///
/// Two handles to the same peer always point at the same allocation, so
/// `Arc::ptr_eq` is the identity check.
pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// One line of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub speaker_name: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    pub text: String,
}

impl TranscriptEntry {
    /// Log form: `"<speaker> (hh:mm:ss) :\r\n<text>\r\n\r\n"`, clock in UTC.
    pub fn render(&self) -> String {
        let secs = self.timestamp / 1000;
        let (h, m, s) = ((secs / 3600) % 24, (secs / 60) % 60, secs % 60);
        format!(
            "{} ({h:02}:{m:02}:{s:02}) :\r\n{}\r\n\r\n",
            self.speaker_name, self.text
        )
    }
}

/// The surface a session is rendered on.
///
/// Called after every append so the view can redraw; it must not call back
/// into the session (the session lock is held).
pub trait SessionSurface: Send + Sync {
    fn transcript_updated(&self, peer_key: &PeerKey, entry: &TranscriptEntry);
}

/// Surface used when nothing renders the session (headless hosts, tests).
pub struct NoopSurface;

impl SessionSurface for NoopSurface {
    fn transcript_updated(&self, _peer_key: &PeerKey, _entry: &TranscriptEntry) {}
}

/// The single logical conversation with one peer.
pub struct ConversationSession {
    peer_key: PeerKey,
    display_title: String,
    transcript: Vec<TranscriptEntry>,
    pending_attachments: Vec<FileRef>,
    visible: bool,
    surface: Arc<dyn SessionSurface>,
    log: Arc<dyn TranscriptLog>,
}

impl ConversationSession {
    pub fn new(
        peer_key: PeerKey,
        display_title: impl Into<String>,
        surface: Arc<dyn SessionSurface>,
        log: Arc<dyn TranscriptLog>,
    ) -> Self {
        Self {
            peer_key,
            display_title: display_title.into(),
            transcript: Vec::new(),
            pending_attachments: Vec::new(),
            visible: false,
            surface,
            log,
        }
    }

    pub fn peer_key(&self) -> &PeerKey {
        &self.peer_key
    }

    pub fn display_title(&self) -> &str {
        &self.display_title
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Record a message received from the peer.
    pub fn append_inbound(&mut self, speaker_name: &str, text: &str) {
        self.append(speaker_name, text);
    }

    /// Record our own outgoing message as soon as it is sent, before any
    /// delivery confirmation.
    pub fn compose_echo(&mut self, speaker_name: &str, text: &str) {
        self.append(speaker_name, text);
    }

    fn append(&mut self, speaker_name: &str, text: &str) {
        let entry = TranscriptEntry {
            speaker_name: speaker_name.to_string(),
            timestamp: timestamp_now_ms(),
            text: text.to_string(),
        };
        self.surface.transcript_updated(&self.peer_key, &entry);
        self.log.append_if_enabled(&entry.render());
        self.transcript.push(entry);
    }

    pub fn pending_attachments(&self) -> &[FileRef] {
        &self.pending_attachments
    }

    pub fn has_pending_attachments(&self) -> bool {
        !self.pending_attachments.is_empty()
    }

    /// Queue a file for the next send. A path already queued is not added twice.
    pub fn add_pending_attachment(&mut self, file: FileRef) {
        if self.pending_attachments.iter().any(|f| f.path == file.path) {
            return;
        }
        self.pending_attachments.push(file);
    }

    /// Drop a queued file. Returns whether it was queued.
    pub fn remove_pending_attachment(&mut self, path: &Path) -> bool {
        let before = self.pending_attachments.len();
        self.pending_attachments.retain(|f| f.path != path);
        self.pending_attachments.len() != before
    }

    pub fn clear_pending_attachments(&mut self) {
        self.pending_attachments.clear();
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("peer_key", &self.peer_key)
            .field("display_title", &self.display_title)
            .field("entries", &self.transcript.len())
            .field("pending_attachments", &self.pending_attachments.len())
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

pub(crate) fn timestamp_now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
