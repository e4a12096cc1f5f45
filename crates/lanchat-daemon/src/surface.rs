use lanchat_core::session::{SessionSurface, TranscriptEntry};
use lanchat_core::PeerKey;

/// Headless surface: every transcript update becomes a log event.
pub struct TracingSurface;

impl SessionSurface for TracingSurface {
    fn transcript_updated(&self, peer_key: &PeerKey, entry: &TranscriptEntry) {
        tracing::info!(
            peer = %peer_key,
            speaker = %entry.speaker_name,
            len = entry.text.len(),
            "transcript updated"
        );
    }
}
