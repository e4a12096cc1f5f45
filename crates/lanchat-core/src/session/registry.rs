use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::peer::PeerKey;
use crate::session::{ConversationSession, SessionSurface, SharedSession};
use crate::transcript_log::TranscriptLog;

/// Maps each peer to its one live conversation.
///
/// Sessions are created lazily on first inbound or outbound activity and
/// live until the surface showing them closes and calls [`remove`].
///
/// [`remove`]: SessionRegistry::remove
pub struct SessionRegistry {
    sessions: RwLock<HashMap<PeerKey, SharedSession>>,
    surface: Arc<dyn SessionSurface>,
    log: Arc<dyn TranscriptLog>,
}

impl SessionRegistry {
    /// New sessions are wired to `surface` and `log`.
    pub fn new(surface: Arc<dyn SessionSurface>, log: Arc<dyn TranscriptLog>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            surface,
            log,
        }
    }

    /// The session for `peer_key`, created with `title_if_creating` when absent.
    ///
    /// The title is ignored for an existing session.
    pub fn get_or_create(&self, peer_key: &PeerKey, title_if_creating: &str) -> SharedSession {
        if let Some(existing) = self.sessions.read().get(peer_key) {
            return Arc::clone(existing);
        }

        // Re-check under the write lock: another caller may have won the race.
        let mut sessions = self.sessions.write();
        let session = sessions.entry(peer_key.clone()).or_insert_with(|| {
            tracing::debug!(peer = %peer_key, title = title_if_creating, "session created");
            Arc::new(Mutex::new(ConversationSession::new(
                peer_key.clone(),
                title_if_creating,
                Arc::clone(&self.surface),
                Arc::clone(&self.log),
            )))
        });
        Arc::clone(session)
    }

    pub fn lookup(&self, peer_key: &PeerKey) -> Option<SharedSession> {
        self.sessions.read().get(peer_key).cloned()
    }

    /// Detach the session for `peer_key`. Removing an absent key is a no-op.
    ///
    /// Handles already held elsewhere stay valid but are no longer reachable
    /// through the registry; the next `get_or_create` starts a fresh session.
    pub fn remove(&self, peer_key: &PeerKey) -> Option<SharedSession> {
        let removed = self.sessions.write().remove(peer_key);
        if removed.is_some() {
            tracing::debug!(peer = %peer_key, "session removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Keys of every live session, sorted.
    pub fn peer_keys(&self) -> Vec<PeerKey> {
        let mut keys: Vec<PeerKey> = self.sessions.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of live sessions whose surface is not currently shown.
    pub fn hidden_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|session| !session.lock().is_visible())
            .count()
    }
}
