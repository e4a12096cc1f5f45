use std::sync::Arc;

use tokio::sync::mpsc;

use crate::flags;
use crate::messaging::{
    AttachmentTracker, InboundMessage, OutboundMessageBuilder, PacketId, ProtocolLayer,
    RecipientDescriptor, TransferManager,
};
use crate::peer::{PeerDirectory, PeerKey};
use crate::preferences::PreferencesProvider;
use crate::session::{SessionRegistry, SessionSurface, SharedSession};
use crate::transcript_log::TranscriptLog;

/// Collaborators the core is wired to at construction.
pub struct ChatCollaborators {
    pub directory: Arc<dyn PeerDirectory>,
    pub preferences: Arc<dyn PreferencesProvider>,
    pub protocol: Arc<dyn ProtocolLayer>,
    pub transfers: Arc<dyn TransferManager>,
    pub surface: Arc<dyn SessionSurface>,
    pub log: Arc<dyn TranscriptLog>,
}

/// Entry point for both the inbound (protocol) and outbound (UI) paths.
pub struct ChatCore {
    registry: SessionRegistry,
    builder: OutboundMessageBuilder,
    directory: Arc<dyn PeerDirectory>,
    preferences: Arc<dyn PreferencesProvider>,
    protocol: Arc<dyn ProtocolLayer>,
}

/// Title given to a session opened for `name`.
pub fn session_title(name: &str) -> String {
    format!("Chatting with {name}")
}

impl ChatCore {
    pub fn new(collaborators: ChatCollaborators) -> Self {
        let ChatCollaborators {
            directory,
            preferences,
            protocol,
            transfers,
            surface,
            log,
        } = collaborators;

        Self {
            registry: SessionRegistry::new(surface, log),
            builder: OutboundMessageBuilder::new(AttachmentTracker::new(transfers)),
            directory,
            preferences,
            protocol,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &Arc<dyn PeerDirectory> {
        &self.directory
    }

    pub fn preferences(&self) -> &Arc<dyn PreferencesProvider> {
        &self.preferences
    }

    /// The user asked to chat with a peer: reuse its session or start one,
    /// and bring it to the front.
    pub fn open_chat(&self, peer_key: &PeerKey, name: &str) -> SharedSession {
        let session = self.registry.get_or_create(peer_key, &session_title(name));
        session.lock().show();
        session
    }

    /// The surface for `peer_key` was minimized. The session stays live and
    /// counts toward [`hidden_session_count`](Self::hidden_session_count).
    ///
    /// Returns whether there was a session to hide.
    pub fn hide_chat(&self, peer_key: &PeerKey) -> bool {
        match self.registry.lookup(peer_key) {
            Some(session) => {
                session.lock().hide();
                true
            }
            None => false,
        }
    }

    /// The surface for `peer_key` closed; forget its session.
    pub fn close_chat(&self, peer_key: &PeerKey) {
        self.registry.remove(peer_key);
    }

    /// Route a message from the protocol layer into its peer's session.
    ///
    /// Only chat messages are routed. The session is shown right away when
    /// `auto_popup` is on; otherwise it waits hidden and is counted by
    /// [`hidden_session_count`](Self::hidden_session_count).
    pub fn route_inbound(&self, message: &InboundMessage) -> Option<SharedSession> {
        if flags::mode(message.flags) != flags::SEND {
            tracing::debug!(
                from = %message.peer_key,
                mode = flags::mode(message.flags),
                "non-chat message not routed"
            );
            return None;
        }

        let session = self
            .registry
            .get_or_create(&message.peer_key, &session_title(&message.speaker_name));
        {
            let mut guard = session.lock();
            guard.append_inbound(&message.speaker_name, &message.text);
            if self.preferences.preferences().auto_popup {
                guard.show();
            }
        }

        tracing::debug!(from = %message.peer_key, len = message.text.len(), "message routed");
        Some(session)
    }

    /// Build, dispatch and register one logical send.
    ///
    /// Returns the packet ids of the dispatched requests in recipient
    /// order. Pending attachments are cleared once at least one request went
    /// out; `draft` is always left empty.
    pub fn send(
        &self,
        session: &SharedSession,
        draft: &mut String,
        recipients: &[RecipientDescriptor],
        sealed: bool,
    ) -> Vec<PacketId> {
        let local_name = self.preferences.preferences().user_name;

        let mut guard = session.lock();
        let requests = self
            .builder
            .build(&mut guard, &local_name, draft, recipients, sealed);

        let mut packet_ids = Vec::with_capacity(requests.len());
        for request in requests {
            let packet_id = self.protocol.dispatch(&request);
            tracing::debug!(to = %request.recipient.address, %packet_id, "request dispatched");
            if let Some(manifest) = request.manifest {
                self.builder.tracker().register(
                    packet_id,
                    manifest,
                    &request.recipient.name,
                    &request.recipient.host,
                );
            }
            packet_ids.push(packet_id);
        }

        if !packet_ids.is_empty() {
            guard.clear_pending_attachments();
        }
        packet_ids
    }

    /// Recipients for the given directory rows, skipping rows that no
    /// longer exist.
    pub fn recipients_for_rows(
        &self,
        rows: impl IntoIterator<Item = usize>,
    ) -> Vec<RecipientDescriptor> {
        rows.into_iter()
            .filter_map(|row| self.directory.row_at(row))
            .map(|record| RecipientDescriptor::from(&record))
            .collect()
    }

    pub fn hidden_session_count(&self) -> usize {
        self.registry.hidden_count()
    }

    /// Drain inbound messages until the channel closes or `shutdown` fires.
    pub async fn run_inbound_loop(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<InboundMessage>,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        tracing::info!("inbound loop started");
        loop {
            tokio::select! {
                message = inbound.recv() => {
                    let Some(message) = message else { break };
                    self.route_inbound(&message);
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::info!("inbound loop stopped");
    }
}
