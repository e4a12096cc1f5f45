use serde::{Deserialize, Serialize};

use crate::flags;
use crate::messaging::attachments::{AttachmentManifest, AttachmentTracker};
use crate::peer::{PeerKey, PeerRecord};
use crate::session::ConversationSession;

/// A selected recipient of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientDescriptor {
    pub address: PeerKey,
    pub name: String,
    pub host: String,
}

impl From<&PeerRecord> for RecipientDescriptor {
    fn from(record: &PeerRecord) -> Self {
        Self {
            address: record.address.clone(),
            name: record.name.clone(),
            host: record.host.clone(),
        }
    }
}

/// One outbound message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub recipient: RecipientDescriptor,
    pub flags: u32,
    /// `text NUL`, followed by `manifest NUL` when files are attached.
    pub payload: Vec<u8>,
    /// Extended section of the message; unused by chat sends.
    pub secondary_payload: Vec<u8>,
    /// The manifest serialized into `payload`, kept for registration once
    /// the request has been dispatched.
    pub manifest: Option<AttachmentManifest>,
}

impl SendRequest {
    pub fn recipient_address(&self) -> &PeerKey {
        &self.recipient.address
    }
}

/// Turns a draft and a recipient selection into per-recipient send requests.
pub struct OutboundMessageBuilder {
    tracker: AttachmentTracker,
}

impl OutboundMessageBuilder {
    pub fn new(tracker: AttachmentTracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &AttachmentTracker {
        &self.tracker
    }

    /// Build one request per recipient, in order.
    ///
    /// The draft is taken and left empty whatever the outcome. Nothing is
    /// built when there are no recipients or the text is blank. Otherwise our
    /// own message is echoed into `session` once, as `local_name`, and every
    /// recipient gets a freshly serialized manifest when files are pending.
    /// Pending attachments are left for the caller to clear after dispatch.
    pub fn build(
        &self,
        session: &mut ConversationSession,
        local_name: &str,
        draft: &mut String,
        recipients: &[RecipientDescriptor],
        sealed: bool,
    ) -> Vec<SendRequest> {
        let text = std::mem::take(draft);

        if recipients.is_empty() {
            tracing::debug!(peer = %session.peer_key(), "send without recipients ignored");
            return Vec::new();
        }
        if text.trim().is_empty() {
            tracing::debug!(peer = %session.peer_key(), "blank message not sent");
            return Vec::new();
        }

        let has_attachments = session.has_pending_attachments();
        let flags = flags::outbound(sealed, recipients.len(), has_attachments);

        session.compose_echo(local_name, &text);

        let mut body = text.into_bytes();
        body.push(0);

        let requests: Vec<SendRequest> = recipients
            .iter()
            .map(|recipient| {
                let mut payload = body.clone();
                let manifest = has_attachments.then(|| {
                    let manifest = self.tracker.prepare_manifest(session);
                    payload.extend_from_slice(manifest.serialized_form());
                    payload.push(0);
                    manifest
                });
                SendRequest {
                    recipient: recipient.clone(),
                    flags,
                    payload,
                    secondary_payload: Vec::new(),
                    manifest,
                }
            })
            .collect();

        tracing::debug!(
            peer = %session.peer_key(),
            recipients = requests.len(),
            flags = format_args!("{flags:#x}"),
            attachments = has_attachments,
            "built outbound message"
        );

        requests
    }
}
