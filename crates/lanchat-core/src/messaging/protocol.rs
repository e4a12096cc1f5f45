use std::fmt;

use serde::{Deserialize, Serialize};

use crate::messaging::composer::SendRequest;
use crate::peer::PeerKey;

/// Token the protocol layer assigns to a request when it goes out.
///
/// Peers quote it back when they pull attached files, so it is the key the
/// transfer manager files manifests under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(u64);

impl PacketId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The LAN messaging protocol layer.
///
/// Owns wire encoding, ports and retransmission; a failed send is reported
/// through the protocol layer's own channels, never back to the caller.
pub trait ProtocolLayer: Send + Sync {
    /// Queue `request` for transmission and return its packet id.
    fn dispatch(&self, request: &SendRequest) -> PacketId;
}

/// A chat message handed up by the protocol layer, already parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub peer_key: PeerKey,
    pub speaker_name: String,
    pub text: String,
    pub flags: u32,
}
