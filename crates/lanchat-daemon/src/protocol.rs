use std::sync::atomic::{AtomicU64, Ordering};

use lanchat_core::{PacketId, ProtocolLayer, SendRequest};

/// Protocol layer for a daemon running without a network transport.
///
/// Assigns packet ids and logs each request it is handed. Ids start at the
/// current unix time and count up by one per request.
pub struct LoopbackProtocol {
    next_packet: AtomicU64,
    dispatched: AtomicU64,
}

impl LoopbackProtocol {
    pub fn new() -> Self {
        Self::starting_at(timestamp_now_secs())
    }

    pub fn starting_at(first_packet: u64) -> Self {
        Self {
            next_packet: AtomicU64::new(first_packet),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Requests dispatched since startup.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

impl Default for LoopbackProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolLayer for LoopbackProtocol {
    fn dispatch(&self, request: &SendRequest) -> PacketId {
        let packet_id = PacketId::new(self.next_packet.fetch_add(1, Ordering::Relaxed));
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            to = %request.recipient_address(),
            %packet_id,
            flags = format_args!("{:#x}", request.flags),
            bytes = request.payload.len(),
            "message dispatched"
        );
        packet_id
    }
}

pub fn timestamp_now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
