//! Command and option bits carried in every message header.
//!
//! Values follow the IP Messenger protocol so the external protocol layer can
//! put them on the wire untouched. The low byte is the command mode; the
//! remaining bits are independent options OR'd on top of it.

/// Selects the command mode from a flag word.
pub const MODE_MASK: u32 = 0x0000_00ff;

/// Mode: a chat message.
pub const SEND: u32 = 0x0000_0020;
/// Mode: the peer opened a sealed message we sent.
pub const READ: u32 = 0x0000_0030;

/// Ask the receiver to confirm delivery.
pub const REQUEST_DELIVERY_ACK: u32 = 0x0000_0100;
/// Message is sealed until the receiver opens it.
pub const SEALED: u32 = 0x0000_0200;
/// One of several copies of the same logical send.
pub const MULTICAST: u32 = 0x0000_0800;
/// Ask the receiver to confirm it has opened a sealed message.
pub const REQUEST_READ_ACK: u32 = 0x0010_0000;
/// Payload carries a file manifest after the text.
pub const FILE_ATTACHED: u32 = 0x0020_0000;

/// Extract the command mode.
pub fn mode(flags: u32) -> u32 {
    flags & MODE_MASK
}

/// Check whether every bit of `option` is set in `flags`.
pub fn has(flags: u32, option: u32) -> bool {
    flags & option == option
}

/// Flags for an outbound chat message.
///
/// Computed once per logical send and shared by every recipient copy.
pub fn outbound(sealed: bool, recipient_count: usize, has_attachments: bool) -> u32 {
    let mut flags = SEND | REQUEST_DELIVERY_ACK;
    if sealed {
        flags |= SEALED | REQUEST_READ_ACK;
    }
    if recipient_count > 1 {
        flags |= MULTICAST;
    }
    if has_attachments {
        flags |= FILE_ATTACHED;
    }
    flags
}
