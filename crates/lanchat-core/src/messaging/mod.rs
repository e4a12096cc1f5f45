pub mod attachments;
pub mod composer;
pub mod protocol;

pub use attachments::{
    AttachmentManifest, AttachmentTracker, FileKind, FileRef, MemoryTransferManager,
    TransferManager, TransferRegistration,
};
pub use composer::{OutboundMessageBuilder, RecipientDescriptor, SendRequest};
pub use protocol::{InboundMessage, PacketId, ProtocolLayer};
