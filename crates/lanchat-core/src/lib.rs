pub mod chat;
pub mod error;
pub mod flags;
pub mod messaging;
pub mod peer;
pub mod preferences;
pub mod search;
pub mod session;
pub mod transcript_log;

pub use chat::{ChatCollaborators, ChatCore};
pub use error::ChatError;
pub use messaging::{
    AttachmentTracker, InboundMessage, OutboundMessageBuilder, PacketId, ProtocolLayer,
    RecipientDescriptor, SendRequest,
};
pub use peer::{MemoryDirectory, PeerDirectory, PeerKey, PeerRecord};
pub use preferences::{Preferences, PreferencesProvider, SharedPreferences};
pub use search::{DialogId, DirectorySearch, GroupEntry, Selection};
pub use session::{ConversationSession, SessionRegistry, SharedSession};
