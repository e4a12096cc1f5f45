use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::messaging::protocol::PacketId;
use crate::session::ConversationSession;

/// Attribute codes written into each manifest record.
const ATTR_REGULAR: u32 = 0x1;
const ATTR_DIRECTORY: u32 = 0x2;

/// Terminates every manifest record.
const RECORD_TERMINATOR: char = '\u{7}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileKind {
    Regular,
    Directory,
}

/// A file or directory queued for sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub path: PathBuf,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification, unix seconds.
    pub modified: u64,
    pub kind: FileKind,
}

impl FileRef {
    /// Stat `path` and describe it.
    pub fn from_path(path: &Path) -> Result<Self, ChatError> {
        let metadata = std::fs::metadata(path)?;
        let kind = if metadata.is_dir() {
            FileKind::Directory
        } else if metadata.is_file() {
            FileKind::Regular
        } else {
            return Err(ChatError::Attachment(format!(
                "not a regular file or directory: {}",
                path.display()
            )));
        };
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs());

        Ok(Self {
            path: path.to_path_buf(),
            size: if kind == FileKind::Directory { 0 } else { metadata.len() },
            modified,
            kind,
        })
    }

    /// Name sent to the peer: the last path component.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// The files attached to one outbound request, plus their wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentManifest {
    files: Vec<FileRef>,
    serialized_form: Vec<u8>,
}

impl AttachmentManifest {
    /// Snapshot `files` and serialize them.
    ///
    /// Each record is `id:name:size:mtime:attr:` with numbers in lowercase
    /// hex, ids counting from 0, and a BEL after every record. Colons inside
    /// a name are doubled.
    pub fn new(files: &[FileRef]) -> Self {
        let mut form = String::new();
        for (id, file) in files.iter().enumerate() {
            let attr = match file.kind {
                FileKind::Regular => ATTR_REGULAR,
                FileKind::Directory => ATTR_DIRECTORY,
            };
            let name = file.file_name().replace(':', "::");
            let _ = write!(form, "{id}:{name}:{:x}:{:x}:{attr:x}:", file.size, file.modified);
            form.push(RECORD_TERMINATOR);
        }

        Self {
            files: files.to_vec(),
            serialized_form: form.into_bytes(),
        }
    }

    pub fn files(&self) -> &[FileRef] {
        &self.files
    }

    pub fn serialized_form(&self) -> &[u8] {
        &self.serialized_form
    }
}

/// A manifest filed under the packet that announced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRegistration {
    pub packet_id: PacketId,
    pub manifest: AttachmentManifest,
    pub recipient_name: String,
    pub recipient_host: String,
}

/// Serves file-pull requests from peers.
///
/// Takes ownership of every registration; a later pull quoting the packet
/// id is matched against it.
pub trait TransferManager: Send + Sync {
    fn register(&self, packet_id: PacketId, registration: TransferRegistration);
}

/// Transfer manager that only keeps registrations in memory.
#[derive(Default)]
pub struct MemoryTransferManager {
    registrations: Mutex<HashMap<PacketId, TransferRegistration>>,
}

impl MemoryTransferManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, packet_id: PacketId) -> Option<TransferRegistration> {
        self.registrations.lock().get(&packet_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }

    /// Registered packet ids, ascending.
    pub fn packet_ids(&self) -> Vec<PacketId> {
        let mut ids: Vec<PacketId> = self.registrations.lock().keys().copied().collect();
        ids.sort();
        ids
    }
}

impl TransferManager for MemoryTransferManager {
    fn register(&self, packet_id: PacketId, registration: TransferRegistration) {
        if self.registrations.lock().insert(packet_id, registration).is_some() {
            tracing::warn!(%packet_id, "packet id registered twice, replacing earlier transfer");
        }
    }
}

/// Builds manifests for outbound sends and files them with the transfer
/// manager once the protocol layer has assigned a packet id.
#[derive(Clone)]
pub struct AttachmentTracker {
    manager: Arc<dyn TransferManager>,
}

impl AttachmentTracker {
    pub fn new(manager: Arc<dyn TransferManager>) -> Self {
        Self { manager }
    }

    /// Fresh manifest of the session's pending attachments.
    ///
    /// Every call returns an independent value; recipients never share one.
    pub fn prepare_manifest(&self, session: &ConversationSession) -> AttachmentManifest {
        AttachmentManifest::new(session.pending_attachments())
    }

    /// Hand `manifest` to the transfer manager under `packet_id`.
    ///
    /// Must run after the request carrying the manifest was dispatched,
    /// since that is when the id exists. Packet ids are never reused; a
    /// duplicate replaces the earlier registration.
    pub fn register(
        &self,
        packet_id: PacketId,
        manifest: AttachmentManifest,
        recipient_name: &str,
        recipient_host: &str,
    ) {
        tracing::debug!(
            %packet_id,
            recipient = recipient_name,
            files = manifest.files().len(),
            "registering file transfer"
        );
        self.manager.register(
            packet_id,
            TransferRegistration {
                packet_id,
                manifest,
                recipient_name: recipient_name.to_string(),
                recipient_host: recipient_host.to_string(),
            },
        );
    }
}
