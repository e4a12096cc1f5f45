use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Stable identity of a remote peer (its network address).
///
/// Conversations are keyed by this alone, so a peer that changes its display
/// name between messages still lands in the same session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerKey(String);

impl PeerKey {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerKey {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for PeerKey {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Searchable columns of the peer directory table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectoryColumn {
    Name,
    Group,
    Host,
    Address,
    Login,
}

impl DirectoryColumn {
    pub const ALL: [DirectoryColumn; 5] = [
        DirectoryColumn::Name,
        DirectoryColumn::Group,
        DirectoryColumn::Host,
        DirectoryColumn::Address,
        DirectoryColumn::Login,
    ];
}

/// One row of the peer directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub host: String,
    pub address: PeerKey,
    #[serde(default)]
    pub login: String,
}

impl PeerRecord {
    /// Cell text for a column.
    pub fn column(&self, column: DirectoryColumn) -> &str {
        match column {
            DirectoryColumn::Name => &self.name,
            DirectoryColumn::Group => &self.group,
            DirectoryColumn::Host => &self.host,
            DirectoryColumn::Address => self.address.as_str(),
            DirectoryColumn::Login => &self.login,
        }
    }
}

/// Ordered table of known peers.
///
/// Owned by the presence layer (entry/exit broadcasts keep it current); the
/// chat core only reads it. Row indices are positions in the current
/// ordering and are not stable across mutations.
pub trait PeerDirectory: Send + Sync {
    /// Number of rows currently in the table.
    fn row_count(&self) -> usize;

    /// Snapshot of the row at `index`.
    fn row_at(&self, index: usize) -> Option<PeerRecord>;

    /// Indices of every row whose `column` cell satisfies `predicate`, ascending.
    fn lookup_by_column(&self, column: DirectoryColumn, predicate: &dyn Fn(&str) -> bool)
        -> Vec<usize>;
}

/// In-memory peer directory.
///
/// Rows keep insertion order. Re-announcing an address replaces its row in
/// place instead of appending a duplicate.
#[derive(Default)]
pub struct MemoryDirectory {
    rows: RwLock<Vec<PeerRecord>>,
}

#[derive(Deserialize)]
struct DirectoryFile {
    peers: Vec<PeerRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = PeerRecord>) -> Self {
        let directory = Self::new();
        for record in records {
            directory.upsert(record);
        }
        directory
    }

    /// Load a directory from JSON of the form `{ "peers": [ ... ] }`.
    pub fn from_json(json: &str) -> Result<Self, ChatError> {
        let file: DirectoryFile = serde_json::from_str(json)
            .map_err(|e| ChatError::Directory(format!("invalid directory JSON: {e}")))?;
        Ok(Self::from_records(file.peers))
    }

    /// Insert a peer, or replace the row that already has its address.
    pub fn upsert(&self, record: PeerRecord) {
        let mut rows = self.rows.write();
        if let Some(existing) = rows.iter_mut().find(|r| r.address == record.address) {
            *existing = record;
        } else {
            rows.push(record);
        }
    }

    /// Remove a peer by address. Returns whether a row was removed.
    pub fn remove(&self, address: &PeerKey) -> bool {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|r| &r.address != address);
        rows.len() != before
    }

    /// Drop every row (the "refresh" action before a new entry broadcast).
    pub fn clear(&self) {
        self.rows.write().clear();
    }
}

impl PeerDirectory for MemoryDirectory {
    fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    fn row_at(&self, index: usize) -> Option<PeerRecord> {
        self.rows.read().get(index).cloned()
    }

    fn lookup_by_column(
        &self,
        column: DirectoryColumn,
        predicate: &dyn Fn(&str) -> bool,
    ) -> Vec<usize> {
        self.rows
            .read()
            .iter()
            .enumerate()
            .filter(|(_, record)| predicate(record.column(column)))
            .map(|(index, _)| index)
            .collect()
    }
}
