use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::peer::{DirectoryColumn, PeerDirectory};
use crate::preferences::PreferencesProvider;

/// Selected directory rows, ascending.
pub type Selection = BTreeSet<usize>;

/// Identity of the search dialog a query came from.
///
/// Re-submitting the same text from the same dialog continues the previous
/// search; a new dialog always starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialogId(u64);

impl DialogId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

/// A group offered by the "select group" action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub name: String,
    /// Directory rows currently in the group.
    pub members: usize,
}

/// What the last `select_next` call searched for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    pub last_query_text: Option<String>,
    pub last_query_origin: Option<DialogId>,
    /// Matches found by the last call, ascending. Rebuilt on every call.
    pub last_matched_rows: Vec<usize>,
}

/// Incremental "find next" over the peer directory.
///
/// Each call re-runs the query against the directory as it is now, so rows
/// that appeared or moved since the previous call are picked up.
pub struct DirectorySearch {
    directory: Arc<dyn PeerDirectory>,
    preferences: Arc<dyn PreferencesProvider>,
    state: SearchState,
}

impl DirectorySearch {
    pub fn new(
        directory: Arc<dyn PeerDirectory>,
        preferences: Arc<dyn PreferencesProvider>,
    ) -> Self {
        Self {
            directory,
            preferences,
            state: SearchState::default(),
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Columns a query is matched against: the name column, or every column
    /// when `search_all_columns` is on.
    pub fn searchable_columns(&self) -> Vec<DirectoryColumn> {
        if self.preferences.preferences().search_all_columns {
            DirectoryColumn::ALL.to_vec()
        } else {
            vec![DirectoryColumn::Name]
        }
    }

    /// Rows where any of `columns` contains `query`, ignoring case,
    /// deduplicated and ascending.
    pub fn find_matches(&self, query: &str, columns: &[DirectoryColumn]) -> Vec<usize> {
        let needle = query.to_lowercase();
        let contains = |cell: &str| cell.to_lowercase().contains(&needle);

        let mut rows = BTreeSet::new();
        for &column in columns {
            rows.extend(self.directory.lookup_by_column(column, &contains));
        }
        rows.into_iter().collect()
    }

    /// The row to select for a "find next" press.
    ///
    /// A query that differs from the previous one (by text or by dialog)
    /// selects the first match. Repeating the previous query selects the
    /// first match after the highest row in `current`, wrapping to the first
    /// match past the end, or the first match when nothing is selected.
    ///
    /// Returns `None` when nothing matches; the remembered query is then
    /// left as it was.
    pub fn select_next(
        &mut self,
        query: &str,
        origin: DialogId,
        current: &Selection,
    ) -> Option<usize> {
        let matches = self.find_matches(query, &self.searchable_columns());
        let first = *matches.first()?;

        let fresh = self.state.last_query_origin != Some(origin)
            || self.state.last_query_text.as_deref() != Some(query);

        let row = if fresh {
            first
        } else {
            current
                .last()
                .and_then(|&highest| matches.iter().copied().find(|&r| r > highest))
                .unwrap_or(first)
        };

        tracing::debug!(query, fresh, row, matches = matches.len(), "directory search");

        self.state = SearchState {
            last_query_text: Some(query.to_string()),
            last_query_origin: Some(origin),
            last_matched_rows: matches,
        };
        Some(row)
    }

    /// Every row whose group is exactly `group`.
    pub fn select_group(&self, group: &str) -> Selection {
        self.exact(DirectoryColumn::Group, group)
    }

    /// Rows for the peer at `address`, used to preselect the peer a chat
    /// surface was opened for.
    pub fn select_peer(&self, address: &str) -> Selection {
        self.exact(DirectoryColumn::Address, address)
    }

    /// The configured `group_names`, in order and without blanks, each with
    /// the number of directory rows currently in it.
    pub fn groups(&self) -> Vec<GroupEntry> {
        self.preferences
            .preferences()
            .group_names
            .into_iter()
            .filter(|name| !name.is_empty())
            .map(|name| {
                let members = self
                    .directory
                    .lookup_by_column(DirectoryColumn::Group, &|cell: &str| cell == name)
                    .len();
                GroupEntry { name, members }
            })
            .collect()
    }

    fn exact(&self, column: DirectoryColumn, value: &str) -> Selection {
        if value.is_empty() {
            return Selection::new();
        }
        self.directory
            .lookup_by_column(column, &|cell: &str| cell == value)
            .into_iter()
            .collect()
    }
}
