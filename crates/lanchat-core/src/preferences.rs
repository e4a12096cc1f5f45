use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Name shown for our own messages in every transcript.
    #[serde(default = "default_user_name")]
    pub user_name: String,
    /// Initial state of the "seal" toggle on a new chat surface.
    #[serde(default)]
    pub sealed_by_default: bool,
    /// Widen "find" from the name column to every directory column.
    #[serde(default)]
    pub search_all_columns: bool,
    /// Show the chat surface as soon as a message arrives.
    #[serde(default = "default_true")]
    pub auto_popup: bool,
    /// Append every transcript entry to `log_path`.
    #[serde(default)]
    pub log_messages: bool,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Groups offered by the "select group" action.
    #[serde(default)]
    pub group_names: Vec<String>,
}

fn default_user_name() -> String {
    "anonymous".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            user_name: default_user_name(),
            sealed_by_default: false,
            search_all_columns: false,
            auto_popup: true,
            log_messages: false,
            log_path: None,
            group_names: Vec::new(),
        }
    }
}

impl Preferences {
    pub fn from_json(json: &str) -> Result<Self, ChatError> {
        serde_json::from_str(json)
            .map_err(|e| ChatError::Preferences(format!("invalid preferences JSON: {e}")))
    }

    /// Load preferences from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no preferences file, using defaults");
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), ChatError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Read access to the current preferences.
///
/// Components take this at construction instead of reaching for a
/// process-wide settings object.
pub trait PreferencesProvider: Send + Sync {
    /// Snapshot of the current preferences.
    fn preferences(&self) -> Preferences;
}

/// Preferences shared between the settings surface and the core.
#[derive(Clone, Default)]
pub struct SharedPreferences {
    inner: Arc<RwLock<Preferences>>,
}

impl SharedPreferences {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            inner: Arc::new(RwLock::new(preferences)),
        }
    }

    /// Apply an in-place edit.
    pub fn update(&self, edit: impl FnOnce(&mut Preferences)) {
        edit(&mut self.inner.write());
    }
}

impl PreferencesProvider for SharedPreferences {
    fn preferences(&self) -> Preferences {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let prefs = Preferences::from_json(r#"{ "userName": "alice", "searchAllColumns": true }"#)
            .unwrap();
        assert_eq!(prefs.user_name, "alice");
        assert!(prefs.search_all_columns);
        assert!(prefs.auto_popup);
        assert!(!prefs.log_messages);
        assert!(prefs.group_names.is_empty());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let prefs = Preferences::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = Preferences {
            user_name: "bob".to_string(),
            group_names: vec!["dev".to_string(), "ops".to_string()],
            ..Preferences::default()
        };
        prefs.save(&path).unwrap();

        assert_eq!(Preferences::load(&path).unwrap(), prefs);
    }

    #[test]
    fn malformed_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ broken").unwrap();

        assert!(matches!(Preferences::load(&path), Err(ChatError::Preferences(_))));
    }

    #[test]
    fn shared_update_is_visible_to_readers() {
        let shared = SharedPreferences::default();
        let reader: &dyn PreferencesProvider = &shared;
        assert!(!reader.preferences().sealed_by_default);

        shared.update(|p| p.sealed_by_default = true);
        assert!(reader.preferences().sealed_by_default);
    }
}
