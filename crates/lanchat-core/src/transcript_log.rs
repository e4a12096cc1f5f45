use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::preferences::PreferencesProvider;

/// Append-only sink for rendered transcript entries.
///
/// Strictly best effort: implementations swallow their own failures so a
/// full disk never interrupts sending or receiving.
pub trait TranscriptLog: Send + Sync {
    fn append_if_enabled(&self, text: &str);
}

/// Log sink used when message logging is not wired up.
pub struct NoopTranscriptLog;

impl TranscriptLog for NoopTranscriptLog {
    fn append_if_enabled(&self, _text: &str) {}
}

/// Appends to the file named by `Preferences::log_path` while
/// `Preferences::log_messages` is on.
///
/// The file is opened lazily and reopened whenever the configured path
/// changes.
pub struct FileTranscriptLog {
    preferences: Arc<dyn PreferencesProvider>,
    open: Mutex<Option<(PathBuf, File)>>,
}

impl FileTranscriptLog {
    pub fn new(preferences: Arc<dyn PreferencesProvider>) -> Self {
        Self {
            preferences,
            open: Mutex::new(None),
        }
    }

    fn write(&self, path: &Path, text: &str) -> std::io::Result<()> {
        let mut open = self.open.lock();
        let reopen = !matches!(open.as_ref(), Some((current, _)) if current == path);
        if reopen {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            *open = Some((path.to_path_buf(), file));
        }
        if let Some((_, file)) = open.as_mut() {
            file.write_all(text.as_bytes())?;
            file.flush()?;
        }
        Ok(())
    }
}

impl TranscriptLog for FileTranscriptLog {
    fn append_if_enabled(&self, text: &str) {
        let prefs = self.preferences.preferences();
        if !prefs.log_messages {
            return;
        }
        let Some(path) = prefs.log_path else {
            return;
        };
        if let Err(e) = self.write(&path, text) {
            tracing::warn!(error = %e, path = %path.display(), "failed to append to message log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::{Preferences, SharedPreferences};

    #[test]
    fn writes_only_when_enabled() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("messages.log");
        let prefs = SharedPreferences::new(Preferences {
            log_path: Some(path.clone()),
            ..Preferences::default()
        });
        let log = FileTranscriptLog::new(Arc::new(prefs.clone()));

        log.append_if_enabled("dropped\n");
        assert!(!path.exists());

        prefs.update(|p| p.log_messages = true);
        log.append_if_enabled("first\n");
        log.append_if_enabled("second\n");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let dir = tempfile::TempDir::new().unwrap();
        let prefs = SharedPreferences::new(Preferences {
            log_messages: true,
            // A directory cannot be opened for appending.
            log_path: Some(dir.path().to_path_buf()),
            ..Preferences::default()
        });
        let log = FileTranscriptLog::new(Arc::new(prefs));

        log.append_if_enabled("never lands\n");
    }
}
