//! End-to-end tests for the chat core: inbound routing, fan-out sends with
//! attachments, directory search and the message log, wired together through
//! `ChatCore` with in-memory collaborators.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use lanchat_core::flags;
use lanchat_core::messaging::{FileRef, MemoryTransferManager, SendRequest};
use lanchat_core::session::{NoopSurface, SessionSurface, TranscriptEntry};
use lanchat_core::transcript_log::{FileTranscriptLog, NoopTranscriptLog, TranscriptLog};
use lanchat_core::{
    ChatCollaborators, ChatCore, DialogId, DirectorySearch, InboundMessage, MemoryDirectory,
    PacketId, PeerDirectory, PeerKey, PeerRecord, Preferences, ProtocolLayer, Selection,
    SharedPreferences,
};

#[derive(Default)]
struct RecordingProtocol {
    next: AtomicU64,
    sent: Mutex<Vec<SendRequest>>,
}

impl ProtocolLayer for RecordingProtocol {
    fn dispatch(&self, request: &SendRequest) -> PacketId {
        self.sent.lock().push(request.clone());
        PacketId::new(500 + self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Default)]
struct RecordingSurface {
    updates: Mutex<Vec<(PeerKey, TranscriptEntry)>>,
}

impl SessionSurface for RecordingSurface {
    fn transcript_updated(&self, peer_key: &PeerKey, entry: &TranscriptEntry) {
        self.updates.lock().push((peer_key.clone(), entry.clone()));
    }
}

struct Env {
    core: Arc<ChatCore>,
    directory: Arc<MemoryDirectory>,
    prefs: SharedPreferences,
    protocol: Arc<RecordingProtocol>,
    transfers: Arc<MemoryTransferManager>,
}

/// Ten peers; rows 2, 5 and 9 have "xy" in their name.
fn directory() -> Arc<MemoryDirectory> {
    let records = (0..10).map(|i| PeerRecord {
        name: if matches!(i, 2 | 5 | 9) { format!("xy{i}") } else { format!("user{i}") },
        group: if i < 5 { "dev".to_string() } else { "qa".to_string() },
        host: format!("ws{i}"),
        address: PeerKey::new(format!("192.168.1.{}", 10 + i)),
        login: format!("u{i}"),
    });
    Arc::new(MemoryDirectory::from_records(records))
}

fn env_with(
    surface: Arc<dyn SessionSurface>,
    log: Arc<dyn TranscriptLog>,
    prefs: SharedPreferences,
) -> Env {
    let directory = directory();
    let protocol = Arc::new(RecordingProtocol::default());
    let transfers = Arc::new(MemoryTransferManager::new());

    let core = Arc::new(ChatCore::new(ChatCollaborators {
        directory: directory.clone(),
        preferences: Arc::new(prefs.clone()),
        protocol: protocol.clone(),
        transfers: transfers.clone(),
        surface,
        log,
    }));

    Env {
        core,
        directory,
        prefs,
        protocol,
        transfers,
    }
}

fn env() -> Env {
    let prefs = SharedPreferences::new(Preferences {
        user_name: "alice".to_string(),
        ..Preferences::default()
    });
    env_with(Arc::new(NoopSurface), Arc::new(NoopTranscriptLog), prefs)
}

fn inbound(from: &str, name: &str, text: &str) -> InboundMessage {
    InboundMessage {
        peer_key: PeerKey::from(from),
        speaker_name: name.to_string(),
        text: text.to_string(),
        flags: flags::SEND,
    }
}

// ── Session identity ─────────────────────────────────────────────────

#[test]
fn repeated_get_or_create_returns_same_session() {
    let env = env();
    let key = PeerKey::from("192.168.1.12");

    let a = env.core.registry().get_or_create(&key, "first");
    let b = env.core.registry().get_or_create(&key, "second");

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(b.lock().display_title(), "first");
    assert_eq!(env.core.registry().len(), 1);
}

#[test]
fn removed_session_is_replaced_by_empty_one() {
    let env = env();
    let key = PeerKey::from("192.168.1.12");

    let old = env.core.route_inbound(&inbound("192.168.1.12", "xy2", "hello")).unwrap();
    env.core.close_chat(&key);
    assert!(env.core.registry().lookup(&key).is_none());

    let new = env.core.open_chat(&key, "xy2");
    assert!(!Arc::ptr_eq(&old, &new));
    assert!(new.lock().transcript().is_empty());
}

#[test]
fn surface_is_notified_for_inbound_and_echo() {
    let surface = Arc::new(RecordingSurface::default());
    let prefs = SharedPreferences::new(Preferences::default());
    let env = env_with(surface.clone(), Arc::new(NoopTranscriptLog), prefs);

    let session = env.core.route_inbound(&inbound("192.168.1.12", "xy2", "ping")).unwrap();
    let recipients = env.core.recipients_for_rows([2]);
    let mut draft = "pong".to_string();
    env.core.send(&session, &mut draft, &recipients, false);

    let updates = surface.updates.lock();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|(key, _)| key.as_str() == "192.168.1.12"));
    assert_eq!(updates[0].1.text, "ping");
    assert_eq!(updates[1].1.speaker_name, "anonymous");
}

// ── Sending ──────────────────────────────────────────────────────────

#[test]
fn whitespace_only_text_sends_nothing() {
    let env = env();
    let session = env.core.open_chat(&PeerKey::from("192.168.1.12"), "xy2");
    let recipients = env.core.recipients_for_rows([2]);

    let mut draft = " \t\r\n".to_string();
    let ids = env.core.send(&session, &mut draft, &recipients, false);

    assert!(ids.is_empty());
    assert!(draft.is_empty());
    assert!(env.protocol.sent.lock().is_empty());
    assert!(session.lock().transcript().is_empty());
}

#[test]
fn sealed_send_to_two_recipients() {
    let env = env();
    let session = env.core.open_chat(&PeerKey::from("192.168.1.12"), "xy2");
    let recipients = env.core.recipients_for_rows([2, 5]);

    let mut draft = "hi".to_string();
    let ids = env.core.send(&session, &mut draft, &recipients, true);

    assert_eq!(ids.len(), 2);
    let sent = env.protocol.sent.lock();
    assert_eq!(sent.len(), 2);
    for request in sent.iter() {
        assert_eq!(flags::mode(request.flags), flags::SEND);
        assert!(flags::has(
            request.flags,
            flags::MULTICAST | flags::SEALED | flags::REQUEST_READ_ACK | flags::REQUEST_DELIVERY_ACK
        ));
        assert_eq!(request.payload, b"hi\0");
    }
    assert_eq!(sent[0].recipient.name, "xy2");
    assert_eq!(sent[1].recipient.name, "xy5");

    let session = session.lock();
    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.transcript()[0].speaker_name, "alice");
}

#[test]
fn attached_send_registers_each_recipient_separately() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("plan.pdf");
    std::fs::write(&path, vec![0u8; 300]).unwrap();

    let env = env();
    let session = env.core.open_chat(&PeerKey::from("192.168.1.12"), "xy2");
    session.lock().add_pending_attachment(FileRef::from_path(&path).unwrap());

    let recipients = env.core.recipients_for_rows([2, 5]);
    let mut draft = "draft attached".to_string();
    let ids = env.core.send(&session, &mut draft, &recipients, false);

    assert_eq!(ids, vec![PacketId::new(500), PacketId::new(501)]);
    assert_eq!(env.transfers.packet_ids(), ids);

    let first = env.transfers.get(ids[0]).unwrap();
    let second = env.transfers.get(ids[1]).unwrap();
    assert_eq!(first.recipient_host, "ws2");
    assert_eq!(second.recipient_host, "ws5");
    assert_eq!(first.manifest.files()[0].size, 300);
    assert_eq!(first.manifest.serialized_form(), second.manifest.serialized_form());
    assert!(first
        .manifest
        .serialized_form()
        .starts_with(b"0:plan.pdf:12c:"));

    for request in env.protocol.sent.lock().iter() {
        assert!(flags::has(request.flags, flags::FILE_ATTACHED | flags::MULTICAST));
        assert!(request.payload.starts_with(b"draft attached\0"));
        assert_eq!(request.payload.last(), Some(&0));
    }

    assert!(!session.lock().has_pending_attachments());
}

// ── Directory search ─────────────────────────────────────────────────

#[test]
fn find_next_cycles_and_wraps() {
    let env = env();
    let mut search = DirectorySearch::new(env.directory.clone(), Arc::new(env.prefs.clone()));
    let dialog = DialogId::new(9);
    let mut selection = Selection::new();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let row = search.select_next("xy", dialog, &selection).unwrap();
        seen.push(row);
        selection = Selection::from([row]);
    }

    assert_eq!(seen, vec![2, 5, 9, 2]);
}

#[test]
fn find_next_without_matches_changes_nothing() {
    let env = env();
    let mut search = DirectorySearch::new(env.directory.clone(), Arc::new(env.prefs.clone()));

    assert_eq!(search.select_next("nobody", DialogId::new(1), &Selection::new()), None);
    assert!(search.state().last_query_text.is_none());
}

#[test]
fn search_all_columns_follows_live_preferences() {
    let env = env();
    let mut search = DirectorySearch::new(env.directory.clone(), Arc::new(env.prefs.clone()));
    let dialog = DialogId::new(1);

    assert_eq!(search.select_next("ws7", dialog, &Selection::new()), None);
    env.prefs.update(|p| p.search_all_columns = true);
    assert_eq!(search.select_next("ws7", dialog, &Selection::new()), Some(7));
}

#[test]
fn select_group_then_send_to_group() {
    let env = env();
    let search = DirectorySearch::new(env.directory.clone(), Arc::new(env.prefs.clone()));

    let rows = search.select_group("qa");
    assert_eq!(rows.len(), 5);

    let session = env.core.open_chat(&PeerKey::from("192.168.1.15"), "xy5");
    let recipients = env.core.recipients_for_rows(rows);
    let mut draft = "standup in 5".to_string();
    let ids = env.core.send(&session, &mut draft, &recipients, false);

    assert_eq!(ids.len(), 5);
    assert_eq!(env.directory.row_count(), 10);
}

// ── Message log ──────────────────────────────────────────────────────

#[test]
fn transcript_is_appended_to_message_log() {
    let dir = tempfile::TempDir::new().unwrap();
    let log_path = dir.path().join("messages.log");
    let prefs = SharedPreferences::new(Preferences {
        user_name: "alice".to_string(),
        log_messages: true,
        log_path: Some(log_path.clone()),
        ..Preferences::default()
    });
    let log = Arc::new(FileTranscriptLog::new(Arc::new(prefs.clone())));
    let env = env_with(Arc::new(NoopSurface), log, prefs);

    let session = env.core.route_inbound(&inbound("192.168.1.12", "xy2", "ping")).unwrap();
    let recipients = env.core.recipients_for_rows([2]);
    let mut draft = "pong".to_string();
    env.core.send(&session, &mut draft, &recipients, false);

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let expected: String = session
        .lock()
        .transcript()
        .iter()
        .map(TranscriptEntry::render)
        .collect();
    assert_eq!(contents, expected);
    assert!(contents.starts_with("xy2 ("));
    assert!(contents.contains(") :\r\npong\r\n\r\n"));
}
