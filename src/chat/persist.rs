use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::types::Message;

const SNAPSHOT_KEY: &str = "chat-messages";

/// Durable form of the transcript plus per-reply durations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct ConversationSnapshot {
    #[serde(default)]
    pub(crate) messages: Vec<Message>,
    #[serde(default)]
    pub(crate) durations: HashMap<String, u64>,
}

/// Single-key snapshot store. Persistence is a convenience cache, not a
/// source of truth: saves are best-effort and loads never fail.
pub(crate) struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    pub(crate) fn open_default() -> Result<Self> {
        let path = store_file_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create store dir {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("open snapshot db {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Self::init(conn)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory snapshot db")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshot (
               key TEXT PRIMARY KEY,
               value TEXT NOT NULL
             );",
        )
        .context("init snapshot schema")?;
        Ok(Self { conn })
    }

    /// Absent and malformed data both come back as the empty snapshot.
    pub(crate) fn load(&self) -> ConversationSnapshot {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM snapshot WHERE key = ?1",
                params![SNAPSHOT_KEY],
                |row| row.get(0),
            )
            .ok();
        let Some(raw) = raw else {
            return ConversationSnapshot::default();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    /// A failed save leaves the conversation memory-only for this cycle.
    pub(crate) fn save(&self, snapshot: &ConversationSnapshot) {
        let serialized = match serde_json::to_string(snapshot) {
            Ok(serialized) => serialized,
            Err(err) => {
                eprintln!("snapshot encode failed: {err}");
                return;
            }
        };
        if let Err(err) = self.put_raw(&serialized) {
            eprintln!("snapshot save failed: {err}");
        }
    }

    fn put_raw(&self, raw: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute(
                "INSERT INTO snapshot(key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![SNAPSHOT_KEY, raw],
            )
            .map(|_| ())
    }
}

fn store_file_path() -> PathBuf {
    if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".cinematch").join("chat.db")
    } else {
        PathBuf::from(".cinematch").join("chat.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::{Fragment, Role};

    fn sample_snapshot() -> ConversationSnapshot {
        let mut durations = HashMap::new();
        durations.insert("reply-1".to_string(), 2400u64);
        ConversationSnapshot {
            messages: vec![
                Message::new(
                    "user-1".to_string(),
                    Role::User,
                    vec![Fragment::text("something tense please")],
                ),
                Message::new(
                    "reply-1".to_string(),
                    Role::Assistant,
                    vec![Fragment::text("Try **Heat** (1995).")],
                ),
            ],
            durations,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = SnapshotStore::open_in_memory().expect("open store");
        let snapshot = sample_snapshot();
        store.save(&snapshot);
        assert_eq!(store.load(), snapshot);
    }

    #[test]
    fn empty_store_loads_as_empty_snapshot() {
        let store = SnapshotStore::open_in_memory().expect("open store");
        assert_eq!(store.load(), ConversationSnapshot::default());
    }

    #[test]
    fn malformed_value_loads_as_empty_snapshot() {
        let store = SnapshotStore::open_in_memory().expect("open store");
        store.put_raw("{not json at all").expect("seed raw value");
        assert_eq!(store.load(), ConversationSnapshot::default());

        store
            .put_raw(r#"{"messages": "wrong shape"}"#)
            .expect("seed wrong-shape value");
        assert_eq!(store.load(), ConversationSnapshot::default());
    }

    #[test]
    fn later_saves_replace_earlier_ones() {
        let store = SnapshotStore::open_in_memory().expect("open store");
        store.save(&sample_snapshot());
        store.save(&ConversationSnapshot::default());
        assert_eq!(store.load(), ConversationSnapshot::default());
    }

    #[test]
    fn legacy_messages_without_fragments_still_load() {
        let store = SnapshotStore::open_in_memory().expect("open store");
        store
            .put_raw(
                r#"{"messages":[{"id":"m1","role":"assistant","content":"old style text"}],"durations":{}}"#,
            )
            .expect("seed legacy value");

        let snapshot = store.load();
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.messages[0].fragments.is_empty());
        assert_eq!(snapshot.messages[0].content.as_deref(), Some("old style text"));
    }
}
