use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config;

use super::persist::{ConversationSnapshot, SnapshotStore};
use super::status::ChatStatus;
use super::types::{Fragment, Message, Role, TurnEvent};

/// What the backend needs to open a completion turn: the id the reply will
/// stream into and the transcript to send.
#[derive(Clone, Debug)]
pub(crate) struct OpenTurn {
    pub(crate) reply_id: String,
    pub(crate) request: Vec<Message>,
}

/// Aggregate root for the transcript. All mutation funnels through here, on
/// one thread, so snapshot saves always happen in mutation order.
pub(crate) struct Conversation {
    messages: Vec<Message>,
    durations: HashMap<String, u64>,
    status: ChatStatus,
    store: Option<SnapshotStore>,
    welcome_shown: bool,
    streaming_reply: Option<String>,
    failure_note: Option<String>,
    id_seq: u64,
}

impl Conversation {
    pub(crate) fn load(store: Option<SnapshotStore>) -> Self {
        let snapshot = store.as_ref().map(SnapshotStore::load).unwrap_or_default();
        Self {
            messages: snapshot.messages,
            durations: snapshot.durations,
            status: ChatStatus::Idle,
            store,
            welcome_shown: false,
            streaming_reply: None,
            failure_note: None,
            id_seq: 0,
        }
    }

    pub(crate) fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn status(&self) -> ChatStatus {
        self.status
    }

    pub(crate) fn duration_ms(&self, id: &str) -> Option<u64> {
        self.durations.get(id).copied()
    }

    #[cfg(test)]
    pub(crate) fn duration_count(&self) -> usize {
        self.durations.len()
    }

    pub(crate) fn failure_note(&self) -> Option<&str> {
        self.failure_note.as_deref()
    }

    /// Seed the one-time greeting, but only into a transcript that loaded
    /// empty. `clear` re-arms this.
    pub(crate) fn maybe_bootstrap_welcome(&mut self) {
        if self.welcome_shown || !self.messages.is_empty() {
            return;
        }
        let id = format!("welcome-{}", epoch_millis());
        self.messages.push(Message::new(
            id,
            Role::Assistant,
            vec![Fragment::text(config::welcome_message())],
        ));
        self.welcome_shown = true;
        self.persist();
    }

    /// Append the user turn and open an empty reply for the stream to fill.
    /// Blank input and in-flight turns are rejected silently.
    pub(crate) fn send(&mut self, text: &str) -> Option<OpenTurn> {
        let trimmed = text.trim();
        if trimmed.is_empty() || !self.status.can_send() {
            return None;
        }

        let user_id = self.next_id("user");
        self.messages
            .push(Message::new(user_id, Role::User, vec![Fragment::text(trimmed)]));
        // The reply placeholder is local bookkeeping; the request stops at
        // the user turn.
        let request = self.messages.clone();

        let reply_id = self.next_id("reply");
        self.messages
            .push(Message::new(reply_id.clone(), Role::Assistant, Vec::new()));
        self.streaming_reply = Some(reply_id.clone());
        self.status = self.status.on_send();
        self.failure_note = None;
        self.persist();
        Some(OpenTurn { reply_id, request })
    }

    /// Apply one boundary event. Returns true when observable state changed;
    /// the caller persists once per drained batch.
    pub(crate) fn apply_event(&mut self, event: TurnEvent) -> bool {
        match event {
            TurnEvent::Fragment {
                message_id,
                fragment,
            } => {
                // Only the open reply may grow; anything else is history and
                // stays immutable.
                if self.streaming_reply.as_deref() != Some(message_id.as_str()) {
                    return false;
                }
                let Some(message) = self
                    .messages
                    .iter_mut()
                    .rev()
                    .find(|message| message.id == message_id)
                else {
                    return false;
                };
                match fragment {
                    Fragment::Text { text } => {
                        // Streamed text chunks grow one fragment, the way a
                        // streamed reply is one text part.
                        if let Some(Fragment::Text { text: last }) = message.fragments.last_mut() {
                            last.push_str(&text);
                        } else {
                            message.fragments.push(Fragment::Text { text });
                        }
                    }
                    other => message.fragments.push(other),
                }
                self.status = self.status.on_first_fragment();
                true
            }
            TurnEvent::Completed {
                message_id,
                elapsed_ms,
            } => {
                // Never invent duration keys for messages that are gone.
                if self.messages.iter().any(|message| message.id == message_id) {
                    self.durations.insert(message_id, elapsed_ms);
                }
                self.status = self.status.on_complete();
                self.streaming_reply = None;
                true
            }
            TurnEvent::Failed { reason } => {
                self.status = self.status.on_failure();
                self.failure_note = Some(reason);
                self.streaming_reply = None;
                true
            }
        }
    }

    /// Local cancellation: the transcript keeps whatever already arrived and
    /// status returns to idle without waiting for the boundary.
    pub(crate) fn stop(&mut self) {
        self.status = self.status.on_stop();
        self.streaming_reply = None;
    }

    /// Wipe transcript and durations, independent of status.
    pub(crate) fn clear(&mut self) {
        self.messages.clear();
        self.durations.clear();
        self.welcome_shown = false;
        self.streaming_reply = None;
        self.failure_note = None;
        self.persist();
    }

    pub(crate) fn persist(&self) {
        if let Some(store) = &self.store {
            store.save(&self.snapshot());
        }
    }

    pub(crate) fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.messages.clone(),
            durations: self.durations.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn take_store(&mut self) -> Option<SnapshotStore> {
        self.store.take()
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.id_seq += 1;
        format!("{prefix}-{}-{}", epoch_millis(), self.id_seq)
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
