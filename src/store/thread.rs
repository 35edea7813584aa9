//! Message thread store: the ordered message list of the open conversation.
//!
//! DESIGN
//! ======
//! One thread at a time. `open` bumps a generation counter and every
//! network completion compares the generation it captured before applying,
//! so results for an abandoned conversation are dropped instead of leaking
//! into the next one.
//!
//! Messages stay sorted by `(created_at, id)` after every operation. New
//! entries are inserted at their sorted position; existing entries are never
//! moved, except that an optimistic entry is swapped for its server record.
//!
//! MERGE POLICY
//! ============
//! `refresh` only adds. A message missing from a fresh fetch is kept (a gap
//! is treated as a transient fetch issue, not a deletion), and a message
//! already present is left alone apart from a one-way `read` upgrade. This
//! makes overlapping refreshes idempotent.
//!
//! A fetched copy of one of our own sends replaces the oldest pending entry
//! with the same text, so a poll landing before the send response never
//! shows the message twice.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::api::MessagesApi;
use crate::api::types::Message;
use crate::error::{ApiError, SendFailure};

/// Longest message the client will submit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

// =============================================================================
// TYPES
// =============================================================================

/// Message identity. Optimistic entries carry a local sequence number until
/// the server assigns the real id.
///
/// Variant order matters: at equal timestamps confirmed messages sort before
/// pending ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageId {
    Confirmed(String),
    Pending(u64),
}

/// A message as held by the thread store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub id: MessageId,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl ThreadMessage {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.id, MessageId::Pending(_))
    }

    fn sort_key(&self) -> (&DateTime<Utc>, &MessageId) {
        (&self.created_at, &self.id)
    }
}

impl From<Message> for ThreadMessage {
    fn from(m: Message) -> Self {
        Self {
            id: MessageId::Confirmed(m.id),
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            content: m.content,
            created_at: m.timestamp,
            read: m.read,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThreadStatus {
    #[default]
    Idle,
    Loading,
    Refreshing,
    Error,
}

/// Whether a completed fetch was applied to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The fetch belonged to the current thread and was applied.
    Applied { added: usize, marked_read: usize },
    /// The thread changed (or polling stopped) while the fetch was in flight.
    Discarded,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Trim and check outgoing message text.
///
/// # Errors
///
/// [`ApiError::Validation`] when the text is blank or longer than
/// [`MAX_MESSAGE_CHARS`].
pub fn validate_message_content(content: &str) -> Result<&str, ApiError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("message is empty".into()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!("message exceeds {MAX_MESSAGE_CHARS} characters")));
    }
    Ok(trimmed)
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Default)]
struct ThreadInner {
    conversation_id: Option<String>,
    generation: u64,
    messages: Vec<ThreadMessage>,
    status: ThreadStatus,
    next_local_id: u64,
}

/// Session-scoped owner of the open conversation's messages.
pub struct MessageThreadStore {
    api: Arc<dyn MessagesApi>,
    user_id: String,
    inner: Mutex<ThreadInner>,
}

impl MessageThreadStore {
    pub fn new(api: Arc<dyn MessagesApi>, user_id: impl Into<String>) -> Self {
        Self { api, user_id: user_id.into(), inner: Mutex::new(ThreadInner::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, ThreadInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Id of the signed-in user; authors optimistic messages.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<String> {
        self.lock().conversation_id.clone()
    }

    #[must_use]
    pub fn status(&self) -> ThreadStatus {
        self.lock().status
    }

    /// Snapshot of the thread in display order.
    #[must_use]
    pub fn messages(&self) -> Vec<ThreadMessage> {
        self.lock().messages.clone()
    }

    /// Newest server-confirmed message of the open thread.
    #[must_use]
    pub fn latest_confirmed(&self) -> Option<ThreadMessage> {
        self.lock().messages.iter().rev().find(|m| !m.is_pending()).cloned()
    }

    /// Current thread generation. Changes whenever a thread is opened or closed.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Switch to `conversation_id`, dropping the previous thread, and load its history.
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the fetch for the still-current thread fails;
    /// the status is then [`ThreadStatus::Error`].
    pub async fn open(&self, conversation_id: &str) -> Result<FetchOutcome, ApiError> {
        let generation = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.conversation_id = Some(conversation_id.to_owned());
            inner.messages.clear();
            inner.status = ThreadStatus::Loading;
            inner.generation
        };

        let result = self.api.get_messages(conversation_id).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(%conversation_id, "discarding history for abandoned thread");
            return Ok(FetchOutcome::Discarded);
        }
        match result {
            Ok(remote) => {
                let mut messages: Vec<ThreadMessage> = remote.into_iter().map(ThreadMessage::from).collect();
                messages.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
                let added = messages.len();
                inner.messages = messages;
                inner.status = ThreadStatus::Idle;
                debug!(%conversation_id, count = added, "thread loaded");
                Ok(FetchOutcome::Applied { added, marked_read: 0 })
            }
            Err(e) => {
                inner.status = ThreadStatus::Error;
                warn!(%conversation_id, error = %e, "thread load failed");
                Err(e)
            }
        }
    }

    /// Drop the open thread. Any in-flight fetch or send for it is discarded on arrival.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.conversation_id = None;
        inner.messages.clear();
        inner.status = ThreadStatus::Idle;
    }

    /// Send `content` to the open conversation.
    ///
    /// The message shows up immediately as a pending entry. On success the
    /// pending entry is swapped for the server record; on failure it is
    /// removed and the typed text is handed back.
    ///
    /// # Errors
    ///
    /// [`SendFailure`] carrying the original `content` when validation or the
    /// network call fails, or when no thread is open.
    pub async fn send(&self, content: &str) -> Result<ThreadMessage, SendFailure> {
        let fail = |error| SendFailure { content: content.to_owned(), error };
        let text = validate_message_content(content).map_err(fail)?;

        let (generation, conversation_id, local_id) = {
            let mut inner = self.lock();
            let Some(conversation_id) = inner.conversation_id.clone() else {
                return Err(fail(ApiError::Validation("no conversation is open".into())));
            };
            inner.next_local_id += 1;
            let local_id = inner.next_local_id;
            let pending = ThreadMessage {
                id: MessageId::Pending(local_id),
                conversation_id: conversation_id.clone(),
                sender_id: self.user_id.clone(),
                content: text.to_owned(),
                created_at: optimistic_timestamp(&inner.messages),
                read: false,
            };
            insert_sorted(&mut inner.messages, pending);
            (inner.generation, conversation_id, local_id)
        };

        let result = self.api.send_message(&conversation_id, text).await;

        let mut inner = self.lock();
        let live = inner.generation == generation;
        if live {
            inner.messages.retain(|m| m.id != MessageId::Pending(local_id));
        } else {
            debug!(%conversation_id, "send completed after thread closed");
        }
        match result {
            Ok(message) => {
                let confirmed = ThreadMessage::from(message);
                if live && !inner.messages.iter().any(|m| m.id == confirmed.id) {
                    insert_sorted(&mut inner.messages, confirmed.clone());
                }
                Ok(confirmed)
            }
            Err(error) => {
                warn!(%conversation_id, error = %error, "send failed; optimistic message removed");
                Err(fail(error))
            }
        }
    }

    /// Fetch the open thread and merge it in. See the module docs for the policy.
    ///
    /// # Errors
    ///
    /// Returns the gateway error; messages are left as they were and the
    /// status is [`ThreadStatus::Error`] until a later fetch succeeds.
    pub async fn refresh(&self) -> Result<FetchOutcome, ApiError> {
        self.refresh_if(|| true).await
    }

    /// Like [`Self::refresh`], but the result is only applied if `still_live`
    /// holds when the response arrives. The polling scheduler passes its
    /// generation check here.
    ///
    /// # Errors
    ///
    /// As [`Self::refresh`].
    pub async fn refresh_if<F>(&self, still_live: F) -> Result<FetchOutcome, ApiError>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let (generation, conversation_id, flagged) = {
            let mut inner = self.lock();
            let Some(conversation_id) = inner.conversation_id.clone() else {
                return Ok(FetchOutcome::Discarded);
            };
            let flagged = inner.status == ThreadStatus::Idle;
            if flagged {
                inner.status = ThreadStatus::Refreshing;
            }
            (inner.generation, conversation_id, flagged)
        };

        let result = self.api.get_messages(&conversation_id).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(%conversation_id, "discarding refresh for abandoned thread");
            return Ok(FetchOutcome::Discarded);
        }
        if flagged && inner.status == ThreadStatus::Refreshing {
            inner.status = ThreadStatus::Idle;
        }
        if !still_live() {
            debug!(%conversation_id, "discarding refresh after polling stopped");
            return Ok(FetchOutcome::Discarded);
        }

        let remote = match result {
            Ok(remote) => remote,
            Err(e) => {
                if inner.status != ThreadStatus::Loading {
                    inner.status = ThreadStatus::Error;
                }
                return Err(e);
            }
        };
        if inner.status == ThreadStatus::Error {
            inner.status = ThreadStatus::Idle;
        }
        let (added, marked_read) = merge_remote(&mut inner.messages, remote, &self.user_id);
        if added > 0 {
            debug!(%conversation_id, added, "merged new messages");
        }
        Ok(FetchOutcome::Applied { added, marked_read })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn insert_sorted(messages: &mut Vec<ThreadMessage>, message: ThreadMessage) {
    let pos = messages.partition_point(|m| m.sort_key() <= message.sort_key());
    messages.insert(pos, message);
}

/// Local send time, never earlier than the newest message so the pending
/// entry lands at the bottom even with a skewed clock.
fn optimistic_timestamp(messages: &[ThreadMessage]) -> DateTime<Utc> {
    let now = Utc::now();
    messages.last().map_or(now, |last| now.max(last.created_at))
}

fn merge_remote(messages: &mut Vec<ThreadMessage>, remote: Vec<Message>, own_id: &str) -> (usize, usize) {
    let mut added = 0;
    let mut marked_read = 0;
    for message in remote {
        let incoming = ThreadMessage::from(message);
        if let Some(existing) = messages.iter_mut().find(|m| m.id == incoming.id) {
            if incoming.read && !existing.read {
                existing.read = true;
                marked_read += 1;
            }
            continue;
        }
        if incoming.sender_id == own_id {
            if let Some(pos) = messages
                .iter()
                .position(|m| m.is_pending() && m.sender_id == own_id && m.content == incoming.content)
            {
                messages.remove(pos);
            }
        }
        insert_sorted(messages, incoming);
        added += 1;
    }
    (added, marked_read)
}

#[cfg(test)]
#[path = "thread_test.rs"]
mod tests;
