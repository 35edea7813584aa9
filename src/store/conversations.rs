//! Conversation store: the signed-in user's conversation list.
//!
//! DESIGN
//! ======
//! The list order is the backend's most-recent-activity order, adjusted
//! locally when the user sends (the conversation jumps to the top) so the UI
//! does not wait for the next `load` to reflect it.
//!
//! Previews follow the thread: whatever the thread store fetches or sends
//! is pushed back through `sync_preview`, which only ever moves a preview
//! forward in time.
//!
//! Overlapping `load` calls are resolved by issuance order, not arrival
//! order: each call takes a sequence number and only the most recently issued
//! call may replace the list.
//!
//! TRADE-OFFS
//! ==========
//! Unread counts are zeroed locally on select and never rolled back. Read
//! state is best-effort and a stale badge is worse than a briefly wrong one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::MessagesApi;
use crate::api::types::{Conversation, ConversationStatus, Partner, PropertyRef};
use crate::error::ApiError;
use crate::store::LoadOutcome;
use crate::store::thread::validate_message_content;

// =============================================================================
// TYPES
// =============================================================================

/// Preview state captured by [`ConversationStore::apply_optimistic_send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRollback {
    conversation_id: String,
    index: usize,
    last_message: Option<String>,
    last_message_at: Option<DateTime<Utc>>,
    optimistic_message: String,
    optimistic_at: DateTime<Utc>,
}

impl PreviewRollback {
    fn is_current(&self, conv: &Conversation) -> bool {
        conv.id == self.conversation_id
            && conv.last_message.as_deref() == Some(self.optimistic_message.as_str())
            && conv.last_message_at == Some(self.optimistic_at)
    }
}

/// Everything needed to open a conversation about a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub property: PropertyRef,
    pub partner: Partner,
    pub initial_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartedConversation {
    /// A new conversation was created with the opening message.
    Created { conversation_id: String },
    /// A conversation for this property and partner already exists; route there.
    Existing { conversation_id: String },
}

impl StartedConversation {
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Created { conversation_id } | Self::Existing { conversation_id } => conversation_id,
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Default)]
struct ListInner {
    items: Vec<Conversation>,
    active: Option<String>,
    load_issued: u64,
}

pub struct ConversationStore {
    api: Arc<dyn MessagesApi>,
    inner: Mutex<ListInner>,
}

impl ConversationStore {
    pub fn new(api: Arc<dyn MessagesApi>) -> Self {
        Self { api, inner: Mutex::new(ListInner::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, ListInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the list in display order.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.lock().items.clone()
    }

    #[must_use]
    pub fn get(&self, conversation_id: &str) -> Option<Conversation> {
        self.lock().items.iter().find(|c| c.id == conversation_id).cloned()
    }

    #[must_use]
    pub fn active(&self) -> Option<String> {
        self.lock().active.clone()
    }

    #[must_use]
    pub fn total_unread(&self) -> u32 {
        self.lock().items.iter().map(|c| c.unread_count).sum()
    }

    /// Conversations whose partner name, property title or location contains
    /// `query`, ignoring case. A blank query matches everything.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<Conversation> {
        let needle = query.trim().to_lowercase();
        let inner = self.lock();
        if needle.is_empty() {
            return inner.items.clone();
        }
        inner.items.iter().filter(|c| matches_query(c, &needle)).cloned().collect()
    }

    /// Fetch the list and replace local state with it.
    ///
    /// # Errors
    ///
    /// Returns the gateway error. The previous list is kept.
    pub async fn load(&self) -> Result<LoadOutcome, ApiError> {
        let seq = {
            let mut inner = self.lock();
            inner.load_issued += 1;
            inner.load_issued
        };

        let result = self.api.list_conversations().await;

        let mut inner = self.lock();
        if inner.load_issued != seq {
            debug!(seq, latest = inner.load_issued, "discarding superseded conversation list");
            return Ok(LoadOutcome::Superseded);
        }
        match result {
            Ok(items) => {
                info!(count = items.len(), "conversations loaded");
                inner.items = items;
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                warn!(error = %e, "conversation load failed; keeping previous list");
                Err(e)
            }
        }
    }

    /// Mark `conversation_id` active and zero its unread count locally.
    /// Returns whether the conversation had unread messages.
    pub fn activate(&self, conversation_id: &str) -> bool {
        let mut inner = self.lock();
        inner.active = Some(conversation_id.to_owned());
        match inner.items.iter_mut().find(|c| c.id == conversation_id) {
            Some(conv) if conv.unread_count > 0 => {
                conv.unread_count = 0;
                true
            }
            _ => false,
        }
    }

    /// [`Self::activate`], then acknowledge the read with the backend when
    /// there was anything unread. Acknowledgement failures are logged only.
    pub async fn select(&self, conversation_id: &str) {
        if !self.activate(conversation_id) {
            return;
        }
        if let Err(e) = self.api.mark_read(conversation_id).await {
            warn!(%conversation_id, error = %e, "read acknowledgement failed");
        }
    }

    pub fn clear_active(&self) {
        self.lock().active = None;
    }

    /// Show `content` as the preview and move the conversation to the top.
    /// Returns `None` when the conversation is not in the list.
    pub fn apply_optimistic_send(
        &self,
        conversation_id: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> Option<PreviewRollback> {
        let mut inner = self.lock();
        let index = inner.items.iter().position(|c| c.id == conversation_id)?;
        let mut conv = inner.items.remove(index);
        let rollback = PreviewRollback {
            conversation_id: conversation_id.to_owned(),
            index,
            last_message: conv.last_message.replace(content.to_owned()),
            last_message_at: conv.last_message_at.replace(at),
            optimistic_message: content.to_owned(),
            optimistic_at: at,
        };
        inner.items.insert(0, conv);
        Some(rollback)
    }

    /// Undo an optimistic preview. Does nothing if the preview has moved on
    /// since (a newer send or a server update).
    pub fn rollback(&self, token: PreviewRollback) {
        let mut inner = self.lock();
        let Some(pos) = inner.items.iter().position(|c| token.is_current(c)) else {
            debug!(conversation_id = %token.conversation_id, "preview changed since send; not rolling back");
            return;
        };
        let mut conv = inner.items.remove(pos);
        conv.last_message = token.last_message;
        conv.last_message_at = token.last_message_at;
        let index = token.index.min(inner.items.len());
        inner.items.insert(index, conv);
    }

    /// Replace an optimistic preview with the confirmed message. Position is
    /// kept; a preview that has moved on is left alone.
    pub fn confirm(&self, token: &PreviewRollback, content: &str, at: DateTime<Utc>) {
        let mut inner = self.lock();
        if let Some(conv) = inner.items.iter_mut().find(|c| token.is_current(c)) {
            conv.last_message = Some(content.to_owned());
            conv.last_message_at = Some(at);
        }
    }

    /// Show a message fetched for `conversation_id` as its preview, unless
    /// the preview is already newer. A conversation whose activity is now the
    /// most recent in the list moves to the top. Returns whether anything changed.
    pub fn sync_preview(&self, conversation_id: &str, content: &str, at: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        let Some(index) = inner.items.iter().position(|c| c.id == conversation_id) else {
            return false;
        };
        let conv = &mut inner.items[index];
        if conv.last_message_at.is_some_and(|current| current > at)
            || (conv.last_message_at == Some(at) && conv.last_message.as_deref() == Some(content))
        {
            return false;
        }
        conv.last_message = Some(content.to_owned());
        conv.last_message_at = Some(at);

        let newest = inner.items.iter().all(|c| c.last_message_at.is_none_or(|t| t <= at));
        if index > 0 && newest {
            let conv = inner.items.remove(index);
            inner.items.insert(0, conv);
        }
        debug!(%conversation_id, "preview synced from thread");
        true
    }

    /// Merge a server record. The server's fields replace local ones; an
    /// existing entry keeps its place and a new one goes on top.
    pub fn upsert_from_server(&self, conversation: Conversation) {
        let mut inner = self.lock();
        match inner.items.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation,
            None => inner.items.insert(0, conversation),
        }
    }

    /// Open a conversation about a listing with its first message.
    ///
    /// An existing conversation for the same property and partner, known
    /// locally or reported by the backend as a conflict, is returned instead
    /// of creating a duplicate.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] for an empty or overlong message, otherwise
    /// the gateway error.
    pub async fn start_conversation(&self, request: NewConversation) -> Result<StartedConversation, ApiError> {
        let text = validate_message_content(&request.initial_message)?;

        if let Some(existing) = self.find_by_pair(&request.property.id, &request.partner.id) {
            debug!(conversation_id = %existing, "conversation already exists locally");
            return Ok(StartedConversation::Existing { conversation_id: existing });
        }

        let created = match self.api.create_conversation(&request.property.id, &request.partner.id, text).await {
            Ok(created) => created,
            Err(ApiError::Conflict { existing_conversation_id: Some(conversation_id), .. }) => {
                info!(%conversation_id, "backend reported existing conversation");
                return Ok(StartedConversation::Existing { conversation_id });
            }
            Err(e) => return Err(e),
        };

        let (preview, at) = match &created.message {
            Some(m) => (m.content.clone(), m.timestamp),
            None => (text.to_owned(), Utc::now()),
        };
        let conversation_id = created.conversation_id;
        info!(%conversation_id, property_id = %request.property.id, "conversation created");
        self.upsert_from_server(Conversation {
            id: conversation_id.clone(),
            property: request.property,
            partner: request.partner,
            last_message: Some(preview),
            last_message_at: Some(at),
            unread_count: 0,
            status: ConversationStatus::Active,
        });
        Ok(StartedConversation::Created { conversation_id })
    }

    fn find_by_pair(&self, property_id: &str, partner_id: &str) -> Option<String> {
        self.lock()
            .items
            .iter()
            .find(|c| c.property.id == property_id && c.partner.id == partner_id)
            .map(|c| c.id.clone())
    }

    /// Drop everything. Used at sign-out.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.items.clear();
        inner.active = None;
        inner.load_issued += 1;
    }
}

fn matches_query(conv: &Conversation, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);
    contains(&conv.partner.name)
        || contains(&conv.property.title)
        || conv.property.location.as_deref().is_some_and(contains)
}

#[cfg(test)]
#[path = "conversations_test.rs"]
mod tests;
