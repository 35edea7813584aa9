//! Session: the stores of one signed-in user, built at sign-in and torn
//! down at sign-out.
//!
//! SYSTEM CONTEXT
//! ==============
//! ```text
//! open_conversation ──► ConversationStore::activate (unread → 0)
//!                   └─► MessageThreadStore::open ──► PollingScheduler::start_with
//!                                                │            │ (on merge)
//!                                                ▼            ▼
//!                                     ConversationStore::sync_preview
//! send ──► ConversationStore::apply_optimistic_send
//!      └─► MessageThreadStore::send ──► confirm | rollback
//! ```
//!
//! Opening a thread fetches its history, and that fetch is the backend's
//! read acknowledgement, so no separate ack call is made here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::api::{FavoritesApi, MarketplaceApi, MessagesApi, ViewingRequestsApi};
use crate::error::{ApiError, SendFailure};
use crate::poll::PollingScheduler;
use crate::store::conversations::{NewConversation, StartedConversation};
use crate::store::thread::{FetchOutcome, ThreadMessage, validate_message_content};
use crate::store::{ConversationStore, FavoritesStore, LoadOutcome, MessageThreadStore, ViewingRequestStore};

pub struct Session {
    user_id: String,
    conversations: Arc<ConversationStore>,
    thread: Arc<MessageThreadStore>,
    poller: PollingScheduler,
    favorites: FavoritesStore,
    viewings: ViewingRequestStore,
}

impl Session {
    /// Build empty stores for `user_id` over one gateway.
    pub fn new<A>(api: Arc<A>, user_id: impl Into<String>, poll_interval: Duration) -> Self
    where
        A: MarketplaceApi + 'static,
    {
        let user_id = user_id.into();
        let messages: Arc<dyn MessagesApi> = api.clone();
        let favorites: Arc<dyn FavoritesApi> = api.clone();
        let viewings: Arc<dyn ViewingRequestsApi> = api;
        Self {
            conversations: Arc::new(ConversationStore::new(messages.clone())),
            thread: Arc::new(MessageThreadStore::new(messages, user_id.clone())),
            poller: PollingScheduler::new(poll_interval),
            favorites: FavoritesStore::new(favorites),
            viewings: ViewingRequestStore::new(viewings),
            user_id,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    #[must_use]
    pub fn thread(&self) -> &Arc<MessageThreadStore> {
        &self.thread
    }

    #[must_use]
    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    #[must_use]
    pub fn viewings(&self) -> &ViewingRequestStore {
        &self.viewings
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Populate the conversation list.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn load(&self) -> Result<LoadOutcome, ApiError> {
        self.conversations.load().await
    }

    /// Show a conversation: clear its unread badge, load the thread and poll it.
    /// The list preview follows the newest fetched message.
    ///
    /// # Errors
    ///
    /// Returns the thread fetch error; polling is not started in that case.
    pub async fn open_conversation(&self, conversation_id: &str) -> Result<FetchOutcome, ApiError> {
        self.poller.stop();
        self.conversations.activate(conversation_id);
        let outcome = self.thread.open(conversation_id).await?;
        if matches!(outcome, FetchOutcome::Applied { .. }) {
            self.sync_preview();
            let conversations = self.conversations.clone();
            self.poller.start_with(self.thread.clone(), move |latest| {
                conversations.sync_preview(&latest.conversation_id, &latest.content, latest.created_at);
            });
        }
        Ok(outcome)
    }

    /// Refresh the open thread now, outside the polling cadence.
    ///
    /// # Errors
    ///
    /// As [`MessageThreadStore::refresh`].
    pub async fn refresh_thread(&self) -> Result<FetchOutcome, ApiError> {
        let outcome = self.thread.refresh().await?;
        if matches!(outcome, FetchOutcome::Applied { added, .. } if added > 0) {
            self.sync_preview();
        }
        Ok(outcome)
    }

    fn sync_preview(&self) {
        if let Some(latest) = self.thread.latest_confirmed() {
            self.conversations.sync_preview(&latest.conversation_id, &latest.content, latest.created_at);
        }
    }

    /// Leave the thread view.
    pub fn close_conversation(&self) {
        self.poller.stop();
        self.thread.close();
        self.conversations.clear_active();
    }

    /// Send to the open conversation, updating its list preview right away.
    ///
    /// # Errors
    ///
    /// [`SendFailure`] with the typed text; thread and preview are restored.
    pub async fn send(&self, content: &str) -> Result<ThreadMessage, SendFailure> {
        let preview = match (self.thread.conversation_id(), validate_message_content(content)) {
            (Some(conversation_id), Ok(text)) => {
                self.conversations.apply_optimistic_send(&conversation_id, text, Utc::now())
            }
            _ => None,
        };

        match self.thread.send(content).await {
            Ok(message) => {
                if let Some(token) = &preview {
                    self.conversations.confirm(token, &message.content, message.created_at);
                }
                Ok(message)
            }
            Err(failure) => {
                if let Some(token) = preview {
                    self.conversations.rollback(token);
                }
                Err(failure)
            }
        }
    }

    /// Start a conversation about a listing. Open the returned id with
    /// [`Self::open_conversation`].
    ///
    /// # Errors
    ///
    /// As [`ConversationStore::start_conversation`].
    pub async fn start_conversation(&self, request: NewConversation) -> Result<StartedConversation, ApiError> {
        self.conversations.start_conversation(request).await
    }

    /// Stop polling and drop every cached record.
    pub fn sign_out(self) {
        self.close_conversation();
        self.conversations.clear();
        self.favorites.clear();
        self.viewings.clear();
        info!(user_id = %self.user_id, "session closed");
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
