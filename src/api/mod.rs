//! API gateway: the single choke point for backend calls.
//!
//! DESIGN
//! ======
//! Stores depend on the traits below, never on HTTP directly, so tests can
//! script responses and their arrival order. `HttpGateway` is the production
//! implementation. No caching happens at this layer; every call is a fresh
//! request and caching is the stores' job.

pub mod http;
pub mod types;

use crate::error::ApiError;
use types::{
    Conversation, CreatedConversation, Favorite, Message, NewViewingRequest, ViewingRequest, ViewingStatus,
    ViewingUpdate,
};

pub use http::HttpGateway;

// =============================================================================
// MESSAGING
// =============================================================================

#[async_trait::async_trait]
pub trait MessagesApi: Send + Sync {
    /// All conversations of the signed-in user, most recent activity first.
    ///
    /// # Errors
    ///
    /// [`ApiError::Auth`] when unauthenticated, [`ApiError::Network`] on
    /// transport failure.
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    /// Full history of one conversation, oldest first. The backend marks the
    /// caller's unread messages as read as a side effect.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] when the conversation is not the caller's.
    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError>;

    /// Persist a message and return the canonical server record.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] for empty content, [`ApiError::NotFound`]
    /// when the conversation is gone.
    async fn send_message(&self, conversation_id: &str, content: &str) -> Result<Message, ApiError>;

    /// Open a conversation about a property and send its first message.
    ///
    /// # Errors
    ///
    /// [`ApiError::Conflict`] when a conversation for the pair already exists.
    async fn create_conversation(
        &self,
        property_id: &str,
        partner_id: &str,
        initial_content: &str,
    ) -> Result<CreatedConversation, ApiError>;

    /// Acknowledge that the caller has read a conversation.
    ///
    /// The backend has no dedicated endpoint; fetching the thread is the
    /// acknowledgement.
    ///
    /// # Errors
    ///
    /// Whatever [`MessagesApi::get_messages`] returns.
    async fn mark_read(&self, conversation_id: &str) -> Result<(), ApiError> {
        self.get_messages(conversation_id).await.map(|_| ())
    }
}

// =============================================================================
// FAVORITES
// =============================================================================

#[async_trait::async_trait]
pub trait FavoritesApi: Send + Sync {
    async fn list_favorites(&self) -> Result<Vec<Favorite>, ApiError>;
    async fn add_favorite(&self, property_id: &str) -> Result<(), ApiError>;
    async fn remove_favorite(&self, property_id: &str) -> Result<(), ApiError>;
    async fn is_favorite(&self, property_id: &str) -> Result<bool, ApiError>;
}

// =============================================================================
// VIEWING REQUESTS
// =============================================================================

#[async_trait::async_trait]
pub trait ViewingRequestsApi: Send + Sync {
    async fn list_viewing_requests(&self, status: Option<ViewingStatus>) -> Result<Vec<ViewingRequest>, ApiError>;
    async fn get_viewing_request(&self, id: &str) -> Result<ViewingRequest, ApiError>;
    async fn create_viewing_request(&self, request: &NewViewingRequest) -> Result<ViewingRequest, ApiError>;
    async fn update_viewing_request(&self, id: &str, update: &ViewingUpdate) -> Result<ViewingRequest, ApiError>;
    async fn delete_viewing_request(&self, id: &str) -> Result<(), ApiError>;
}

/// Everything a signed-in session talks to.
pub trait MarketplaceApi: MessagesApi + FavoritesApi + ViewingRequestsApi {}

impl<T: MessagesApi + FavoritesApi + ViewingRequestsApi> MarketplaceApi for T {}
