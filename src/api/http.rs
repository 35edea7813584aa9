//! HTTP implementation of the gateway traits over `reqwest`.
//!
//! Thin wrapper: builds the URL, attaches the bearer credential, maps the
//! status to an [`ApiError`] and decodes the JSON envelope. Pure path and
//! parsing helpers are split out for testability.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    AddFavoriteRequest, Conversation, ConversationsResponse, CreateConversationRequest, CreatedConversation,
    Favorite, FavoriteCheckResponse, FavoritesResponse, Message, MessageResponse, MessagesResponse,
    NewViewingRequest, SendMessageRequest, ViewingRequest, ViewingRequestResponse, ViewingRequestsResponse,
    ViewingStatus, ViewingUpdate,
};
use super::{FavoritesApi, MessagesApi, ViewingRequestsApi};
use crate::config::{ClientConfig, normalize_base_url};
use crate::error::ApiError;

// =============================================================================
// ENDPOINTS
// =============================================================================

const CONVERSATIONS_PATH: &str = "/api/v1/messages/conversations";
const FAVORITES_PATH: &str = "/api/v1/favorites";
const VIEWING_REQUESTS_PATH: &str = "/api/v1/viewing-requests";

/// Everything outside the RFC 3986 unreserved set.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encode an opaque id for use as one path segment.
fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

fn conversation_endpoint(conversation_id: &str) -> String {
    format!("/api/v1/messages/conversation/{}", encode_segment(conversation_id))
}

fn favorite_endpoint(property_id: &str) -> String {
    format!("{FAVORITES_PATH}/{}", encode_segment(property_id))
}

fn favorite_check_endpoint(property_id: &str) -> String {
    format!("{FAVORITES_PATH}/check/{}", encode_segment(property_id))
}

fn viewing_request_endpoint(request_id: &str) -> String {
    format!("{VIEWING_REQUESTS_PATH}/{}", encode_segment(request_id))
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
}

// =============================================================================
// CLIENT
// =============================================================================

/// Authenticated REST client for the marketplace backend.
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpGateway {
    /// Build a gateway from typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: normalize_base_url(&config.base_url)?, token: config.token.clone() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let request = builder.build().map_err(|e| ApiError::Network(e.to_string()))?;
        debug!(method = %request.method(), path = request.url().path(), "api request");

        let response = self.http.execute(request).await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(ApiError::from_status(status, &text));
        }
        Ok(text)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let text = self.send(builder).await?;
        parse_body(&text)
    }
}

// =============================================================================
// MESSAGING
// =============================================================================

#[async_trait::async_trait]
impl MessagesApi for HttpGateway {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let body: ConversationsResponse = self.fetch(self.request(Method::GET, CONVERSATIONS_PATH)).await?;
        Ok(body.conversations)
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        let body: MessagesResponse = self
            .fetch(self.request(Method::GET, &conversation_endpoint(conversation_id)))
            .await?;
        Ok(body.messages)
    }

    async fn send_message(&self, conversation_id: &str, content: &str) -> Result<Message, ApiError> {
        let builder = self
            .request(Method::POST, &conversation_endpoint(conversation_id))
            .json(&SendMessageRequest { content });
        let body: MessageResponse = self.fetch(builder).await?;
        Ok(body.message)
    }

    async fn create_conversation(
        &self,
        property_id: &str,
        partner_id: &str,
        initial_content: &str,
    ) -> Result<CreatedConversation, ApiError> {
        let builder = self.request(Method::POST, CONVERSATIONS_PATH).json(&CreateConversationRequest {
            property_id,
            landlord_id: partner_id,
            initial_message: initial_content,
        });
        self.fetch(builder).await
    }
}

// =============================================================================
// FAVORITES
// =============================================================================

#[async_trait::async_trait]
impl FavoritesApi for HttpGateway {
    async fn list_favorites(&self) -> Result<Vec<Favorite>, ApiError> {
        let body: FavoritesResponse = self.fetch(self.request(Method::GET, FAVORITES_PATH)).await?;
        Ok(body.favorites)
    }

    async fn add_favorite(&self, property_id: &str) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, FAVORITES_PATH)
            .json(&AddFavoriteRequest { property_id });
        self.send(builder).await.map(|_| ())
    }

    async fn remove_favorite(&self, property_id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &favorite_endpoint(property_id)))
            .await
            .map(|_| ())
    }

    async fn is_favorite(&self, property_id: &str) -> Result<bool, ApiError> {
        let body: FavoriteCheckResponse = self
            .fetch(self.request(Method::GET, &favorite_check_endpoint(property_id)))
            .await?;
        Ok(body.is_favorite)
    }
}

// =============================================================================
// VIEWING REQUESTS
// =============================================================================

#[async_trait::async_trait]
impl ViewingRequestsApi for HttpGateway {
    async fn list_viewing_requests(&self, status: Option<ViewingStatus>) -> Result<Vec<ViewingRequest>, ApiError> {
        let mut builder = self.request(Method::GET, VIEWING_REQUESTS_PATH);
        if let Some(status) = status {
            builder = builder.query(&[("status_filter", status.as_str())]);
        }
        let body: ViewingRequestsResponse = self.fetch(builder).await?;
        Ok(body.viewing_requests)
    }

    async fn get_viewing_request(&self, id: &str) -> Result<ViewingRequest, ApiError> {
        let body: ViewingRequestResponse = self
            .fetch(self.request(Method::GET, &viewing_request_endpoint(id)))
            .await?;
        Ok(body.viewing_request)
    }

    async fn create_viewing_request(&self, request: &NewViewingRequest) -> Result<ViewingRequest, ApiError> {
        let builder = self.request(Method::POST, VIEWING_REQUESTS_PATH).json(request);
        let body: ViewingRequestResponse = self.fetch(builder).await?;
        Ok(body.viewing_request)
    }

    async fn update_viewing_request(&self, id: &str, update: &ViewingUpdate) -> Result<ViewingRequest, ApiError> {
        let builder = self
            .request(Method::PATCH, &viewing_request_endpoint(id))
            .json(update);
        let body: ViewingRequestResponse = self.fetch(builder).await?;
        Ok(body.viewing_request)
    }

    async fn delete_viewing_request(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &viewing_request_endpoint(id)))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
