//! Test fixtures: a scripted in-memory backend behind the gateway traits.
//!
//! `MockApi` answers from a `FakeBackend` that tests seed and mutate
//! directly. Each call snapshots its answer when it is issued, then waits on
//! an optional gate, so a test decides the order in which responses land.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tokio::sync::Notify;

use crate::api::types::{
    Conversation, ConversationStatus, CreatedConversation, Favorite, Message, MessageType, NewViewingRequest,
    Partner, PropertyRef, PropertySummary, TimeSlot, ViewingRequest, ViewingStatus, ViewingUpdate,
};
use crate::api::{FavoritesApi, MessagesApi, ViewingRequestsApi};
use crate::error::ApiError;

pub const USER_ID: &str = "tenant-1";

// =============================================================================
// FIXTURES
// =============================================================================

/// Fixed instant `secs` seconds after the test epoch.
#[must_use]
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
}

#[must_use]
pub fn message(id: &str, conversation_id: &str, sender_id: &str, content: &str, secs: i64) -> Message {
    Message {
        id: id.into(),
        conversation_id: conversation_id.into(),
        sender_id: sender_id.into(),
        recipient_id: None,
        content: content.into(),
        message_type: MessageType::Text,
        read: false,
        read_at: None,
        timestamp: at(secs),
    }
}

#[must_use]
pub fn conversation(id: &str, property_id: &str, partner_id: &str, unread_count: u32) -> Conversation {
    Conversation {
        id: id.into(),
        property: PropertyRef {
            id: property_id.into(),
            title: format!("Listing {property_id}"),
            location: Some("Lekki, Lagos".into()),
            price: None,
            images: Vec::new(),
        },
        partner: Partner { id: partner_id.into(), name: format!("Partner {partner_id}"), avatar_url: None, verified: false },
        last_message: None,
        last_message_at: None,
        unread_count,
        status: ConversationStatus::Active,
    }
}

#[must_use]
pub fn property(id: &str, property_type: &str, price: Option<f64>) -> PropertySummary {
    PropertySummary {
        id: id.into(),
        title: format!("Listing {id}"),
        location: None,
        price,
        property_type: Some(property_type.into()),
        images: Vec::new(),
        bedrooms: None,
        bathrooms: None,
    }
}

#[must_use]
pub fn favorite(property: PropertySummary, secs: i64) -> Favorite {
    Favorite {
        id: format!("fav-{}", property.id),
        user_id: Some(USER_ID.into()),
        property_id: property.id.clone(),
        created_at: Some(at(secs)),
        property: Some(property),
    }
}

#[must_use]
pub fn viewing(id: &str, status: ViewingStatus, preferred_date: NaiveDate) -> ViewingRequest {
    ViewingRequest {
        id: id.into(),
        tenant_id: USER_ID.into(),
        landlord_id: "landlord-9".into(),
        property_id: "prop-1".into(),
        preferred_date,
        time_slot: TimeSlot::Morning,
        contact_number: "+234 800 000".into(),
        tenant_name: "Tolu".into(),
        message: None,
        status,
        landlord_notes: None,
        confirmed_date: None,
        confirmed_time: None,
        created_at: Some(at(0)),
        updated_at: None,
        property: None,
    }
}

// =============================================================================
// FAKE BACKEND
// =============================================================================

#[derive(Default)]
pub struct FakeBackend {
    pub conversations: Vec<Conversation>,
    pub messages: HashMap<String, Vec<Message>>,
    pub favorites: Vec<Favorite>,
    pub viewings: Vec<ViewingRequest>,
    next_id: u64,
    clock: i64,
}

impl FakeBackend {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Server clock; always after any seeded message.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        at(10_000 + self.clock)
    }

    fn thread_mut(&mut self, conversation_id: &str) -> Result<&mut Vec<Message>, ApiError> {
        if !self.conversations.iter().any(|c| c.id == conversation_id) {
            return Err(ApiError::NotFound(format!("conversation {conversation_id}")));
        }
        Ok(self.messages.entry(conversation_id.to_owned()).or_default())
    }

    /// Append a message from someone other than the test user.
    pub fn push_incoming(&mut self, conversation_id: &str, content: &str) -> Message {
        let id = self.next_id("msg");
        let ts = self.tick();
        let mut msg = message(&id, conversation_id, "landlord-9", content, 0);
        msg.timestamp = ts;
        self.messages.entry(conversation_id.to_owned()).or_default().push(msg.clone());
        msg
    }

    fn store_message(&mut self, conversation_id: &str, content: &str) -> Result<Message, ApiError> {
        let id = self.next_id("msg");
        let ts = self.tick();
        let mut msg = message(&id, conversation_id, USER_ID, content, 0);
        msg.timestamp = ts;
        self.thread_mut(conversation_id)?.push(msg.clone());
        if let Some(conv) = self.conversations.iter_mut().find(|c| c.id == conversation_id) {
            conv.last_message = Some(content.to_owned());
            conv.last_message_at = Some(ts);
        }
        Ok(msg)
    }
}

// =============================================================================
// MOCK GATEWAY
// =============================================================================

#[derive(Default)]
pub struct MockApi {
    pub backend: Mutex<FakeBackend>,
    failures: Mutex<HashMap<&'static str, VecDeque<ApiError>>>,
    gates: Mutex<HashMap<&'static str, VecDeque<Arc<Notify>>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockApi {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next call to `op` fail with `error`.
    pub fn fail_next(&self, op: &'static str, error: ApiError) {
        self.failures.lock().unwrap().entry(op).or_default().push_back(error);
    }

    /// Hold the next call to `op` until the returned gate is notified.
    pub fn gate_next(&self, op: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().entry(op).or_default().push_back(gate.clone());
        gate
    }

    #[must_use]
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    pub fn with_backend<R>(&self, f: impl FnOnce(&mut FakeBackend) -> R) -> R {
        f(&mut self.backend.lock().unwrap())
    }

    async fn call<T>(
        &self,
        op: &'static str,
        answer: impl FnOnce(&mut FakeBackend) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
        let gate = self.gates.lock().unwrap().get_mut(op).and_then(VecDeque::pop_front);
        let failure = self.failures.lock().unwrap().get_mut(op).and_then(VecDeque::pop_front);
        let result = match failure {
            Some(e) => Err(e),
            None => answer(&mut self.backend.lock().unwrap()),
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        result
    }
}

#[async_trait::async_trait]
impl MessagesApi for MockApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.call("list_conversations", |b| Ok(b.conversations.clone())).await
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        self.call("get_messages", |b| {
            let thread = b.thread_mut(conversation_id)?;
            for m in thread.iter_mut().filter(|m| m.sender_id != USER_ID) {
                m.read = true;
            }
            let snapshot = thread.clone();
            if let Some(conv) = b.conversations.iter_mut().find(|c| c.id == conversation_id) {
                conv.unread_count = 0;
            }
            Ok(snapshot)
        })
        .await
    }

    async fn send_message(&self, conversation_id: &str, content: &str) -> Result<Message, ApiError> {
        self.call("send_message", |b| {
            if content.trim().is_empty() {
                return Err(ApiError::Validation("content is required".into()));
            }
            b.store_message(conversation_id, content)
        })
        .await
    }

    async fn create_conversation(
        &self,
        property_id: &str,
        partner_id: &str,
        initial_content: &str,
    ) -> Result<CreatedConversation, ApiError> {
        self.call("create_conversation", |b| {
            if let Some(existing) =
                b.conversations.iter().find(|c| c.property.id == property_id && c.partner.id == partner_id)
            {
                return Err(ApiError::Conflict {
                    message: "conversation already exists".into(),
                    existing_conversation_id: Some(existing.id.clone()),
                });
            }
            let conversation_id = b.next_id("c");
            b.conversations.insert(0, conversation(&conversation_id, property_id, partner_id, 0));
            let message = b.store_message(&conversation_id, initial_content)?;
            Ok(CreatedConversation { conversation_id, message: Some(message) })
        })
        .await
    }
}

#[async_trait::async_trait]
impl FavoritesApi for MockApi {
    async fn list_favorites(&self) -> Result<Vec<Favorite>, ApiError> {
        self.call("list_favorites", |b| Ok(b.favorites.clone())).await
    }

    async fn add_favorite(&self, property_id: &str) -> Result<(), ApiError> {
        self.call("add_favorite", |b| {
            if b.favorites.iter().any(|f| f.property_id == property_id) {
                return Err(ApiError::Validation("already in favorites".into()));
            }
            let id = b.next_id("fav");
            let created_at = Some(b.tick());
            b.favorites.insert(
                0,
                Favorite { id, user_id: Some(USER_ID.into()), property_id: property_id.into(), created_at, property: None },
            );
            Ok(())
        })
        .await
    }

    async fn remove_favorite(&self, property_id: &str) -> Result<(), ApiError> {
        self.call("remove_favorite", |b| {
            let before = b.favorites.len();
            b.favorites.retain(|f| f.property_id != property_id);
            if b.favorites.len() == before {
                return Err(ApiError::NotFound(format!("favorite {property_id}")));
            }
            Ok(())
        })
        .await
    }

    async fn is_favorite(&self, property_id: &str) -> Result<bool, ApiError> {
        self.call("is_favorite", |b| Ok(b.favorites.iter().any(|f| f.property_id == property_id))).await
    }
}

#[async_trait::async_trait]
impl ViewingRequestsApi for MockApi {
    async fn list_viewing_requests(&self, status: Option<ViewingStatus>) -> Result<Vec<ViewingRequest>, ApiError> {
        self.call("list_viewing_requests", |b| {
            Ok(b.viewings.iter().filter(|v| status.is_none_or(|s| v.status == s)).cloned().collect())
        })
        .await
    }

    async fn get_viewing_request(&self, id: &str) -> Result<ViewingRequest, ApiError> {
        self.call("get_viewing_request", |b| {
            b.viewings
                .iter()
                .find(|v| v.id == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("viewing request {id}")))
        })
        .await
    }

    async fn create_viewing_request(&self, request: &NewViewingRequest) -> Result<ViewingRequest, ApiError> {
        self.call("create_viewing_request", |b| {
            let id = b.next_id("v");
            let mut created = viewing(&id, ViewingStatus::Pending, request.preferred_date);
            created.property_id.clone_from(&request.property_id);
            created.time_slot = request.time_slot;
            created.contact_number.clone_from(&request.contact_number);
            created.tenant_name.clone_from(&request.tenant_name);
            created.message.clone_from(&request.message);
            b.viewings.push(created.clone());
            Ok(created)
        })
        .await
    }

    async fn update_viewing_request(&self, id: &str, update: &ViewingUpdate) -> Result<ViewingRequest, ApiError> {
        self.call("update_viewing_request", |b| {
            let ts = b.tick();
            let found = b
                .viewings
                .iter_mut()
                .find(|v| v.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("viewing request {id}")))?;
            found.status = update.status;
            if update.landlord_notes.is_some() {
                found.landlord_notes.clone_from(&update.landlord_notes);
            }
            found.updated_at = Some(ts);
            Ok(found.clone())
        })
        .await
    }

    async fn delete_viewing_request(&self, id: &str) -> Result<(), ApiError> {
        self.call("delete_viewing_request", |b| {
            let before = b.viewings.len();
            b.viewings.retain(|v| v.id != id);
            if b.viewings.len() == before {
                return Err(ApiError::NotFound(format!("viewing request {id}")));
            }
            Ok(())
        })
        .await
    }
}
