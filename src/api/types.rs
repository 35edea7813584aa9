//! Wire records exchanged with the marketplace backend.
//!
//! DESIGN
//! ======
//! Field names follow the backend's snake_case JSON. Optional and
//! display-only fields default when absent so a sparse record from an older
//! backend still decodes; identity, ownership and ordering fields are
//! required.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// The other participant in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

/// The listing a conversation is about. Fixed for the conversation's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRef {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl PropertyRef {
    /// First listing image, used as the conversation thumbnail.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Archived,
    Blocked,
}

/// A tenant/landlord thread scoped to one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub property: PropertyRef,
    pub partner: Partner,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub status: ConversationStatus,
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    System,
}

/// A message as persisted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub read: bool,
    #[serde(default, with = "timestamp::option")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp", alias = "created_at")]
    pub timestamp: DateTime<Utc>,
}

/// Result of `createConversation`: the new thread id and, when the backend
/// returns it, the first message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedConversation {
    pub conversation_id: String,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateConversationRequest<'a> {
    pub property_id: &'a str,
    pub landlord_id: &'a str,
    pub initial_message: &'a str,
}

// =============================================================================
// FAVORITES
// =============================================================================

/// Listing fields embedded in favorites and viewing requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price: Option<f64>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
}

/// A saved listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub property_id: String,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub property: Option<PropertySummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavoritesResponse {
    pub favorites: Vec<Favorite>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FavoriteCheckResponse {
    pub is_favorite: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddFavoriteRequest<'a> {
    pub property_id: &'a str,
}

// =============================================================================
// VIEWING REQUESTS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Rejected,
}

impl ViewingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ViewingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown viewing status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    Morning,
    #[default]
    Afternoon,
    Evening,
}

impl TimeSlot {
    /// Hours covered by the slot, as shown to the tenant.
    #[must_use]
    pub fn hours(self) -> &'static str {
        match self {
            Self::Morning => "9AM - 12PM",
            Self::Afternoon => "12PM - 4PM",
            Self::Evening => "4PM - 7PM",
        }
    }
}

/// A tenant's request to view a property, and the landlord's response to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewingRequest {
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub landlord_id: String,
    pub property_id: String,
    #[serde(with = "calendar_date")]
    pub preferred_date: NaiveDate,
    #[serde(default)]
    pub time_slot: TimeSlot,
    #[serde(default)]
    pub contact_number: String,
    #[serde(default)]
    pub tenant_name: String,
    #[serde(default)]
    pub message: Option<String>,
    pub status: ViewingStatus,
    #[serde(default)]
    pub landlord_notes: Option<String>,
    #[serde(default)]
    pub confirmed_date: Option<String>,
    #[serde(default)]
    pub confirmed_time: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub property: Option<PropertySummary>,
}

/// Body of `POST /api/v1/viewing-requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewViewingRequest {
    pub property_id: String,
    #[serde(with = "calendar_date")]
    pub preferred_date: NaiveDate,
    pub time_slot: TimeSlot,
    pub contact_number: String,
    pub tenant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of `PATCH /api/v1/viewing-requests/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewingUpdate {
    pub status: ViewingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landlord_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewingRequestsResponse {
    pub viewing_requests: Vec<ViewingRequest>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewingRequestResponse {
    pub viewing_request: ViewingRequest,
}

// =============================================================================
// SERDE HELPERS
// =============================================================================

/// Backend timestamps are ISO-8601, with or without an offset. Offset-less
/// values are taken as UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
                    .map(|n| n.and_utc())
            })
    }

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de};

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&super::format(v)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}"))),
            }
        }
    }
}

/// `YYYY-MM-DD`, tolerating a trailing time component.
pub(crate) mod calendar_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        let head = raw.trim().get(..10).unwrap_or(raw.trim());
        NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(|_| de::Error::custom(format!("invalid date: {raw}")))
    }
}

/// Prices arrive as numbers or as numeric strings.
fn lenient_number<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.replace(',', "").trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
