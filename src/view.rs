//! View-model helpers: what the conversation list, thread and composer show.
//!
//! Pure functions over store snapshots. Nothing here talks to the network.

use chrono::{DateTime, Utc};

use crate::api::types::Conversation;
use crate::error::{ApiError, SendFailure};
use crate::store::thread::{MAX_MESSAGE_CHARS, ThreadMessage, validate_message_content};

/// Shown when a listing has no images.
pub const DEFAULT_PROPERTY_IMAGE: &str =
    "https://images.unsplash.com/photo-1560448204-e02f11c3d0e2?w=400&h=300&fit=crop";

// =============================================================================
// TIME LABELS
// =============================================================================

/// Short age label for a timestamp: `Just now`, `5m ago`, `3h ago`,
/// `Yesterday`, `4d ago`. Future timestamps count as now.
#[must_use]
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let hours = elapsed.num_hours();
    if hours < 1 {
        let minutes = elapsed.num_minutes();
        return if minutes < 1 { "Just now".to_owned() } else { format!("{minutes}m ago") };
    }
    if hours < 24 {
        return format!("{hours}h ago");
    }
    match hours / 24 {
        1 => "Yesterday".to_owned(),
        days => format!("{days}d ago"),
    }
}

// =============================================================================
// CONVERSATION CARD
// =============================================================================

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationCard {
    pub conversation_id: String,
    pub partner_name: String,
    pub verified: bool,
    pub property_title: String,
    pub location: Option<String>,
    pub thumbnail: String,
    pub preview: String,
    pub time_label: String,
    /// Unread badge; `None` when there is nothing unread.
    pub unread: Option<u32>,
}

impl ConversationCard {
    #[must_use]
    pub fn new(conv: &Conversation, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id: conv.id.clone(),
            partner_name: conv.partner.name.clone(),
            verified: conv.partner.verified,
            property_title: conv.property.title.clone(),
            location: conv.property.location.clone(),
            thumbnail: conv.property.thumbnail().unwrap_or(DEFAULT_PROPERTY_IMAGE).to_owned(),
            preview: conv.last_message.clone().unwrap_or_else(|| "No messages yet".to_owned()),
            time_label: conv.last_message_at.map(|t| relative_time(t, now)).unwrap_or_default(),
            unread: (conv.unread_count > 0).then_some(conv.unread_count),
        }
    }
}

// =============================================================================
// MESSAGE BUBBLES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Own,
    Partner,
}

/// A thread message placed on its side of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bubble<'a> {
    pub side: Side,
    /// Still waiting for the backend to confirm.
    pub pending: bool,
    pub message: &'a ThreadMessage,
}

impl<'a> Bubble<'a> {
    #[must_use]
    pub fn classify(message: &'a ThreadMessage, user_id: &str) -> Self {
        let side = if message.sender_id == user_id { Side::Own } else { Side::Partner };
        Self { side, pending: message.is_pending(), message }
    }
}

#[must_use]
pub fn bubbles<'a>(messages: &'a [ThreadMessage], user_id: &str) -> Vec<Bubble<'a>> {
    messages.iter().map(|m| Bubble::classify(m, user_id)).collect()
}

// =============================================================================
// COMPOSER
// =============================================================================

/// Draft text of the message input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
}

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.draft
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Characters left before the limit; zero once over it.
    #[must_use]
    pub fn remaining(&self) -> usize {
        MAX_MESSAGE_CHARS.saturating_sub(self.draft.chars().count())
    }

    #[must_use]
    pub fn can_send(&self) -> bool {
        self.validate().is_ok()
    }

    /// # Errors
    ///
    /// [`ApiError::Validation`] for blank or overlong drafts.
    pub fn validate(&self) -> Result<&str, ApiError> {
        validate_message_content(&self.draft)
    }

    /// Hand the draft over for sending and clear the input.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`]; the draft is kept.
    pub fn take(&mut self) -> Result<String, ApiError> {
        self.validate()?;
        Ok(std::mem::take(&mut self.draft))
    }

    /// Put back the text of a failed send. Anything typed since is kept
    /// after it on a new line.
    pub fn restore(&mut self, failure: &SendFailure) {
        if self.draft.is_empty() {
            self.draft.clone_from(&failure.content);
        } else {
            self.draft = format!("{}\n{}", failure.content, self.draft);
        }
    }
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
