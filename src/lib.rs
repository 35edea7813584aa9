//! Client-side conversation and messaging state for the RentConnect rental
//! marketplace.
//!
//! The backend owns persistence; this crate keeps session-scoped caches of
//! conversations, the open message thread, favorites and viewing requests,
//! applies optimistic updates, and polls the open thread for new messages.

pub mod api;
pub mod config;
pub mod error;
pub mod poll;
pub mod session;
pub mod store;
pub mod view;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use api::HttpGateway;
pub use config::ClientConfig;
pub use error::{ApiError, ErrorCode, SendFailure};
pub use session::Session;
