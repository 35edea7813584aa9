//! Session-scoped client-side caches of backend state.
//!
//! Each store owns one slice of state behind a `std::sync::Mutex` that is
//! never held across an `.await`. Network completions are reconciled by
//! sequence or generation counters captured before the call, not by holding
//! locks.

pub mod conversations;
pub mod favorites;
pub mod thread;
pub mod viewings;

pub use conversations::ConversationStore;
pub use favorites::FavoritesStore;
pub use thread::MessageThreadStore;
pub use viewings::ViewingRequestStore;

/// Whether a completed list fetch replaced local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer fetch was issued while this one was in flight.
    Superseded,
}
