//! Viewing-request store: tenant requests and landlord responses.
//!
//! DESIGN
//! ======
//! Drafts are validated locally before anything is sent; the backend repeats
//! the checks but a local rejection keeps the form responsive. Status changes
//! and deletes are applied optimistically and undone if the backend refuses.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, Months, NaiveDate};
use tracing::{debug, info, warn};

use crate::api::ViewingRequestsApi;
use crate::api::types::{NewViewingRequest, ViewingRequest, ViewingStatus, ViewingUpdate};
use crate::error::ApiError;
use crate::store::LoadOutcome;
use crate::store::thread::MAX_MESSAGE_CHARS;

pub const APPROVAL_NOTE: &str = "Your viewing request has been approved.";
pub const DEFAULT_REJECTION_NOTE: &str = "Unfortunately, this time slot is not available.";

/// How far ahead a viewing may be booked.
const BOOKING_WINDOW_MONTHS: u32 = 3;

/// Today's date on the local calendar.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Check and normalize a draft against the calendar day `today`.
///
/// Name and contact are trimmed; a blank note is dropped.
///
/// # Errors
///
/// [`ApiError::Validation`] naming the first offending field.
pub fn validate_draft(draft: NewViewingRequest, today: NaiveDate) -> Result<NewViewingRequest, ApiError> {
    let tenant_name = draft.tenant_name.trim().to_owned();
    if tenant_name.is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }

    let contact_number = draft.contact_number.trim().to_owned();
    if contact_number.is_empty() {
        return Err(ApiError::Validation("contact number is required".into()));
    }
    if !contact_number.chars().all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')')) {
        return Err(ApiError::Validation("contact number may only contain digits, spaces and + - ( )".into()));
    }

    let latest = today.checked_add_months(Months::new(BOOKING_WINDOW_MONTHS)).unwrap_or(NaiveDate::MAX);
    if draft.preferred_date < today || draft.preferred_date > latest {
        return Err(ApiError::Validation(format!("preferred date must be between {today} and {latest}")));
    }

    let message = draft.message.map(|m| m.trim().to_owned()).filter(|m| !m.is_empty());
    if message.as_ref().is_some_and(|m| m.chars().count() > MAX_MESSAGE_CHARS) {
        return Err(ApiError::Validation(format!("message exceeds {MAX_MESSAGE_CHARS} characters")));
    }

    Ok(NewViewingRequest { tenant_name, contact_number, message, ..draft })
}

// =============================================================================
// GROUPING
// =============================================================================

/// Requests split the way the tenant dashboard shows them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewingGroups {
    /// Confirmed and not yet past, soonest first.
    pub upcoming: Vec<ViewingRequest>,
    pub pending: Vec<ViewingRequest>,
    /// Finished, refused, cancelled, or confirmed for a day already gone; latest first.
    pub past: Vec<ViewingRequest>,
}

#[must_use]
pub fn group_requests(requests: &[ViewingRequest], today: NaiveDate) -> ViewingGroups {
    let mut groups = ViewingGroups::default();
    for r in requests {
        match r.status {
            ViewingStatus::Pending => groups.pending.push(r.clone()),
            ViewingStatus::Confirmed if r.preferred_date >= today => groups.upcoming.push(r.clone()),
            _ => groups.past.push(r.clone()),
        }
    }
    groups.upcoming.sort_by_key(|r| r.preferred_date);
    groups.past.sort_by(|a, b| b.preferred_date.cmp(&a.preferred_date));
    groups
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Default)]
struct ViewingsInner {
    items: Vec<ViewingRequest>,
    load_issued: u64,
}

pub struct ViewingRequestStore {
    api: Arc<dyn ViewingRequestsApi>,
    inner: Mutex<ViewingsInner>,
}

impl ViewingRequestStore {
    pub fn new(api: Arc<dyn ViewingRequestsApi>) -> Self {
        Self { api, inner: Mutex::new(ViewingsInner::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, ViewingsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<ViewingRequest> {
        self.lock().items.clone()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<ViewingRequest> {
        self.lock().items.iter().find(|r| r.id == id).cloned()
    }

    #[must_use]
    pub fn grouped(&self, today: NaiveDate) -> ViewingGroups {
        group_requests(&self.lock().items, today)
    }

    /// Replace the list with the backend's, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns the gateway error; the last good list is kept.
    pub async fn load(&self, status: Option<ViewingStatus>) -> Result<LoadOutcome, ApiError> {
        let seq = {
            let mut inner = self.lock();
            inner.load_issued += 1;
            inner.load_issued
        };
        let result = self.api.list_viewing_requests(status).await;

        let mut inner = self.lock();
        if inner.load_issued != seq {
            debug!(seq, "discarding superseded viewing request list");
            return Ok(LoadOutcome::Superseded);
        }
        match result {
            Ok(items) => {
                info!(count = items.len(), "viewing requests loaded");
                inner.items = items;
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                warn!(error = %e, "viewing request load failed; keeping previous list");
                Err(e)
            }
        }
    }

    /// Fetch one request from the backend and merge it into the list.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn fetch(&self, id: &str) -> Result<ViewingRequest, ApiError> {
        let fresh = self.api.get_viewing_request(id).await?;
        self.upsert(fresh.clone());
        Ok(fresh)
    }

    /// Validate and submit a new request.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] before any network call, otherwise the gateway error.
    pub async fn create(&self, draft: NewViewingRequest) -> Result<ViewingRequest, ApiError> {
        let request = validate_draft(draft, today())?;
        let created = self.api.create_viewing_request(&request).await?;
        info!(id = %created.id, property_id = %created.property_id, "viewing request created");
        self.upsert(created.clone());
        Ok(created)
    }

    /// Change a request's status, optionally with a landlord note.
    ///
    /// # Errors
    ///
    /// Returns the gateway error after restoring the previous record.
    pub async fn update(
        &self,
        id: &str,
        status: ViewingStatus,
        landlord_notes: Option<String>,
    ) -> Result<ViewingRequest, ApiError> {
        let previous = {
            let mut inner = self.lock();
            inner.items.iter_mut().find(|r| r.id == id).map(|r| {
                let previous = r.clone();
                r.status = status;
                if landlord_notes.is_some() {
                    r.landlord_notes.clone_from(&landlord_notes);
                }
                previous
            })
        };

        let update = ViewingUpdate { status, landlord_notes, confirmed_date: None, confirmed_time: None };
        match self.api.update_viewing_request(id, &update).await {
            Ok(fresh) => {
                debug!(%id, status = status.as_str(), "viewing request updated");
                self.upsert(fresh.clone());
                Ok(fresh)
            }
            Err(e) => {
                warn!(%id, error = %e, "viewing request update failed; rolling back");
                if let Some(previous) = previous {
                    self.replace_if_present(previous);
                }
                Err(e)
            }
        }
    }

    /// # Errors
    ///
    /// As [`Self::update`].
    pub async fn cancel(&self, id: &str) -> Result<ViewingRequest, ApiError> {
        self.update(id, ViewingStatus::Cancelled, None).await
    }

    /// # Errors
    ///
    /// As [`Self::update`].
    pub async fn approve(&self, id: &str) -> Result<ViewingRequest, ApiError> {
        self.update(id, ViewingStatus::Confirmed, Some(APPROVAL_NOTE.to_owned())).await
    }

    /// Reject with `reason`, or a stock note when none is given.
    ///
    /// # Errors
    ///
    /// As [`Self::update`].
    pub async fn reject(&self, id: &str, reason: Option<&str>) -> Result<ViewingRequest, ApiError> {
        let note = reason.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REJECTION_NOTE);
        self.update(id, ViewingStatus::Rejected, Some(note.to_owned())).await
    }

    /// # Errors
    ///
    /// Returns the gateway error after putting the request back in place.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let removed = {
            let mut inner = self.lock();
            inner.items.iter().position(|r| r.id == id).map(|index| (index, inner.items.remove(index)))
        };

        if let Err(e) = self.api.delete_viewing_request(id).await {
            warn!(%id, error = %e, "viewing request delete failed; rolling back");
            if let Some((index, request)) = removed {
                let mut inner = self.lock();
                if !inner.items.iter().any(|r| r.id == id) {
                    let index = index.min(inner.items.len());
                    inner.items.insert(index, request);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.items.clear();
        inner.load_issued += 1;
    }

    fn upsert(&self, request: ViewingRequest) {
        let mut inner = self.lock();
        match inner.items.iter_mut().find(|r| r.id == request.id) {
            Some(existing) => *existing = request,
            None => inner.items.push(request),
        }
    }

    fn replace_if_present(&self, request: ViewingRequest) {
        let mut inner = self.lock();
        if let Some(existing) = inner.items.iter_mut().find(|r| r.id == request.id) {
            *existing = request;
        }
    }
}

#[cfg(test)]
#[path = "viewings_test.rs"]
mod tests;
