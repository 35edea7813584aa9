//! Favorites store: saved listings with optimistic add/remove.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::api::FavoritesApi;
use crate::api::types::{Favorite, PropertySummary};
use crate::error::ApiError;
use crate::store::LoadOutcome;

/// Id given to a favorite added locally before the backend has listed it.
const LOCAL_ID_PREFIX: &str = "local:";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FavoriteSort {
    /// Most recently saved first.
    #[default]
    Recent,
    PriceLow,
    PriceHigh,
}

impl std::str::FromStr for FavoriteSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "price-low" | "price_low" => Ok(Self::PriceLow),
            "price-high" | "price_high" => Ok(Self::PriceHigh),
            other => Err(format!("unknown sort: {other}")),
        }
    }
}

#[derive(Default)]
struct FavoritesInner {
    items: Vec<Favorite>,
    load_issued: u64,
}

pub struct FavoritesStore {
    api: Arc<dyn FavoritesApi>,
    inner: Mutex<FavoritesInner>,
}

impl FavoritesStore {
    pub fn new(api: Arc<dyn FavoritesApi>) -> Self {
        Self { api, inner: Mutex::new(FavoritesInner::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, FavoritesInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn favorites(&self) -> Vec<Favorite> {
        self.lock().items.clone()
    }

    #[must_use]
    pub fn contains(&self, property_id: &str) -> bool {
        self.lock().items.iter().any(|f| f.property_id == property_id)
    }

    /// Replace the list with the backend's.
    ///
    /// # Errors
    ///
    /// Returns the gateway error; the last good list is kept.
    pub async fn load(&self) -> Result<LoadOutcome, ApiError> {
        let seq = {
            let mut inner = self.lock();
            inner.load_issued += 1;
            inner.load_issued
        };
        let result = self.api.list_favorites().await;

        let mut inner = self.lock();
        if inner.load_issued != seq {
            debug!(seq, "discarding superseded favorites list");
            return Ok(LoadOutcome::Superseded);
        }
        match result {
            Ok(items) => {
                info!(count = items.len(), "favorites loaded");
                inner.items = items;
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                warn!(error = %e, "favorites load failed; keeping previous list");
                Err(e)
            }
        }
    }

    /// Save a listing. Returns `false` without a network call when it is
    /// already saved.
    ///
    /// # Errors
    ///
    /// Returns the gateway error after removing the optimistic entry.
    pub async fn add(&self, property_id: &str, property: Option<PropertySummary>) -> Result<bool, ApiError> {
        let local_id = format!("{LOCAL_ID_PREFIX}{property_id}");
        {
            let mut inner = self.lock();
            if inner.items.iter().any(|f| f.property_id == property_id) {
                return Ok(false);
            }
            inner.items.insert(
                0,
                Favorite {
                    id: local_id.clone(),
                    user_id: None,
                    property_id: property_id.to_owned(),
                    created_at: Some(Utc::now()),
                    property,
                },
            );
        }

        if let Err(e) = self.api.add_favorite(property_id).await {
            warn!(%property_id, error = %e, "add favorite failed; rolling back");
            self.lock().items.retain(|f| f.id != local_id);
            return Err(e);
        }
        Ok(true)
    }

    /// Unsave a listing. Returns `false` without a network call when it is
    /// not saved.
    ///
    /// # Errors
    ///
    /// Returns the gateway error after restoring the entry at its old position.
    pub async fn remove(&self, property_id: &str) -> Result<bool, ApiError> {
        let (index, removed) = {
            let mut inner = self.lock();
            let Some(index) = inner.items.iter().position(|f| f.property_id == property_id) else {
                return Ok(false);
            };
            (index, inner.items.remove(index))
        };

        if let Err(e) = self.api.remove_favorite(property_id).await {
            warn!(%property_id, error = %e, "remove favorite failed; rolling back");
            let mut inner = self.lock();
            if !inner.items.iter().any(|f| f.property_id == property_id) {
                let index = index.min(inner.items.len());
                inner.items.insert(index, removed);
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Add or remove depending on the current local state. Returns whether
    /// the listing is saved afterwards.
    ///
    /// # Errors
    ///
    /// As [`Self::add`] or [`Self::remove`].
    pub async fn toggle(&self, property_id: &str, property: Option<PropertySummary>) -> Result<bool, ApiError> {
        if self.contains(property_id) {
            self.remove(property_id).await.map(|_| false)
        } else {
            self.add(property_id, property).await.map(|_| true)
        }
    }

    /// Ask the backend whether a listing is saved. Local state is not touched.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn check(&self, property_id: &str) -> Result<bool, ApiError> {
        self.api.is_favorite(property_id).await
    }

    /// Filtered, sorted copy of the list. `property_type` of `None` or `"all"`
    /// keeps everything; otherwise the type must match ignoring case.
    #[must_use]
    pub fn view(&self, property_type: Option<&str>, sort: FavoriteSort) -> Vec<Favorite> {
        let wanted = property_type.map(str::trim).filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("all"));
        let mut items: Vec<Favorite> = self
            .lock()
            .items
            .iter()
            .filter(|f| wanted.is_none_or(|w| type_of(f).is_some_and(|t| t.eq_ignore_ascii_case(w))))
            .cloned()
            .collect();
        match sort {
            FavoriteSort::Recent => items.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            FavoriteSort::PriceLow => items.sort_by(|a, b| compare_prices(price_of(a), price_of(b), false)),
            FavoriteSort::PriceHigh => items.sort_by(|a, b| compare_prices(price_of(a), price_of(b), true)),
        }
        items
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.items.clear();
        inner.load_issued += 1;
    }
}

fn type_of(f: &Favorite) -> Option<&str> {
    f.property.as_ref().and_then(|p| p.property_type.as_deref())
}

fn price_of(f: &Favorite) -> Option<f64> {
    f.property.as_ref().and_then(|p| p.price)
}

/// Missing prices sort last in either direction.
fn compare_prices(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if descending => y.total_cmp(&x),
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
#[path = "favorites_test.rs"]
mod tests;
