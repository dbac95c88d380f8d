//! Per-visitor storefront state and its persistence.
//!
//! A [`StorefrontSession`] is loaded once from a [`SessionStore`] and written back
//! after every mutation, so a crash never loses more than the change in flight.
//! Handlers open sessions through [`SessionLocks`] so two requests for the same
//! visitor never interleave their load and save.

use super::{
    cart::{Cart, CartItem},
    comparator::{CompareOutcome, Comparator},
};
use crate::errors::ServiceError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Weak},
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionState {
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    pub comparator: Comparator,
    #[serde(default)]
    pub view_mode: ViewMode,
    /// Customer the cart is priced for
    #[serde(default)]
    pub customer_id: Option<uuid::Uuid>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, ServiceError>;
    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), ServiceError>;
    async fn delete(&self, session_id: &str) -> Result<(), ServiceError>;
}

static SESSION_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

/// Session ids come from clients and end up in file names
pub fn validate_session_id(session_id: &str) -> Result<(), ServiceError> {
    if SESSION_ID_RE.is_match(session_id) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(
            "session id must be 1-64 letters, digits, '-' or '_'".to_string(),
        ))
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, ServiceError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), ServiceError> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), ServiceError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

/// One JSON document per session under `root`
#[derive(Debug, Clone)]
pub struct JsonFileSessionStore {
    root: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, ServiceError> {
        validate_session_id(session_id)?;
        Ok(self.root.join(format!("{}.json", session_id)))
    }
}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>, ServiceError> {
        let path = self.path_for(session_id)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!(path = %path.display(), "Failed to read session: {}", e);
                return Err(ServiceError::StorageError(e.to_string()));
            }
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn save(&self, session_id: &str, state: &SessionState) -> Result<(), ServiceError> {
        let path = self.path_for(session_id)?;
        let body = serde_json::to_vec(state)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ServiceError::StorageError(e.to_string()))?;

        // Write to a sibling file first so a reader never sees half a document
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| ServiceError::StorageError(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ServiceError::StorageError(e.to_string()))?;
        debug!(session_id, "session saved");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), ServiceError> {
        let path = self.path_for(session_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServiceError::StorageError(e.to_string())),
        }
    }
}

/// One async mutex per session id.
///
/// Entries are weak; a session's mutex is freed once no request holds or waits on it.
#[derive(Debug, Default, Clone)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<String, Weak<Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder has `session_id`
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.retain(|_, lock| lock.strong_count() > 0);
            match map.get(session_id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(Mutex::new(()));
                    map.insert(session_id.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Session ids with a live mutex
    pub async fn active_count(&self) -> usize {
        let map = self.inner.lock().await;
        map.values().filter(|lock| lock.strong_count() > 0).count()
    }
}

/// Storefront state for one visitor, saved after each change
pub struct StorefrontSession {
    id: String,
    state: SessionState,
    store: Arc<dyn SessionStore>,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl StorefrontSession {
    /// Loads the session, starting empty when the store has none
    pub async fn open(store: Arc<dyn SessionStore>, id: &str) -> Result<Self, ServiceError> {
        validate_session_id(id)?;
        let state = store.load(id).await?.unwrap_or_default();
        Ok(Self {
            id: id.to_string(),
            state,
            store,
            _guard: None,
        })
    }

    /// Like [`StorefrontSession::open`], holding the session's lock until dropped
    pub async fn open_exclusive(
        store: Arc<dyn SessionStore>,
        locks: &SessionLocks,
        id: &str,
    ) -> Result<Self, ServiceError> {
        validate_session_id(id)?;
        let guard = locks.acquire(id).await;
        let mut session = Self::open(store, id).await?;
        session._guard = Some(guard);
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn cart(&self) -> &Cart {
        &self.state.cart
    }

    pub fn comparator(&self) -> &Comparator {
        &self.state.comparator
    }

    pub fn view_mode(&self) -> ViewMode {
        self.state.view_mode
    }

    async fn persist(&self) -> Result<(), ServiceError> {
        self.store.save(&self.id, &self.state).await
    }

    pub async fn add_to_cart(&mut self, item: CartItem) -> Result<(), ServiceError> {
        self.state.cart.add_to_cart(item);
        self.persist().await
    }

    pub async fn add_quantity(
        &mut self,
        item: CartItem,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        self.state.cart.add_quantity(item, quantity);
        self.persist().await
    }

    pub async fn increment(&mut self, line_id: &str) -> Result<bool, ServiceError> {
        let found = self.state.cart.increment(line_id);
        if found {
            self.persist().await?;
        }
        Ok(found)
    }

    pub async fn decrement(&mut self, line_id: &str) -> Result<bool, ServiceError> {
        let found = self.state.cart.decrement(line_id);
        if found {
            self.persist().await?;
        }
        Ok(found)
    }

    pub async fn remove_from_cart(&mut self, line_id: &str) -> Result<bool, ServiceError> {
        let found = self.state.cart.remove(line_id);
        if found {
            self.persist().await?;
        }
        Ok(found)
    }

    /// Prices later views for this customer; saved with the next change
    pub fn set_customer(&mut self, customer_id: uuid::Uuid) {
        self.state.customer_id = Some(customer_id);
    }

    pub async fn clear_cart(&mut self) -> Result<(), ServiceError> {
        self.state.cart.clear();
        self.persist().await
    }

    pub async fn toggle_compare(
        &mut self,
        product_id: uuid::Uuid,
    ) -> Result<CompareOutcome, ServiceError> {
        let outcome = self.state.comparator.toggle(product_id);
        if matches!(outcome, CompareOutcome::Added | CompareOutcome::Removed) {
            self.persist().await?;
        }
        Ok(outcome)
    }

    pub async fn clear_comparator(&mut self) -> Result<(), ServiceError> {
        self.state.comparator.clear();
        self.persist().await
    }

    pub async fn set_view_mode(&mut self, mode: ViewMode) -> Result<(), ServiceError> {
        self.state.view_mode = mode;
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn every_mutation_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn SessionStore> = Arc::new(JsonFileSessionStore::new(dir.path()));
        let product = Uuid::new_v4();

        let mut session = StorefrontSession::open(store.clone(), "visitor-1").await.unwrap();
        session
            .add_to_cart(CartItem::new(product, None, "Ladrillo", dec!(120)))
            .await
            .unwrap();
        session.set_view_mode(ViewMode::List).await.unwrap();
        session.toggle_compare(product).await.unwrap();

        let reopened = StorefrontSession::open(store, "visitor-1").await.unwrap();
        assert_eq!(reopened.cart().items().len(), 1);
        assert_eq!(reopened.view_mode(), ViewMode::List);
        assert_eq!(reopened.comparator().product_ids(), &[product]);
    }

    #[tokio::test]
    async fn missing_session_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn SessionStore> =
            Arc::new(JsonFileSessionStore::new(dir.path().join("nested")));
        let session = StorefrontSession::open(store, "fresh").await.unwrap();
        assert!(session.cart().is_empty());
        assert_eq!(session.view_mode(), ViewMode::Grid);
    }

    #[tokio::test]
    async fn path_like_ids_are_rejected() {
        let store: Arc<dyn SessionStore> = Arc::new(JsonFileSessionStore::new("/tmp"));
        assert_matches!(
            StorefrontSession::open(store, "../etc/passwd").await.err(),
            Some(ServiceError::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn exclusive_sessions_apply_adds_one_at_a_time() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let locks = SessionLocks::new();
        let product = Uuid::new_v4();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let locks = locks.clone();
                tokio::spawn(async move {
                    let mut session = StorefrontSession::open_exclusive(store, &locks, "busy")
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                    session
                        .add_to_cart(CartItem::new(product, None, "Ladrillo", dec!(120)))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let session = StorefrontSession::open(store, "busy").await.unwrap();
        assert_eq!(session.cart().items()[0].quantity, 8);
        assert_eq!(locks.active_count().await, 0);
    }

    #[tokio::test]
    async fn second_holder_waits_for_the_first() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let locks = SessionLocks::new();
        let first = StorefrontSession::open_exclusive(store.clone(), &locks, "s1")
            .await
            .unwrap();

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            StorefrontSession::open_exclusive(store.clone(), &locks, "s1"),
        )
        .await;
        assert!(blocked.is_err());

        // other sessions are not held up
        StorefrontSession::open_exclusive(store.clone(), &locks, "s2")
            .await
            .unwrap();

        drop(first);
        StorefrontSession::open_exclusive(store, &locks, "s1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{not json").unwrap();
        let store = JsonFileSessionStore::new(dir.path());
        assert_matches!(
            store.load("broken").await,
            Err(ServiceError::SerializationError(_))
        );
    }

    #[tokio::test]
    async fn memory_store_round_trips_and_deletes() {
        let store = MemorySessionStore::new();
        let mut state = SessionState::default();
        state.view_mode = ViewMode::List;
        store.save("s", &state).await.unwrap();
        assert_eq!(store.load("s").await.unwrap(), Some(state));
        store.delete("s").await.unwrap();
        assert_eq!(store.load("s").await.unwrap(), None);
    }
}
