use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::api_client::ApiClient;
use super::resource::Resource;
use super::state::StoreState;
use crate::models::{Interaction, Person};

pub type PersonStore = ResourceStore<Person>;
pub type InteractionStore = ResourceStore<Interaction>;

/// Client-side cache and action set for one resource collection.
///
/// Async actions never return errors: a failure lands in `error` and the
/// action returns `None` / `false`. Actions on one store run one at a time,
/// and each applies its result as a single update of the state.
pub struct ResourceStore<R: Resource> {
    client: Arc<ApiClient>,
    state: Mutex<StoreState<R>>,
    /// Bumped by `reset`; responses from an older generation are dropped.
    generation: AtomicU64,
    ops: tokio::sync::Mutex<()>,
}

impl<R: Resource> ResourceStore<R> {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            state: Mutex::new(StoreState::default()),
            generation: AtomicU64::new(0),
            ops: tokio::sync::Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Reads ====================

    pub fn snapshot(&self) -> StoreState<R> {
        self.state().clone()
    }

    /// Cached items, empty while uninitialized
    pub fn items(&self) -> Vec<R> {
        self.state().items().to_vec()
    }

    pub fn is_loaded(&self) -> bool {
        self.state().is_loaded()
    }

    pub fn loading(&self) -> bool {
        self.state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn selected(&self) -> Option<R> {
        self.state().selected.clone()
    }

    pub fn find(&self, id: &str) -> Option<R> {
        self.state().find(id).cloned()
    }

    // ==================== Sync actions ====================

    pub fn set_loading(&self, loading: bool) {
        self.state().loading = loading;
    }

    /// Record an error; whatever was loading has stopped.
    pub fn set_error(&self, error: Option<String>) {
        let mut state = self.state();
        state.error = error;
        state.loading = false;
    }

    pub fn clear_error(&self) {
        self.state().error = None;
    }

    pub fn select(&self, entity: Option<R>) {
        self.state().selected = entity;
    }

    /// Back to the uninitialized shape, e.g. on sign-out.
    pub fn reset(&self) {
        let mut state = self.state();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *state = StoreState::default();
    }

    // ==================== Async actions ====================

    /// Fetch only if nothing is cached, no error is showing and nothing is
    /// loading. Callers that queue up behind a running fetch see its result
    /// and skip. Returns whether a request was made.
    pub async fn ensure_loaded(&self, filter: Option<&str>) -> bool {
        if !self.needs_load() {
            return false;
        }
        let _op = self.ops.lock().await;
        if !self.needs_load() {
            return false;
        }
        self.fetch_locked(filter).await;
        true
    }

    /// Replace the cache with the server's list. On failure the previous
    /// items stay visible next to the error.
    pub async fn fetch_all(&self, filter: Option<&str>) {
        let _op = self.ops.lock().await;
        self.fetch_locked(filter).await;
    }

    fn needs_load(&self) -> bool {
        let state = self.state();
        state.items.is_none() && state.error.is_none() && !state.loading
    }

    /// Caller holds `ops`.
    async fn fetch_locked(&self, filter: Option<&str>) {
        let generation = self.begin();

        match self.client.list::<R>(filter).await {
            Ok(items) => {
                log::debug!("Fetched {} {}", items.len(), R::PLURAL);
                self.commit(generation, |state| state.replace_all(items));
            }
            Err(e) => {
                log::warn!("Failed to fetch {}: {}", R::PLURAL, e);
                self.commit(generation, |state| state.fail(e.to_string()));
            }
        }
    }

    /// Create on the server and put the result at the front of the cache.
    pub async fn create(&self, draft: &R::Draft) -> Option<R> {
        let _op = self.ops.lock().await;
        let generation = self.begin();

        match self.client.create::<R>(draft).await {
            Ok(created) => {
                log::debug!("Created {} {}", R::SINGULAR, created.id());
                self.commit(generation, |state| state.prepend(created.clone()));
                Some(created)
            }
            Err(e) => {
                log::warn!("Failed to create {}: {}", R::SINGULAR, e);
                self.commit(generation, |state| state.fail(e.to_string()));
                None
            }
        }
    }

    pub async fn update(&self, id: &str, patch: &R::Patch) -> Option<R> {
        let _op = self.ops.lock().await;
        let generation = self.begin();

        match self.client.update::<R>(id, patch).await {
            Ok(updated) => {
                self.commit(generation, |state| state.replace_one(updated.clone()));
                Some(updated)
            }
            Err(e) => {
                log::warn!("Failed to update {} {}: {}", R::SINGULAR, id, e);
                self.commit(generation, |state| state.fail(e.to_string()));
                None
            }
        }
    }

    pub async fn delete(&self, id: &str) -> bool {
        let _op = self.ops.lock().await;
        let generation = self.begin();

        match self.client.delete::<R>(id).await {
            Ok(()) => {
                self.commit(generation, |state| state.remove(id));
                true
            }
            Err(e) => {
                log::warn!("Failed to delete {} {}: {}", R::SINGULAR, id, e);
                self.commit(generation, |state| state.fail(e.to_string()));
                false
            }
        }
    }

    fn begin(&self) -> u64 {
        let mut state = self.state();
        state.begin();
        self.generation.load(Ordering::SeqCst)
    }

    fn commit(&self, generation: u64, apply: impl FnOnce(&mut StoreState<R>)) {
        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("Dropping {} response that arrived after a reset", R::SINGULAR);
            return;
        }
        apply(&mut state);
    }
}
