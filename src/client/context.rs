use std::sync::Arc;

use super::api_client::{ApiClient, ClientResult};
use super::store::{InteractionStore, PersonStore};
use crate::models::{RegisterRequest, User};

/// One client session: the API connection plus a store per resource.
///
/// Views receive this explicitly instead of reaching for globals, so every
/// test can build its own.
pub struct AppContext {
    client: Arc<ApiClient>,
    persons: PersonStore,
    interactions: InteractionStore,
}

impl AppContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Arc::new(ApiClient::new(base_url)))
    }

    pub fn with_client(client: Arc<ApiClient>) -> Self {
        Self {
            persons: PersonStore::new(client.clone()),
            interactions: InteractionStore::new(client.clone()),
            client,
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn persons(&self) -> &PersonStore {
        &self.persons
    }

    pub fn interactions(&self) -> &InteractionStore {
        &self.interactions
    }

    /// Register a new account and start a session for it. Cached data from
    /// any previous identity is discarded.
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<User> {
        self.reset_stores();
        let user = self.client.register(request).await?;
        log::info!("Signed in as new user {}", user.username);
        Ok(user)
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> ClientResult<User> {
        self.reset_stores();
        let user = self.client.login(username, password).await?;
        log::info!("Signed in as {}", user.username);
        Ok(user)
    }

    pub fn sign_out(&self) {
        self.client.set_token(None);
        self.reset_stores();
        log::info!("Signed out");
    }

    fn reset_stores(&self) {
        self.persons.reset();
        self.interactions.reset();
    }
}
