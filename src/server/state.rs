use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;

use crate::auth::JwtKeys;
use crate::chat::{ConnectionRegistry, MessageStore};
use crate::config::Settings;
use crate::search::SearchClient;
use crate::users::UserDirectory;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt: Arc<JwtKeys>,
    /// The one registry instance for this process, injected into every
    /// chat session.
    pub registry: Arc<ConnectionRegistry>,
    pub message_store: Arc<dyn MessageStore>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub search: Arc<SearchClient>,
    pub database: Option<PgPool>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        message_store: Arc<dyn MessageStore>,
        user_directory: Arc<dyn UserDirectory>,
        database: Option<PgPool>,
    ) -> Self {
        let jwt = Arc::new(JwtKeys::new(&settings.jwt));
        let registry = Arc::new(ConnectionRegistry::new());
        let search = Arc::new(SearchClient::new(settings.search.clone()));

        Self {
            settings: Arc::new(settings),
            jwt,
            registry,
            message_store,
            user_directory,
            search,
            database,
            start_time: Instant::now(),
        }
    }
}
