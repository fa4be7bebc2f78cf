use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::config::AppConfig;
use crate::csrf::{CsrfTokenService, CsrfTokenStore, InMemoryTokenStore, SessionKeyResolver};
use crate::metrics::Metrics;
use crate::sanitizer::{HtmlEscaper, Sanitizer};
use crate::users::{SqliteUserDirectory, UserDirectory};

/// The shared application state.
///
/// Cloned into every handler and pipeline stage. The CSRF token store lives
/// behind the [`CsrfTokenService`]; nothing else holds a handle to it.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool backing the user directory.
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub csrf: CsrfTokenService,
    pub resolver: SessionKeyResolver,
    pub jwt: JwtVerifier,
    pub users: Arc<dyn UserDirectory>,
    pub sanitizer: Arc<dyn Sanitizer>,
    pub metrics: Metrics,
}

impl AppState {
    /// Wires the default collaborators: in-memory token store, SQLite user
    /// directory and the HTML escaper.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let store: Arc<dyn CsrfTokenStore> = Arc::new(InMemoryTokenStore::new());
        Self::with_store(db, config, store)
    }

    /// Same as [`AppState::new`] with a caller-supplied token store.
    pub fn with_store(db: sqlx::SqlitePool, config: AppConfig, store: Arc<dyn CsrfTokenStore>) -> Self {
        let csrf = CsrfTokenService::from_config(store, &config.csrf);
        let jwt = JwtVerifier::from_config(&config.jwt);
        let users: Arc<dyn UserDirectory> = Arc::new(SqliteUserDirectory::new(db.clone(), config.users.bcrypt_cost));
        let sanitizer: Arc<dyn Sanitizer> = Arc::new(HtmlEscaper::new(config.sanitizer.max_field_len));

        Self {
            db,
            config: Arc::new(config),
            csrf,
            resolver: SessionKeyResolver::new(),
            jwt,
            users,
            sanitizer,
            metrics: Metrics::new(),
        }
    }
}
