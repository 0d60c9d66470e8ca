//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{Database, User};
use crate::error::Result;
use crate::library::{Catalog, ReadStates};
use crate::search::EvalContext;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Current catalog snapshot, replaced whole on reload.
    catalog: Arc<RwLock<Arc<Catalog>>>,
}

impl AppState {
    /// Create new application state with database.
    pub fn new_with_db(config: Config, db: Database, auth: AuthService) -> Self {
        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            catalog: Arc::new(RwLock::new(Arc::new(Catalog::empty()))),
        }
    }

    /// Get the base URL for generating links.
    pub fn base_url(&self) -> String {
        String::new()
    }

    /// Rebuild the catalog snapshot from the database.
    pub fn reload_catalog(&self) -> Result<Arc<Catalog>> {
        tracing::info!("Loading catalog from database...");
        let start = std::time::Instant::now();

        let catalog = Arc::new(Catalog::new(self.db.get_all_series()?, self.db.get_all_books()?));
        *self.catalog.write() = Arc::clone(&catalog);

        tracing::info!(
            series = catalog.series_count(),
            books = catalog.book_count(),
            elapsed = ?start.elapsed(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Current catalog snapshot. Holds no lock once returned.
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&*self.catalog.read())
    }

    /// Read state of `user`; anonymous requests have none.
    pub fn read_states(&self, user: Option<&User>) -> Result<ReadStates> {
        match user {
            Some(user) => Ok(ReadStates::from_progress(
                &self.db.get_progress_for_user(&user.id)?,
            )),
            None => Ok(ReadStates::none()),
        }
    }

    /// Evaluation inputs for a request, reading the clock once.
    pub fn eval_context(&self) -> EvalContext {
        EvalContext::at(Utc::now()).with_case(self.config.search.case_sensitivity())
    }
}
