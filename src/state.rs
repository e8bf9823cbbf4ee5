use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::AuthBackend;
use crate::config::AppConfig;
use crate::theming::SiteSettings;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub auth: AuthBackend,
    pub config: Arc<AppConfig>,
    pub site: Arc<SiteSettings>,
}

impl AppState {
    pub fn new(db: SqlitePool, auth: AuthBackend, config: AppConfig) -> Self {
        let site = Arc::new(config.site_settings());
        Self {
            db,
            auth,
            config: Arc::new(config),
            site,
        }
    }

    /// Same state, rendered with different site settings.
    pub fn with_site(mut self, site: SiteSettings) -> Self {
        self.site = Arc::new(site);
        self
    }
}
