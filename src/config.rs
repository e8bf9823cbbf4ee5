use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::IdentityConfig;
use crate::error::AppError;
use crate::theming::SiteSettings;

const DEFAULT_DATABASE_URL: &str = "sqlite://lms.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_TEMPLATE_DIR: &str = "templates";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Shared secret accepted in the API key header. Unset disables key access.
    pub api_key: Option<String>,
    pub identity: IdentityConfig,
    pub template_dir: PathBuf,
    pub comp_theme_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(identity: IdentityConfig) -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 3000))),
            api_key: None,
            identity,
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            comp_theme_dir: None,
        }
    }

    pub fn new_from_env() -> Result<Self, AppError> {
        let mut config = Self::new(IdentityConfig::new_from_env()?);

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(addr) = env::var("BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|_| AppError::Config(format!("BIND_ADDR is not a socket address: {}", addr)))?;
        }
        config.api_key = env::var("EDX_API_KEY").ok().filter(|k| !k.is_empty());
        if let Ok(dir) = env::var("TEMPLATE_DIR") {
            config.template_dir = PathBuf::from(dir);
        }
        config.comp_theme_dir = env::var("COMP_THEME_DIR")
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Site settings for this configuration, themed when a theme is configured.
    pub fn site_settings(&self) -> SiteSettings {
        let base = SiteSettings::new(&self.template_dir);
        match &self.comp_theme_dir {
            Some(theme_dir) => base.with_comp_theme(theme_dir),
            None => base,
        }
    }
}

pub(crate) fn parse_flag(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!("{} must be a boolean, got '{}'", name, value))),
    }
}
