use std::env;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::auth::Credentials;
use crate::error::AppError;

pub const DEFAULT_API_TOKEN_VAR: &str = "IDENTITY_API_TOKEN";

/// How credentials are presented to the identity API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityAuthScheme {
    /// Form post to `token-auth/`, then a token-authorized record lookup.
    Token,
    /// Basic credentials on `token-auth/`; the response body is the record.
    Basic,
}

impl FromStr for IdentityAuthScheme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "basic" => Ok(Self::Basic),
            other => Err(AppError::Config(format!(
                "IDENTITY_AUTH_SCHEME must be 'token' or 'basic', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IdentityConfig {
    pub api_root: String,
    pub scheme: IdentityAuthScheme,
    pub verify_ssl: bool,
    pub timeout: Duration,
    /// Fixed token; when unset the token is read from `api_token_var` on every lookup.
    pub api_token: Option<String>,
    pub api_token_var: String,
}

impl IdentityConfig {
    pub fn new(api_root: &str) -> Self {
        Self {
            api_root: api_root.trim_end_matches('/').to_string(),
            scheme: IdentityAuthScheme::Token,
            verify_ssl: true,
            timeout: Duration::from_secs(10),
            api_token: None,
            api_token_var: DEFAULT_API_TOKEN_VAR.to_string(),
        }
    }

    pub fn new_from_env() -> Result<Self, AppError> {
        let api_root = env::var("IDENTITY_API_ROOT")
            .map_err(|_| AppError::Config("IDENTITY_API_ROOT is not set".to_string()))?;

        let mut config = Self::new(&api_root);

        if let Ok(scheme) = env::var("IDENTITY_AUTH_SCHEME") {
            config.scheme = scheme.parse()?;
        }
        if let Ok(verify) = env::var("IDENTITY_VERIFY_SSL") {
            config.verify_ssl = crate::config::parse_flag("IDENTITY_VERIFY_SSL", &verify)?;
        }
        if let Ok(secs) = env::var("IDENTITY_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| {
                AppError::Config(format!("IDENTITY_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_scheme(mut self, scheme: IdentityAuthScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_api_token(mut self, token: &str) -> Self {
        self.api_token = Some(token.to_string());
        self
    }
}

/// Account data returned by the identity API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity API rejected the credentials: {0}")]
    Rejected(StatusCode),

    #[error("identity API record lookup failed: {0}")]
    LookupFailed(StatusCode),

    #[error("identity API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity API returned an unreadable record: {0}")]
    Decode(String),

    #[error("{0}")]
    Config(String),
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Check the credentials remotely and return the account they belong to.
    async fn verify_credentials(&self, credentials: &Credentials)
        -> Result<IdentityRecord, IdentityError>;
}

pub struct HttpIdentityClient {
    client: Client,
    config: IdentityConfig,
}

impl HttpIdentityClient {
    pub fn new(config: IdentityConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn token_auth_url(&self) -> String {
        format!("{}/token-auth/", self.config.api_root)
    }

    fn user_url(&self, username: &str) -> Result<Url, IdentityError> {
        let mut url = Url::parse(&self.config.api_root)
            .map_err(|e| IdentityError::Config(format!("invalid IDENTITY_API_ROOT: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| IdentityError::Config("IDENTITY_API_ROOT cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["api", "users", username, ""]);
        Ok(url)
    }

    fn api_token(&self) -> Result<String, IdentityError> {
        if let Some(token) = &self.config.api_token {
            return Ok(token.clone());
        }
        env::var(&self.config.api_token_var).map_err(|_| {
            IdentityError::Config(format!(
                "${} environment variable not set.",
                self.config.api_token_var
            ))
        })
    }

    async fn check_with_form(&self, credentials: &Credentials) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(self.token_auth_url())
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Rejected(status));
        }
        Ok(())
    }

    async fn fetch_record(&self, username: &str) -> Result<IdentityRecord, IdentityError> {
        let token = self.api_token()?;
        let response = self
            .client
            .get(self.user_url(username)?)
            .header("Authorization", format!("Token {}", token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::LookupFailed(status));
        }
        decode_record(response).await
    }

    async fn check_with_basic(&self, credentials: &Credentials) -> Result<IdentityRecord, IdentityError> {
        let response = self
            .client
            .post(self.token_auth_url())
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Rejected(status));
        }
        decode_record(response).await
    }
}

async fn decode_record(response: reqwest::Response) -> Result<IdentityRecord, IdentityError> {
    let body = response.text().await?;
    serde_json::from_str::<IdentityRecord>(&body).map_err(|e| IdentityError::Decode(e.to_string()))
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn verify_credentials(&self, credentials: &Credentials)
        -> Result<IdentityRecord, IdentityError> {
        debug!("verifying credentials for {} ({:?})", credentials.username, self.config.scheme);
        match self.config.scheme {
            IdentityAuthScheme::Token => {
                self.check_with_form(credentials).await?;
                self.fetch_record(&credentials.username).await
            }
            IdentityAuthScheme::Basic => self.check_with_basic(credentials).await,
        }
    }
}
