pub mod account;
pub mod extract;
pub mod identity;

use std::sync::Arc;

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::repository;
use crate::error::AppError;
use crate::models::User;

pub use extract::{ApiKeyOrAuthenticated, AuthenticatedUser, CanEditModes};
pub use identity::{
    HttpIdentityClient, IdentityAuthScheme, IdentityClient, IdentityConfig, IdentityError,
    IdentityRecord,
};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login form fields. The login is an email address.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Explicit arguments win; missing ones are taken from the submitted form.
    pub fn resolve(
        username: Option<String>,
        password: Option<String>,
        form: Option<&LoginForm>,
    ) -> Option<Self> {
        let username = username
            .filter(|u| !u.is_empty())
            .or_else(|| form.and_then(|f| f.email.clone()))
            .filter(|u| !u.is_empty())?;
        let password = password
            .filter(|p| !p.is_empty())
            .or_else(|| form.and_then(|f| f.password.clone()))
            .filter(|p| !p.is_empty())?;
        Some(Self { username, password })
    }
}

/// Authenticates against the identity API and provisions local users.
#[derive(Clone)]
pub struct AuthBackend {
    db: SqlitePool,
    identity: Arc<dyn IdentityClient>,
}

impl AuthBackend {
    pub fn new(db: SqlitePool, identity: Arc<dyn IdentityClient>) -> Self {
        Self { db, identity }
    }

    /// `Ok(None)` whenever the identity API does not vouch for the credentials,
    /// whatever the reason. Only configuration problems are errors.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Option<User>, AppError> {
        let record = match self.identity.verify_credentials(credentials).await {
            Ok(record) => record,
            Err(IdentityError::Config(msg)) => return Err(AppError::Config(msg)),
            Err(e) => {
                warn!("authentication failed for {}: {}", credentials.username, e);
                return Ok(None);
            }
        };

        self.ensure_local_user(&record, credentials).await.map(Some)
    }

    /// Find the local user for a verified identity, creating it on first sight.
    pub async fn ensure_local_user(
        &self,
        record: &IdentityRecord,
        credentials: &Credentials,
    ) -> Result<User, AppError> {
        let username = credentials.username.as_str();

        if let Some(user) = repository::find_user_by_login(&self.db, username).await? {
            return Ok(user);
        }

        let request = account::AccountRequest {
            username,
            password: &credentials.password,
            first_name: &record.first_name,
            last_name: &record.last_name,
            is_active: record.is_active,
        };

        match account::create_account(&self.db, request).await {
            Ok((user, _, _)) => {
                info!("provisioned user {} from identity API", user.username);
                Ok(user)
            }
            // Lost a race with a concurrent first login of the same identity.
            Err(account::AccountError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                repository::find_user_by_login(&self.db, username)
                    .await?
                    .ok_or(AppError::InternalServerError)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        Ok(repository::find_user_by_id(&self.db, user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::NewAccount;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticIdentityClient {
        record: Option<IdentityRecord>,
        config_error: bool,
        calls: AtomicUsize,
    }

    impl StaticIdentityClient {
        fn accepting(is_active: bool) -> Self {
            Self {
                record: Some(IdentityRecord {
                    first_name: "Ada".to_string(),
                    last_name: "Lovelace".to_string(),
                    is_active,
                }),
                config_error: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting() -> Self {
            Self {
                record: None,
                config_error: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityClient for StaticIdentityClient {
        async fn verify_credentials(&self, _credentials: &Credentials)
            -> Result<IdentityRecord, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.config_error {
                return Err(IdentityError::Config("$IDENTITY_API_TOKEN environment variable not set.".to_string()));
            }
            self.record
                .clone()
                .ok_or(IdentityError::Rejected(reqwest::StatusCode::BAD_REQUEST))
        }
    }

    fn ada() -> Credentials {
        Credentials::new("ada@example.com", "s3cret")
    }

    #[tokio::test]
    async fn test_successful_authentication_provisions_user() {
        let pool = test_pool().await;
        let backend = AuthBackend::new(pool.clone(), Arc::new(StaticIdentityClient::accepting(true)));

        let user = backend.authenticate(&ada()).await.unwrap().expect("user");
        assert_eq!(user.username, "ada@example.com");
        assert_eq!(user.first_name, "Ada");
        assert!(user.is_active);

        let fetched = backend.get_user(user.id).await.unwrap();
        assert_eq!(fetched.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_rejected_authentication_creates_nothing() {
        let pool = test_pool().await;
        let backend = AuthBackend::new(pool.clone(), Arc::new(StaticIdentityClient::rejecting()));

        assert!(backend.authenticate(&ada()).await.unwrap().is_none());
        assert_eq!(repository::count_users(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_second_authentication_reuses_user() {
        let pool = test_pool().await;
        let client = Arc::new(StaticIdentityClient::accepting(true));
        let backend = AuthBackend::new(pool.clone(), client.clone());

        let first = backend.authenticate(&ada()).await.unwrap().unwrap();
        let second = backend.authenticate(&ada()).await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repository::count_users(&pool).await.unwrap(), 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_inactive_identity_yields_inactive_user() {
        let pool = test_pool().await;
        let backend = AuthBackend::new(pool, Arc::new(StaticIdentityClient::accepting(false)));

        let user = backend.authenticate(&ada()).await.unwrap().unwrap();
        assert!(!user.is_active);
    }

    #[tokio::test]
    async fn test_config_error_propagates() {
        let pool = test_pool().await;
        let mut client = StaticIdentityClient::accepting(true);
        client.config_error = true;
        let backend = AuthBackend::new(pool, Arc::new(client));

        let err = backend.authenticate(&ada()).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn test_ensure_local_user_matches_login_as_username_or_email() {
        let pool = test_pool().await;
        let backend = AuthBackend::new(pool.clone(), Arc::new(StaticIdentityClient::rejecting()));
        let record = StaticIdentityClient::accepting(true).record.unwrap();

        let account = NewAccount {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "hash".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            name: "Ada Lovelace".to_string(),
        };
        let (original, _, _) = repository::create_account(&pool, account).await.unwrap();

        let by_name = backend.ensure_local_user(&record, &Credentials::new("ada", "s3cret")).await.unwrap();
        let by_email = backend.ensure_local_user(&record, &ada()).await.unwrap();
        assert_eq!(by_name.id, original.id);
        assert_eq!(by_email.id, original.id);
        assert_eq!(repository::count_users(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_distinct_logins_resolve_to_distinct_users() {
        let pool = test_pool().await;
        let backend = AuthBackend::new(pool.clone(), Arc::new(StaticIdentityClient::accepting(true)));

        let alice = backend
            .authenticate(&Credentials::new("alice@example.com", "s3cret"))
            .await
            .unwrap()
            .unwrap();
        let bob = backend
            .authenticate(&Credentials::new("bob@example.com", "s3cret"))
            .await
            .unwrap()
            .unwrap();

        assert_ne!(alice.id, bob.id);
        assert_eq!(bob.username, "bob@example.com");
        assert_eq!(repository::count_users(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_get_user_miss_is_none() {
        let pool = test_pool().await;
        let backend = AuthBackend::new(pool, Arc::new(StaticIdentityClient::rejecting()));
        assert!(backend.get_user(42).await.unwrap().is_none());
    }

    #[test]
    fn test_credentials_resolve_from_args_or_form() {
        let form = LoginForm {
            email: Some("form@example.com".to_string()),
            password: Some("formpass".to_string()),
        };

        let from_form = Credentials::resolve(None, None, Some(&form)).unwrap();
        assert_eq!(from_form, Credentials::new("form@example.com", "formpass"));

        let from_args = Credentials::resolve(
            Some("arg@example.com".to_string()),
            Some("argpass".to_string()),
            Some(&form),
        )
        .unwrap();
        assert_eq!(from_args, Credentials::new("arg@example.com", "argpass"));

        assert!(Credentials::resolve(None, None, None).is_none());
        assert!(Credentials::resolve(Some("a".to_string()), Some(String::new()), None).is_none());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", ada());
        assert!(debug.contains("ada@example.com"));
        assert!(!debug.contains("s3cret"));
    }
}
