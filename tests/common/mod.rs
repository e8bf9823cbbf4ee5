#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sqlx::SqlitePool;

use lms::auth::{AuthBackend, Credentials, IdentityClient, IdentityConfig, IdentityError, IdentityRecord};
use lms::config::AppConfig;
use lms::db;
use lms::models::CourseMode;
use lms::state::AppState;

pub const API_KEY: &str = "test-api-key";

/// Identity API stand-in that knows a fixed set of accounts.
#[derive(Default)]
pub struct FakeIdentityClient {
    accounts: HashMap<String, (String, IdentityRecord)>,
}

impl FakeIdentityClient {
    pub fn with_account(mut self, username: &str, password: &str, is_active: bool) -> Self {
        let record = IdentityRecord {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            is_active,
        };
        self.accounts
            .insert(username.to_string(), (password.to_string(), record));
        self
    }
}

#[async_trait]
impl IdentityClient for FakeIdentityClient {
    async fn verify_credentials(&self, credentials: &Credentials)
        -> Result<IdentityRecord, IdentityError> {
        match self.accounts.get(&credentials.username) {
            Some((password, record)) if *password == credentials.password => Ok(record.clone()),
            _ => Err(IdentityError::Rejected(reqwest::StatusCode::BAD_REQUEST)),
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::new(IdentityConfig::new("http://identity.invalid")).with_api_key(API_KEY);
    config.template_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates");
    config
}

pub async fn test_state_with(identity: FakeIdentityClient) -> AppState {
    let pool = db::connect_in_memory().await.expect("Failed to create test db");
    let auth = AuthBackend::new(pool.clone(), Arc::new(identity));
    AppState::new(pool, auth, test_config())
}

pub async fn test_state() -> AppState {
    test_state_with(
        FakeIdentityClient::default()
            .with_account("student@example.com", "pass", true)
            .with_account("staff@example.com", "pass", true)
            .with_account("pending@example.com", "pass", false),
    )
    .await
}

pub fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
}

pub async fn get_body(response: Response<Body>) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub async fn get_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&get_body(response).await).unwrap()
}

pub fn request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

pub async fn seed_modes(db: &SqlitePool, course_id: &str, modes: &[(&str, i64, Option<&str>)]) {
    let mut rows: Vec<CourseMode> = modes
        .iter()
        .map(|(slug, price, sku)| CourseMode {
            min_price: *price,
            sku: sku.map(str::to_string),
            ..CourseMode::new(course_id, slug)
        })
        .collect();
    db::repository::save_modes(db, &mut rows)
        .await
        .expect("Failed to seed modes");
}

/// Provision the user through a login, then flag it as staff.
pub async fn make_staff(state: &AppState, username: &str, password: &str) {
    let user = state
        .auth
        .authenticate(&Credentials::new(username, password))
        .await
        .unwrap()
        .expect("staff user");
    sqlx::query("UPDATE users SET is_staff = 1 WHERE id = ?")
        .bind(user.id)
        .execute(&state.db)
        .await
        .unwrap();
}
