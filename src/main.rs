use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lms::api::router;
use lms::auth::{AuthBackend, HttpIdentityClient};
use lms::config::AppConfig;
use lms::db;
use lms::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lms=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let pool = db::connect(&config.database_url).await?;

    let identity = Arc::new(HttpIdentityClient::new(config.identity.clone())?);
    let auth = AuthBackend::new(pool.clone(), identity);

    if let Some(theme_dir) = &config.comp_theme_dir {
        info!("using comprehensive theme {}", theme_dir.display());
    }

    let addr = config.bind_addr;
    let state = AppState::new(pool, auth, config);
    let app = router(state);

    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
