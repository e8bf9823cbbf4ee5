use axum::extract::Path;
use axum::response::Html;
use axum::{Form, Json};
use axum::{Router, extract::State, http::StatusCode, routing::{get, post}};
use serde::Serialize;
use tracing::{error, info};

use crate::auth::{ApiKeyOrAuthenticated, AuthenticatedUser, CanEditModes, Credentials, LoginForm};
use crate::error::AppError;
use crate::models::Course;
use crate::serializers::CourseResource;
use crate::state::AppState;
use crate::theming::MAIN_NAMESPACE;

#[derive(Debug, Serialize)]
struct LoginResponse {
    id: i64,
    username: String,
    is_active: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/api/commerce/v1/courses/", get(list_courses))
        // Catch-all so deprecated `org/course/run` keys match with raw slashes.
        .route(
            "/api/commerce/v1/courses/{*course_path}",
            get(retrieve_course).put(update_course),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let path = state
        .site
        .lookups
        .resolve(MAIN_NAMESPACE, "index.html")
        .ok_or(AppError::NotFound)?;

    let body = tokio::fs::read_to_string(&path).await.map_err(|e| {
        error!("failed to read template {}: {}", path.display(), e);
        AppError::InternalServerError
    })?;
    Ok(Html(body))
}

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginResponse>, AppError> {
    let credentials = Credentials::resolve(None, None, Some(&form)).ok_or_else(|| {
        AppError::BadRequest("email and password are required".to_string())
    })?;

    let user = state
        .auth
        .authenticate(&credentials)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.is_active {
        return Err(AppError::Forbidden);
    }

    info!("user {} logged in", user.username);
    Ok(Json(LoginResponse {
        id: user.id,
        username: user.username,
        is_active: user.is_active,
    }))
}

/// The course id in `{id}/`; anything without the trailing slash is not a course URL.
fn course_id_from_path(course_path: &str) -> Result<&str, AppError> {
    course_path
        .strip_suffix('/')
        .filter(|id| !id.is_empty())
        .ok_or(AppError::NotFound)
}

async fn list_courses(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<CourseResource>>, AppError> {
    let courses = Course::all(&state.db).await?;
    Ok(Json(courses.iter().map(CourseResource::from).collect()))
}

async fn retrieve_course(
    State(state): State<AppState>,
    _access: ApiKeyOrAuthenticated,
    Path(course_path): Path<String>,
) -> Result<Json<CourseResource>, AppError> {
    let course_id = course_id_from_path(&course_path)?;
    let course = Course::get(&state.db, course_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(CourseResource::from(&course)))
}

async fn update_course(
    State(state): State<AppState>,
    _access: CanEditModes,
    Path(course_path): Path<String>,
    Json(payload): Json<CourseResource>,
) -> Result<Json<CourseResource>, AppError> {
    let course_id = course_id_from_path(&course_path)?;
    let existing = Course::get(&state.db, course_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut course = payload.restore(Some(existing))?;
    course.save(&state.db).await?;
    info!("updated {} mode(s) of {}", course.modes.len(), course.id);

    let saved = Course::get(&state.db, course_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(CourseResource::from(&saved)))
}
