use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::models::{CourseKey, CourseMode, NewAccount, Registration, User, UserProfile};

const MODE_COLUMNS: &str =
    "id, course_id, mode_slug, mode_display_name, min_price, currency, sku";

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, is_active, is_staff, date_joined";

pub async fn fetch_modes_for_course(
    db: &SqlitePool,
    course_id: &CourseKey,
) -> Result<Vec<CourseMode>, sqlx::Error> {
    sqlx::query_as::<_, CourseMode>(&format!(
        "SELECT {MODE_COLUMNS} FROM course_modes WHERE course_id = ? ORDER BY id"
    ))
    .bind(course_id.to_string())
    .fetch_all(db)
    .await
}

pub async fn fetch_all_modes(db: &SqlitePool) -> Result<Vec<CourseMode>, sqlx::Error> {
    sqlx::query_as::<_, CourseMode>(&format!(
        "SELECT {MODE_COLUMNS} FROM course_modes ORDER BY course_id, id"
    ))
    .fetch_all(db)
    .await
}

/// All modes grouped by their parsed course key, in key order.
pub async fn fetch_modes_grouped(
    db: &SqlitePool,
) -> Result<BTreeMap<CourseKey, Vec<CourseMode>>, sqlx::Error> {
    let mut grouped: BTreeMap<CourseKey, Vec<CourseMode>> = BTreeMap::new();

    for mode in fetch_all_modes(db).await? {
        match CourseKey::from_string(&mode.course_id) {
            Ok(key) => grouped.entry(key).or_default().push(mode),
            Err(e) => warn!("Skipping course mode {:?}: {}", mode.id, e),
        }
    }

    Ok(grouped)
}

/// Insert or update every mode in one transaction. Inserted modes get their id.
pub async fn save_modes(db: &SqlitePool, modes: &mut [CourseMode]) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    for mode in modes.iter_mut() {
        if let Some(id) = mode.id {
            let updated = sqlx::query(
                "UPDATE course_modes SET course_id = ?, mode_slug = ?, mode_display_name = ?, min_price = ?, currency = ?, sku = ? WHERE id = ?"
            )
            .bind(&mode.course_id)
            .bind(&mode.mode_slug)
            .bind(&mode.mode_display_name)
            .bind(mode.min_price)
            .bind(&mode.currency)
            .bind(&mode.sku)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated > 0 {
                continue;
            }
        }

        let id = sqlx::query(
            "INSERT INTO course_modes (course_id, mode_slug, mode_display_name, min_price, currency, sku) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&mode.course_id)
        .bind(&mode.mode_slug)
        .bind(&mode.mode_display_name)
        .bind(mode.min_price)
        .bind(&mode.currency)
        .bind(&mode.sku)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        mode.id = Some(id);
    }

    tx.commit().await
}

pub async fn find_user_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// The user whose username or email equals `login`.
pub async fn find_user_by_login(db: &SqlitePool, login: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ? OR email = ? ORDER BY id LIMIT 1"
    ))
    .bind(login)
    .bind(login)
    .fetch_optional(db)
    .await
}

/// Create the user row together with its profile and a pending registration.
pub async fn create_account(
    db: &SqlitePool,
    account: NewAccount,
) -> Result<(User, UserProfile, Registration), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let activation_key = Uuid::new_v4().simple().to_string();

    let mut tx = db.begin().await?;

    let user_id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, first_name, last_name, is_active, is_staff, date_joined) VALUES (?, ?, ?, ?, ?, 0, 0, ?)"
    )
    .bind(&account.username)
    .bind(&account.email)
    .bind(&account.password_hash)
    .bind(&account.first_name)
    .bind(&account.last_name)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query("INSERT INTO user_profiles (user_id, name) VALUES (?, ?)")
        .bind(user_id)
        .bind(&account.name)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO registrations (user_id, activation_key, activated_at) VALUES (?, ?, NULL)")
        .bind(user_id)
        .bind(&activation_key)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let user = User {
        id: user_id,
        username: account.username,
        email: account.email,
        password_hash: account.password_hash,
        first_name: account.first_name,
        last_name: account.last_name,
        is_active: false,
        is_staff: false,
        date_joined: now,
    };
    let profile = UserProfile {
        user_id,
        name: account.name,
    };
    let registration = Registration {
        user_id,
        activation_key,
        activated_at: None,
    };

    Ok((user, profile, registration))
}

/// Mark the registration activated and the user active.
/// Returns false when there was no pending registration for the user.
pub async fn activate_registration(db: &SqlitePool, user_id: i64) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let mut tx = db.begin().await?;

    let activated = sqlx::query(
        "UPDATE registrations SET activated_at = ? WHERE user_id = ? AND activated_at IS NULL"
    )
    .bind(&now)
    .bind(user_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if activated > 0 {
        sqlx::query("UPDATE users SET is_active = 1 WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(activated > 0)
}

pub async fn find_profile(db: &SqlitePool, user_id: i64) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query_as::<_, UserProfile>("SELECT user_id, name FROM user_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn find_registration(
    db: &SqlitePool,
    user_id: i64,
) -> Result<Option<Registration>, sqlx::Error> {
    sqlx::query_as::<_, Registration>(
        "SELECT user_id, activation_key, activated_at FROM registrations WHERE user_id = ?"
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn count_users(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await
}
