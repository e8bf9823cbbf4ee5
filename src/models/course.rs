use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::debug;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{CourseKey, CourseMode, PostedMode};

/// A course run and its modes. Not a table of its own: it is assembled from
/// the `course_modes` rows sharing a course key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub id: CourseKey,
    pub modes: Vec<CourseMode>,
}

impl Course {
    pub fn new(id: CourseKey, modes: Vec<CourseMode>) -> Self {
        Self { id, modes }
    }

    /// Retrieve a single course. `Ok(None)` when no modes exist for the key.
    pub async fn get(db: &SqlitePool, course_id: &str) -> Result<Option<Course>, AppError> {
        let key = CourseKey::from_string(course_id).map_err(|e| {
            debug!("[{}] is not a valid course key.", course_id);
            e
        })?;

        let modes = repository::fetch_modes_for_course(db, &key).await?;
        if modes.is_empty() {
            return Ok(None);
        }

        Ok(Some(Course::new(key, modes)))
    }

    /// Retrieve all courses/modes, ordered by course key.
    pub async fn all(db: &SqlitePool) -> Result<Vec<Course>, AppError> {
        let grouped = repository::fetch_modes_grouped(db).await?;
        Ok(grouped
            .into_iter()
            .map(|(key, modes)| Course::new(key, modes))
            .collect())
    }

    /// Merge posted modes into this course by slug.
    ///
    /// Matching modes are overwritten in place, unseen slugs are appended in
    /// payload order and modes missing from the payload are kept as they are.
    /// The display name always follows the slug.
    pub fn update(&mut self, posted: Vec<PostedMode>) {
        let course_id = self.id.to_string();

        let mut by_slug: HashMap<String, usize> = HashMap::with_capacity(self.modes.len());
        for (idx, mode) in self.modes.iter().enumerate() {
            by_slug.entry(mode.mode_slug.clone()).or_insert(idx);
        }

        for posted_mode in posted {
            let idx = match by_slug.get(&posted_mode.mode_slug) {
                Some(&idx) => idx,
                None => {
                    self.modes.push(CourseMode::new(&course_id, &posted_mode.mode_slug));
                    let idx = self.modes.len() - 1;
                    by_slug.insert(posted_mode.mode_slug.clone(), idx);
                    idx
                }
            };

            let merged = &mut self.modes[idx];
            merged.course_id = course_id.clone();
            merged.mode_display_name = posted_mode.mode_slug.clone();
            merged.mode_slug = posted_mode.mode_slug;
            merged.min_price = posted_mode.min_price;
            merged.currency = posted_mode.currency;
            merged.sku = posted_mode.sku;
        }
    }

    /// Persist every mode under this course's key.
    pub async fn save(&mut self, db: &SqlitePool) -> Result<(), AppError> {
        let course_id = self.id.to_string();
        for mode in &mut self.modes {
            mode.course_id = course_id.clone();
            mode.mode_display_name = mode.mode_slug.clone();
        }
        repository::save_modes(db, &mut self.modes).await?;
        Ok(())
    }
}
