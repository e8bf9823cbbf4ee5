use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_CURRENCY: &str = "usd";

/// A purchasable pricing tier of a course, one row of `course_modes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CourseMode {
    /// `None` until the row has been inserted.
    pub id: Option<i64>,
    pub course_id: String,
    pub mode_slug: String,
    pub mode_display_name: String,
    pub min_price: i64,
    pub currency: String,
    pub sku: Option<String>,
}

impl CourseMode {
    pub fn new(course_id: &str, mode_slug: &str) -> Self {
        Self {
            id: None,
            course_id: course_id.to_string(),
            mode_slug: mode_slug.to_string(),
            mode_display_name: mode_slug.to_string(),
            min_price: 0,
            currency: DEFAULT_CURRENCY.to_string(),
            sku: None,
        }
    }
}

/// Mode values submitted by a client, before they are merged into a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMode {
    pub mode_slug: String,
    pub min_price: i64,
    pub currency: String,
    pub sku: Option<String>,
}
