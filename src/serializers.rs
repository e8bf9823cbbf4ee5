//! JSON shapes of the commerce API and their mapping onto [`Course`].

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::mode::DEFAULT_CURRENCY;
use crate::models::{Course, CourseKey, CourseMode, PostedMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeResource {
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub price: i64,
    #[serde(default)]
    pub sku: Option<String>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseResource {
    /// Required on create; on update the key from the URL is authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub modes: Vec<ModeResource>,
}

impl From<&CourseMode> for ModeResource {
    fn from(mode: &CourseMode) -> Self {
        Self {
            name: mode.mode_slug.clone(),
            currency: mode.currency.clone(),
            price: mode.min_price,
            sku: mode.sku.clone(),
        }
    }
}

impl From<&Course> for CourseResource {
    fn from(course: &Course) -> Self {
        Self {
            id: Some(course.id.to_string()),
            modes: course.modes.iter().map(ModeResource::from).collect(),
        }
    }
}

impl From<ModeResource> for PostedMode {
    fn from(mode: ModeResource) -> Self {
        Self {
            mode_slug: mode.name,
            min_price: mode.price,
            currency: mode.currency,
            sku: mode.sku,
        }
    }
}

impl CourseResource {
    fn validate(&self) -> Result<(), AppError> {
        if self.modes.iter().any(|m| m.name.trim().is_empty()) {
            return Err(AppError::BadRequest("modes.name: this field may not be blank".to_string()));
        }
        if self.modes.iter().any(|m| m.currency.trim().is_empty()) {
            return Err(AppError::BadRequest("modes.currency: this field may not be blank".to_string()));
        }
        Ok(())
    }

    /// Build a new course from this payload, or merge it into `instance`.
    pub fn restore(self, instance: Option<Course>) -> Result<Course, AppError> {
        self.validate()?;
        let posted: Vec<PostedMode> = self.modes.into_iter().map(PostedMode::from).collect();

        match instance {
            Some(mut course) => {
                course.update(posted);
                Ok(course)
            }
            None => {
                let raw_id = self
                    .id
                    .ok_or_else(|| AppError::BadRequest("id: this field is required".to_string()))?;
                let key = CourseKey::from_string(&raw_id)?;
                let mut course = Course::new(key, Vec::new());
                course.update(posted);
                Ok(course)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn course() -> Course {
        let key = CourseKey::from_string("course-v1:edX+DemoX+T1").unwrap();
        let mut honor = CourseMode::new(&key.to_string(), "honor");
        honor.id = Some(1);
        Course::new(key, vec![honor])
    }

    #[test]
    fn test_serialize_course() {
        let value = serde_json::to_value(CourseResource::from(&course())).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "course-v1:edX+DemoX+T1",
                "modes": [{"name": "honor", "currency": "usd", "price": 0, "sku": null}]
            })
        );
    }

    #[test]
    fn test_deserialize_defaults() {
        let resource: CourseResource =
            serde_json::from_value(json!({"modes": [{"name": "verified", "price": 50}]})).unwrap();
        assert_eq!(resource.id, None);
        assert_eq!(resource.modes[0].currency, "usd");
        assert_eq!(resource.modes[0].sku, None);
    }

    #[test]
    fn test_deserialize_requires_price() {
        let result: Result<CourseResource, _> =
            serde_json::from_value(json!({"modes": [{"name": "verified"}]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_restore_routes_into_update() {
        let resource: CourseResource = serde_json::from_value(json!({
            "id": "ignored",
            "modes": [{"name": "verified", "currency": "usd", "price": 50, "sku": "ABC123"}]
        }))
        .unwrap();

        let restored = resource.restore(Some(course())).unwrap();
        assert_eq!(restored.id.to_string(), "course-v1:edX+DemoX+T1");
        assert_eq!(restored.modes.len(), 2);
        assert_eq!(restored.modes[1].mode_display_name, "verified");
    }

    #[test]
    fn test_restore_creates_new_course() {
        let resource: CourseResource = serde_json::from_value(json!({
            "id": "course-v1:edX+New+T2",
            "modes": [{"name": "honor", "price": 0}]
        }))
        .unwrap();

        let created = resource.restore(None).unwrap();
        assert_eq!(created.id.to_string(), "course-v1:edX+New+T2");
        assert_eq!(created.modes.len(), 1);
        assert_eq!(created.modes[0].id, None);
    }

    #[test]
    fn test_restore_rejects_bad_id_and_blank_name() {
        let bad_id = CourseResource {
            id: Some("nope".to_string()),
            modes: vec![],
        };
        assert!(matches!(bad_id.restore(None), Err(AppError::InvalidCourseKey(_))));

        let missing_id = CourseResource { id: None, modes: vec![] };
        assert!(matches!(missing_id.restore(None), Err(AppError::BadRequest(_))));

        let blank = CourseResource {
            id: None,
            modes: vec![ModeResource {
                name: " ".to_string(),
                currency: "usd".to_string(),
                price: 1,
                sku: None,
            }],
        };
        assert!(matches!(blank.restore(Some(course())), Err(AppError::BadRequest(_))));
    }
}
