use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const CURRENT_PREFIX: &str = "course-v1:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{0}] is not a valid course key.")]
pub struct InvalidKeyError(pub String);

/// Which string form a key was written in. Display round-trips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyForm {
    /// `course-v1:org+course+run`
    Current,
    /// `org/course/run`
    Deprecated,
}

/// Identifier of a course run, e.g. `course-v1:edX+DemoX+2015_T1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CourseKey {
    org: String,
    course: String,
    run: String,
    form: KeyForm,
}

impl CourseKey {
    pub fn new(org: &str, course: &str, run: &str) -> Result<Self, InvalidKeyError> {
        let key = Self {
            org: org.to_string(),
            course: course.to_string(),
            run: run.to_string(),
            form: KeyForm::Current,
        };
        if [org, course, run].iter().all(|part| is_valid_part(part)) {
            Ok(key)
        } else {
            Err(InvalidKeyError(key.to_string()))
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    pub fn form(&self) -> KeyForm {
        self.form
    }

    pub fn from_string(raw: &str) -> Result<Self, InvalidKeyError> {
        let invalid = || InvalidKeyError(raw.to_string());

        let (parts, form) = match raw.strip_prefix(CURRENT_PREFIX) {
            Some(rest) => (rest.split('+').collect::<Vec<_>>(), KeyForm::Current),
            None => (raw.split('/').collect::<Vec<_>>(), KeyForm::Deprecated),
        };

        let [org, course, run] = parts.as_slice() else {
            return Err(invalid());
        };

        if !(is_valid_part(org) && is_valid_part(course) && is_valid_part(run)) {
            return Err(invalid());
        }

        Ok(Self {
            org: org.to_string(),
            course: course.to_string(),
            run: run.to_string(),
            form,
        })
    }
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '~' | '.' | ':'))
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.form {
            KeyForm::Current => write!(f, "{}{}+{}+{}", CURRENT_PREFIX, self.org, self.course, self.run),
            KeyForm::Deprecated => write!(f, "{}/{}/{}", self.org, self.course, self.run),
        }
    }
}

impl FromStr for CourseKey {
    type Err = InvalidKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl Serialize for CourseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CourseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_string(&raw).map_err(serde::de::Error::custom)
    }
}
