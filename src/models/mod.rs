pub mod course;
pub mod course_key;
pub mod mode;
pub mod user;

pub use course::Course;
pub use course_key::{CourseKey, InvalidKeyError};
pub use mode::{CourseMode, PostedMode};
pub use user::{NewAccount, Registration, User, UserProfile};
