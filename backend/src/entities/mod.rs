//! LMS entity types
//!
//! Each entity derives its column metadata with `#[derive(EntitySchema)]`
//! and implements [`Entity`](crate::query::Entity) for its relation registry
//! and [`Resource`](crate::resource::Resource) for the fields it exposes.

mod class_room;
mod course;
mod learning_material;
mod learning_material_question;
mod learning_material_question_test_case;
mod role;
mod school;
mod student_score;
mod user;

pub use class_room::ClassRoom;
pub use course::Course;
pub use learning_material::LearningMaterial;
pub use learning_material_question::LearningMaterialQuestion;
pub use learning_material_question_test_case::LearningMaterialQuestionTestCase;
pub use role::{Role, RoleName};
pub use school::School;
pub use student_score::StudentScore;
pub use user::{User, UserIntent};
