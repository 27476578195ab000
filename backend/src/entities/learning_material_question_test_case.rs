use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::LearningMaterialQuestion;
use crate::query::{
    Entity, EntitySchema, LoadedRelations, RelationDef, RelationKind, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "learning_material_question_test_cases", default_sort = "created_at")]
pub struct LearningMaterialQuestionTestCase {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[filterable]
    pub learning_material_question_id: i64,

    #[searchable]
    pub input: Option<String>,

    pub expected_output_file: Option<String>,

    #[searchable]
    pub description: Option<String>,

    #[filterable]
    pub hidden: bool,

    #[filterable]
    pub active: bool,

    #[sortable]
    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[relations]
    pub relations: LoadedRelations,
}

static RELATIONS: [RelationDef; 1] = [RelationDef {
    name: "question",
    target: &LearningMaterialQuestion::META,
    kind: RelationKind::BelongsTo {
        foreign_key: "learning_material_question_id",
        owner_key: "id",
    },
    load: load_related::<LearningMaterialQuestion>,
}];

impl Entity for LearningMaterialQuestionTestCase {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }
}

impl Resource for LearningMaterialQuestionTestCase {
    fn to_fields(&self, _urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::value(self.id)),
            (
                "learning_material_question_id",
                Field::value(self.learning_material_question_id),
            ),
            ("input", Field::value(&self.input)),
            ("expected_output_file", Field::value(&self.expected_output_file)),
            ("description", Field::value(&self.description)),
            ("hidden", Field::value(self.hidden)),
            ("active", Field::value(self.active)),
            ("question", Field::Relation),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
        ]
    }
}
