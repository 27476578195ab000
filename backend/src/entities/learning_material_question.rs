use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::{LearningMaterial, LearningMaterialQuestionTestCase};
use crate::query::{
    Entity, EntitySchema, LoadedRelations, RelationDef, RelationKind, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

const FILE_DIRECTORY: &str = "learning-material-questions";

#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "learning_material_questions", default_sort = "order_number", default_dir = "asc")]
pub struct LearningMaterialQuestion {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[filterable]
    pub learning_material_id: i64,

    #[searchable]
    #[sortable]
    pub title: Option<String>,

    #[searchable]
    pub description: Option<String>,

    pub file: Option<String>,

    pub file_extension: Option<String>,

    #[filterable]
    pub r#type: String,

    #[sortable]
    pub order_number: i64,

    pub clue: Option<String>,

    #[filterable]
    pub active: bool,

    #[sortable]
    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[relations]
    pub relations: LoadedRelations,
}

static RELATIONS: [RelationDef; 2] = [
    RelationDef {
        name: "learning_material",
        target: &LearningMaterial::META,
        kind: RelationKind::BelongsTo {
            foreign_key: "learning_material_id",
            owner_key: "id",
        },
        load: load_related::<LearningMaterial>,
    },
    RelationDef {
        name: "learning_material_question_test_cases",
        target: &LearningMaterialQuestionTestCase::META,
        kind: RelationKind::HasMany {
            foreign_key: "learning_material_question_id",
            local_key: "id",
        },
        load: load_related::<LearningMaterialQuestionTestCase>,
    },
];

impl Entity for LearningMaterialQuestion {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }
}

impl Resource for LearningMaterialQuestion {
    fn to_fields(&self, urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        let file_url = self
            .file
            .as_deref()
            .map(|file| urls.url(&format!("{FILE_DIRECTORY}/{file}")));
        vec![
            ("id", Field::value(self.id)),
            ("learning_material_id", Field::value(self.learning_material_id)),
            ("title", Field::value(&self.title)),
            ("description", Field::value(&self.description)),
            ("file", Field::value(&self.file)),
            ("file_extension", Field::value(&self.file_extension)),
            ("file_url", Field::value(file_url)),
            ("type", Field::value(&self.r#type)),
            ("order_number", Field::value(self.order_number)),
            ("clue", Field::value(&self.clue)),
            ("active", Field::value(self.active)),
            ("learning_material", Field::Relation),
            ("learning_material_question_test_cases", Field::Relation),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
        ]
    }
}
