use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::{Course, LearningMaterialQuestion};
use crate::query::{
    Entity, EntitySchema, LoadedRelations, RelationDef, RelationKind, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

/// Storage directory of uploaded material files
const FILE_DIRECTORY: &str = "learning-materials";

#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "learning_materials", default_sort = "created_at")]
pub struct LearningMaterial {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[filterable]
    pub course_id: i64,

    #[searchable]
    #[sortable]
    pub title: String,

    #[searchable]
    pub description: Option<String>,

    pub file: Option<String>,

    pub file_extension: Option<String>,

    #[filterable]
    pub r#type: String,

    #[sortable]
    pub order_number: i64,

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
        name: "course",
        target: &Course::META,
        kind: RelationKind::BelongsTo {
            foreign_key: "course_id",
            owner_key: "id",
        },
        load: load_related::<Course>,
    },
    RelationDef {
        name: "learning_material_questions",
        target: &LearningMaterialQuestion::META,
        kind: RelationKind::HasMany {
            foreign_key: "learning_material_id",
            local_key: "id",
        },
        load: load_related::<LearningMaterialQuestion>,
    },
];

impl Entity for LearningMaterial {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }
}

impl Resource for LearningMaterial {
    fn to_fields(&self, urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        let file_url = self
            .file
            .as_deref()
            .map(|file| urls.url(&format!("{FILE_DIRECTORY}/{file}")));
        vec![
            ("id", Field::value(self.id)),
            ("course_id", Field::value(self.course_id)),
            ("title", Field::value(&self.title)),
            ("description", Field::value(&self.description)),
            ("file", Field::value(&self.file)),
            ("file_extension", Field::value(&self.file_extension)),
            ("file_url", Field::value(file_url)),
            ("type", Field::value(&self.r#type)),
            ("order_number", Field::value(self.order_number)),
            ("active", Field::value(self.active)),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
            ("course", Field::Relation),
            ("learning_material_questions", Field::Relation),
        ]
    }
}
