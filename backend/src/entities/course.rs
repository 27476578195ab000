use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::{ClassRoom, LearningMaterial, User};
use crate::query::{
    Entity, EntitySchema, LoadedRelations, RelationDef, RelationKind, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "courses", default_sort = "created_at")]
pub struct Course {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[filterable]
    pub class_room_id: i64,

    #[filterable]
    pub teacher_id: Option<i64>,

    #[searchable]
    #[sortable]
    pub name: String,

    pub description: Option<String>,

    #[filterable]
    #[sortable]
    pub active: bool,

    #[sortable]
    pub created_at: DateTime<Utc>,

    #[sortable]
    pub updated_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[relations]
    pub relations: LoadedRelations,
}

static RELATIONS: [RelationDef; 3] = [
    RelationDef {
        name: "classroom",
        target: &ClassRoom::META,
        kind: RelationKind::BelongsTo {
            foreign_key: "class_room_id",
            owner_key: "id",
        },
        load: load_related::<ClassRoom>,
    },
    RelationDef {
        name: "teacher",
        target: &User::META,
        kind: RelationKind::BelongsTo {
            foreign_key: "teacher_id",
            owner_key: "id",
        },
        load: load_related::<User>,
    },
    RelationDef {
        name: "learning_materials",
        target: &LearningMaterial::META,
        kind: RelationKind::HasMany {
            foreign_key: "course_id",
            local_key: "id",
        },
        load: load_related::<LearningMaterial>,
    },
];

impl Entity for Course {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }

    fn always_counted() -> &'static [&'static str] {
        &["learning_materials"]
    }
}

impl Resource for Course {
    fn to_fields(&self, _urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        let deletable = self.relations.count("learning_materials").unwrap_or(0) == 0;
        vec![
            ("id", Field::value(self.id)),
            ("class_room_id", Field::value(self.class_room_id)),
            ("teacher_id", Field::value(self.teacher_id)),
            ("name", Field::value(&self.name)),
            ("description", Field::value(&self.description)),
            ("active", Field::value(self.active)),
            ("deletable", Field::value(deletable)),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
            ("classroom", Field::Relation),
            ("teacher", Field::Relation),
            ("learning_materials", Field::Relation),
        ]
    }
}
