use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::{Course, School, User};
use crate::query::{
    Entity, EntitySchema, LoadedRelations, RelationDef, RelationKind, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "class_rooms", default_sort = "created_at")]
pub struct ClassRoom {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[filterable]
    pub school_id: i64,

    #[searchable]
    #[sortable]
    pub name: String,

    #[searchable]
    pub description: Option<String>,

    #[filterable]
    #[sortable]
    pub grade: Option<i64>,

    #[filterable]
    #[sortable]
    pub year: Option<i64>,

    #[filterable]
    pub active: bool,

    #[sortable]
    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[relations]
    pub relations: LoadedRelations,
}

static RELATIONS: [RelationDef; 3] = [
    RelationDef {
        name: "school",
        target: &School::META,
        kind: RelationKind::BelongsTo {
            foreign_key: "school_id",
            owner_key: "id",
        },
        load: load_related::<School>,
    },
    RelationDef {
        name: "students",
        target: &User::META,
        kind: RelationKind::BelongsToMany {
            pivot_table: "class_room_students",
            foreign_pivot_key: "class_room_id",
            related_pivot_key: "user_id",
            parent_key: "id",
            related_key: "id",
        },
        load: load_related::<User>,
    },
    RelationDef {
        name: "courses",
        target: &Course::META,
        kind: RelationKind::HasMany {
            foreign_key: "class_room_id",
            local_key: "id",
        },
        load: load_related::<Course>,
    },
];

impl Entity for ClassRoom {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }

    fn always_counted() -> &'static [&'static str] {
        &["courses"]
    }
}

impl Resource for ClassRoom {
    fn to_fields(&self, _urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        // A class room with courses cannot be removed
        let deletable = self.relations.count("courses").unwrap_or(0) == 0;
        vec![
            ("id", Field::value(self.id)),
            ("school_id", Field::value(self.school_id)),
            ("name", Field::value(&self.name)),
            ("description", Field::value(&self.description)),
            ("grade", Field::value(self.grade)),
            ("year", Field::value(self.year)),
            ("active", Field::value(self.active)),
            ("deletable", Field::value(deletable)),
            ("school", Field::Relation),
            ("students", Field::Relation),
            ("courses", Field::Relation),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
        ]
    }
}
