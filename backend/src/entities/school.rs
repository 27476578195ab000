use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::{ClassRoom, User};
use crate::query::{
    Entity, EntitySchema, LoadedRelations, RelationDef, RelationKind, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "schools", default_sort = "created_at")]
pub struct School {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[searchable]
    #[sortable]
    pub name: String,

    #[searchable]
    pub address: String,

    #[searchable]
    #[filterable]
    #[sortable]
    pub city: Option<String>,

    #[filterable]
    pub active: bool,

    #[sortable]
    pub created_at: DateTime<Utc>,

    #[sortable]
    pub updated_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[relations]
    pub relations: LoadedRelations,
}

static RELATIONS: [RelationDef; 2] = [
    RelationDef {
        name: "users",
        target: &User::META,
        kind: RelationKind::BelongsToMany {
            pivot_table: "school_user",
            foreign_pivot_key: "school_id",
            related_pivot_key: "user_id",
            parent_key: "id",
            related_key: "id",
        },
        load: load_related::<User>,
    },
    RelationDef {
        name: "class_rooms",
        target: &ClassRoom::META,
        kind: RelationKind::HasMany {
            foreign_key: "school_id",
            local_key: "id",
        },
        load: load_related::<ClassRoom>,
    },
];

impl Entity for School {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }
}

impl Resource for School {
    fn to_fields(&self, _urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::value(self.id)),
            ("name", Field::value(&self.name)),
            ("address", Field::value(&self.address)),
            ("city", Field::value(&self.city)),
            ("active", Field::value(self.active)),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
            ("users", Field::Relation),
            ("class_rooms", Field::Relation),
        ]
    }
}
