use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::User;
use crate::query::{
    Entity, EntitySchema, LoadedRelations, RelationDef, RelationKind, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

/// Built-in role names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleName {
    SuperAdmin,
    SchoolAdmin,
    Teacher,
    Student,
}

impl RoleName {
    pub fn as_str(self) -> &'static str {
        match self {
            RoleName::SuperAdmin => "super_admin",
            RoleName::SchoolAdmin => "school_admin",
            RoleName::Teacher => "teacher",
            RoleName::Student => "student",
        }
    }
}

#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "roles", default_sort = "id", default_dir = "asc")]
pub struct Role {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[searchable]
    #[filterable]
    #[sortable]
    pub name: String,

    pub guard_name: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[relations]
    pub relations: LoadedRelations,
}

static RELATIONS: [RelationDef; 1] = [RelationDef {
    name: "users",
    target: &User::META,
    kind: RelationKind::BelongsToMany {
        pivot_table: "role_user",
        foreign_pivot_key: "role_id",
        related_pivot_key: "user_id",
        parent_key: "id",
        related_key: "id",
    },
    load: load_related::<User>,
}];

impl Entity for Role {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }
}

impl Resource for Role {
    fn to_fields(&self, _urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::value(self.id)),
            ("name", Field::value(&self.name)),
            ("guard_name", Field::value(&self.guard_name)),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
            ("users", Field::Relation),
        ]
    }
}
