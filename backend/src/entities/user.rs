use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::{ClassRoom, Role, RoleName, School};
use crate::query::{
    ColumnKind, Entity, EntitySchema, FilterRequest, LoadedRelations, RelationArrayFilter,
    RelationDef, RelationKind, RequestContext, SelectQuery, SqlValue, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

const PROFILE_IMAGE_DIRECTORY: &str = "user-profile-images";

/// Named list scopes used by the school and class room assignment dialogs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIntent {
    /// Students of `school_id`
    SchoolStudents,
    /// Students of `school_id` not yet in `classroom_id`
    ClassRoomCandidates,
}

impl UserIntent {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user.index.students" => Some(UserIntent::SchoolStudents),
            "user.index.class_room_students" => Some(UserIntent::ClassRoomCandidates),
            _ => None,
        }
    }
}

/// The password hash is never selected.
#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "users", default_sort = "created_at")]
pub struct User {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[searchable]
    #[sortable]
    pub name: String,

    #[searchable]
    #[sortable]
    pub username: String,

    #[searchable]
    #[sortable]
    pub email: String,

    pub profile_image: Option<String>,

    pub email_verified_at: Option<DateTime<Utc>>,

    #[filterable]
    #[sortable]
    pub created_at: DateTime<Utc>,

    #[filterable]
    #[sortable]
    pub updated_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[relations]
    pub relations: LoadedRelations,
}

static RELATIONS: [RelationDef; 3] = [
    RelationDef {
        name: "roles",
        target: &Role::META,
        kind: RelationKind::BelongsToMany {
            pivot_table: "role_user",
            foreign_pivot_key: "user_id",
            related_pivot_key: "role_id",
            parent_key: "id",
            related_key: "id",
        },
        load: load_related::<Role>,
    },
    RelationDef {
        name: "schools",
        target: &School::META,
        kind: RelationKind::BelongsToMany {
            pivot_table: "school_user",
            foreign_pivot_key: "user_id",
            related_pivot_key: "school_id",
            parent_key: "id",
            related_key: "id",
        },
        load: load_related::<School>,
    },
    RelationDef {
        name: "classrooms",
        target: &ClassRoom::META,
        kind: RelationKind::BelongsToMany {
            pivot_table: "class_room_students",
            foreign_pivot_key: "user_id",
            related_pivot_key: "class_room_id",
            parent_key: "id",
            related_key: "id",
        },
        load: load_related::<ClassRoom>,
    },
];

static ARRAY_FILTERS: [RelationArrayFilter; 3] = [
    RelationArrayFilter {
        param: "roles",
        relation: "roles",
        column: "name",
    },
    RelationArrayFilter {
        param: "schools",
        relation: "schools",
        column: "id",
    },
    RelationArrayFilter {
        param: "classrooms",
        relation: "classrooms",
        column: "id",
    },
];

impl Entity for User {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }

    fn relation_array_filters() -> &'static [RelationArrayFilter] {
        &ARRAY_FILTERS
    }

    fn scope(query: SelectQuery, request: &FilterRequest, _ctx: &RequestContext) -> SelectQuery {
        let Some(raw) = request.intent.as_deref() else {
            return query;
        };
        let Some(intent) = UserIntent::parse(raw) else {
            tracing::debug!(intent = %raw, "ignoring unknown user intent");
            return query;
        };

        let id_param = |key: &str| {
            request
                .extra(key)
                .map(|raw| SqlValue::coerce(raw, ColumnKind::Integer))
        };
        let (Some(roles), Some(schools), Some(classrooms)) = (
            Self::relation("roles"),
            Self::relation("schools"),
            Self::relation("classrooms"),
        ) else {
            return query;
        };

        let Some(school_id) = id_param("school_id") else {
            tracing::warn!(intent = %raw, "intent requires school_id, listing without it");
            return query;
        };
        let classroom_id = match intent {
            UserIntent::SchoolStudents => None,
            UserIntent::ClassRoomCandidates => match id_param("classroom_id") {
                Some(id) => Some(id),
                None => {
                    tracing::warn!(intent = %raw, "intent requires classroom_id, listing without it");
                    return query;
                }
            },
        };

        let query = query
            .where_has(roles, "name", vec![RoleName::Student.as_str().into()])
            .where_has(schools, "id", vec![school_id]);
        match classroom_id {
            Some(id) => query.where_doesnt_have(classrooms, "id", vec![id]),
            None => query,
        }
    }
}

impl Resource for User {
    fn to_fields(&self, urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        let profile_image_url = self
            .profile_image
            .as_deref()
            .map(|image| urls.url(&format!("{PROFILE_IMAGE_DIRECTORY}/{image}")));
        vec![
            ("id", Field::value(self.id)),
            ("name", Field::value(&self.name)),
            ("email", Field::value(&self.email)),
            ("username", Field::value(&self.username)),
            (
                "email_verified_at",
                Field::optional_timestamp(self.email_verified_at.as_ref()),
            ),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
            ("profile_image", Field::value(&self.profile_image)),
            ("profile_image_url", Field::value(profile_image_url)),
            ("roles", Field::Relation),
            ("schools", Field::Relation),
            ("classrooms", Field::Relation),
        ]
    }
}
