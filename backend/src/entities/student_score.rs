use chrono::{DateTime, Utc};
use learnhub_macros::EntitySchema;
use sqlx::FromRow;

use super::{LearningMaterialQuestion, RoleName, User};
use crate::query::{
    Entity, EntitySchema, FilterRequest, LoadedRelations, RelationDef, RelationKind,
    RequestContext, SelectQuery, SqlValue, load_related,
};
use crate::resource::{Field, Resource, UrlResolver};

#[derive(EntitySchema, FromRow, Clone, Debug)]
#[entity(table = "student_scores", default_sort = "created_at")]
pub struct StudentScore {
    #[primary_key]
    #[filterable]
    #[sortable]
    pub id: i64,

    #[filterable]
    pub user_id: i64,

    #[filterable]
    pub learning_material_question_id: i64,

    #[sortable]
    pub coding_time: i64,

    #[sortable]
    pub score: i64,

    #[filterable]
    pub completion_status: bool,

    #[filterable]
    pub trial_status: bool,

    pub compile_count: i64,

    pub test_case_complete_count: i64,

    pub test_case_total_count: i64,

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
        name: "user",
        target: &User::META,
        kind: RelationKind::BelongsTo {
            foreign_key: "user_id",
            owner_key: "id",
        },
        load: load_related::<User>,
    },
    RelationDef {
        name: "learning_material_question",
        target: &LearningMaterialQuestion::META,
        kind: RelationKind::BelongsTo {
            foreign_key: "learning_material_question_id",
            owner_key: "id",
        },
        load: load_related::<LearningMaterialQuestion>,
    },
];

impl Entity for StudentScore {
    fn relations() -> &'static [RelationDef] {
        &RELATIONS
    }

    /// Students only ever see their own scores.
    fn scope(query: SelectQuery, _request: &FilterRequest, ctx: &RequestContext) -> SelectQuery {
        if !ctx.has_only_role(RoleName::Student.as_str()) {
            return query;
        }
        match ctx.user_id {
            Some(user_id) => query.where_clause(
                format!("{} = ?", Self::META.qualified("user_id")),
                [SqlValue::Int(user_id)],
            ),
            None => query.where_clause("1 = 0", []),
        }
    }
}

impl Resource for StudentScore {
    fn to_fields(&self, _urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        vec![
            ("id", Field::value(self.id)),
            ("user_id", Field::value(self.user_id)),
            (
                "learning_material_question_id",
                Field::value(self.learning_material_question_id),
            ),
            ("score", Field::value(self.score)),
            ("completion_status", Field::value(self.completion_status)),
            ("trial_status", Field::value(self.trial_status)),
            ("compile_count", Field::value(self.compile_count)),
            ("test_case_complete_count", Field::value(self.test_case_complete_count)),
            ("test_case_total_count", Field::value(self.test_case_total_count)),
            ("coding_time", Field::value(self.coding_time)),
            ("created_at", Field::timestamp(&self.created_at)),
            ("updated_at", Field::timestamp(&self.updated_at)),
            ("user", Field::Relation),
            ("learning_material_question", Field::Relation),
        ]
    }
}
