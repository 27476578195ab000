//! Query composer
//!
//! Turns a [`FilterRequest`] into a paginated query over one entity type.
//! The pipeline is fixed:
//!
//! 1. caller scope ([`Entity::scope`])
//! 2. search
//! 3. relation-array filters
//! 4. column filters
//! 5. relation resolution (count sub-selects now, eager loads after fetch)
//! 6. sorting
//!
//! and only then pagination.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::builder::SelectQuery;
use super::entity::{Entity, EntitySchema};
use super::pagination::{Page, PageLimits, PageMeta};
use super::relations::{Loaded, RelationDef};
use super::request::{FilterRequest, RequestContext};
use super::strategy::{
    AllowListedColumnFilter, AllowListedSort, ColumnFilterStrategy, ExistsRelationFilter,
    LikeSearch, RelationFilterStrategy, SearchStrategy, SortStrategy,
};
use super::value::SqlValue;
use crate::error::QueryError;
use crate::resource::Shape;

/// Builds and runs read queries for entity type `E`.
pub struct QueryComposer<E> {
    search: Arc<dyn SearchStrategy>,
    column_filters: Arc<dyn ColumnFilterStrategy>,
    relation_filters: Arc<dyn RelationFilterStrategy>,
    sort: Arc<dyn SortStrategy>,
    limits: PageLimits,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for QueryComposer<E> {
    fn clone(&self) -> Self {
        Self {
            search: self.search.clone(),
            column_filters: self.column_filters.clone(),
            relation_filters: self.relation_filters.clone(),
            sort: self.sort.clone(),
            limits: self.limits,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Default for QueryComposer<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> QueryComposer<E> {
    /// A composer with the standard strategies and default page limits
    pub fn new() -> Self {
        Self {
            search: Arc::new(LikeSearch),
            column_filters: Arc::new(AllowListedColumnFilter),
            relation_filters: Arc::new(ExistsRelationFilter),
            sort: Arc::new(AllowListedSort),
            limits: PageLimits::default(),
            _entity: PhantomData,
        }
    }

    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_search(mut self, strategy: impl SearchStrategy + 'static) -> Self {
        self.search = Arc::new(strategy);
        self
    }

    pub fn with_column_filters(mut self, strategy: impl ColumnFilterStrategy + 'static) -> Self {
        self.column_filters = Arc::new(strategy);
        self
    }

    pub fn with_relation_filters(
        mut self,
        strategy: impl RelationFilterStrategy + 'static,
    ) -> Self {
        self.relation_filters = Arc::new(strategy);
        self
    }

    pub fn with_sort(mut self, strategy: impl SortStrategy + 'static) -> Self {
        self.sort = Arc::new(strategy);
        self
    }

    pub fn apply_search(&self, query: SelectQuery, request: &FilterRequest) -> SelectQuery {
        self.search.apply(query, request)
    }

    pub fn apply_relation_array_filters(
        &self,
        query: SelectQuery,
        request: &FilterRequest,
    ) -> SelectQuery {
        self.relation_filters
            .apply(query, request, E::relation_array_filters(), E::relations())
    }

    pub fn apply_column_filters(&self, query: SelectQuery, request: &FilterRequest) -> SelectQuery {
        self.column_filters.apply(query, request)
    }

    /// Add `<relation>_count` sub-selects for requested and always-counted
    /// relations. Eager loads themselves run in [`Self::load_relations`]
    /// once the final row set is known.
    pub fn apply_resolved_relations(
        &self,
        mut query: SelectQuery,
        request: &FilterRequest,
    ) -> SelectQuery {
        for name in request.relations.keys() {
            if E::relation(name).is_none() {
                tracing::debug!(entity = E::META.type_name, relation = %name, "ignoring unknown relation");
            }
        }
        for (relation, _) in Self::counted_relations(request).into_values() {
            query = query.select_expr(&relation.count_expr(&E::META), &count_alias(relation));
        }
        query
    }

    pub fn apply_sorting(&self, query: SelectQuery, request: &FilterRequest) -> SelectQuery {
        self.sort.apply(query, request, E::relations())
    }

    /// Apply the whole pipeline in its fixed order.
    pub fn apply_filters(
        &self,
        query: SelectQuery,
        request: &FilterRequest,
        ctx: &RequestContext,
    ) -> SelectQuery {
        let query = E::scope(query, request, ctx);
        self.apply_relation_query(query, request)
    }

    /// The pipeline without the caller scope, as used for eager loads.
    pub(crate) fn apply_relation_query(
        &self,
        query: SelectQuery,
        request: &FilterRequest,
    ) -> SelectQuery {
        let query = self.apply_search(query, request);
        let query = self.apply_relation_array_filters(query, request);
        let query = self.apply_column_filters(query, request);
        let query = self.apply_resolved_relations(query, request);
        self.apply_sorting(query, request)
    }

    /// Run the filtered query and return one page plus metadata.
    pub async fn paginate(
        &self,
        pool: &SqlitePool,
        request: &FilterRequest,
        ctx: &RequestContext,
    ) -> Result<Page<E>, QueryError> {
        let query = self.apply_filters(SelectQuery::new(&E::META), request, ctx);
        let total = query.count(pool).await?;

        let (query, meta) = match self.limits.resolve(request.page_size) {
            None => (query, PageMeta::unpaginated(total)),
            Some(per_page) => {
                let meta = PageMeta::new(total, request.page.unwrap_or(1), per_page);
                (query.limit(meta.per_page).offset(meta.offset()), meta)
            }
        };

        let data = self.fetch(pool, &query, request, ctx).await?;
        Ok(Page { data, meta })
    }

    /// Run the filtered query without pagination.
    pub async fn get(
        &self,
        pool: &SqlitePool,
        request: &FilterRequest,
        ctx: &RequestContext,
    ) -> Result<Vec<E>, QueryError> {
        let query = self.apply_filters(SelectQuery::new(&E::META), request, ctx);
        self.fetch(pool, &query, request, ctx).await
    }

    /// Load one entity by primary key with its requested relations and
    /// counts. Rows hidden by the caller scope are not found.
    pub async fn find(
        &self,
        pool: &SqlitePool,
        id: i64,
        request: &FilterRequest,
        ctx: &RequestContext,
    ) -> Result<E, QueryError> {
        let query = E::scope(SelectQuery::new(&E::META), request, ctx).where_clause(
            format!("{} = ?", E::META.qualified(E::META.primary_key)),
            [SqlValue::Int(id)],
        );
        let query = self.apply_resolved_relations(query, request).limit(1);

        self.fetch(pool, &query, request, ctx)
            .await?
            .into_iter()
            .next()
            .ok_or(QueryError::NotFound {
                entity: E::META.type_name,
                id,
            })
    }

    async fn fetch(
        &self,
        pool: &SqlitePool,
        query: &SelectQuery,
        request: &FilterRequest,
        ctx: &RequestContext,
    ) -> Result<Vec<E>, QueryError> {
        let rows = query.fetch_rows(pool).await?;
        let mut entities = rows
            .iter()
            .map(|row| self.decode(row, request))
            .collect::<Result<Vec<_>, _>>()?;
        self.load_relations(pool, &mut entities, request, ctx).await?;
        Ok(entities)
    }

    /// Decode a row, attaching any relation counts it carries.
    pub fn decode(&self, row: &SqliteRow, request: &FilterRequest) -> Result<E, QueryError> {
        let decode_error = |source| QueryError::Decode {
            entity: E::META.type_name,
            source,
        };

        let mut entity = E::from_row(row).map_err(decode_error)?;
        for (relation, exposed) in Self::counted_relations(request).into_values() {
            let value: i64 = row
                .try_get(count_alias(relation).as_str())
                .map_err(decode_error)?;
            entity.loaded_mut().set_count(relation.name, value, exposed);
        }
        Ok(entity)
    }

    /// Eager-load every requested relation onto `entities`.
    ///
    /// One query per relation regardless of how many parents there are.
    /// Relations that match nothing are still attached (as `None` or an
    /// empty list) so they appear in shaped output.
    pub async fn load_relations(
        &self,
        pool: &SqlitePool,
        entities: &mut [E],
        request: &FilterRequest,
        ctx: &RequestContext,
    ) -> Result<(), QueryError> {
        if entities.is_empty() {
            return Ok(());
        }

        for (name, nested) in &request.relations {
            let Some(relation) = E::relation(name) else {
                continue;
            };
            let key_column = relation.parent_key_column();
            let parent_key = |entity: &E| entity.column_value(key_column).and_then(|v| v.as_key());

            let keys: BTreeSet<i64> = entities.iter().filter_map(parent_key).collect();
            let children = if keys.is_empty() {
                Vec::new()
            } else {
                let keys = keys.into_iter().map(SqlValue::Int).collect();
                (relation.load)(pool, relation, keys, nested, ctx).await?
            };

            let mut by_parent: HashMap<i64, Vec<Arc<dyn Shape>>> = HashMap::new();
            for (parent, child) in children {
                by_parent.entry(parent).or_default().push(child);
            }

            for entity in entities.iter_mut() {
                let matched = parent_key(entity)
                    .and_then(|key| by_parent.get(&key))
                    .cloned()
                    .unwrap_or_default();
                let loaded = if relation.is_multiple() {
                    Loaded::Many(matched)
                } else {
                    Loaded::One(matched.into_iter().next())
                };
                entity.loaded_mut().insert(relation.name, loaded);
            }
        }
        Ok(())
    }

    /// Relations to count, keyed by name, with whether the caller asked for
    /// them (as opposed to a computed field needing them).
    fn counted_relations(request: &FilterRequest) -> BTreeMap<&'static str, (&'static RelationDef, bool)> {
        let mut counted = BTreeMap::new();
        for name in E::always_counted() {
            if let Some(relation) = E::relation(name) {
                counted.insert(relation.name, (relation, false));
            }
        }
        for name in &request.relation_counts {
            match E::relation(name) {
                Some(relation) => {
                    counted.insert(relation.name, (relation, true));
                }
                None => {
                    tracing::debug!(entity = E::META.type_name, relation = %name, "ignoring count of unknown relation")
                }
            }
        }
        counted
    }
}

fn count_alias(relation: &RelationDef) -> String {
    format!("{}_count", relation.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::entities::{ClassRoom, Course, School, StudentScore, User};
    use crate::query::ParamBag;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn request(query: &str) -> FilterRequest {
        FilterRequest::from_params(&ParamBag::from_query(query))
    }

    async fn seeded() -> Database {
        let db = Database::in_memory().await.unwrap();
        crate::db::seed::seed_demo_data(db.pool()).await.unwrap();
        db
    }

    fn names(courses: &[Course]) -> Vec<&str> {
        courses.iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_search_matches_substring() {
        let db = seeded().await;
        let courses = QueryComposer::<Course>::new()
            .get(db.pool(), &request("search=algo&sort_by=id,asc"), &RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(names(&courses), vec!["Algorithms", "Algorithmic Thinking"]);
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let db = seeded().await;
        sqlx::query("UPDATE courses SET name = 'Ökologie' WHERE id = 2")
            .execute(db.pool())
            .await
            .unwrap();

        let composer = QueryComposer::<Course>::new();
        let ctx = RequestContext::anonymous();
        for term in ["ökolog", "ÖKOLOG", "%C3%96kOLOG"] {
            let courses = composer
                .get(db.pool(), &request(&format!("search={term}")), &ctx)
                .await
                .unwrap();
            assert_eq!(names(&courses), vec!["Ökologie"], "search={term}");
        }
    }

    #[tokio::test]
    async fn test_empty_search_is_noop() {
        let db = seeded().await;
        let composer = QueryComposer::<Course>::new();
        let ctx = RequestContext::anonymous();
        let all = composer.get(db.pool(), &request(""), &ctx).await.unwrap();
        let blank = composer.get(db.pool(), &request("search=+"), &ctx).await.unwrap();
        assert_eq!(names(&all), names(&blank));
    }

    #[tokio::test]
    async fn test_column_filter_active() {
        let db = seeded().await;
        let composer = QueryComposer::<Course>::new();
        let ctx = RequestContext::anonymous();
        let active = composer
            .get(db.pool(), &request("active=1&sort_by=id,asc"), &ctx)
            .await
            .unwrap();
        assert_eq!(names(&active), vec!["Algorithms", "Algorithmic Thinking"]);

        let as_list = composer
            .get(db.pool(), &request("active[]=1&sort_by=id,asc"), &ctx)
            .await
            .unwrap();
        assert_eq!(names(&active), names(&as_list));
    }

    #[tokio::test]
    async fn test_bogus_filters_do_not_change_results() {
        let db = seeded().await;
        let composer = QueryComposer::<Course>::new();
        let ctx = RequestContext::anonymous();
        let plain = composer.get(db.pool(), &request(""), &ctx).await.unwrap();
        let bogus = composer
            .get(
                db.pool(),
                &request("column_filters[description]=x&nope=1&sort_by=nope,asc&relations=nope"),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(names(&plain), names(&bogus));
    }

    #[tokio::test]
    async fn test_relation_array_filter_distinct() {
        let db = seeded().await;
        let users = QueryComposer::<User>::new()
            .get(
                db.pool(),
                &request("schools[]=1&schools[]=2&sort_by=id,asc"),
                &RequestContext::anonymous(),
            )
            .await
            .unwrap();
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        // user 5 belongs to both schools and appears once
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_paginate_second_page() {
        let db = Database::in_memory().await.unwrap();
        for i in 1..=25 {
            sqlx::query("INSERT INTO schools (name, address, created_at, updated_at) VALUES (?, '', ?, ?)")
                .bind(format!("School {i:02}"))
                .bind(format!("2024-01-01 00:00:{i:02}"))
                .bind(format!("2024-01-01 00:00:{i:02}"))
                .execute(db.pool())
                .await
                .unwrap();
        }

        let page = QueryComposer::<School>::new()
            .paginate(
                db.pool(),
                &request("page=2&page_size=10&sort_by=id,asc"),
                &RequestContext::anonymous(),
            )
            .await
            .unwrap();
        assert_eq!(
            page.meta,
            PageMeta { total: 25, current_page: 2, per_page: 10, last_page: 3 }
        );
        let ids: Vec<i64> = page.data.iter().map(|s| s.id).collect();
        assert_eq!(ids, (11..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_paginate_huge_page_is_empty() {
        let db = seeded().await;
        let composer = QueryComposer::<Course>::new();
        let ctx = RequestContext::anonymous();

        let page = composer
            .paginate(db.pool(), &request("page=9223372036854775807&page_size=10"), &ctx)
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(
            page.meta,
            PageMeta { total: 3, current_page: i64::MAX, per_page: 10, last_page: 1 }
        );

        let page = composer
            .paginate(db.pool(), &request("page=1000000000000000000&page_size=100"), &ctx)
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.meta.total, 3);
    }

    #[tokio::test]
    async fn test_paginate_all_sentinel() {
        let db = seeded().await;
        let page = QueryComposer::<Course>::new()
            .paginate(db.pool(), &request("page_size=all"), &RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(page.data.len(), 3);
        assert_eq!(page.meta, PageMeta { total: 3, current_page: 1, per_page: 3, last_page: 1 });
    }

    #[tokio::test]
    async fn test_default_order_is_deterministic() {
        let db = seeded().await;
        let composer = QueryComposer::<Course>::new();
        let ctx = RequestContext::anonymous();
        let first = composer.get(db.pool(), &request(""), &ctx).await.unwrap();
        let second = composer.get(db.pool(), &request(""), &ctx).await.unwrap();
        assert_eq!(names(&first), names(&second));
        // newest first
        assert_eq!(first[0].name, "Algorithmic Thinking");
    }

    #[tokio::test]
    async fn test_eager_load_with_nested_filter() {
        let db = seeded().await;
        let schools = QueryComposer::<School>::new()
            .get(
                db.pool(),
                &request("relations=class_rooms&relation_params[class_rooms][column_filters][id]=1&sort_by=id,asc"),
                &RequestContext::anonymous(),
            )
            .await
            .unwrap();

        let first = schools[0].loaded().get("class_rooms").unwrap();
        assert_matches!(first, Loaded::Many(rooms) if rooms.len() == 1);
        let second = schools[1].loaded().get("class_rooms").unwrap();
        assert_matches!(second, Loaded::Many(rooms) if rooms.is_empty());
    }

    #[tokio::test]
    async fn test_counts_and_deletable() {
        let db = seeded().await;
        let rooms = QueryComposer::<ClassRoom>::new()
            .get(db.pool(), &request("relations_count=students&sort_by=id,asc"), &RequestContext::anonymous())
            .await
            .unwrap();
        assert_eq!(rooms[0].loaded().count("courses"), Some(2));
        assert_eq!(rooms[0].loaded().count("students"), Some(2));
        let exposed: Vec<_> = rooms[0].loaded().exposed_counts().collect();
        assert_eq!(exposed, vec![("students", 2)]);
    }

    #[tokio::test]
    async fn test_find_not_found() {
        let db = seeded().await;
        let composer = QueryComposer::<Course>::new();
        let ctx = RequestContext::anonymous();
        let found = composer.find(db.pool(), 1, &request("relations=classroom"), &ctx).await.unwrap();
        assert!(found.loaded().is_loaded("classroom"));

        let missing = composer.find(db.pool(), 999, &request(""), &ctx).await;
        assert_matches!(missing, Err(QueryError::NotFound { entity: "course", id: 999 }));
    }

    #[tokio::test]
    async fn test_student_only_sees_own_scores() {
        let db = seeded().await;
        let composer = QueryComposer::<StudentScore>::new();
        let student = RequestContext::new(3, vec!["student".into()]);
        let scores = composer.get(db.pool(), &request(""), &student).await.unwrap();
        assert!(!scores.is_empty());
        assert!(scores.iter().all(|s| s.user_id == 3));

        let admin = RequestContext::new(1, vec!["super_admin".into()]);
        let all = composer.get(db.pool(), &request(""), &admin).await.unwrap();
        assert!(all.len() > scores.len());
    }

    #[tokio::test]
    async fn test_user_intents() {
        let db = seeded().await;
        let composer = QueryComposer::<User>::new();
        let ctx = RequestContext::anonymous();

        let students = composer
            .get(db.pool(), &request("intent=user.index.students&school_id=1&sort_by=id,asc"), &ctx)
            .await
            .unwrap();
        let ids: Vec<i64> = students.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3, 5]);

        let not_in_room = composer
            .get(
                db.pool(),
                &request("intent=user.index.class_room_students&school_id=1&classroom_id=1"),
                &ctx,
            )
            .await
            .unwrap();
        assert!(not_in_room.is_empty());

        let degraded = composer
            .get(db.pool(), &request("intent=user.index.students"), &ctx)
            .await
            .unwrap();
        assert_eq!(degraded.len(), 5);
    }
}
