//! Query composition strategies
//!
//! Each concern of a list query lives in its own small strategy so it can be
//! swapped or tested on its own. A [`QueryComposer`](super::QueryComposer)
//! holds one of each and applies them in a fixed order.

use super::builder::SelectQuery;
use super::entity::EntityMeta;
use super::relations::{RelationArrayFilter, RelationDef};
use super::request::FilterRequest;
use super::value::SqlValue;
use crate::db::functions::UNICODE_LOWER;

/// Free-text search over an entity's searchable columns
pub trait SearchStrategy: Send + Sync {
    fn apply(&self, query: SelectQuery, request: &FilterRequest) -> SelectQuery;
}

/// Exact / `IN` filters over an entity's filterable columns
pub trait ColumnFilterStrategy: Send + Sync {
    fn apply(&self, query: SelectQuery, request: &FilterRequest) -> SelectQuery;
}

/// "Has a related row whose column is in the list" filters
pub trait RelationFilterStrategy: Send + Sync {
    fn apply(
        &self,
        query: SelectQuery,
        request: &FilterRequest,
        filters: &[RelationArrayFilter],
        relations: &[RelationDef],
    ) -> SelectQuery;
}

/// Sort directives over an entity's sortable columns
pub trait SortStrategy: Send + Sync {
    fn apply(
        &self,
        query: SelectQuery,
        request: &FilterRequest,
        relations: &[RelationDef],
    ) -> SelectQuery;
}

/// Case-insensitive substring match, OR'd across searchable columns.
///
/// Columns are folded with the connection-level `unicode_lower` function
/// and the term is folded in Rust, so non-ASCII text matches regardless of
/// case. SQLite's own `LOWER` only folds ASCII.
#[derive(Debug, Clone, Copy, Default)]
pub struct LikeSearch;

impl SearchStrategy for LikeSearch {
    fn apply(&self, query: SelectQuery, request: &FilterRequest) -> SelectQuery {
        let Some(term) = request.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return query;
        };
        let meta = query.meta();
        if meta.searchable.is_empty() {
            tracing::debug!(entity = meta.type_name, "search ignored, no searchable columns");
            return query;
        }

        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
        let conditions: Vec<String> = meta
            .searchable
            .iter()
            .map(|c| format!("{UNICODE_LOWER}({}) LIKE ? ESCAPE '\\'", meta.qualified(c)))
            .collect();
        let values = meta
            .searchable
            .iter()
            .map(|_| SqlValue::String(pattern.clone()));

        query.where_clause(format!("({})", conditions.join(" OR ")), values)
    }
}

/// Escape LIKE wildcards so the term only ever matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Equality for scalars, `IN` for lists, allow-listed columns only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowListedColumnFilter;

impl ColumnFilterStrategy for AllowListedColumnFilter {
    fn apply(&self, mut query: SelectQuery, request: &FilterRequest) -> SelectQuery {
        let meta = query.meta();

        for column in request.column_filters.keys() {
            if !meta.filterable.contains(&column.as_str()) {
                tracing::debug!(entity = meta.type_name, column = %column, "ignoring filter on column outside allow-list");
            }
        }

        for column in meta.filterable {
            let Some(value) = request.column_filter(column) else {
                continue;
            };
            let Some(def) = meta.column(column) else {
                continue;
            };
            let values = value
                .scalars()
                .into_iter()
                .map(|raw| SqlValue::coerce(raw, def.kind))
                .collect();
            query = query.where_in(&meta.qualified(column), values);
        }
        query
    }
}

/// Correlated `EXISTS` sub-selects through the relation registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExistsRelationFilter;

impl RelationFilterStrategy for ExistsRelationFilter {
    fn apply(
        &self,
        mut query: SelectQuery,
        request: &FilterRequest,
        filters: &[RelationArrayFilter],
        relations: &[RelationDef],
    ) -> SelectQuery {
        let meta = query.meta();

        for filter in filters {
            let Some(value) = request.relation_array_filter(filter.param) else {
                continue;
            };
            let Some(relation) = relations.iter().find(|r| r.name == filter.relation) else {
                tracing::debug!(entity = meta.type_name, relation = filter.relation, "relation filter names an unknown relation");
                continue;
            };
            let Some(def) = relation.target.column(filter.column) else {
                continue;
            };

            let values = value
                .scalars()
                .into_iter()
                .map(|raw| SqlValue::coerce(raw, def.kind))
                .collect();
            query = query.where_has(relation, filter.column, values);
        }

        for name in request.relation_array_filters.keys() {
            if !filters.iter().any(|f| f.param == name) {
                tracing::debug!(entity = meta.type_name, filter = %name, "ignoring unknown relation filter");
            }
        }
        query
    }
}

/// Relation-count ordering first, then allow-listed column directives.
///
/// Without any usable directive the builder falls back to the entity's
/// default order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowListedSort;

impl SortStrategy for AllowListedSort {
    fn apply(
        &self,
        mut query: SelectQuery,
        request: &FilterRequest,
        relations: &[RelationDef],
    ) -> SelectQuery {
        let meta: &EntityMeta = query.meta();

        if let Some((name, direction)) = &request.sort_by_relation_count {
            match relations.iter().find(|r| r.name == name) {
                Some(relation) => {
                    let expr = relation.count_expr(meta);
                    query = query.order_by(&expr, *direction);
                }
                None => {
                    tracing::debug!(entity = meta.type_name, relation = %name, "ignoring sort by unknown relation count")
                }
            }
        }

        for directive in &request.sort {
            if !meta.sortable.contains(&directive.column.as_str()) {
                tracing::debug!(entity = meta.type_name, column = %directive.column, "ignoring sort on column outside allow-list");
                continue;
            }
            query = query.order_by(&meta.qualified(&directive.column), directive.direction);
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Course, User};
    use crate::query::{Entity, EntitySchema, ParamBag};
    use pretty_assertions::assert_eq;

    fn request(query: &str) -> FilterRequest {
        FilterRequest::from_params(&ParamBag::from_query(query))
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("algo"), "algo");
    }

    #[test]
    fn test_search_ors_searchable_columns() {
        let query = LikeSearch.apply(SelectQuery::new(&User::META), &request("search=ann"));
        let sql = query.build_count_sql();
        assert!(sql.contains("(unicode_lower(users.name) LIKE ? ESCAPE '\\'"));
        assert!(sql.contains(" OR unicode_lower(users.email) LIKE ?"));
    }

    #[test]
    fn test_blank_search_is_noop() {
        let query = LikeSearch.apply(SelectQuery::new(&Course::META), &request("search=%20%20"));
        assert_eq!(query.build_count_sql(), "SELECT COUNT(*) FROM courses");
    }

    #[test]
    fn test_column_filter_scalar_and_list() {
        let query = AllowListedColumnFilter.apply(
            SelectQuery::new(&Course::META),
            &request("active=1&column_filters[id][]=1&column_filters[id][]=3"),
        );
        assert_eq!(
            query.build_count_sql(),
            "SELECT COUNT(*) FROM courses WHERE courses.id IN (?, ?) AND courses.active = ?"
        );
    }

    #[test]
    fn test_column_filter_outside_allow_list_ignored() {
        let query = AllowListedColumnFilter.apply(
            SelectQuery::new(&Course::META),
            &request("column_filters[description]=x&bogus=1"),
        );
        assert_eq!(query.build_count_sql(), "SELECT COUNT(*) FROM courses");
    }

    #[test]
    fn test_relation_filter_exists() {
        let query = ExistsRelationFilter.apply(
            SelectQuery::new(&User::META),
            &request("schools[]=3&schools[]=7&unknown[]=1"),
            User::relation_array_filters(),
            User::relations(),
        );
        let sql = query.build_count_sql();
        assert!(sql.contains("WHERE EXISTS (SELECT 1 FROM schools AS rel"));
        assert!(sql.ends_with("AND rel.id IN (?, ?))"));
    }

    #[test]
    fn test_sort_allow_list_and_relation_count() {
        let query = AllowListedSort.apply(
            SelectQuery::new(&Course::META),
            &request("sort_by=name,asc,password,desc&sort_by_relation_count=learning_materials&sort_dir_relation_count=asc"),
            Course::relations(),
        );
        assert_eq!(
            query.order_clauses(),
            [
                "(SELECT COUNT(*) FROM learning_materials AS rel WHERE rel.course_id = courses.id) ASC",
                "courses.name ASC",
            ]
        );
    }
}
