//! SQL query builder
//!
//! Builds parameterized SELECT and COUNT statements over one entity table.
//! Identifiers only ever come from [`EntityMeta`] and the relation registry;
//! every caller-supplied value is bound through `?` placeholders.

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;

use super::entity::EntityMeta;
use super::relations::RelationDef;
use super::request::SortDirection;
use super::value::SqlValue;

/// A query builder for one entity table.
///
/// Values are only ever attached by WHERE clauses, so the order of
/// `values` always matches the order of placeholders in the statement.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    meta: &'static EntityMeta,
    extra_selects: Vec<String>,
    joins: Vec<String>,
    where_clauses: Vec<String>,
    values: Vec<SqlValue>,
    order_clauses: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SelectQuery {
    /// Create a new query over the entity's table.
    pub fn new(meta: &'static EntityMeta) -> Self {
        Self {
            meta,
            extra_selects: Vec::new(),
            joins: Vec::new(),
            where_clauses: Vec::new(),
            values: Vec::new(),
            order_clauses: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn meta(&self) -> &'static EntityMeta {
        self.meta
    }

    /// Order clauses added so far, in precedence order
    pub fn order_clauses(&self) -> &[String] {
        &self.order_clauses
    }

    /// Add a WHERE condition whose `?` placeholders are bound to `values`.
    pub fn where_clause<I>(mut self, condition: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = SqlValue>,
    {
        self.where_clauses.push(condition.into());
        self.values.extend(values);
        self
    }

    /// `expr = ?` for one value, `expr IN (?, ...)` for several.
    ///
    /// An empty list matches nothing.
    pub fn where_in(self, expr: &str, values: Vec<SqlValue>) -> Self {
        match values.len() {
            0 => self.where_clause("1 = 0", []),
            1 => self.where_clause(format!("{expr} = ?"), values),
            n => self.where_clause(format!("{expr} IN ({})", placeholders(n)), values),
        }
    }

    /// Keep rows with at least one related row whose `column` is in `values`.
    pub fn where_has(self, relation: &RelationDef, column: &str, values: Vec<SqlValue>) -> Self {
        if values.is_empty() {
            return self.where_clause("1 = 0", []);
        }
        let condition = relation.exists_expr(self.meta, column, values.len());
        self.where_clause(condition, values)
    }

    /// Keep rows with no related row whose `column` is in `values`.
    pub fn where_doesnt_have(
        self,
        relation: &RelationDef,
        column: &str,
        values: Vec<SqlValue>,
    ) -> Self {
        if values.is_empty() {
            return self;
        }
        let condition = relation.exists_expr(self.meta, column, values.len());
        self.where_clause(format!("NOT {condition}"), values)
    }

    /// Add `expr AS alias` to the select list.
    pub fn select_expr(mut self, expr: &str, alias: &str) -> Self {
        self.extra_selects.push(format!("{expr} AS \"{alias}\""));
        self
    }

    /// Add a raw JOIN clause.
    pub fn join(mut self, clause: impl Into<String>) -> Self {
        self.joins.push(clause.into());
        self
    }

    /// Append an ORDER BY term.
    pub fn order_by(mut self, expr: &str, direction: SortDirection) -> Self {
        self.order_clauses.push(format!("{expr} {}", direction.as_sql()));
        self
    }

    /// Set limit directly.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set offset directly.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Full ORDER BY list: explicit terms (or the entity default), then the
    /// primary key so rows with equal sort values keep a stable order.
    fn order_terms(&self) -> Vec<String> {
        let pk = self.meta.qualified(self.meta.primary_key);
        let mut terms = self.order_clauses.clone();
        let tiebreak = if terms.is_empty() {
            let direction = self.meta.default_direction;
            terms.push(format!(
                "{} {}",
                self.meta.qualified(self.meta.default_sort),
                direction.as_sql()
            ));
            direction
        } else {
            SortDirection::Asc
        };
        if !terms.iter().any(|t| t.starts_with(&format!("{pk} "))) {
            terms.push(format!("{pk} {}", tiebreak.as_sql()));
        }
        terms
    }

    fn push_from_where(&self, sql: &mut String) {
        sql.push_str(" FROM ");
        sql.push_str(self.meta.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }
    }

    /// Build the SQL query string.
    pub fn build_sql(&self) -> String {
        let mut sql = format!("SELECT {}", self.meta.select_list());
        for select in &self.extra_selects {
            sql.push_str(", ");
            sql.push_str(select);
        }
        self.push_from_where(&mut sql);

        sql.push_str(" ORDER BY ");
        sql.push_str(&self.order_terms().join(", "));

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            if offset > 0 {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        sql
    }

    /// Build a COUNT query string over the same predicates.
    pub fn build_count_sql(&self) -> String {
        let mut sql = String::from("SELECT COUNT(*)");
        self.push_from_where(&mut sql);
        sql
    }

    /// Execute the query and return the raw rows.
    pub async fn fetch_rows(&self, pool: &SqlitePool) -> Result<Vec<SqliteRow>, sqlx::Error> {
        let sql = self.build_sql();
        tracing::debug!(sql = %sql, values = ?self.values, "Executing entity query");

        let mut query = sqlx::query(&sql);
        for value in &self.values {
            query = value.bind_to_query(query);
        }
        query.fetch_all(pool).await
    }

    /// Execute a COUNT query.
    pub async fn count(&self, pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let sql = self.build_count_sql();
        tracing::debug!(sql = %sql, "Executing count query");

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &self.values {
            query = value.bind_to_scalar(query);
        }
        query.fetch_one(pool).await
    }
}

/// `?, ?, ?` for `n` values
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ColumnDef, ColumnKind};
    use pretty_assertions::assert_eq;

    static META: EntityMeta = EntityMeta {
        type_name: "course",
        table: "courses",
        primary_key: "id",
        columns: &[
            ColumnDef { name: "id", kind: ColumnKind::Integer },
            ColumnDef { name: "name", kind: ColumnKind::Text },
            ColumnDef { name: "created_at", kind: ColumnKind::Timestamp },
        ],
        searchable: &["name"],
        filterable: &["id"],
        sortable: &["id", "name", "created_at"],
        default_sort: "created_at",
        default_direction: SortDirection::Desc,
    };

    #[test]
    fn test_default_order_has_tiebreak() {
        let sql = SelectQuery::new(&META).build_sql();
        assert_eq!(
            sql,
            "SELECT courses.id, courses.name, courses.created_at FROM courses \
             ORDER BY courses.created_at DESC, courses.id DESC"
        );
    }

    #[test]
    fn test_where_and_limit() {
        let query = SelectQuery::new(&META)
            .where_in("courses.id", vec![SqlValue::Int(1), SqlValue::Int(2)])
            .where_clause("courses.name = ?", [SqlValue::from("x")])
            .order_by("courses.name", SortDirection::Asc)
            .limit(10)
            .offset(20);
        assert_eq!(
            query.build_sql(),
            "SELECT courses.id, courses.name, courses.created_at FROM courses \
             WHERE courses.id IN (?, ?) AND courses.name = ? \
             ORDER BY courses.name ASC, courses.id ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            query.build_count_sql(),
            "SELECT COUNT(*) FROM courses WHERE courses.id IN (?, ?) AND courses.name = ?"
        );
    }

    #[test]
    fn test_explicit_pk_order_skips_tiebreak() {
        let sql = SelectQuery::new(&META)
            .order_by("courses.id", SortDirection::Desc)
            .build_sql();
        assert!(sql.ends_with("ORDER BY courses.id DESC"));
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let sql = SelectQuery::new(&META).where_in("courses.id", vec![]).build_count_sql();
        assert_eq!(sql, "SELECT COUNT(*) FROM courses WHERE 1 = 0");
    }
}
