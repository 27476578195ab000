//! Core traits for entity types
//!
//! `EntitySchema` is implemented by `#[derive(EntitySchema)]` from
//! `learnhub-macros`. `Entity` is written by hand next to each entity and
//! carries the relation registry and any caller-dependent scope.

use sqlx::FromRow;
use sqlx::sqlite::SqliteRow;

use super::builder::SelectQuery;
use super::relations::{LoadedRelations, RelationArrayFilter, RelationDef};
use super::request::{FilterRequest, RequestContext, SortDirection};
use super::value::SqlValue;
use crate::resource::Resource;

/// Storage kind of a column, used to coerce incoming filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Boolean,
    Text,
    Timestamp,
}

/// Column definition generated from a struct field.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Column name in the database
    pub name: &'static str,
    /// Storage kind
    pub kind: ColumnKind,
}

/// Static metadata about an entity type (table).
#[derive(Debug)]
pub struct EntityMeta {
    /// snake_case type name, e.g. `class_room`
    pub type_name: &'static str,
    /// The SQL table name, e.g. `class_rooms`
    pub table: &'static str,
    /// The primary key column name
    pub primary_key: &'static str,
    /// Every persisted column
    pub columns: &'static [ColumnDef],
    /// Columns matched by the free-text search term
    pub searchable: &'static [&'static str],
    /// Columns accepted as column filters
    pub filterable: &'static [&'static str],
    /// Columns accepted as sort directives
    pub sortable: &'static [&'static str],
    /// Default sort column for list queries
    pub default_sort: &'static str,
    /// Default sort direction
    pub default_direction: SortDirection,
}

impl EntityMeta {
    /// Look up a declared column by name
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Table-qualified column reference, e.g. `courses.name`
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{}", self.table, column)
    }

    /// Qualified select list of every declared column
    pub fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| self.qualified(c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Metadata about a database entity (table).
///
/// Implemented by `#[derive(EntitySchema)]` macro.
pub trait EntitySchema: Sized {
    /// Column metadata and allow-lists
    const META: EntityMeta;

    /// Read a declared column's value, `None` for unknown columns
    fn column_value(&self, column: &str) -> Option<SqlValue>;

    /// Relations and counts attached by the eager loader
    fn loaded(&self) -> &LoadedRelations;

    /// Mutable access for the eager loader
    fn loaded_mut(&mut self) -> &mut LoadedRelations;
}

/// A queryable, shapeable entity type.
pub trait Entity:
    EntitySchema + Resource + for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static
{
    /// Relations that may be eager-loaded, counted or filtered on
    fn relations() -> &'static [RelationDef] {
        &[]
    }

    /// Parameter name → (relation, column) mappings for existence filters
    fn relation_array_filters() -> &'static [RelationArrayFilter] {
        &[]
    }

    /// Relation counts computed fields depend on; loaded on every query
    fn always_counted() -> &'static [&'static str] {
        &[]
    }

    /// Caller-dependent predicates applied before any request filter
    fn scope(query: SelectQuery, _request: &FilterRequest, _ctx: &RequestContext) -> SelectQuery {
        query
    }

    /// Find a relation in the registry by name
    fn relation(name: &str) -> Option<&'static RelationDef> {
        Self::relations().iter().find(|r| r.name == name)
    }
}
