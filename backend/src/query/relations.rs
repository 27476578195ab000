//! Relation registry and eager loading
//!
//! Each entity type declares its relations as static [`RelationDef`]s. The
//! wire format names relations by string; the registry is the only place
//! those strings are resolved, and each definition carries a typed loader
//! for its target entity.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx::{Row, SqlitePool};

use super::builder::{SelectQuery, placeholders};
use super::composer::QueryComposer;
use super::entity::{Entity, EntityMeta, EntitySchema};
use super::request::{FilterRequest, RequestContext};
use super::value::SqlValue;
use crate::error::QueryError;
use crate::resource::Shape;

/// Alias of the parent key selected alongside eager-loaded rows
pub const PARENT_KEY_ALIAS: &str = "__parent_key";

/// Alias of the related table inside correlated sub-selects
const SUBQUERY_ALIAS: &str = "rel";

/// How two tables are linked
#[derive(Debug, Clone, Copy)]
pub enum RelationKind {
    /// The parent row holds `foreign_key`, pointing at the target's `owner_key`
    BelongsTo {
        foreign_key: &'static str,
        owner_key: &'static str,
    },
    /// Target rows hold `foreign_key`, pointing at the parent's `local_key`
    HasMany {
        foreign_key: &'static str,
        local_key: &'static str,
    },
    /// Linked through a pivot table
    BelongsToMany {
        pivot_table: &'static str,
        /// Pivot column referencing the parent
        foreign_pivot_key: &'static str,
        /// Pivot column referencing the target
        related_pivot_key: &'static str,
        parent_key: &'static str,
        related_key: &'static str,
    },
}

/// Loads the targets of one relation for a set of parent keys, returning
/// `(parent key, child)` pairs.
pub type RelationLoader = for<'a> fn(
    &'a SqlitePool,
    &'static RelationDef,
    Vec<SqlValue>,
    &'a FilterRequest,
    &'a RequestContext,
) -> BoxFuture<'a, Result<Vec<(i64, Arc<dyn Shape>)>, QueryError>>;

/// A named relation of an entity type
pub struct RelationDef {
    pub name: &'static str,
    pub target: &'static EntityMeta,
    pub kind: RelationKind,
    pub load: RelationLoader,
}

impl fmt::Debug for RelationDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDef")
            .field("name", &self.name)
            .field("target", &self.target.table)
            .field("kind", &self.kind)
            .finish()
    }
}

impl RelationDef {
    /// The parent column whose values identify related rows
    pub fn parent_key_column(&self) -> &'static str {
        match self.kind {
            RelationKind::BelongsTo { foreign_key, .. } => foreign_key,
            RelationKind::HasMany { local_key, .. } => local_key,
            RelationKind::BelongsToMany { parent_key, .. } => parent_key,
        }
    }

    /// Whether the relation yields a list rather than a single row
    pub fn is_multiple(&self) -> bool {
        !matches!(self.kind, RelationKind::BelongsTo { .. })
    }

    /// FROM/JOIN/link predicate of a sub-select over the aliased target,
    /// correlated with `parent`
    fn correlated_from(&self, parent: &EntityMeta) -> String {
        let target = self.target.table;
        let rel = SUBQUERY_ALIAS;
        match self.kind {
            RelationKind::BelongsTo {
                foreign_key,
                owner_key,
            } => format!(
                "FROM {target} AS {rel} WHERE {rel}.{owner_key} = {}",
                parent.qualified(foreign_key)
            ),
            RelationKind::HasMany {
                foreign_key,
                local_key,
            } => format!(
                "FROM {target} AS {rel} WHERE {rel}.{foreign_key} = {}",
                parent.qualified(local_key)
            ),
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                parent_key,
                related_key,
            } => format!(
                "FROM {target} AS {rel} \
                 INNER JOIN {pivot_table} ON {pivot_table}.{related_pivot_key} = {rel}.{related_key} \
                 WHERE {pivot_table}.{foreign_pivot_key} = {}",
                parent.qualified(parent_key)
            ),
        }
    }

    /// Correlated `COUNT(*)` sub-select of related rows
    pub fn count_expr(&self, parent: &EntityMeta) -> String {
        format!("(SELECT COUNT(*) {})", self.correlated_from(parent))
    }

    /// `EXISTS` predicate: some related row has `column` among `n` bound values
    pub fn exists_expr(&self, parent: &EntityMeta, column: &str, n: usize) -> String {
        format!(
            "EXISTS (SELECT 1 {} AND {SUBQUERY_ALIAS}.{column} IN ({}))",
            self.correlated_from(parent),
            placeholders(n)
        )
    }

    /// Restrict a query over the target to rows related to `keys`, selecting
    /// the matching parent key as [`PARENT_KEY_ALIAS`].
    pub fn constrain(&self, query: SelectQuery, keys: Vec<SqlValue>) -> SelectQuery {
        let target = self.target;
        match self.kind {
            RelationKind::BelongsTo { owner_key, .. } => {
                let column = target.qualified(owner_key);
                query
                    .select_expr(&column, PARENT_KEY_ALIAS)
                    .where_in(&column, keys)
            }
            RelationKind::HasMany { foreign_key, .. } => {
                let column = target.qualified(foreign_key);
                query
                    .select_expr(&column, PARENT_KEY_ALIAS)
                    .where_in(&column, keys)
            }
            RelationKind::BelongsToMany {
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                related_key,
                ..
            } => {
                let column = format!("{pivot_table}.{foreign_pivot_key}");
                query
                    .join(format!(
                        "INNER JOIN {pivot_table} ON {pivot_table}.{related_pivot_key} = {}",
                        target.qualified(related_key)
                    ))
                    .select_expr(&column, PARENT_KEY_ALIAS)
                    .where_in(&column, keys)
            }
        }
    }
}

/// Maps a request parameter to "has a related row whose column is in the list"
#[derive(Debug, Clone, Copy)]
pub struct RelationArrayFilter {
    /// Parameter name on the wire, e.g. `schools`
    pub param: &'static str,
    /// Relation in the registry
    pub relation: &'static str,
    /// Column of the related table
    pub column: &'static str,
}

/// Eager-loaded targets of one relation
#[derive(Clone)]
pub enum Loaded {
    One(Option<Arc<dyn Shape>>),
    Many(Vec<Arc<dyn Shape>>),
}

impl fmt::Debug for Loaded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loaded::One(target) => f
                .debug_tuple("One")
                .field(&target.as_ref().map(|t| t.type_name()))
                .finish(),
            Loaded::Many(targets) => f
                .debug_tuple("Many")
                .field(&targets.iter().map(|t| t.type_name()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// Relations and relation counts attached to an entity instance.
///
/// Only relations that were explicitly requested are present.
#[derive(Clone, Default)]
pub struct LoadedRelations {
    relations: BTreeMap<&'static str, Loaded>,
    counts: BTreeMap<&'static str, RelationCount>,
}

#[derive(Debug, Clone, Copy)]
struct RelationCount {
    value: i64,
    exposed: bool,
}

impl LoadedRelations {
    pub fn insert(&mut self, name: &'static str, loaded: Loaded) {
        self.relations.insert(name, loaded);
    }

    pub fn get(&self, name: &str) -> Option<&Loaded> {
        self.relations.get(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    /// Record a relation count. Exposed counts appear in output as
    /// `<relation>_count`.
    pub fn set_count(&mut self, name: &'static str, value: i64, exposed: bool) {
        let entry = self
            .counts
            .entry(name)
            .or_insert(RelationCount { value, exposed });
        entry.value = value;
        entry.exposed |= exposed;
    }

    pub fn count(&self, name: &str) -> Option<i64> {
        self.counts.get(name).map(|c| c.value)
    }

    /// Counts the caller asked for, in name order
    pub fn exposed_counts(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        self.counts
            .iter()
            .filter(|(_, c)| c.exposed)
            .map(|(name, c)| (*name, c.value))
    }
}

impl fmt::Debug for LoadedRelations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedRelations")
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("counts", &self.counts)
            .finish()
    }
}

/// Typed loader for relations targeting `T`, referenced from `RelationDef`s.
///
/// Runs one query for every parent key at once, applies the relation's
/// nested request (without pagination), then recurses into the children's
/// own requested relations.
pub fn load_related<'a, T: Entity>(
    pool: &'a SqlitePool,
    relation: &'static RelationDef,
    keys: Vec<SqlValue>,
    request: &'a FilterRequest,
    ctx: &'a RequestContext,
) -> BoxFuture<'a, Result<Vec<(i64, Arc<dyn Shape>)>, QueryError>> {
    Box::pin(async move {
        let composer = QueryComposer::<T>::new();
        let query = relation.constrain(SelectQuery::new(&T::META), keys);
        let query = composer.apply_relation_query(query, request);

        let rows = query.fetch_rows(pool).await?;
        let mut parents = Vec::with_capacity(rows.len());
        let mut children = Vec::with_capacity(rows.len());
        for row in &rows {
            let parent: i64 = row.try_get(PARENT_KEY_ALIAS)?;
            parents.push(parent);
            children.push(composer.decode(row, request)?);
        }

        composer
            .load_relations(pool, &mut children, request, ctx)
            .await?;

        Ok(parents
            .into_iter()
            .zip(children)
            .map(|(parent, child)| (parent, Arc::new(child) as Arc<dyn Shape>))
            .collect())
    })
}
