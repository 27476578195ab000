//! Generic read-query layer
//!
//! This module provides the building blocks list and show endpoints share:
//!
//! - [`ParamBag`] / [`FilterRequest`]: the untyped query string and its
//!   normalised form
//! - [`EntitySchema`] / [`Entity`]: per-type column metadata (derived) and
//!   relation registry (hand-written)
//! - [`QueryComposer`]: search, filters, relation resolution, sorting and
//!   pagination over one entity type, built from swappable strategies
//! - [`SelectQuery`]: the parameterized SQL builder underneath
//!
//! # Example
//!
//! ```rust,ignore
//! let request = FilterRequest::from_params(&ParamBag::from_query("search=algo&relations=classroom"));
//! let page = QueryComposer::<Course>::new()
//!     .with_limits(config.page_limits())
//!     .paginate(db.pool(), &request, &ctx)
//!     .await?;
//! ```

mod builder;
mod composer;
mod entity;
mod pagination;
mod params;
mod relations;
mod request;
pub mod strategy;
mod value;

pub use builder::SelectQuery;
pub use composer::QueryComposer;
pub use entity::{ColumnDef, ColumnKind, Entity, EntityMeta, EntitySchema};
pub use pagination::{Page, PageLimits, PageMeta};
pub use params::{ParamBag, ParamMap, ParamValue};
pub use relations::{
    Loaded, LoadedRelations, RelationArrayFilter, RelationDef, RelationKind, RelationLoader,
    load_related,
};
pub use request::{
    FieldSelection, FilterRequest, PageSize, RequestContext, SortDirection, SortDirective,
};
pub use value::SqlValue;
