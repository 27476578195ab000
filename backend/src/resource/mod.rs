//! Resource shaping
//!
//! Every entity type lists the fields it can expose (including computed
//! ones) through [`Resource`]. The [`ResourceShaper`] projects a loaded
//! entity graph onto the caller's field selections without touching the
//! database.

mod shaper;
mod storage;

pub use shaper::{ResourceShaper, ShapePlan};
pub use storage::{PublicStorage, UrlResolver};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::query::{Entity, EntitySchema, LoadedRelations};

/// Output format of every timestamp field
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One exposable field of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// A plain value, already serialized
    Value(Value),
    /// A relation of the same name, emitted only when it was eager-loaded
    Relation,
}

impl Field {
    pub fn value<T: Serialize>(value: T) -> Self {
        Field::Value(serde_json::to_value(value).unwrap_or(Value::Null))
    }

    pub fn timestamp(value: &DateTime<Utc>) -> Self {
        Field::Value(Value::String(value.format(TIMESTAMP_FORMAT).to_string()))
    }

    pub fn optional_timestamp(value: Option<&DateTime<Utc>>) -> Self {
        value.map_or(Field::Value(Value::Null), Field::timestamp)
    }
}

/// The full, ordered list of fields an entity type can expose.
pub trait Resource {
    fn to_fields(&self, urls: &dyn UrlResolver) -> Vec<(&'static str, Field)>;
}

/// Object-safe view of a loaded entity, used for nested relations.
pub trait Shape: Send + Sync {
    /// snake_case type name, matching `<type>_resource` selections
    fn type_name(&self) -> &'static str;

    fn resource_fields(&self, urls: &dyn UrlResolver) -> Vec<(&'static str, Field)>;

    fn loaded_relations(&self) -> &LoadedRelations;
}

impl<T: Entity> Shape for T {
    fn type_name(&self) -> &'static str {
        T::META.type_name
    }

    fn resource_fields(&self, urls: &dyn UrlResolver) -> Vec<(&'static str, Field)> {
        self.to_fields(urls)
    }

    fn loaded_relations(&self) -> &LoadedRelations {
        self.loaded()
    }
}
