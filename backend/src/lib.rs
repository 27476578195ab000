//! LearnHub backend - read API for the learning-management system
//!
//! List and show endpoints share one query pipeline: a [`query::QueryComposer`]
//! turns request parameters into filtered, sorted, paginated SQL with eager
//! loaded relations, and a [`resource::ResourceShaper`] projects the result
//! onto the requested fields.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod query;
pub mod resource;

pub use app::{AppState, build_app};
