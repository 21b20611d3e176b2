//! Schema-driven models for the Tabula engine.
//!
//! A [`Model`] is built from a [`ModelDefinition`], bound to a shared
//! [`Database`](tabula_db::Database), and then used for every read and write
//! against its table. Array columns live in child tables that the model
//! creates, joins, and rewrites on its own.
//!
//! Statements run on pooled connections inside
//! `tokio::task::spawn_blocking`, so every operation is `async` and safe to
//! call from any number of tasks at once.

mod definition;
mod error;
mod model;
mod options;
mod page;

pub use definition::ModelDefinition;
pub use error::ModelError;
pub use model::Model;
pub use options::{ChangeCallback, FindOptions, UpdateOptions};
pub use page::{clamp_page, page_count, size_options, PageData, PageOptions, PageQuery};
