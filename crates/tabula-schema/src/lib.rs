//! Schema layer for the Tabula engine.
//!
//! Turns compact column declarations into a validated [`Schema`]: the
//! injection guard for every name that ends up in SQL text, the type-string
//! parser, primary-key derivation, child tables for array columns, and the
//! per-column adapters that convert values between user and storage form.
//!
//! Everything here is pure; no function touches the database.

mod adapter;
mod children;
mod column;
mod error;
mod guard;
mod pipeline;
mod reserved;
mod schema;

pub use adapter::{
    coerce_bool, default_adapter, default_array_adapter, from_text, Adapter, AdapterResult,
    ArrayAdapter, ArrayLayout, BooleanAdapter, DateAdapter, DecodeFn, EncodeFn, FloatAdapter,
    IntAdapter, ObjectAdapter,
};
pub use children::ChildTable;
pub use column::{parse_type_str, Bounds, Column, ColumnDecl, Limits, StorageDecl, TypeSpec};
pub use error::{AdapterError, SchemaError};
pub use guard::{check_delimiter, check_identifier, check_storage_type, check_value};
pub use pipeline::{encode_filter, run_adapters, Direction};
pub use schema::{Schema, SchemaOptions, TableKind};
