//! SQL builder for the Tabula engine.
//!
//! Pure functions from a [`Schema`](tabula_schema::Schema) and call
//! arguments to [`Statement`](tabula_db::Statement)s: selects that join
//! child tables back into their parent rows, counts, chunked multi-row
//! inserts, updates, deletes and key swaps, plus the table definitions the
//! executor creates.
//!
//! Values are always bound as parameters. The only text written into
//! statements is table and column names taken from the schema, which the
//! injection guard has already checked, and the schema's delimiter.

mod ddl;
mod error;
mod filter;
mod select;
mod value;
mod write;

pub use ddl::create_table;
pub use error::BuildError;
pub use filter::{escape_like, MatchMode};
pub use select::{count, select, SelectOptions};
pub use value::{from_sql, row_to_record, to_sql, to_text};
pub use write::{delete, delete_children, insert, insert_children, swap, update, MAX_PARAMS};
