//! Per-call options for reads and updates.

use std::fmt;
use std::sync::Arc;

use tabula_types::Record;

use crate::error::ModelError;

/// Options for [`Model::get`](crate::Model::get) and
/// [`Model::find`](crate::Model::find).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Use type-dependent fuzzy matching instead of equality.
    pub partial: bool,
    /// Sort column; the primary key when unset.
    pub order_by: Option<String>,
    pub reverse: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Return storage values: no decoding, hidden columns kept, empty
    /// arrays left as `null`.
    pub raw: bool,
    /// Column `get` looks the id up in; the primary key when unset.
    pub id_key: Option<String>,
}

/// Called with the rows an update matched and the pending changes.
///
/// The callback may rewrite the changes; returning an error vetoes the
/// update.
pub type ChangeCallback = Arc<dyn Fn(&[Record], &mut Record) -> Result<(), ModelError> + Send + Sync>;

/// Options for [`Model::update`](crate::Model::update).
#[derive(Clone, Default)]
pub struct UpdateOptions {
    /// Column the id is looked up in; the primary key when unset.
    pub id_key: Option<String>,
    pub on_change: Option<ChangeCallback>,
}

impl UpdateOptions {
    pub fn id_key(mut self, key: impl Into<String>) -> Self {
        self.id_key = Some(key.into());
        self
    }

    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[Record], &mut Record) -> Result<(), ModelError> + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for UpdateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateOptions")
            .field("id_key", &self.id_key)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}
