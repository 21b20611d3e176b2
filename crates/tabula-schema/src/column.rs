//! Column declarations and their resolved form.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tabula_types::ColumnType;

use crate::adapter::{default_adapter, default_array_adapter, Adapter, ArrayLayout};
use crate::error::SchemaError;
use crate::guard::check_storage_type;

/// Numeric bounds on a value, or on the length of a string or array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Limits declared on a column.
///
/// Array columns may bound the array and its elements separately.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Limits {
    Bounds(Bounds),
    Array {
        #[serde(default)]
        array: Option<Bounds>,
        #[serde(default)]
        elem: Option<Bounds>,
    },
}

impl Limits {
    /// Bounds that apply to each element of an array column.
    pub fn element(&self) -> Option<Bounds> {
        match self {
            Self::Array { elem, .. } => *elem,
            Self::Bounds(_) => None,
        }
    }

    /// Bounds that apply to the value as a whole.
    pub fn outer(&self) -> Option<Bounds> {
        match self {
            Self::Array { array, .. } => *array,
            Self::Bounds(bounds) => Some(*bounds),
        }
    }
}

/// An explicit storage mapping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StorageDecl {
    /// `false` keeps the column out of the table; `true` derives as usual.
    Enabled(bool),
    /// A literal storage type such as `VARCHAR(64) NOT NULL`.
    Explicit(String),
}

/// A column as written in a model definition.
///
/// Every flag is optional. Flags left unset are derived when the schema is
/// built; flags that are set are never overwritten.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnDecl {
    /// Compact type string, `type[*][[]][?]`.
    #[serde(rename = "type", alias = "typeStr", alias = "type_str")]
    pub type_str: Option<String>,
    #[serde(alias = "isOptional")]
    pub optional: Option<bool>,
    #[serde(alias = "isArray")]
    pub array: Option<bool>,
    #[serde(alias = "hasSpaces")]
    pub has_spaces: Option<bool>,
    pub limits: Option<Limits>,
    pub default: Option<Value>,
    #[serde(alias = "isPrimary")]
    pub primary: bool,
    /// UI hint for form rendering.
    pub html: Option<String>,
    pub db: Option<StorageDecl>,
    #[serde(alias = "dbOnly")]
    pub db_only: bool,
    #[serde(alias = "isBitmap")]
    pub bitmap: bool,
    #[serde(alias = "isHTML")]
    pub is_html: bool,
    pub hidden: bool,
    #[serde(skip)]
    pub decoder: Option<Arc<dyn Adapter>>,
    #[serde(skip)]
    pub encoder: Option<Arc<dyn Adapter>>,
}

impl ColumnDecl {
    /// A declaration with the given type string and nothing else.
    pub fn new(type_str: impl Into<String>) -> Self {
        Self {
            type_str: Some(type_str.into()),
            ..Self::default()
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn bitmap(mut self) -> Self {
        self.bitmap = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_storage(mut self, storage: StorageDecl) -> Self {
        self.db = Some(storage);
        self
    }

    pub fn with_decoder(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.decoder = Some(adapter);
        self
    }

    pub fn with_encoder(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.encoder = Some(adapter);
        self
    }
}

/// The flags encoded in a compact type string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeSpec {
    pub ty: ColumnType,
    pub has_spaces: bool,
    pub array: bool,
    pub optional: bool,
}

impl TypeSpec {
    /// The type given to a primary key declared without one.
    pub const PRIMARY_DEFAULT: TypeSpec = TypeSpec {
        ty: ColumnType::Int,
        has_spaces: false,
        array: false,
        optional: false,
    };
}

/// Parses `type[*][[]][?]`. Suffixes may appear in any order.
///
/// # Errors
///
/// Returns `SchemaError::UnknownType` if the base type is not recognized.
pub fn parse_type_str(column: &str, type_str: &str) -> Result<TypeSpec, SchemaError> {
    let mut rest = type_str.trim();
    let (mut has_spaces, mut array, mut optional) = (false, false, false);

    loop {
        if let Some(stripped) = rest.strip_suffix('?') {
            optional = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_suffix("[]") {
            array = true;
            rest = stripped;
        } else if let Some(stripped) = rest.strip_suffix('*') {
            has_spaces = true;
            rest = stripped;
        } else {
            break;
        }
        rest = rest.trim_end();
    }

    let ty = rest.parse::<ColumnType>().map_err(|_| SchemaError::UnknownType {
        column: column.to_string(),
        type_str: type_str.to_string(),
    })?;

    Ok(TypeSpec {
        ty,
        has_spaces,
        array,
        optional,
    })
}

/// A fully resolved column.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub optional: bool,
    pub array: bool,
    pub has_spaces: bool,
    pub limits: Option<Limits>,
    pub default: Option<Value>,
    pub primary: bool,
    /// Storage type of the parent-table column, `None` if there is none.
    pub storage: Option<String>,
    pub ui_hint: Option<String>,
    pub db_only: bool,
    pub bitmap: bool,
    pub is_html: bool,
    pub hidden: bool,
    pub decoder: Option<Arc<dyn Adapter>>,
    pub encoder: Option<Arc<dyn Adapter>>,
}

impl Column {
    /// Resolves a declaration within `table`.
    pub(crate) fn resolve(
        table: &str,
        name: &str,
        decl: ColumnDecl,
        delimiter: &str,
    ) -> Result<Self, SchemaError> {
        let spec = match decl.type_str.as_deref() {
            Some(type_str) => parse_type_str(name, type_str)?,
            None if decl.primary => TypeSpec::PRIMARY_DEFAULT,
            None => return Err(SchemaError::MissingType(name.to_string())),
        };

        let ty = spec.ty;
        let optional = decl.optional.unwrap_or(spec.optional);
        let array = decl.array.unwrap_or(spec.array);
        let has_spaces = decl.has_spaces.unwrap_or(spec.has_spaces);

        let invalid = |reason| SchemaError::InvalidFlag {
            column: name.to_string(),
            reason,
        };
        if has_spaces && ty != ColumnType::String {
            return Err(invalid("hasSpaces requires type string"));
        }
        if decl.bitmap && ty != ColumnType::Int {
            return Err(invalid("isBitmap requires type int"));
        }
        if decl.is_html && !(ty == ColumnType::String && has_spaces) {
            return Err(invalid("isHTML requires type string with hasSpaces"));
        }
        if decl.primary && array {
            return Err(SchemaError::ArrayPrimary {
                table: table.to_string(),
                column: name.to_string(),
            });
        }

        let storage = match decl.db {
            Some(StorageDecl::Enabled(false)) => None,
            Some(StorageDecl::Explicit(explicit)) => {
                Some(check_storage_type(&explicit, name)?.to_string())
            }
            Some(StorageDecl::Enabled(true)) | None if array => None,
            Some(StorageDecl::Enabled(true)) | None => {
                Some(derive_storage(ty, optional, decl.primary))
            }
        };

        let ui_hint = decl.html.or_else(|| {
            (!decl.primary && !decl.db_only).then(|| ty.ui_hint().to_string())
        });

        let (decoder, encoder) = if decl.bitmap {
            (decl.decoder, decl.encoder)
        } else {
            let fallback = if array {
                let layout = match storage {
                    None => ArrayLayout::Child {
                        delimiter: delimiter.to_string(),
                    },
                    Some(_) => ArrayLayout::Inline,
                };
                Some(default_array_adapter(ty, layout))
            } else {
                default_adapter(ty)
            };
            (
                decl.decoder.or_else(|| fallback.clone()),
                decl.encoder.or(fallback),
            )
        };

        Ok(Self {
            name: name.to_string(),
            ty,
            optional,
            array,
            has_spaces,
            limits: decl.limits,
            default: decl.default,
            primary: decl.primary,
            storage,
            ui_hint,
            db_only: decl.db_only,
            bitmap: decl.bitmap,
            is_html: decl.is_html,
            hidden: decl.hidden,
            decoder,
            encoder,
        })
    }

    /// Whether this array column is stored in its own child table.
    pub fn is_child_array(&self) -> bool {
        self.array && self.storage.is_none()
    }

    /// Whether values of this column live in the parent table.
    pub fn is_stored(&self) -> bool {
        self.storage.is_some()
    }
}

fn derive_storage(ty: ColumnType, optional: bool, primary: bool) -> String {
    let affinity = ty.affinity();
    if primary {
        format!("{affinity} PRIMARY KEY")
    } else if optional {
        affinity.to_string()
    } else {
        format!("{affinity} NOT NULL")
    }
}
