//! The CRUD facade every caller goes through.

use std::sync::Arc;

use indexmap::IndexMap;
use rusqlite::Connection;
use serde_json::Value;
use tabula_db::{reset, transaction, Database, DbError, SqlValue, Statement};
use tabula_schema::{encode_filter, run_adapters, ChildTable, Direction, Schema};
use tabula_sql::{
    create_table, delete_children, from_sql, insert_children, row_to_record, to_sql, MatchMode,
    SelectOptions,
};
use tabula_types::{Filter, IfExists, Record};

use crate::definition::ModelDefinition;
use crate::error::ModelError;
use crate::options::{FindOptions, UpdateOptions};
use crate::page::{clamp_page, offset, page_count, size_options, PageData, PageOptions, PageQuery};

/// Ids looked up per statement when reading rows back after an insert.
const ID_CHUNK: usize = 500;

/// A table and its child tables, bound to a database.
///
/// Every operation encodes its input, runs the generated statements on a
/// pooled connection off the async runtime, and decodes what comes back.
#[derive(Debug, Clone)]
pub struct Model {
    schema: Arc<Schema>,
    title: String,
    url: String,
    db: Option<Arc<Database>>,
}

impl Model {
    /// Builds the schema without touching a database.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Schema` for any configuration mistake.
    pub fn new(definition: &ModelDefinition) -> Result<Self, ModelError> {
        let schema = definition.build_schema()?;
        Ok(Self {
            schema: Arc::new(schema),
            title: definition.resolved_title(),
            url: definition.resolved_url(),
            db: None,
        })
    }

    /// Builds the schema, opens `db` if needed and creates missing tables.
    pub async fn open(db: Arc<Database>, definition: &ModelDefinition) -> Result<Self, ModelError> {
        let mut model = Self::new(definition)?;
        model.init(db).await?;
        Ok(model)
    }

    /// Binds the model to `db`, opening it if no other model has yet, and
    /// creates missing tables.
    pub async fn init(&mut self, db: Arc<Database>) -> Result<(), ModelError> {
        let handle = Arc::clone(&db);
        tokio::task::spawn_blocking(move || handle.open()).await??;
        self.db = Some(db);
        self.create(false).await?;
        tracing::info!(
            table = %self.schema.table(),
            child_tables = self.schema.child_tables().len(),
            "model initialized"
        );
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn table(&self) -> &str {
        self.schema.table()
    }

    pub fn primary_id(&self) -> &str {
        self.schema.primary_id()
    }

    pub fn child_tables(&self) -> &IndexMap<String, ChildTable> {
        self.schema.child_tables()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> Option<&Arc<Database>> {
        self.db.as_ref()
    }

    /// Creates the table and its child tables. With `overwrite` they are
    /// dropped first.
    pub async fn create(&self, overwrite: bool) -> Result<(), ModelError> {
        self.with_conn(move |conn, schema| {
            reset(conn, &create_table(schema), overwrite)?;
            Ok(())
        })
        .await
    }

    /// Counts rows, or the rows whose `id_key` (the primary key by default)
    /// equals `id`.
    pub async fn count(&self, id: Option<Value>, id_key: Option<&str>) -> Result<u64, ModelError> {
        let key = self.key_or_primary(id_key)?;
        self.with_conn(move |conn, schema| {
            let filter = match id {
                Some(id) => Filter::eq(key, id),
                None => Filter::All,
            };
            count_rows(conn, schema, filter)
        })
        .await
    }

    /// Loads the first row whose id key equals `id`.
    pub async fn get(
        &self,
        id: impl Into<Value>,
        options: FindOptions,
    ) -> Result<Option<Record>, ModelError> {
        let id = id.into();
        if id.is_null() {
            return Err(ModelError::NoId);
        }
        let key = self.key_or_primary(options.id_key.as_deref())?;
        let options = FindOptions {
            limit: Some(1),
            ..options
        };
        Ok(self.find(Filter::eq(key, id), options).await?.into_iter().next())
    }

    /// Loads every row matching `filter`.
    pub async fn find(
        &self,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Vec<Record>, ModelError> {
        self.with_conn(move |conn, schema| read(conn, schema, filter, &options))
            .await
    }

    /// Loads one page of rows. Pages are one-based.
    pub async fn get_page(
        &self,
        page: u64,
        size: u64,
        reverse: bool,
        order_key: Option<&str>,
    ) -> Result<Vec<Record>, ModelError> {
        if size == 0 {
            return Err(ModelError::NoSize);
        }
        let options = FindOptions {
            order_by: order_key.map(str::to_string),
            reverse,
            limit: Some(size),
            offset: Some(offset(page, size)),
            ..FindOptions::default()
        };
        self.find(Filter::All, options).await
    }

    /// Loads a page together with the totals a pager needs. The page is
    /// clamped into range.
    pub async fn get_page_data(
        &self,
        query: PageQuery,
        options: PageOptions,
    ) -> Result<PageData, ModelError> {
        if query.size == 0 {
            return Err(ModelError::NoSize);
        }
        self.with_conn(move |conn, schema| {
            let total = count_rows(conn, schema, Filter::All)?;
            let page_count = page_count(total, query.size);
            let page = clamp_page(query.page, page_count);
            let find = FindOptions {
                order_by: options.order_key,
                reverse: options.reverse,
                limit: Some(query.size),
                offset: Some(offset(page, query.size)),
                raw: options.raw,
                ..FindOptions::default()
            };
            Ok(PageData {
                data: read(conn, schema, Filter::All, &find)?,
                page,
                size: query.size,
                page_count,
                total,
                sizes: size_options(query.size),
            })
        })
        .await
    }

    /// Inserts rows and returns the primary keys of the rows written.
    ///
    /// Declared defaults fill missing columns. Rows skipped by
    /// [`IfExists::Skip`] have no key in the result.
    pub async fn add(&self, rows: Vec<Record>, if_exists: IfExists) -> Result<Vec<Value>, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::NoData);
        }
        self.with_conn(move |conn, schema| insert_rows(conn, schema, rows, if_exists))
            .await
    }

    /// Inserts rows and reads them back.
    pub async fn add_and_return(
        &self,
        rows: Vec<Record>,
        if_exists: IfExists,
    ) -> Result<Vec<Record>, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::NoData);
        }
        self.with_conn(move |conn, schema| {
            let ids = insert_rows(conn, schema, rows, if_exists)?;
            let mut out = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(ID_CHUNK) {
                let filter = Filter::any_of(schema.primary_id(), chunk.iter().cloned());
                out.extend(read(conn, schema, filter, &FindOptions::default())?);
            }
            Ok(out)
        })
        .await
    }

    /// Applies `data` to the single row whose id key equals `id`.
    ///
    /// The parent row is updated first; array columns are then rewritten
    /// in a second transaction.
    ///
    /// # Errors
    ///
    /// `NoId` without an id, `NoData` without changes, `NoEntry` if no row
    /// matches, `MultiAction` if several do, or whatever the change callback
    /// returns.
    pub async fn update(
        &self,
        id: impl Into<Value>,
        data: Record,
        options: UpdateOptions,
    ) -> Result<(), ModelError> {
        let id = id.into();
        if id.is_null() {
            return Err(ModelError::NoId);
        }
        if data.is_empty() {
            return Err(ModelError::NoData);
        }
        let key = self.key_or_primary(options.id_key.as_deref())?;

        self.with_conn(move |conn, schema| {
            let raw = FindOptions {
                raw: true,
                ..FindOptions::default()
            };
            let matched = read(conn, schema, Filter::eq(key.clone(), id.clone()), &raw)?;
            match matched.len() {
                0 => return Err(ModelError::no_entry(&key, &id)),
                1 => {}
                count => {
                    return Err(ModelError::MultiAction {
                        key,
                        id: id.to_string(),
                        count,
                    })
                }
            }

            let mut changes = data;
            if let Some(callback) = &options.on_change {
                let decoded = matched
                    .iter()
                    .cloned()
                    .map(|row| decode(schema, row))
                    .collect::<Result<Vec<_>, _>>()?;
                callback(&decoded, &mut changes)?;
            }

            let mut stored = run_adapters(Direction::Encode, changes, schema)?;
            let arrays = take_arrays(schema, &mut stored);

            let filter = encode_filter(Filter::eq(key.clone(), id.clone()), schema)?;
            if let Some(stmt) = tabula_sql::update(schema, &stored, &filter)? {
                tabula_db::run(conn, &stmt)?;
            }

            if !arrays.is_empty() {
                let primary = schema.primary_id();
                let owner = stored
                    .get(primary)
                    .or_else(|| matched[0].get(primary))
                    .map(to_sql)
                    .unwrap_or(SqlValue::Null);
                let mut statements = Vec::new();
                for (column, items) in &arrays {
                    let child = &schema.child_tables()[column.as_str()];
                    statements.extend(delete_children(child, std::slice::from_ref(&owner)));
                    statements.extend(insert_children(child, &owner, items));
                }
                tabula_db::multi_run(conn, &statements)?;
            }

            tracing::debug!(table = %schema.table(), key = %key, id = %id, "row updated");
            Ok(())
        })
        .await
    }

    /// Deletes the row whose id key equals `id`.
    pub async fn remove(&self, id: impl Into<Value>, id_key: Option<&str>) -> Result<usize, ModelError> {
        self.batch_remove(vec![id.into()], id_key).await
    }

    /// Deletes every listed row in one transaction. Every id must exist.
    pub async fn batch_remove(
        &self,
        ids: Vec<Value>,
        id_key: Option<&str>,
    ) -> Result<usize, ModelError> {
        if ids.is_empty() || ids.iter().any(Value::is_null) {
            return Err(ModelError::NoId);
        }
        let key = self.key_or_primary(id_key)?;

        self.with_conn(move |conn, schema| {
            let mut encoded = Vec::with_capacity(ids.len());
            for id in ids {
                if count_rows(conn, schema, Filter::eq(key.clone(), id.clone()))? == 0 {
                    return Err(ModelError::no_entry(&key, &id));
                }
                encoded.push(encode_value(schema, &key, id)?);
            }
            let statements = tabula_sql::delete(schema, &key, &encoded)?;
            let info = tabula_db::multi_run(conn, &statements)?;
            tracing::debug!(table = %schema.table(), removed = info.changes, "rows removed");
            Ok(info.changes)
        })
        .await
    }

    /// Exchanges the id keys of two rows. If no row has `b`, the row with `a`
    /// is renamed to `b`.
    pub async fn swap(
        &self,
        a: impl Into<Value>,
        b: impl Into<Value>,
        id_key: Option<&str>,
    ) -> Result<(), ModelError> {
        let (a, b) = (a.into(), b.into());
        if a.is_null() || b.is_null() {
            return Err(ModelError::NoId);
        }
        let key = self.key_or_primary(id_key)?;

        self.with_conn(move |conn, schema| {
            if count_rows(conn, schema, Filter::eq(key.clone(), a.clone()))? == 0 {
                return Err(ModelError::no_entry(&key, &a));
            }
            let b_exists = count_rows(conn, schema, Filter::eq(key.clone(), b.clone()))? > 0;
            let statements = tabula_sql::swap(
                schema,
                &key,
                &encode_value(schema, &key, a)?,
                &encode_value(schema, &key, b)?,
                b_exists,
            )?;
            tabula_db::multi_run(conn, &statements)?;
            tracing::debug!(table = %schema.table(), key = %key, renamed = !b_exists, "rows swapped");
            Ok(())
        })
        .await
    }

    /// Runs arbitrary SQL. Nothing here is checked by the injection guard.
    ///
    /// Unless `raw` is set, returned columns that belong to this table are
    /// decoded like any other read.
    pub async fn custom(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
        raw: bool,
    ) -> Result<Vec<Record>, ModelError> {
        let stmt = Statement::with_params(sql, params.iter().map(to_sql).collect());
        self.with_conn(move |conn, schema| {
            tabula_db::all(conn, &stmt)?
                .into_iter()
                .map(row_to_record)
                .map(|record| if raw { Ok(record) } else { decode(schema, record) })
                .collect()
        })
        .await
    }

    /// Canonical name of `key`, or of the primary key when `key` is unset.
    fn key_or_primary(&self, key: Option<&str>) -> Result<String, ModelError> {
        let Some(key) = key else {
            return Ok(self.schema.primary_id().to_string());
        };
        self.schema
            .resolve(key)
            .filter(|column| column.is_stored())
            .map(|column| column.name.clone())
            .ok_or_else(|| ModelError::BadKey {
                table: self.schema.table().to_string(),
                key: key.to_string(),
            })
    }

    /// Runs `f` on a pooled connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, ModelError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &Schema) -> Result<T, ModelError> + Send + 'static,
    {
        let pool = self.db.as_ref().ok_or(DbError::NoDb)?.pool()?;
        let schema = Arc::clone(&self.schema);
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(DbError::from)?;
            f(&conn, &schema)
        })
        .await?
    }
}

fn count_rows(conn: &Connection, schema: &Schema, filter: Filter) -> Result<u64, ModelError> {
    let filter = encode_filter(filter, schema)?;
    let stmt = tabula_sql::count(schema, &filter, MatchMode::Exact)?;
    let count = tabula_db::get(conn, &stmt)?
        .and_then(|row| match row.get("count") {
            Some(SqlValue::Integer(n)) => u64::try_from(*n).ok(),
            _ => None,
        })
        .unwrap_or(0);
    Ok(count)
}

fn read(
    conn: &Connection,
    schema: &Schema,
    filter: Filter,
    options: &FindOptions,
) -> Result<Vec<Record>, ModelError> {
    let filter = encode_filter(filter, schema)?;
    let select = SelectOptions {
        mode: if options.partial {
            MatchMode::Partial
        } else {
            MatchMode::Exact
        },
        order_by: options.order_by.clone(),
        reverse: options.reverse,
        limit: options.limit,
        offset: options.offset,
        with_children: true,
    };
    let stmt = tabula_sql::select(schema, &filter, &select)?;
    tabula_db::all(conn, &stmt)?
        .into_iter()
        .map(row_to_record)
        .map(|record| {
            if options.raw {
                Ok(record)
            } else {
                decode(schema, record)
            }
        })
        .collect()
}

/// Storage → user. A child array with no rows reads as `[]`.
fn decode(schema: &Schema, mut record: Record) -> Result<Record, ModelError> {
    for column in schema.child_tables().keys() {
        if let Some(value) = record.get_mut(column) {
            if value.is_null() {
                *value = Value::Array(Vec::new());
            }
        }
    }
    Ok(run_adapters(Direction::Decode, record, schema)?)
}

fn encode_value(schema: &Schema, key: &str, value: Value) -> Result<Value, ModelError> {
    let mut record = Record::new();
    record.insert(key.to_string(), value);
    let mut encoded = run_adapters(Direction::Encode, record, schema)?;
    Ok(encoded.shift_remove(key).unwrap_or(Value::Null))
}

/// Removes child-array values from an encoded record.
fn take_arrays(schema: &Schema, record: &mut Record) -> Vec<(String, Vec<Value>)> {
    schema
        .child_tables()
        .keys()
        .filter_map(|column| {
            let items = match record.shift_remove(column)? {
                Value::Null => Vec::new(),
                Value::Array(items) => items,
                other => vec![other],
            };
            Some((column.clone(), items))
        })
        .collect()
}

fn insert_rows(
    conn: &Connection,
    schema: &Schema,
    rows: Vec<Record>,
    if_exists: IfExists,
) -> Result<Vec<Value>, ModelError> {
    let mut prepared = Vec::with_capacity(rows.len());
    for mut row in rows {
        schema.apply_defaults(&mut row);
        let mut stored = run_adapters(Direction::Encode, row, schema)?;
        let arrays = take_arrays(schema, &mut stored);
        prepared.push((stored, arrays));
    }
    let count = prepared.len();
    let primary = schema.primary_id();

    let ids = if prepared.iter().all(|(_, arrays)| arrays.is_empty()) {
        let records: Vec<Record> = prepared.into_iter().map(|(record, _)| record).collect();
        let statements = tabula_sql::insert(schema, &records, if_exists)?;
        transaction::<_, ModelError, _>(conn, |conn| {
            let mut ids = Vec::with_capacity(records.len());
            for stmt in &statements {
                for row in tabula_db::all(conn, stmt)? {
                    ids.extend(row.get(primary).cloned().map(from_sql));
                }
            }
            Ok(ids)
        })?
    } else {
        // Child rows need the generated key of their parent, so rows are
        // inserted one at a time.
        transaction::<_, ModelError, _>(conn, |conn| {
            let mut ids = Vec::with_capacity(prepared.len());
            for (record, arrays) in &prepared {
                let statements =
                    tabula_sql::insert(schema, std::slice::from_ref(record), if_exists)?;
                let mut returned = None;
                for stmt in &statements {
                    if let Some(mut row) = tabula_db::get(conn, stmt)? {
                        returned = row.shift_remove(primary);
                    }
                }
                let Some(id) = returned else {
                    if if_exists == IfExists::Skip {
                        continue;
                    }
                    return Err(ModelError::NoPrimary(schema.table().to_string()));
                };

                let mut children = Vec::new();
                for (column, items) in arrays {
                    let child = &schema.child_tables()[column.as_str()];
                    if if_exists == IfExists::Overwrite {
                        children.extend(delete_children(child, std::slice::from_ref(&id)));
                    }
                    children.extend(insert_children(child, &id, items));
                }
                for stmt in &children {
                    tabula_db::run(conn, stmt)?;
                }
                ids.push(from_sql(id));
            }
            Ok(ids)
        })?
    };

    tracing::debug!(
        table = %schema.table(),
        requested = count,
        inserted = ids.len(),
        if_exists = %if_exists,
        "rows added"
    );
    Ok(ids)
}
