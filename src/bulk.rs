//! Bulk write engine.
//!
//! Turns a batch of homogeneous records into as few parameterized statements
//! as the per-statement bound parameter ceiling allows. Brands and models are
//! insert-if-absent; rebates and products are upserted by id. Deletes use
//! `DELETE ... WHERE id IN (...)` under the same chunking.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;

use metrics::counter;
use sea_orm::sea_query::{Alias, Expr, InsertStatement, OnConflict, Query, SimpleExpr};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement, Value};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::catalog::Catalog;

/// Which of a catalog's four tables a record targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Brands,
    Models,
    Rebates,
    Products,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Keep the stored row when the key already exists.
    InsertOrIgnore,
    /// Overwrite every non-key column when the key already exists.
    InsertOrReplace,
}

impl TableKind {
    fn suffix(&self) -> &'static str {
        match self {
            TableKind::Brands => "brands",
            TableKind::Models => "models",
            TableKind::Rebates => "rebates",
            TableKind::Products => "products",
        }
    }

    pub fn table_name(&self, catalog: Catalog) -> String {
        format!("{}_{}", catalog.table_prefix(), self.suffix())
    }

    pub fn policy(&self) -> WritePolicy {
        match self {
            TableKind::Brands | TableKind::Models => WritePolicy::InsertOrIgnore,
            TableKind::Rebates | TableKind::Products => WritePolicy::InsertOrReplace,
        }
    }
}

/// A row that can be written by [`BulkWriter::bulk_write`].
///
/// `values()` must yield exactly one value per entry of `COLUMNS`, in order.
pub trait BulkRecord {
    const KIND: TableKind;
    const COLUMNS: &'static [&'static str];
    /// Unique column used as the conflict target.
    const KEY_COLUMN: &'static str;

    /// Value of `KEY_COLUMN` for this record.
    fn key(&self) -> &str;
    fn values(&self) -> Vec<Value>;
}

/// One record per key, in first-seen order. A repeated key keeps its last
/// occurrence.
///
/// Postgres refuses an `ON CONFLICT DO UPDATE` that touches the same row twice
/// in one statement.
pub fn last_per_key<R: BulkRecord>(records: &[R]) -> Vec<&R> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<&R> = Vec::with_capacity(records.len());
    for record in records {
        match positions.entry(record.key()) {
            Entry::Occupied(slot) => unique[*slot.get()] = record,
            Entry::Vacant(slot) => {
                slot.insert(unique.len());
                unique.push(record);
            }
        }
    }
    unique
}

#[derive(Debug, Error)]
pub enum BulkWriteError {
    #[error("{table}: record needs {params} bound parameters but a statement allows {max}")]
    RecordTooWide {
        table: String,
        params: usize,
        max: usize,
    },
    #[error("{table}: failed to build statement: {message}")]
    Build { table: String, message: String },
    #[error("{table}: statement failed: {source}")]
    Database {
        table: String,
        #[source]
        source: DbErr,
    },
}

/// Outcome of a chunked write. Failed chunks do not stop later chunks.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub records: usize,
    pub statements: usize,
    pub failures: Vec<BulkWriteError>,
}

impl WriteReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// First failure, if any chunk failed.
    pub fn into_result(self) -> Result<WriteReport, BulkWriteError> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        let WriteReport { mut failures, .. } = self;
        Err(failures.swap_remove(0))
    }
}

/// `floor(max_params / params_per_record)`, never less than one.
pub fn max_items_per_statement(params_per_record: usize, max_params: usize) -> usize {
    (max_params / params_per_record.max(1)).max(1)
}

/// Feeds `items` to `handler` in consecutive slices of at most `max_items`.
///
/// Every slice is attempted; failures are collected into the report.
pub async fn execute_chunked<'a, T, F, Fut>(
    items: &'a [T],
    max_items: usize,
    mut handler: F,
) -> WriteReport
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Result<(), BulkWriteError>>,
{
    let chunk_size = max_items.max(1);
    let mut report = WriteReport {
        records: items.len(),
        ..WriteReport::default()
    };

    let mut remaining = items;
    while !remaining.is_empty() {
        let (chunk, rest) = remaining.split_at(chunk_size.min(remaining.len()));
        report.statements += 1;
        if let Err(err) = handler(chunk).await {
            report.failures.push(err);
        }
        remaining = rest;
    }

    report
}

/// Chunked writer over one database connection.
#[derive(Debug, Clone)]
pub struct BulkWriter {
    db: DatabaseConnection,
    max_params: usize,
}

impl BulkWriter {
    pub fn new(db: DatabaseConnection, max_params: usize) -> Self {
        Self { db, max_params }
    }

    pub fn max_params(&self) -> usize {
        self.max_params
    }

    /// Writes `records` into the catalog's table for `R::KIND` using that
    /// kind's [`WritePolicy`].
    #[instrument(skip_all, fields(catalog = %catalog, kind = ?R::KIND, records = records.len()))]
    pub async fn bulk_write<R>(&self, catalog: Catalog, records: &[R]) -> WriteReport
    where
        R: BulkRecord + Sync,
    {
        let table = R::KIND.table_name(catalog);
        let Some(first) = records.first() else {
            return WriteReport::default();
        };

        let params_per_record = first.values().len();
        if params_per_record > self.max_params {
            let err = BulkWriteError::RecordTooWide {
                table: table.clone(),
                params: params_per_record,
                max: self.max_params,
            };
            warn!(table = %table, error = %err, "Record does not fit in a single statement");
            return WriteReport {
                records: records.len(),
                statements: 0,
                failures: vec![err],
            };
        }

        let rows: Vec<&R> = match R::KIND.policy() {
            WritePolicy::InsertOrReplace => last_per_key(records),
            WritePolicy::InsertOrIgnore => records.iter().collect(),
        };
        if rows.len() < records.len() {
            debug!(table = %table, repeated = records.len() - rows.len(), "Collapsed repeated keys");
        }

        let max_items = max_items_per_statement(params_per_record, self.max_params);
        let table_ref = table.as_str();
        let report = execute_chunked(rows.as_slice(), max_items, |chunk| async move {
            let insert = build_insert(table_ref, chunk)?;
            let stmt = self.db.get_database_backend().build(&insert);
            self.run_statement(table_ref, stmt).await
        })
        .await;

        debug!(
            table = %table,
            statements = report.statements,
            failed = report.failures.len(),
            "Bulk write finished"
        );
        report
    }

    /// Deletes rows of `kind` whose id is in `ids`. Deleting rebates also
    /// clears `rebate_id` on this catalog's products that referenced them.
    #[instrument(skip_all, fields(catalog = %catalog, kind = ?kind, ids = ids.len()))]
    pub async fn delete_by_ids(&self, catalog: Catalog, kind: TableKind, ids: &[String]) -> WriteReport {
        let table = kind.table_name(catalog);
        let products = TableKind::Products.table_name(catalog);
        let table_ref = table.as_str();
        let products_ref = products.as_str();
        let max_items = max_items_per_statement(1, self.max_params);

        execute_chunked(ids, max_items, |chunk| async move {
            let backend = self.db.get_database_backend();
            if kind == TableKind::Rebates {
                let clear = Query::update()
                    .table(Alias::new(products_ref))
                    .value(Alias::new("rebate_id"), Option::<String>::None)
                    .and_where(Expr::col(Alias::new("rebate_id")).is_in(chunk.iter().cloned()))
                    .to_owned();
                self.run_statement(products_ref, backend.build(&clear)).await?;
            }

            let delete = Query::delete()
                .from_table(Alias::new(table_ref))
                .and_where(Expr::col(Alias::new("id")).is_in(chunk.iter().cloned()))
                .to_owned();
            self.run_statement(table_ref, backend.build(&delete)).await
        })
        .await
    }

    /// Every id currently stored in the catalog's table for `kind`.
    pub async fn stored_ids(&self, catalog: Catalog, kind: TableKind) -> Result<Vec<String>, BulkWriteError> {
        let table = kind.table_name(catalog);
        let select = Query::select()
            .column(Alias::new("id"))
            .from(Alias::new(table.as_str()))
            .to_owned();
        let stmt = self.db.get_database_backend().build(&select);

        let rows = self
            .db
            .query_all(stmt)
            .await
            .map_err(|source| BulkWriteError::Database {
                table: table.clone(),
                source,
            })?;

        rows.iter()
            .map(|row| row.try_get::<String>("", "id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| BulkWriteError::Database { table, source })
    }

    async fn run_statement(&self, table: &str, stmt: Statement) -> Result<(), BulkWriteError> {
        match self.db.execute(stmt).await {
            Ok(_) => Ok(()),
            Err(source) => {
                counter!("catalog_bulk_chunks_failed_total", "table" => table.to_string())
                    .increment(1);
                warn!(table = %table, error = %source, "Bulk statement failed");
                Err(BulkWriteError::Database {
                    table: table.to_string(),
                    source,
                })
            }
        }
    }
}

fn build_insert<R: BulkRecord>(table: &str, chunk: &[&R]) -> Result<InsertStatement, BulkWriteError> {
    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(table))
        .columns(R::COLUMNS.iter().map(|column| Alias::new(*column)));

    for record in chunk {
        insert
            .values(record.values().into_iter().map(SimpleExpr::from))
            .map_err(|err| BulkWriteError::Build {
                table: table.to_string(),
                message: err.to_string(),
            })?;
    }

    let mut target = OnConflict::column(Alias::new(R::KEY_COLUMN));
    let on_conflict = match R::KIND.policy() {
        WritePolicy::InsertOrIgnore => target.do_nothing().to_owned(),
        WritePolicy::InsertOrReplace => target
            .update_columns(
                R::COLUMNS
                    .iter()
                    .filter(|column| **column != R::KEY_COLUMN)
                    .map(|column| Alias::new(*column)),
            )
            .to_owned(),
    };
    insert.on_conflict(on_conflict);

    Ok(insert)
}
