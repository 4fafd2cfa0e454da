//! SQLite implementation of the backend contract.
//!
//! # Responsibility
//! - Translate entity-level operations into parameterized SQL.
//! - Drive `BEGIN`/`COMMIT`/`ROLLBACK`, using savepoints when `begin` is
//!   called on a handle that is itself an active transaction.
//!
//! # Invariants
//! - Every operation overwrites the handle's `BackendState`.
//! - Table and column names are validated before they reach SQL text; all
//!   values are bound parameters.
//! - A transaction handle dropped while still active is rolled back.
//! - Only one top-level transaction is open per connection; a second
//!   `begin` from outside it fails with `TransactionBusy`.
//! - Commit and rollback ignore the context so cleanup always runs.

use super::{Backend, BackendState};
use crate::context::Context;
use crate::db::{open_db, open_db_in_memory, BackendConfig, DbError, DbResult};
use crate::model::condition::{render, Condition, RenderedFilter};
use crate::model::entity::{is_zero_key, validate_identifier, Entity};
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use uuid::Uuid;

struct Shared {
    conn: Mutex<Connection>,
    config: BackendConfig,
}

struct TxScope {
    /// `None` for the outermost transaction.
    savepoint: Option<String>,
    active: bool,
}

impl TxScope {
    fn commit_sql(&self) -> String {
        match &self.savepoint {
            Some(name) => format!("RELEASE SAVEPOINT {name};"),
            None => "COMMIT;".to_string(),
        }
    }

    fn rollback_sql(&self) -> String {
        match &self.savepoint {
            Some(name) => format!("ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name};"),
            None => "ROLLBACK;".to_string(),
        }
    }
}

/// Backend handle over one shared SQLite connection.
///
/// The root handle comes from `open`, `open_in_memory` or `from_connection`;
/// `begin()` derives transaction handles that share the same connection.
pub struct SqliteBackend {
    shared: Arc<Shared>,
    ctx: Context,
    state: BackendState,
    tx: Option<TxScope>,
}

impl SqliteBackend {
    pub fn from_connection(conn: Connection, config: BackendConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                conn: Mutex::new(conn),
                config,
            }),
            ctx: Context::background(),
            state: BackendState::default(),
            tx: None,
        }
    }

    pub fn open(path: impl AsRef<Path>, config: &BackendConfig) -> DbResult<Self> {
        let conn = open_db(path, config)?;
        Ok(Self::from_connection(conn, config.clone()))
    }

    pub fn open_in_memory(config: &BackendConfig) -> DbResult<Self> {
        let conn = open_db_in_memory(config)?;
        Ok(Self::from_connection(conn, config.clone()))
    }

    /// Creates the entity's table when it does not exist yet.
    ///
    /// Only additive: existing tables are left untouched.
    pub fn auto_migrate<T: Entity>(&self) -> DbResult<()> {
        let table = validate_identifier(T::TABLE)?;
        let mut definitions = Vec::with_capacity(T::COLUMNS.len());
        for column in T::COLUMNS {
            let name = validate_identifier(column.name)?;
            if name == T::PRIMARY_KEY {
                definitions.push(format!("{name} {} PRIMARY KEY", column.sql_type));
            } else {
                definitions.push(format!("{name} {}", column.sql_type));
            }
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} ({});",
            definitions.join(", ")
        );
        lock(&self.shared).execute_batch(&sql)?;
        debug!("event=db_auto_migrate module=backend status=ok table={table}");
        Ok(())
    }

    /// Runs `f` against the underlying connection.
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&lock(&self.shared))
    }

    /// Whether this handle is a transaction that has not been finished.
    pub fn in_transaction(&self) -> bool {
        self.tx.as_ref().is_some_and(|scope| scope.active)
    }

    fn run(&mut self, event: &str, table: &str, op: impl FnOnce(&Connection) -> DbResult<u64>) {
        let started_at = Instant::now();
        let outcome = self.ctx.check().and_then(|()| {
            let conn = lock(&self.shared);
            let busy_timeout = match self.ctx.remaining() {
                Some(left) => left.min(self.shared.config.busy_timeout()),
                None => self.shared.config.busy_timeout(),
            };
            conn.busy_timeout(busy_timeout)?;
            op(&conn)
        });

        match &outcome {
            Ok(rows) => debug!(
                "event={event} module=backend status=ok table={table} rows={rows} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(DbError::RecordNotFound) => debug!(
                "event={event} module=backend status=not_found table={table} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={event} module=backend status=error table={table} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        self.state.record(outcome);
    }

    fn finish(&mut self, commit: bool) {
        let event = if commit { "tx_commit" } else { "tx_rollback" };
        let outcome = match self.tx.as_mut() {
            Some(scope) if scope.active => {
                let sql = if commit {
                    scope.commit_sql()
                } else {
                    scope.rollback_sql()
                };
                let result = lock(&self.shared).execute_batch(&sql);
                // A failed commit leaves the transaction open for rollback.
                if !commit || result.is_ok() {
                    scope.active = false;
                }
                result.map(|()| 0).map_err(DbError::from)
            }
            _ => Err(DbError::InvalidTransaction),
        };

        match &outcome {
            Ok(_) => debug!("event={event} module=backend status=ok"),
            Err(err) => warn!("event={event} module=backend status=error error={err}"),
        }
        self.state.record(outcome);
    }
}

impl Backend for SqliteBackend {
    fn with_context(&mut self, ctx: &Context) {
        self.ctx = ctx.clone();
        self.state.record(Ok(0));
    }

    fn create<T: Entity>(&mut self, value: &mut T) {
        self.run("db_create", T::TABLE, |conn| insert(conn, value));
    }

    fn find<T: Entity>(&mut self, out: &mut Vec<T>, conditions: &[Condition]) {
        out.clear();
        self.run("db_find", T::TABLE, |conn| {
            select(conn, conditions, "", |row| out.push(row))
        });
    }

    fn first<T: Entity>(&mut self, out: &mut T, conditions: &[Condition]) {
        self.run("db_first", T::TABLE, |conn| {
            let tail = format!(" ORDER BY {} ASC LIMIT 1", validate_identifier(T::PRIMARY_KEY)?);
            let found = select(conn, conditions, &tail, |row| *out = row)?;
            if found == 0 {
                return Err(DbError::RecordNotFound);
            }
            Ok(found)
        });
    }

    fn save<T: Entity>(&mut self, value: &mut T) {
        self.run("db_save", T::TABLE, |conn| {
            if is_zero_key(&value.primary_key()) {
                insert(conn, value)
            } else {
                upsert(conn, value)
            }
        });
    }

    fn delete<T: Entity>(&mut self, value: &T, conditions: &[Condition]) {
        self.run("db_delete", T::TABLE, |conn| remove(conn, value, conditions));
    }

    fn begin(&mut self) -> Self {
        let mut handle = Self {
            shared: Arc::clone(&self.shared),
            ctx: self.ctx.clone(),
            state: BackendState::default(),
            tx: None,
        };

        let nested = self.in_transaction();
        let opened = self.ctx.check().and_then(|()| {
            let conn = lock(&self.shared);
            if nested {
                let name = format!("sp_{}", Uuid::new_v4().simple());
                conn.execute_batch(&format!("SAVEPOINT {name};"))?;
                Ok(Some(name))
            } else if conn.is_autocommit() {
                conn.execute_batch("BEGIN;")?;
                Ok(None)
            } else {
                // Another handle owns the open transaction.
                Err(DbError::TransactionBusy)
            }
        });

        match opened {
            Ok(savepoint) => {
                debug!(
                    "event=tx_begin module=backend status=ok nested={}",
                    savepoint.is_some()
                );
                handle.tx = Some(TxScope {
                    savepoint,
                    active: true,
                });
            }
            Err(err) => {
                warn!("event=tx_begin module=backend status=error error={err}");
                handle.state = BackendState::failed(err);
            }
        }
        handle
    }

    fn commit(&mut self) {
        self.finish(true);
    }

    fn rollback(&mut self) {
        self.finish(false);
    }

    fn state(&self) -> &BackendState {
        &self.state
    }
}

impl Drop for SqliteBackend {
    fn drop(&mut self) {
        let Some(scope) = self.tx.as_mut() else {
            return;
        };
        if !scope.active {
            return;
        }
        scope.active = false;

        warn!("event=tx_abandoned module=backend status=rollback");
        if let Err(err) = lock(&self.shared).execute_batch(&scope.rollback_sql()) {
            error!("event=tx_abandoned module=backend status=error error={err}");
        }
    }
}

// The connection stays usable after a panic in another holder of the lock.
fn lock(shared: &Shared) -> MutexGuard<'_, Connection> {
    shared.conn.lock().unwrap_or_else(PoisonError::into_inner)
}

fn insert<T: Entity>(conn: &Connection, value: &mut T) -> DbResult<u64> {
    let table = validate_identifier(T::TABLE)?;
    let generated = is_zero_key(&value.primary_key());

    let mut columns = Vec::with_capacity(T::COLUMNS.len());
    let mut args = Vec::with_capacity(T::COLUMNS.len());
    for (column, arg) in T::COLUMNS.iter().zip(value.to_values()) {
        if generated && column.name == T::PRIMARY_KEY {
            continue;
        }
        columns.push(validate_identifier(column.name)?);
        args.push(arg);
    }

    let sql = if columns.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES;")
    } else {
        format!(
            "INSERT INTO {table} ({}) VALUES ({});",
            columns.join(", "),
            placeholders(args.len())
        )
    };
    let changed = conn.execute(&sql, params_from_iter(args))?;

    if generated {
        value.set_generated_key(conn.last_insert_rowid());
    }
    Ok(changed as u64)
}

fn upsert<T: Entity>(conn: &Connection, value: &T) -> DbResult<u64> {
    let table = validate_identifier(T::TABLE)?;
    let key = validate_identifier(T::PRIMARY_KEY)?;

    let mut columns = Vec::with_capacity(T::COLUMNS.len());
    let mut updates = Vec::new();
    for column in T::COLUMNS {
        let name = validate_identifier(column.name)?;
        columns.push(name);
        if name != key {
            updates.push(format!("{name} = excluded.{name}"));
        }
    }

    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT({key}) {on_conflict};",
        columns.join(", "),
        placeholders(columns.len())
    );
    let changed = conn.execute(&sql, params_from_iter(value.to_values()))?;
    Ok(changed as u64)
}

fn select<T: Entity>(
    conn: &Connection,
    conditions: &[Condition],
    tail: &str,
    mut sink: impl FnMut(T),
) -> DbResult<u64> {
    let table = validate_identifier(T::TABLE)?;
    let columns = T::COLUMNS
        .iter()
        .map(|column| validate_identifier(column.name))
        .collect::<DbResult<Vec<_>>>()?;
    let filter = render::<T>(conditions)?;

    let sql = format!(
        "SELECT {} FROM {table}{}{tail};",
        columns.join(", "),
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(filter.args))?;

    let mut count = 0;
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|index| row.get::<_, Value>(index))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        sink(T::from_values(values)?);
        count += 1;
    }
    Ok(count)
}

fn remove<T: Entity>(conn: &Connection, value: &T, conditions: &[Condition]) -> DbResult<u64> {
    let table = validate_identifier(T::TABLE)?;
    let mut filter = RenderedFilter::default();

    let key = value.primary_key();
    if !is_zero_key(&key) {
        let key_column = validate_identifier(T::PRIMARY_KEY)?;
        filter.push(&format!("{key_column} = ?"), [key]);
    }
    let extra = render::<T>(conditions)?;
    if !extra.is_empty() {
        filter.push(&extra.clause, extra.args);
    }
    if filter.is_empty() {
        return Err(DbError::MissingWhereClause);
    }

    let sql = format!("DELETE FROM {table}{};", filter.where_sql());
    let changed = conn.execute(&sql, params_from_iter(filter.args))?;
    Ok(changed as u64)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
