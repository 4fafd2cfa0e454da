//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `datakit_core` linkage and run one transactional round-trip
//!   against SQLite (in memory, or the file given as first argument).

use datakit_core::{
    default_log_level, init_logging, BackendConfig, Column, Condition, Context, DbError,
    DbResult, Entity, LiveSession, Repository, Session, SessionRepository, SqliteBackend,
    ValueReader,
};
use log::info;
use rusqlite::types::Value;
use std::process::ExitCode;

#[derive(Debug, Default)]
struct Probe {
    id: i64,
    label: String,
}

impl Entity for Probe {
    const TABLE: &'static str = "datakit_probe";
    const PRIMARY_KEY: &'static str = "id";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", "INTEGER"),
        Column::new("label", "TEXT NOT NULL"),
    ];

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Integer(self.id), Value::Text(self.label.clone())]
    }

    fn from_values(values: Vec<Value>) -> DbResult<Self> {
        let mut reader = ValueReader::for_entity::<Self>(values);
        Ok(Self {
            id: reader.next()?,
            label: reader.next()?,
        })
    }

    fn primary_key(&self) -> Value {
        Value::Integer(self.id)
    }
}

fn main() -> ExitCode {
    if let Err(err) = init_logging(default_log_level(), None) {
        eprintln!("logging disabled: {err}");
    }
    println!("datakit_core version={}", datakit_core::core_version());

    match run(std::env::args().nth(1)) {
        Ok(count) => {
            println!("datakit_core probe=ok rows={count}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("datakit_core probe=error error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: Option<String>) -> DbResult<usize> {
    let config = BackendConfig::default();
    let backend = match path {
        Some(path) => SqliteBackend::open(path, &config)?,
        None => SqliteBackend::open_in_memory(&config)?,
    };
    backend.auto_migrate::<Probe>()?;
    let mut session = LiveSession::new(backend);
    let ctx = Context::background();

    session.transaction(|tx| -> Result<(), DbError> {
        SessionRepository::<Probe, _>::new(tx).create(
            &ctx,
            Probe {
                id: 0,
                label: "probe".to_string(),
            },
        )
    })?;

    let rows = SessionRepository::<Probe, _>::new(&mut session)
        .find(&ctx, &[Condition::eq("label", "probe".to_string())])?;
    info!("event=cli_probe module=cli status=ok rows={}", rows.len());
    Ok(rows.len())
}
