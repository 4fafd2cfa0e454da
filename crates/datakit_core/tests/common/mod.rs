#![allow(dead_code)]

use datakit_core::{
    BackendConfig, Column, DbResult, Entity, LiveSession, SqliteBackend, SqliteSession,
    ValueReader,
};
use rusqlite::types::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestModel {
    pub id: i64,
    pub name: String,
}

impl TestModel {
    pub fn named(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
        }
    }

    pub fn with_id(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

impl Entity for TestModel {
    const TABLE: &'static str = "test_models";
    const PRIMARY_KEY: &'static str = "id";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", "INTEGER"),
        Column::new("name", "TEXT NOT NULL"),
    ];

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Integer(self.id), Value::Text(self.name.clone())]
    }

    fn from_values(values: Vec<Value>) -> DbResult<Self> {
        let mut reader = ValueReader::for_entity::<Self>(values);
        Ok(Self {
            id: reader.next()?,
            name: reader.next()?,
        })
    }

    fn primary_key(&self) -> Value {
        Value::Integer(self.id)
    }

    fn set_generated_key(&mut self, key: i64) {
        self.id = key;
    }
}

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// Live session over a fresh in-memory database with `test_models` created.
pub fn memory_session() -> SqliteSession {
    let backend = SqliteBackend::open_in_memory(&BackendConfig::default()).unwrap();
    backend.auto_migrate::<TestModel>().unwrap();
    LiveSession::new(backend)
}

pub fn row_count(session: &SqliteSession) -> i64 {
    session.handle().with_connection(|conn| {
        conn.query_row("SELECT COUNT(*) FROM test_models;", [], |row| row.get(0))
            .unwrap()
    })
}
