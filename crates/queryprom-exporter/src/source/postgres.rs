//! PostgreSQL through `sqlx`.
//!
//! The statement is prepared once per cycle for its column list, then run
//! over the simple query protocol so every cell arrives in PostgreSQL's text
//! format. Booleans, integers, floats and `bytea` are typed; any other type
//! (dates, numerics, uuids, oids, ...) is kept verbatim as text.
//!
//! PostgreSQL has no unsigned integer types: every integer decodes to
//! `Scalar::Int`, which coercion rejects as a result field.

use std::collections::VecDeque;

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection as _, Executor, Row, Statement, TypeInfo, ValueRef};

use queryprom_core::{PollRow, Scalar};

use super::{Connection, Connector, DriverError, DriverResult, ResultRows};
use crate::config::Driver;

pub struct PostgresConnector {
    url: String,
}

impl PostgresConnector {
    pub fn new(conn_string: &str) -> Self {
        Self {
            url: conn_string.to_string(),
        }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    async fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        let conn = PgConnection::connect(&self.url)
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        Ok(Box::new(PostgresConnection { conn }))
    }
}

struct PostgresConnection {
    conn: PgConnection,
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn query(&mut self, sql: &str) -> DriverResult<Box<dyn ResultRows>> {
        // Prepare first so columns are known even for an empty result.
        let stmt = (&mut self.conn)
            .prepare(sql)
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();

        // No bind arguments: simple protocol, text-format results.
        let rows = (&mut self.conn)
            .fetch_all(sql)
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;

        Ok(Box::new(PostgresRows {
            columns,
            rows: rows.into(),
        }))
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DriverError::new(e.to_string()))
    }
}

struct PostgresRows {
    columns: Vec<String>,
    rows: VecDeque<PgRow>,
}

impl ResultRows for PostgresRows {
    fn columns(&self) -> DriverResult<Vec<String>> {
        Ok(self.columns.clone())
    }

    fn next_row(&mut self) -> Option<DriverResult<PollRow>> {
        let row = self.rows.pop_front()?;
        Some(decode_row(&self.columns, &row))
    }
}

fn decode_row(columns: &[String], row: &PgRow) -> DriverResult<PollRow> {
    let mut out = PollRow::new();
    for (i, name) in columns.iter().enumerate() {
        let value = decode_cell(row, i).map_err(|e| DriverError::new(format!("column {name}: {e}")))?;
        out.insert(name.clone(), value);
    }
    Ok(out)
}

fn decode_cell(row: &PgRow, i: usize) -> Result<Scalar, sqlx::Error> {
    let type_name = {
        let raw = row.try_get_raw(i)?;
        if raw.is_null() {
            return Ok(Scalar::Null);
        }
        raw.type_info().name().to_string()
    };

    if type_name == "BYTEA" {
        return Ok(Scalar::Bytes(row.try_get(i)?));
    }
    let text: String = row.try_get_unchecked(i)?;
    decode_text(&type_name, text).map_err(|e| sqlx::Error::Decode(e.into()))
}

/// Map one text-format cell of PostgreSQL type `type_name` to a `Scalar`.
pub(crate) fn decode_text(type_name: &str, text: String) -> Result<Scalar, String> {
    let value = match type_name {
        "BOOL" => match text.as_str() {
            "t" | "true" => Scalar::Bool(true),
            "f" | "false" => Scalar::Bool(false),
            other => return Err(format!("expected bool, got {other:?}")),
        },
        "INT2" | "INT4" | "INT8" => {
            let v = text
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("expected integer, got {text:?}: {e}"))?;
            Scalar::Int(v)
        }
        "FLOAT4" | "FLOAT8" => {
            let v = text
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("expected float, got {text:?}: {e}"))?;
            Scalar::Float(v)
        }
        _ => Scalar::Text(text),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn integers_are_signed() {
        assert_eq!(decode_text("INT2", "7".into()).unwrap(), Scalar::Int(7));
        assert_eq!(decode_text("INT4", "-3".into()).unwrap(), Scalar::Int(-3));
        assert_eq!(
            decode_text("INT8", "9223372036854775807".into()).unwrap(),
            Scalar::Int(i64::MAX)
        );
        assert!(decode_text("INT8", "12a".into()).is_err());
    }

    #[test]
    fn bools_and_floats() {
        assert_eq!(decode_text("BOOL", "t".into()).unwrap(), Scalar::Bool(true));
        assert_eq!(decode_text("BOOL", "f".into()).unwrap(), Scalar::Bool(false));
        assert_eq!(decode_text("FLOAT8", "1.5".into()).unwrap(), Scalar::Float(1.5));
        assert_eq!(
            decode_text("FLOAT4", "-Infinity".into()).unwrap(),
            Scalar::Float(f64::NEG_INFINITY)
        );
        assert!(matches!(decode_text("FLOAT8", "NaN".into()).unwrap(), Scalar::Float(v) if v.is_nan()));
    }

    #[test]
    fn other_types_render_verbatim() {
        let cases = [
            ("DATE", "2024-01-31"),
            ("TIMESTAMPTZ", "2024-01-31 10:00:00+00"),
            ("NUMERIC", "12.50"),
            ("UUID", "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"),
            ("OID", "16384"),
            ("INET", "10.0.0.1"),
            ("JSONB", r#"{"a": 1}"#),
            ("TEXT", "users"),
            ("NAME", "public"),
        ];
        for (ty, text) in cases {
            assert_eq!(
                decode_text(ty, text.to_string()).unwrap(),
                Scalar::Text(text.to_string()),
                "{ty}"
            );
        }
    }

    #[test]
    fn verbatim_labels_are_not_numeric_results() {
        let oid = decode_text("OID", "16384".into()).unwrap();
        assert_eq!(oid.to_string(), "16384");
        assert!(oid.as_observation().is_none());
    }
}
