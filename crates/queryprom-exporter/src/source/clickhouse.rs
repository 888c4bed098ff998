//! ClickHouse over its HTTP interface.
//!
//! Queries are POSTed verbatim with
//! `default_format=JSONCompactEachRowWithNamesAndTypes`: the first line holds
//! column names, the second their ClickHouse types, every further line one
//! row as a JSON array. 64-bit integers arrive quoted.

use std::collections::VecDeque;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;

use queryprom_core::{PollRow, Scalar};

use super::{Connection, Connector, DriverError, DriverResult, ResultRows};
use crate::config::Driver;

const RESULT_FORMAT: &str = "JSONCompactEachRowWithNamesAndTypes";

pub struct ClickHouseConnector {
    client: Client,
    base: Url,
}

impl ClickHouseConnector {
    /// `conn_string` is the HTTP endpoint, e.g. `http://127.0.0.1:8123/?user=default`.
    pub fn new(conn_string: &str) -> DriverResult<Self> {
        let base = Url::parse(conn_string)
            .map_err(|e| DriverError::new(format!("invalid clickhouse url {conn_string:?}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(DriverError::new(format!(
                "clickhouse url must use http or https, got {:?}",
                base.scheme()
            )));
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }
}

#[async_trait]
impl Connector for ClickHouseConnector {
    fn driver(&self) -> Driver {
        Driver::ClickHouse
    }

    async fn connect(&self) -> DriverResult<Box<dyn Connection>> {
        let mut ping = self.base.clone();
        ping.set_path("/ping");
        ping.set_query(None);

        let resp = self
            .client
            .get(ping)
            .send()
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DriverError::new(format!("ping returned {}", resp.status())));
        }

        Ok(Box::new(ClickHouseConnection {
            client: self.client.clone(),
            base: self.base.clone(),
        }))
    }
}

struct ClickHouseConnection {
    client: Client,
    base: Url,
}

#[async_trait]
impl Connection for ClickHouseConnection {
    async fn query(&mut self, sql: &str) -> DriverResult<Box<dyn ResultRows>> {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("default_format", RESULT_FORMAT);

        let resp = self
            .client
            .post(url)
            .body(sql.to_string())
            .send()
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| DriverError::new(e.to_string()))?;
        if !status.is_success() {
            return Err(DriverError::new(format!("{status}: {}", body.trim())));
        }

        Ok(Box::new(ClickHouseRows::parse(&body)))
    }

    async fn close(self: Box<Self>) -> DriverResult<()> {
        // Stateless HTTP; pooled sockets go back with the client.
        Ok(())
    }
}

struct Header {
    names: Vec<String>,
    types: Vec<String>,
}

pub(crate) struct ClickHouseRows {
    header: Result<Header, String>,
    lines: VecDeque<String>,
}

impl ClickHouseRows {
    pub(crate) fn parse(body: &str) -> Self {
        let mut lines: VecDeque<String> = body
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect();

        let header = match (lines.pop_front(), lines.pop_front()) {
            (Some(names), Some(types)) => parse_header(&names, &types),
            _ => Err("response carries no column header".to_string()),
        };

        Self { header, lines }
    }
}

fn parse_header(names: &str, types: &str) -> Result<Header, String> {
    let names: Vec<String> =
        serde_json::from_str(names).map_err(|e| format!("bad column names line: {e}"))?;
    let types: Vec<String> =
        serde_json::from_str(types).map_err(|e| format!("bad column types line: {e}"))?;
    if names.len() != types.len() {
        return Err(format!(
            "{} column names but {} column types",
            names.len(),
            types.len()
        ));
    }
    Ok(Header { names, types })
}

impl ResultRows for ClickHouseRows {
    fn columns(&self) -> DriverResult<Vec<String>> {
        match &self.header {
            Ok(h) => Ok(h.names.clone()),
            Err(e) => Err(DriverError::new(e.clone())),
        }
    }

    fn next_row(&mut self) -> Option<DriverResult<PollRow>> {
        let line = self.lines.pop_front()?;
        let header = match &self.header {
            Ok(h) => h,
            Err(e) => return Some(Err(DriverError::new(e.clone()))),
        };
        Some(decode_row(header, &line))
    }
}

fn decode_row(header: &Header, line: &str) -> DriverResult<PollRow> {
    let cells: Vec<Value> = serde_json::from_str(line)
        .map_err(|e| DriverError::new(format!("bad row: {e}")))?;
    if cells.len() != header.names.len() {
        return Err(DriverError::new(format!(
            "row has {} cells, expected {}",
            cells.len(),
            header.names.len()
        )));
    }

    let mut row = PollRow::new();
    for ((name, ty), cell) in header.names.iter().zip(&header.types).zip(cells) {
        let value = decode_value(ty, cell)
            .map_err(|e| DriverError::new(format!("column {name}: {e}")))?;
        row.insert(name.clone(), value);
    }
    Ok(row)
}

/// Strip `Nullable(...)` and `LowCardinality(...)` wrappers.
fn base_type(ty: &str) -> &str {
    let mut ty = ty.trim();
    loop {
        let inner = ["Nullable(", "LowCardinality("]
            .iter()
            .find_map(|w| ty.strip_prefix(w).and_then(|t| t.strip_suffix(')')));
        match inner {
            Some(t) => ty = t.trim(),
            None => return ty,
        }
    }
}

pub(crate) fn decode_value(ty: &str, cell: Value) -> Result<Scalar, String> {
    if cell.is_null() {
        return Ok(Scalar::Null);
    }
    let ty = base_type(ty);
    match ty {
        "UInt8" => unsigned(&cell).and_then(narrow::<u8>).map(Scalar::UInt8),
        "UInt16" => unsigned(&cell).and_then(narrow::<u16>).map(Scalar::UInt16),
        "UInt32" => unsigned(&cell).and_then(narrow::<u32>).map(Scalar::UInt32),
        "UInt64" => unsigned(&cell).map(Scalar::UInt64),
        "Int8" | "Int16" | "Int32" | "Int64" => signed(&cell).map(Scalar::Int),
        "Float32" | "Float64" => float(&cell).map(Scalar::Float),
        "Bool" => cell
            .as_bool()
            .map(Scalar::Bool)
            .ok_or_else(|| format!("expected bool, got {cell}")),
        _ => Ok(Scalar::Text(match cell {
            Value::String(s) => s,
            other => other.to_string(),
        })),
    }
}

fn unsigned(cell: &Value) -> Result<u64, String> {
    let v = match cell {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    v.ok_or_else(|| format!("expected unsigned integer, got {cell}"))
}

fn narrow<T: TryFrom<u64>>(v: u64) -> Result<T, String> {
    T::try_from(v).map_err(|_| format!("{v} out of range"))
}

fn signed(cell: &Value) -> Result<i64, String> {
    let v = match cell {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    v.ok_or_else(|| format!("expected integer, got {cell}"))
}

fn float(cell: &Value) -> Result<f64, String> {
    let v = match cell {
        Value::Number(n) => n.as_f64(),
        // nan / inf arrive as strings
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    v.ok_or_else(|| format!("expected float, got {cell}"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn unsigned_types_keep_their_width() {
        assert_eq!(decode_value("UInt8", json!(3)).unwrap(), Scalar::UInt8(3));
        assert_eq!(decode_value("UInt16", json!(300)).unwrap(), Scalar::UInt16(300));
        assert_eq!(decode_value("UInt32", json!(70000)).unwrap(), Scalar::UInt32(70000));
        assert_eq!(
            decode_value("UInt64", json!("18446744073709551615")).unwrap(),
            Scalar::UInt64(u64::MAX)
        );
        assert!(decode_value("UInt8", json!(256)).is_err());
    }

    #[test]
    fn wrappers_and_nulls() {
        assert_eq!(decode_value("Nullable(UInt8)", Value::Null).unwrap(), Scalar::Null);
        assert_eq!(decode_value("Nullable(UInt16)", json!(5)).unwrap(), Scalar::UInt16(5));
        assert_eq!(
            decode_value("LowCardinality(Nullable(String))", json!("x")).unwrap(),
            Scalar::Text("x".into())
        );
    }

    #[test]
    fn non_numeric_types_become_text() {
        assert_eq!(decode_value("Int64", json!("-4")).unwrap(), Scalar::Int(-4));
        assert_eq!(decode_value("Float64", json!(1.5)).unwrap(), Scalar::Float(1.5));
        assert_eq!(
            decode_value("DateTime", json!("2024-01-01 00:00:00")).unwrap(),
            Scalar::Text("2024-01-01 00:00:00".into())
        );
        assert_eq!(
            decode_value("Array(UInt8)", json!([1, 2])).unwrap(),
            Scalar::Text("[1,2]".into())
        );
    }

    #[test]
    fn parses_body_with_header() {
        let body = "[\"table\",\"cnt\"]\n[\"String\",\"UInt64\"]\n[\"a\",\"3\"]\n[\"b\",\"5\"]\n";
        let mut rows = ClickHouseRows::parse(body);
        assert_eq!(rows.columns().unwrap(), ["table", "cnt"]);

        let first = rows.next_row().unwrap().unwrap();
        assert_eq!(first.get("table"), Some(&Scalar::Text("a".into())));
        assert_eq!(first.get("cnt"), Some(&Scalar::UInt64(3)));
        assert!(rows.next_row().unwrap().is_ok());
        assert!(rows.next_row().is_none());
    }

    #[test]
    fn missing_header_fails_columns() {
        let rows = ClickHouseRows::parse("");
        assert!(rows.columns().is_err());
    }

    #[test]
    fn short_row_fails_scan() {
        let body = "[\"table\",\"cnt\"]\n[\"String\",\"UInt8\"]\n[\"a\"]\n";
        let mut rows = ClickHouseRows::parse(body);
        assert!(rows.next_row().unwrap().is_err());
    }

    #[test]
    fn rejects_native_protocol_urls() {
        assert!(ClickHouseConnector::new("tcp://127.0.0.1:9000?debug=false").is_err());
        assert!(ClickHouseConnector::new("http://127.0.0.1:8123").is_ok());
    }
}
