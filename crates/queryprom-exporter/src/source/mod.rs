//! Database adapters.
//!
//! Pollers only see these traits. Each adapter decodes its native cell types
//! into `Scalar` so the engine never switches on driver-specific types.
//!
//! - `clickhouse`: HTTP interface, JSON rows with names and types
//! - `postgres`: `sqlx` connection, one per poll cycle

pub mod clickhouse;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use queryprom_core::PollRow;

use crate::config::Driver;

pub use clickhouse::ClickHouseConnector;
pub use postgres::PostgresConnector;

/// Driver-level failure; the poller attaches metric and stage.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DriverError(pub String);

impl DriverError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Opens connections; shared by every poller.
#[async_trait]
pub trait Connector: Send + Sync {
    fn driver(&self) -> Driver;
    async fn connect(&self) -> DriverResult<Box<dyn Connection>>;
}

/// One open connection, owned by a single poll cycle.
#[async_trait]
pub trait Connection: Send {
    /// Run `sql` verbatim.
    async fn query(&mut self, sql: &str) -> DriverResult<Box<dyn ResultRows>>;
    async fn close(self: Box<Self>) -> DriverResult<()>;
}

/// Cursor over a query result.
pub trait ResultRows: Send {
    /// Column names in the order the database reports them.
    fn columns(&self) -> DriverResult<Vec<String>>;
    fn next_row(&mut self) -> Option<DriverResult<PollRow>>;
}

/// Build the connector for `driver` from the shared connection string.
pub fn connector_for(driver: Driver, conn_string: &str) -> DriverResult<Arc<dyn Connector>> {
    let connector: Arc<dyn Connector> = match driver {
        Driver::ClickHouse => Arc::new(ClickHouseConnector::new(conn_string)?),
        Driver::Postgres => Arc::new(PostgresConnector::new(conn_string)),
    };
    Ok(connector)
}
