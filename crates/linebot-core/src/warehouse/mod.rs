pub mod bigquery;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Config, WarehouseBackend};
use crate::error::WarehouseError;
use crate::gcp::AccessTokenSource;
use crate::types::LogRecord;

/// Append-only sink for usage rows.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Insert one row. Called at most once per record.
    async fn insert_row(&self, record: &LogRecord) -> Result<(), WarehouseError>;

    /// Human-readable destination, for logs.
    fn destination(&self) -> String;
}

/// Create the warehouse selected by the config.
pub fn create_warehouse(config: &Config) -> Box<dyn Warehouse> {
    match config.warehouse.backend {
        WarehouseBackend::Bigquery => Box::new(bigquery::BigQueryWarehouse::new(
            &config.warehouse.api_base,
            &config.project_id,
            &config.warehouse.dataset,
            &config.warehouse.table,
            AccessTokenSource::from_env(),
        )),
        WarehouseBackend::None => Box::new(LogOnlyWarehouse),
    }
}

/// Writes rows to the process log only.
pub struct LogOnlyWarehouse;

#[async_trait]
impl Warehouse for LogOnlyWarehouse {
    async fn insert_row(&self, record: &LogRecord) -> Result<(), WarehouseError> {
        info!(
            user_id = %record.user_id,
            response_time_ms = record.response_time_ms,
            error = record.error_message.as_deref().unwrap_or(""),
            "usage row (warehouse disabled)"
        );
        Ok(())
    }

    fn destination(&self) -> String {
        "process log".to_string()
    }
}

/// In-memory warehouse (for local dev/testing).
pub struct InMemoryWarehouse {
    records: std::sync::Mutex<Vec<LogRecord>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self {
            records: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every row inserted so far.
    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(r) => r.clone(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for InMemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn insert_row(&self, record: &LogRecord) -> Result<(), WarehouseError> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
        Ok(())
    }

    fn destination(&self) -> String {
        "memory".to_string()
    }
}
