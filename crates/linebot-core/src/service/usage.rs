use std::sync::Arc;

use tracing::{error, info};

use crate::types::LogRecord;
use crate::warehouse::Warehouse;

/// Best-effort usage logging: one warehouse append per handled message.
///
/// A failed insert is logged and dropped. Nothing is buffered or retried.
#[derive(Clone)]
pub struct UsageLogger {
    warehouse: Arc<dyn Warehouse>,
}

impl UsageLogger {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Append one row. Returns whether the warehouse accepted it.
    pub async fn log(&self, record: &LogRecord) -> bool {
        match self.warehouse.insert_row(record).await {
            Ok(()) => {
                info!("Logged usage row to {}", self.warehouse.destination());
                true
            }
            Err(e) => {
                error!(
                    "Failed to log usage row to {}: {}",
                    self.warehouse.destination(),
                    e
                );
                false
            }
        }
    }
}
