use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Warehouse;
use crate::error::WarehouseError;
use crate::gcp::AccessTokenSource;
use crate::types::LogRecord;
use crate::util::http;

/// BigQuery streaming insert (`tabledata.insertAll`) for a single table.
pub struct BigQueryWarehouse {
    insert_url: String,
    table_id: String,
    tokens: AccessTokenSource,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest<'a> {
    kind: &'static str,
    rows: Vec<InsertRow<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertRow<'a> {
    insert_id: String,
    json: &'a LogRecord,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<RowErrors>,
}

#[derive(Debug, Deserialize)]
struct RowErrors {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    message: String,
}

impl BigQueryWarehouse {
    pub fn new(
        api_base: &str,
        project_id: &str,
        dataset: &str,
        table: &str,
        tokens: AccessTokenSource,
    ) -> Self {
        let insert_url = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            api_base.trim_end_matches('/'),
            project_id,
            dataset,
            table
        );
        Self {
            insert_url,
            table_id: format!("{project_id}.{dataset}.{table}"),
            tokens,
        }
    }

    fn request_body(record: &LogRecord) -> InsertAllRequest<'_> {
        InsertAllRequest {
            kind: "bigquery#tableDataInsertAllRequest",
            rows: vec![InsertRow {
                insert_id: uuid::Uuid::new_v4().to_string(),
                json: record,
            }],
        }
    }
}

/// Flatten per-row insert errors into one message, or `None` if there were none.
fn summarize_insert_errors(resp: &InsertAllResponse) -> Option<String> {
    if resp.insert_errors.is_empty() {
        return None;
    }
    let parts: Vec<String> = resp
        .insert_errors
        .iter()
        .flat_map(|row| {
            row.errors.iter().map(move |e| {
                format!("row {}: {} {} {}", row.index, e.reason, e.location, e.message)
                    .trim_end()
                    .to_string()
            })
        })
        .collect();
    Some(parts.join("; "))
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn insert_row(&self, record: &LogRecord) -> Result<(), WarehouseError> {
        let token = self.tokens.token().await?;

        let resp = http::client()
            .post(&self.insert_url)
            .bearer_auth(token)
            .json(&Self::request_body(record))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(WarehouseError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: InsertAllResponse = resp.json().await?;
        if let Some(errors) = summarize_insert_errors(&body) {
            return Err(WarehouseError::InsertErrors(errors));
        }

        debug!("Inserted 1 row into {}", self.table_id);
        Ok(())
    }

    fn destination(&self) -> String {
        self.table_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InboundEvent;

    fn warehouse() -> BigQueryWarehouse {
        BigQueryWarehouse::new(
            "https://bigquery.googleapis.com/bigquery/v2/",
            "proj",
            "autostudio_line",
            "line_bot_logs",
            AccessTokenSource::fixed("t"),
        )
    }

    #[test]
    fn test_insert_url() {
        let wh = warehouse();
        assert_eq!(
            wh.insert_url,
            "https://bigquery.googleapis.com/bigquery/v2/projects/proj/datasets/autostudio_line/tables/line_bot_logs/insertAll"
        );
        assert_eq!(wh.destination(), "proj.autostudio_line.line_bot_logs");
    }

    #[test]
    fn test_request_body_shape() {
        let event = InboundEvent::new("U1", "こんにちは", "rt");
        let record = LogRecord::failed(&event, "Invalid reply token");
        let body = serde_json::to_value(BigQueryWarehouse::request_body(&record)).unwrap();

        assert_eq!(body["kind"], "bigquery#tableDataInsertAllRequest");
        let rows = body["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0]["insertId"].as_str().unwrap().is_empty());
        assert_eq!(rows[0]["json"]["user_id"], "U1");
        assert_eq!(rows[0]["json"]["message_text"], "こんにちは");
        assert_eq!(rows[0]["json"]["response_text"], "");
        assert_eq!(rows[0]["json"]["response_time_ms"], 0);
        assert_eq!(rows[0]["json"]["error_message"], "Invalid reply token");
    }

    #[test]
    fn test_summarize_insert_errors() {
        let ok: InsertAllResponse =
            serde_json::from_str(r#"{"kind":"bigquery#tableDataInsertAllResponse"}"#).unwrap();
        assert!(summarize_insert_errors(&ok).is_none());

        let failed: InsertAllResponse = serde_json::from_str(
            r#"{
                "kind": "bigquery#tableDataInsertAllResponse",
                "insertErrors": [{
                    "index": 0,
                    "errors": [{ "reason": "invalid", "location": "response_time_ms", "message": "Cannot convert value" }]
                }]
            }"#,
        )
        .unwrap();
        let summary = summarize_insert_errors(&failed).unwrap();
        assert!(summary.contains("row 0"));
        assert!(summary.contains("response_time_ms"));
    }
}
