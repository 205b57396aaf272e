// Search history: an append-only audit trail of searches by signed-in users

use crate::error::AuditError;
use crate::models::{Actor, SearchHistoryRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: SearchHistoryRecord) -> Result<(), AuditError>;
}

const CSV_HEADER: [&str; 5] = ["actor", "query", "filters", "result_count", "created_at"];

/// Appends records as CSV rows, writing the header when the file is new.
pub struct CsvAuditSink {
    path: PathBuf,
    // Serializes writers within this process
    lock: Mutex<()>,
}

impl CsvAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

fn write_row(path: &Path, row: [String; 5]) -> Result<(), AuditError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_new = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if is_new {
        writer.write_record(CSV_HEADER)?;
    }
    writer.write_record(&row)?;
    writer.flush()?;
    Ok(())
}

#[async_trait]
impl AuditSink for CsvAuditSink {
    async fn append(&self, record: SearchHistoryRecord) -> Result<(), AuditError> {
        let row = [
            record.actor.unwrap_or_default(),
            record.query,
            serde_json::to_string(&record.filters)?,
            record.result_count.to_string(),
            record.created_at.to_rfc3339(),
        ];

        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_row(&path, row))
            .await
            .map_err(|e| AuditError::Task(e.to_string()))?
    }
}

/// Fire-and-forget recording of searches. Recording never delays or fails the
/// search that triggered it.
#[derive(Clone, Default)]
pub struct SearchHistoryRecorder {
    sink: Option<Arc<dyn AuditSink>>,
}

impl SearchHistoryRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Recorder that drops everything.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Schedules a record for an authenticated actor's non-empty search.
    /// Returns the handle of the spawned write, if one was spawned.
    pub fn record(
        &self,
        actor: Option<&Actor>,
        params: &HashMap<String, String>,
        result_count: u64,
    ) -> Option<JoinHandle<()>> {
        let sink = self.sink.clone()?;
        let actor = actor?;
        if params.is_empty() {
            return None;
        }

        let record = SearchHistoryRecord {
            actor: Some(actor.id.clone()),
            query: params.get("search").map(|q| q.trim().to_string()).unwrap_or_default(),
            filters: params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            result_count,
            created_at: chrono::Utc::now(),
        };

        Some(tokio::spawn(async move {
            if let Err(e) = sink.append(record).await {
                tracing::warn!("Failed to record search history: {}", e);
            }
        }))
    }
}
