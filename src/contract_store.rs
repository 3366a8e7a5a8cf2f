//! Flat JSON collection of extracted contract records.
//!
//! The whole file is rewritten on every mutation. Writers are serialized by an
//! in-process lock; there is no cross-process coordination.

use crate::errors::AppError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct ContractStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ContractStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Reads the raw document. `None` when the file does not exist, an empty
    /// array for an empty file.
    async fn read_document(&self) -> Result<Option<Value>, AppError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::StorageError(format!(
                    "Error reading {}: {}",
                    self.file_name(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(Some(Value::Array(Vec::new())));
        }

        serde_json::from_str(&content).map(Some).map_err(|e| {
            AppError::StorageError(format!("Error parsing {}: {}", self.file_name(), e))
        })
    }

    async fn write_records(&self, records: &[Value]) -> Result<(), AppError> {
        let body = serde_json::to_string_pretty(records)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, body).await.map_err(|e| {
            AppError::StorageError(format!("Error writing to {}: {}", self.file_name(), e))
        })
    }

    /// Returns the stored document as-is.
    pub async fn list(&self) -> Result<Value, AppError> {
        self.read_document()
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", self.file_name())))
    }

    /// Returns the records, failing when the document is not a list.
    pub async fn records(&self) -> Result<Vec<Value>, AppError> {
        match self.list().await? {
            Value::Array(records) => Ok(records),
            _ => Err(AppError::StorageError(format!(
                "Data in {} is not a list.",
                self.file_name()
            ))),
        }
    }

    /// Finds a record by `level_id`.
    pub async fn find(&self, level_id: &str) -> Result<Option<Value>, AppError> {
        Ok(self
            .records()
            .await?
            .into_iter()
            .find(|record| record_level_id(record) == Some(level_id)))
    }

    /// Appends a record. Unreadable or non-list content is replaced by a new list.
    pub async fn append(&self, record: Value) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut records = match self.read_document().await {
            Ok(Some(Value::Array(records))) => records,
            Ok(None) => Vec::new(),
            Ok(Some(_)) => {
                tracing::warn!(
                    "Data in {} is not a list. It will be overwritten with a new list.",
                    self.file_name()
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read {}. It will be overwritten. Error: {}",
                    self.file_name(),
                    e
                );
                Vec::new()
            }
        };

        records.push(record);
        self.write_records(&records).await?;

        tracing::info!("Appended contract to {} ({} records)", self.file_name(), records.len());
        Ok(records.len())
    }

    /// Deletes every record whose `level_id` matches.
    ///
    /// # Returns
    ///
    /// * `Result<String, AppError>` - Confirmation message, `NotFound` if the
    ///   file or the record does not exist.
    pub async fn delete(&self, level_id: &str) -> Result<String, AppError> {
        let _guard = self.write_lock.lock().await;

        let records = match self.read_document().await? {
            None => {
                return Err(AppError::NotFound(format!(
                    "Error: {} not found.",
                    self.file_name()
                )))
            }
            Some(Value::Array(records)) => records,
            Some(_) => {
                return Err(AppError::StorageError(format!(
                    "Error: Data in {} is not a list.",
                    self.file_name()
                )))
            }
        };

        let initial_count = records.len();
        let remaining: Vec<Value> = records
            .into_iter()
            .filter(|record| record_level_id(record) != Some(level_id))
            .collect();

        if remaining.len() == initial_count {
            return Err(AppError::NotFound(format!(
                "Contract with level_id '{}' not found.",
                level_id
            )));
        }

        self.write_records(&remaining).await?;
        tracing::info!("Deleted contract {} from {}", level_id, self.file_name());

        Ok(format!(
            "Successfully deleted contract with level_id: {}",
            level_id
        ))
    }
}

fn record_level_id(record: &Value) -> Option<&str> {
    record.get("level_id").and_then(|v| v.as_str())
}
