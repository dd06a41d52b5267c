//! Batch client for the `/extract` endpoint.
//!
//! Uploads each file in turn, stamps every returned record with the source
//! filename, and concatenates the records in file order. A failure on one
//! file is reported and the remaining files are still processed.

use crate::error::ClientError;
use crate::output::Record;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Key added to every record with the uploaded file's name.
pub const FILENAME_KEY: &str = "Filename";

/// HTTP client for one extraction endpoint.
#[derive(Debug, Clone)]
pub struct BatchClient {
    http: reqwest::Client,
    endpoint: String,
}

/// Records collected from a batch, plus the files that failed.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub records: Vec<Record>,
    pub failures: Vec<(String, ClientError)>,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    data: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl BatchClient {
    /// `endpoint` is the full URL of the extract route,
    /// e.g. `http://127.0.0.1:5000/extract`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Upload one PDF and return its records, each tagged with `filename`.
    pub async fn extract_bytes(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<Record>, ClientError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self.http.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: ExtractResponse = response.json().await?;
        Ok(tag_records(body.data, filename))
    }

    /// Read and upload one file from disk.
    pub async fn extract_file(&self, path: &Path) -> Result<Vec<Record>, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.extract_bytes(&display_name(path), bytes).await
    }

    /// Upload every file in order; failures do not stop the batch.
    pub async fn extract_files(&self, paths: &[PathBuf]) -> BatchResult {
        let mut result = BatchResult::default();
        for path in paths {
            let name = display_name(path);
            info!("Processing '{}'", name);
            match self.extract_file(path).await {
                Ok(records) => {
                    info!("'{}': {} records", name, records.len());
                    result.records.extend(records);
                }
                Err(e) => {
                    warn!("Failed to process '{}': {}", name, e);
                    result.failures.push((name, e));
                }
            }
        }
        result
    }
}

/// Add `Filename` to every object record; other values pass through.
pub fn tag_records(records: Vec<Record>, filename: &str) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut record| {
            if let Some(obj) = record.as_object_mut() {
                obj.insert(FILENAME_KEY.to_string(), Record::String(filename.to_string()));
            }
            record
        })
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
