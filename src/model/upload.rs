use serde::{Deserialize, Serialize};

use super::bucket::Bucket;

/// A file handed to the upload pipeline. Content is only used for the preview handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    pub content: Option<Vec<u8>>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            content: None,
        }
    }

    pub fn with_content(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: content.len() as u64,
            content: Some(content),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Processing,
    Done,
    /// Tagging failed after every retry; only reachable with failure injection.
    Failed,
}

impl UploadStatus {
    /// Whether `self -> next` is a forward step of the item lifecycle.
    pub fn can_advance_to(&self, next: UploadStatus) -> bool {
        matches!(
            (self, next),
            (UploadStatus::Pending, UploadStatus::Uploading)
                | (UploadStatus::Uploading, UploadStatus::Processing)
                | (UploadStatus::Processing, UploadStatus::Done)
                | (UploadStatus::Processing, UploadStatus::Failed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadQueueItem {
    pub id: String,
    pub file_name: String,
    pub size: u64,
    pub bucket: Bucket,
    /// 0-100
    pub progress: u8,
    pub status: UploadStatus,
    pub preview: Option<String>,
}

impl UploadQueueItem {
    pub fn new(id: impl Into<String>, file: &UploadFile, bucket: Bucket) -> Self {
        let id = id.into();
        let preview = file.content.as_ref().map(|_| format!("preview://{id}"));
        Self {
            id,
            file_name: file.name.clone(),
            size: file.size,
            bucket,
            progress: 0,
            status: UploadStatus::Pending,
            preview,
        }
    }
}
