//! Send queue model.

use std::path::{Path, PathBuf};

use droplink_protocol::TransferMeta;

use crate::TransferError;

/// Lifecycle status of a queued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Waiting its turn.
    Pending,
    /// Currently being sent. At most one entry per engine.
    Active,
    /// Suspended mid-transfer by the user.
    Paused,
    /// Fully sent and acknowledged with `done`.
    Done,
    /// Terminated without `done` (read failure, channel failure, or
    /// cancellation).
    Error,
}

/// One item in the send queue.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Location of the underlying file.
    pub path: PathBuf,
    /// Display name sent to the peer.
    pub name: String,
    /// Total byte length.
    pub size: u64,
    /// Content-type label.
    pub mime_type: String,
    /// Current lifecycle status. Mutated only by the send engine.
    pub status: FileStatus,
}

impl FileEntry {
    /// Creates a pending entry.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            status: FileStatus::Pending,
        }
    }

    /// Creates a pending entry from a file on disk.
    ///
    /// The name is derived from the final path component and the
    /// content type defaults to `application/octet-stream`.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let size = tokio::fs::metadata(path).await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(path, name, size, "application/octet-stream"))
    }

    /// The metadata announced to the peer before the first chunk.
    pub fn meta(&self) -> TransferMeta {
        TransferMeta {
            name: self.name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Ordered collection of queued files, preserving insertion order.
///
/// Drives the send engine's iteration order. Not shared across tasks:
/// the queue's single consumer is the engine, and both it and the
/// user-action handlers run on the same cooperative context.
#[derive(Debug, Default)]
pub struct QueueModel {
    entries: Vec<FileEntry>,
}

impl QueueModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Always allowed.
    pub fn push(&mut self, entry: FileEntry) {
        self.entries.push(entry);
    }

    /// Removes the entry at `index` if it has not started yet.
    ///
    /// A file already started cannot be dequeued, only cancelled.
    pub fn remove(&mut self, index: usize) -> Option<FileEntry> {
        match self.entries.get(index) {
            Some(entry) if entry.status == FileStatus::Pending => {
                Some(self.entries.remove(index))
            }
            _ => None,
        }
    }

    /// Drops every pending entry, leaving started ones in place.
    pub fn clear_pending(&mut self) {
        self.entries.retain(|e| e.status != FileStatus::Pending);
    }

    /// Total byte count of pending entries.
    pub fn pending_bytes(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.status == FileStatus::Pending)
            .map(|e| e.size)
            .sum()
    }

    /// Number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == FileStatus::Pending)
            .count()
    }

    /// Index of the next pending entry, in insertion order.
    pub fn next_pending(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.status == FileStatus::Pending)
    }

    /// Index of the entry currently active or paused, if any.
    pub fn active_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e.status, FileStatus::Active | FileStatus::Paused))
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Transitions the entry at `index` to `status`.
    ///
    /// Only the send engine calls this; it upholds the invariant that
    /// at most one entry is active at a time.
    pub(crate) fn set_status(&mut self, index: usize, status: FileStatus) {
        if status == FileStatus::Active {
            debug_assert!(
                self.active_index().is_none_or(|i| i == index),
                "two files active at once"
            );
        }
        if let Some(entry) = self.entries.get_mut(index) {
            entry.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, size: u64) -> FileEntry {
        FileEntry::new(format!("/tmp/{name}"), name, size, "application/octet-stream")
    }

    #[test]
    fn push_preserves_insertion_order() {
        let mut queue = QueueModel::new();
        queue.push(entry("a", 10));
        queue.push(entry("b", 20));
        queue.push(entry("c", 30));

        let names: Vec<_> = queue.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn pending_aggregates() {
        let mut queue = QueueModel::new();
        queue.push(entry("a", 10));
        queue.push(entry("b", 20));
        assert_eq!(queue.pending_count(), 2);
        assert_eq!(queue.pending_bytes(), 30);

        queue.set_status(0, FileStatus::Done);
        assert_eq!(queue.pending_count(), 1);
        assert_eq!(queue.pending_bytes(), 20);
    }

    #[test]
    fn remove_only_while_pending() {
        let mut queue = QueueModel::new();
        queue.push(entry("a", 10));
        queue.push(entry("b", 20));
        queue.set_status(0, FileStatus::Active);

        assert!(queue.remove(0).is_none());
        assert_eq!(queue.entries().len(), 2);

        let removed = queue.remove(1).unwrap();
        assert_eq!(removed.name, "b");
        assert_eq!(queue.entries().len(), 1);
    }

    #[test]
    fn remove_out_of_range_is_none() {
        let mut queue = QueueModel::new();
        assert!(queue.remove(0).is_none());
    }

    #[test]
    fn clear_pending_keeps_started_entries() {
        let mut queue = QueueModel::new();
        queue.push(entry("a", 10));
        queue.push(entry("b", 20));
        queue.push(entry("c", 30));
        queue.set_status(0, FileStatus::Done);
        queue.set_status(1, FileStatus::Active);

        queue.clear_pending();

        let names: Vec<_> = queue.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn next_pending_in_order() {
        let mut queue = QueueModel::new();
        queue.push(entry("a", 10));
        queue.push(entry("b", 20));
        queue.set_status(0, FileStatus::Error);
        assert_eq!(queue.next_pending(), Some(1));

        queue.set_status(1, FileStatus::Done);
        assert_eq!(queue.next_pending(), None);
    }

    #[test]
    fn active_index_covers_paused() {
        let mut queue = QueueModel::new();
        queue.push(entry("a", 10));
        queue.set_status(0, FileStatus::Paused);
        assert_eq!(queue.active_index(), Some(0));
    }

    #[tokio::test]
    async fn from_path_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"12345").unwrap();

        let entry = FileEntry::from_path(&path).await.unwrap();
        assert_eq!(entry.name, "report.pdf");
        assert_eq!(entry.size, 5);
        assert_eq!(entry.mime_type, "application/octet-stream");
        assert_eq!(entry.status, FileStatus::Pending);
    }

    #[tokio::test]
    async fn from_path_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileEntry::from_path(dir.path().join("nope")).await;
        assert!(matches!(result, Err(TransferError::Read(_))));
    }
}
