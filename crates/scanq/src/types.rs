//! Core types for scanq

use crate::error::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::SystemTime;

/// Rendering used for `updated_at`: local wall time plus the UTC offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// Upper bound on individual errors kept in a [`WalkResult`]; counters keep going.
pub const MAX_RECORDED_ERRORS: usize = 1_000;

// ============================================================================
// Discovery Event
// ============================================================================

/// One recently modified file, as announced on the queue.
///
/// Field order is part of the message contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    pub path: String,
    pub updated_at: String,
    pub mime: String,
}

impl DiscoveryEvent {
    /// `path` must be the exact file name as found; callers skip paths that
    /// are not valid UTF-8 rather than publish a lossy rendering.
    pub fn new(path: &str, modified: SystemTime, mime: impl Into<String>) -> Self {
        Self {
            path: path.to_owned(),
            updated_at: format_timestamp(modified),
            mime: mime.into(),
        }
    }

    /// Message body: `{"path":...,"updated_at":...,"mime":...}`.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

// ============================================================================
// Per-entry errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryErrorKind {
    /// Opening a directory for listing failed
    ReadDir,
    /// Listing stopped part way through a directory
    ReadEntry,
    /// File type or mtime could not be read
    Metadata,
    /// File header could not be read for sniffing
    Classify,
    /// The broker did not accept the event
    Publish,
    /// Path is not valid UTF-8 and cannot be carried in a JSON event
    InvalidPath,
    /// A directory task panicked; the rest of its files are lost
    TaskPanicked,
}

impl EntryErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryErrorKind::ReadDir => "read_dir",
            EntryErrorKind::ReadEntry => "read_entry",
            EntryErrorKind::Metadata => "metadata",
            EntryErrorKind::Classify => "classify",
            EntryErrorKind::Publish => "publish",
            EntryErrorKind::InvalidPath => "invalid_path",
            EntryErrorKind::TaskPanicked => "task_panicked",
        }
    }
}

impl fmt::Display for EntryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure on one entry. Never aborts the walk.
#[derive(Debug, Clone)]
pub struct EntryError {
    pub path: String,
    pub kind: EntryErrorKind,
    pub message: String,
}

impl EntryError {
    pub fn new(path: &Path, kind: EntryErrorKind, err: impl fmt::Display) -> Self {
        Self {
            path: path.display().to_string(),
            kind,
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Walk statistics
// ============================================================================

/// Counters for one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Directories listed successfully
    pub dirs_scanned: u64,
    /// Regular files whose mtime was read
    pub files_seen: u64,
    /// Regular files newer than the cutoff
    pub files_matched: u64,
    /// Regular files at or before the cutoff
    pub files_too_old: u64,
    /// Symlinks, sockets, devices, fifos
    pub other_skipped: u64,
    pub events_published: u64,
    pub classify_failures: u64,
    pub publish_failures: u64,
    /// Every recorded entry error, including classify and publish failures
    pub errors: u64,
    pub duration_ms: u64,
}

impl WalkStats {
    pub fn merge(&mut self, other: &WalkStats) {
        self.dirs_scanned += other.dirs_scanned;
        self.files_seen += other.files_seen;
        self.files_matched += other.files_matched;
        self.files_too_old += other.files_too_old;
        self.other_skipped += other.other_skipped;
        self.events_published += other.events_published;
        self.classify_failures += other.classify_failures;
        self.publish_failures += other.publish_failures;
        self.errors += other.errors;
    }
}

/// Result of a walk
#[derive(Debug, Default)]
pub struct WalkResult {
    pub stats: WalkStats,
    /// First [`MAX_RECORDED_ERRORS`] entry errors
    pub errors: Vec<EntryError>,
}

impl WalkResult {
    pub fn record(&mut self, error: EntryError) {
        self.stats.errors += 1;
        self.keep(error);
    }

    /// Fold a finished task's counters and errors into the run total.
    pub fn absorb(&mut self, stats: &WalkStats, errors: Vec<EntryError>) {
        self.stats.merge(stats);
        for error in errors {
            self.keep(error);
        }
    }

    fn keep(&mut self, error: EntryError) {
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(error);
        }
    }
}
