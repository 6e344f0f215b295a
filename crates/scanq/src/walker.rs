//! Concurrent directory walk with per-file filter, classify and publish
//!
//! # Design
//!
//! - One task per directory. A task lists its own directory only, and every
//!   subdirectory it finds is sent back to the scheduler before any of the
//!   directory's files are handled
//! - The scheduler keeps at most `max_concurrent_dirs` tasks live and queues
//!   the rest, so wide trees do not spawn unbounded work
//! - Symlinks are never followed, so each directory is listed exactly once
//! - Per-entry failures are counted and recorded, never propagated. A task
//!   that panics loses only the files it had not reached yet

use crate::classify::FileClassifier;
use crate::publish::EventSink;
use crate::types::{DiscoveryEvent, EntryError, EntryErrorKind, WalkResult, WalkStats};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::mpsc;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, warn};

/// Shared state for every directory task
struct WalkContext<S> {
    cutoff: SystemTime,
    classifier: FileClassifier,
    sink: Arc<S>,
    /// Subdirectories found by any task, queued by the scheduler
    found: mpsc::UnboundedSender<PathBuf>,
}

/// What one directory task hands back
#[derive(Default)]
struct DirOutcome {
    stats: WalkStats,
    errors: Vec<EntryError>,
}

impl DirOutcome {
    fn record(&mut self, error: EntryError) {
        debug!(path = %error.path, kind = %error.kind, error = %error.message, "Entry error");
        self.stats.errors += 1;
        self.errors.push(error);
    }
}

pub struct TraversalScheduler<S> {
    sink: Arc<S>,
    classifier: FileClassifier,
    max_concurrent_dirs: usize,
}

impl<S: EventSink + 'static> TraversalScheduler<S> {
    pub fn new(sink: Arc<S>, classifier: FileClassifier, max_concurrent_dirs: usize) -> Self {
        Self {
            sink,
            classifier,
            max_concurrent_dirs: max_concurrent_dirs.max(1),
        }
    }

    /// Walk `root` and publish every regular file modified strictly after `cutoff`.
    ///
    /// Returns once every directory task has finished.
    pub async fn walk(&self, root: &Path, cutoff: SystemTime) -> WalkResult {
        let start = Instant::now();
        info!(
            root = %root.display(),
            max_concurrent_dirs = self.max_concurrent_dirs,
            "Starting walk"
        );

        let (found, mut found_rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(WalkContext {
            cutoff,
            classifier: self.classifier.clone(),
            sink: Arc::clone(&self.sink),
            found,
        });

        let mut pending: VecDeque<PathBuf> = VecDeque::from([root.to_path_buf()]);
        let mut in_flight: JoinSet<DirOutcome> = JoinSet::new();
        let mut dirs_by_task: HashMap<task::Id, PathBuf> = HashMap::new();
        let mut result = WalkResult::default();

        loop {
            while in_flight.len() < self.max_concurrent_dirs {
                let Some(dir) = pending.pop_front() else {
                    break;
                };
                let handle = in_flight.spawn(walk_dir(dir.clone(), Arc::clone(&ctx)));
                dirs_by_task.insert(handle.id(), dir);
            }

            if in_flight.is_empty() {
                // every finished task sent its subdirectories before returning
                while let Ok(dir) = found_rx.try_recv() {
                    pending.push_back(dir);
                }
                if pending.is_empty() {
                    break;
                }
                continue;
            }

            tokio::select! {
                biased;
                Some(dir) = found_rx.recv() => pending.push_back(dir),
                Some(joined) = in_flight.join_next_with_id() => match joined {
                    Ok((id, outcome)) => {
                        dirs_by_task.remove(&id);
                        result.absorb(&outcome.stats, outcome.errors);
                    }
                    Err(join_err) => {
                        let dir = dirs_by_task.remove(&join_err.id()).unwrap_or_default();
                        warn!(
                            dir = %dir.display(),
                            error = %join_err,
                            "Directory task failed; its remaining files were not handled"
                        );
                        result.record(EntryError::new(&dir, EntryErrorKind::TaskPanicked, join_err));
                    }
                },
            }
        }

        if result.stats.dirs_scanned == 0 {
            warn!(root = %root.display(), "Scan root is not usable");
        }

        result.stats.duration_ms = start.elapsed().as_millis() as u64;
        result
    }
}

/// List one directory. Subdirectories are sent to the scheduler, not descended into.
async fn walk_dir<S: EventSink>(dir: PathBuf, ctx: Arc<WalkContext<S>>) -> DirOutcome {
    let mut outcome = DirOutcome::default();

    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) => {
            outcome.record(EntryError::new(&dir, EntryErrorKind::ReadDir, e));
            return outcome;
        }
    };
    outcome.stats.dirs_scanned += 1;

    let mut files = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                // the listing cannot be resumed past a failed read
                outcome.record(EntryError::new(&dir, EntryErrorKind::ReadEntry, e));
                break;
            }
        };

        let path = entry.path();
        let file_type = match entry.file_type().await {
            Ok(ft) => ft,
            Err(e) => {
                outcome.record(EntryError::new(&path, EntryErrorKind::Metadata, e));
                continue;
            }
        };

        if file_type.is_dir() {
            // the receiver lives until every task has been joined
            let _ = ctx.found.send(path);
        } else if file_type.is_file() {
            files.push(entry);
        } else {
            outcome.stats.other_skipped += 1;
        }
    }

    for entry in files {
        handle_file(&entry.path(), &entry, &ctx, &mut outcome).await;
    }

    outcome
}

async fn handle_file<S: EventSink>(
    path: &Path,
    entry: &tokio::fs::DirEntry,
    ctx: &WalkContext<S>,
    outcome: &mut DirOutcome,
) {
    let modified = match entry.metadata().await.and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) => {
            outcome.record(EntryError::new(path, EntryErrorKind::Metadata, e));
            return;
        }
    };
    outcome.stats.files_seen += 1;

    if modified <= ctx.cutoff {
        outcome.stats.files_too_old += 1;
        return;
    }

    let Some(path_str) = path.to_str() else {
        outcome.record(EntryError::new(
            path,
            EntryErrorKind::InvalidPath,
            "path is not valid UTF-8",
        ));
        return;
    };
    outcome.stats.files_matched += 1;

    let mime = match ctx.classifier.try_classify(path).await {
        Ok(mime) => mime,
        Err(e) => {
            outcome.stats.classify_failures += 1;
            outcome.record(EntryError::new(path, EntryErrorKind::Classify, e));
            String::new()
        }
    };

    let event = DiscoveryEvent::new(path_str, modified, mime);
    match ctx.sink.publish(&event).await {
        Ok(()) => {
            outcome.stats.events_published += 1;
            debug!(path = %event.path, mime = %event.mime, "Discovered file");
        }
        Err(e) => {
            outcome.stats.publish_failures += 1;
            outcome.record(EntryError::new(path, EntryErrorKind::Publish, e));
        }
    }
}
