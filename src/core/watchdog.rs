//! Filesystem watchdog: turns debounced filesystem events into `FileChange`
//! batches for the change processor. Runs for the lifetime of the returned
//! debouncer handle; dropping it stops the watch.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};

use crate::models::FileChange;
use crate::utils::filesystem::is_audio_file;

const DEBOUNCE: Duration = Duration::from_secs(2);

/// Watch `root` recursively, calling `on_batch` with the changed audio files
/// whenever the debouncer flushes a batch.
///
/// The minimal debouncer doesn't distinguish create/modify, and folds a
/// rename into a remove-then-create pair on most platforms; this is treated
/// as `Modified` (if the path still exists) or `Removed` (if it doesn't) —
/// the change processor's soft-fail extraction path handles either case
/// correctly without needing a true rename signal.
pub fn watch(
    root: PathBuf,
    on_batch: impl Fn(Vec<FileChange>) + Send + 'static,
) -> notify::Result<Debouncer<notify::RecommendedWatcher>> {
    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("watchdog error: {}", e);
                return;
            }
        };

        let changes: Vec<FileChange> = events
            .into_iter()
            .filter(|e| is_audio_file(&e.path))
            .map(|e| {
                let path = e.path.to_string_lossy().to_string();
                let at = Utc::now();
                if matches!(e.kind, DebouncedEventKind::Any) && e.path.exists() {
                    FileChange::Modified { path, at }
                } else {
                    FileChange::Removed { path, at }
                }
            })
            .collect();

        if !changes.is_empty() {
            on_batch(changes);
        }
    })?;

    debouncer.watcher().watch(&root, notify::RecursiveMode::Recursive)?;
    tracing::info!("watchdog started on {}", root.display());
    Ok(debouncer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    #[test]
    fn detects_new_audio_file() {
        let dir = TempDir::new().unwrap();
        let seen: Arc<Mutex<Vec<FileChange>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _debouncer = watch(dir.path().to_path_buf(), move |changes| {
            seen_clone.lock().unwrap().extend(changes);
        })
        .unwrap();

        std::fs::write(dir.path().join("new.mp3"), b"fake").unwrap();
        std::thread::sleep(StdDuration::from_secs(3));

        assert!(!seen.lock().unwrap().is_empty());
    }
}
