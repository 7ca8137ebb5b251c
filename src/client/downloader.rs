//! Client-side download scheduler: a persistent FIFO queue of `DownloadTask`s
//! driven at concurrency 1, with pause/resume/retry/cancel and broadcast
//! progress/queue-change streams for a UI to subscribe to.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Notify};

use crate::error::{CoreError, CoreResult};
use crate::models::{DownloadProgress, DownloadStatus, DownloadTask, MAX_RETRIES};

const RETRY_BACKOFF: Duration = Duration::from_secs(5);
const QUEUE_CHANGE_CAPACITY: usize = 64;
const PROGRESS_CAPACITY: usize = 256;

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueDocument {
    tasks: Vec<DownloadTask>,
}

struct SchedulerState {
    tasks: Vec<DownloadTask>,
    driving: bool,
}

/// Single-owner client download queue. Cheap to clone (internally an `Arc`).
#[derive(Clone)]
pub struct DownloadScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    queue_path: PathBuf,
    downloads_dir: PathBuf,
    state: Mutex<SchedulerState>,
    progress_tx: broadcast::Sender<DownloadProgress>,
    queue_tx: broadcast::Sender<Vec<DownloadTask>>,
    cancel_signals: Mutex<HashMap<String, Arc<Notify>>>,
    http: reqwest::Client,
}

impl DownloadScheduler {
    pub fn new(queue_path: PathBuf, downloads_dir: PathBuf) -> Self {
        let tasks = load_queue(&queue_path);
        let (progress_tx, _) = broadcast::channel(PROGRESS_CAPACITY);
        let (queue_tx, _) = broadcast::channel(QUEUE_CHANGE_CAPACITY);

        let _ = std::fs::create_dir_all(&downloads_dir);

        Self {
            inner: Arc::new(Inner {
                queue_path,
                downloads_dir,
                state: Mutex::new(SchedulerState { tasks, driving: false }),
                progress_tx,
                queue_tx,
                cancel_signals: Mutex::new(HashMap::new()),
                http: reqwest::Client::new(),
            }),
        }
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<DownloadProgress> {
        self.inner.progress_tx.subscribe()
    }

    pub fn subscribe_queue_changes(&self) -> broadcast::Receiver<Vec<DownloadTask>> {
        self.inner.queue_tx.subscribe()
    }

    pub fn enqueue(&self, task: DownloadTask) {
        self.enqueue_batch(vec![task]);
    }

    pub fn enqueue_batch(&self, tasks: Vec<DownloadTask>) {
        {
            let mut state = self.inner.state.lock();
            state.tasks.extend(tasks);
        }
        self.persist_and_notify();
        self.drive();
    }

    pub fn pause(&self, task_id: &str) {
        self.cancel_in_flight(task_id);
        self.mutate_task(task_id, |t| {
            if t.status == DownloadStatus::Downloading {
                t.status = DownloadStatus::Paused;
            }
        });
    }

    pub fn resume(&self, task_id: &str) {
        self.mutate_task(task_id, |t| {
            if t.status == DownloadStatus::Paused {
                t.status = DownloadStatus::Pending;
            }
        });
        self.drive();
    }

    pub fn retry(&self, task_id: &str) {
        self.mutate_task(task_id, |t| {
            if t.status == DownloadStatus::Failed {
                t.status = DownloadStatus::Pending;
                t.error = None;
            }
        });
        self.drive();
    }

    pub fn cancel(&self, task_id: &str) {
        self.cancel_in_flight(task_id);
        self.mutate_task(task_id, |t| {
            t.status = DownloadStatus::Cancelled;
            t.bytes_received = 0;
        });
    }

    pub fn clear_all(&self) {
        {
            let mut state = self.inner.state.lock();
            state.tasks.clear();
        }
        self.persist_and_notify();
    }

    /// Remove every task belonging to `album_id`, or every standalone task
    /// (`album_id == None`) if none is given.
    pub fn delete_album(&self, album_id: Option<&str>) {
        {
            let mut state = self.inner.state.lock();
            state.tasks.retain(|t| match album_id {
                Some(id) => t.album_id.as_deref() != Some(id),
                None => t.album_id.is_some(),
            });
        }
        self.persist_and_notify();
    }

    fn cancel_in_flight(&self, task_id: &str) {
        if let Some(notify) = self.inner.cancel_signals.lock().get(task_id) {
            notify.notify_waiters();
        }
    }

    fn mutate_task(&self, task_id: &str, f: impl FnOnce(&mut DownloadTask)) {
        {
            let mut state = self.inner.state.lock();
            if let Some(task) = state.tasks.iter_mut().find(|t| t.id == task_id) {
                f(task);
            }
        }
        self.persist_and_notify();
    }

    /// Like `mutate_task`, but only applies `f` (and only persists) when
    /// `predicate` still holds at mutation time. Returns whether it applied.
    fn mutate_task_if(
        &self,
        task_id: &str,
        predicate: impl Fn(&DownloadTask) -> bool,
        f: impl FnOnce(&mut DownloadTask),
    ) -> bool {
        let applied = {
            let mut state = self.inner.state.lock();
            match state.tasks.iter_mut().find(|t| t.id == task_id) {
                Some(t) if predicate(t) => {
                    f(t);
                    true
                }
                _ => false,
            }
        };
        if applied {
            self.persist_and_notify();
        }
        applied
    }

    fn persist_and_notify(&self) {
        let tasks = self.inner.state.lock().tasks.clone();
        if let Err(e) = save_queue(&self.inner.queue_path, &tasks) {
            tracing::warn!("failed to persist download queue: {}", e);
        }
        let _ = self.inner.queue_tx.send(tasks);
    }

    /// Ensure exactly one driver loop is running; a no-op if one already is
    /// (concurrency is fixed at 1, per the scheduling contract).
    fn drive(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.driving {
                return;
            }
            state.driving = true;
        }

        let this = self.clone();
        crate::utils::threading::spawn_background(async move {
            this.drive_loop().await;
            this.inner.state.lock().driving = false;
        });
    }

    async fn drive_loop(&self) {
        loop {
            let next_id = {
                let mut state = self.inner.state.lock();
                let candidate = state.tasks.iter().find(|t| t.status == DownloadStatus::Pending).map(|t| t.id.clone());
                if let Some(id) = &candidate {
                    if let Some(task) = state.tasks.iter_mut().find(|t| &t.id == id) {
                        task.status = DownloadStatus::Downloading;
                    }
                }
                candidate
            };
            self.persist_and_notify();

            let Some(task_id) = next_id else { break };
            self.run_download(&task_id).await;
        }
    }

    async fn run_download(&self, task_id: &str) {
        let task = {
            let state = self.inner.state.lock();
            match state.tasks.iter().find(|t| t.id == task_id) {
                Some(t) => t.clone(),
                None => return,
            }
        };

        let notify = Arc::new(Notify::new());
        self.inner.cancel_signals.lock().insert(task_id.to_string(), notify.clone());

        let dest = self.inner.downloads_dir.join(format!("{}.mp3", task.song_id));
        let result = tokio::select! {
            result = self.transfer(&task, &dest) => result,
            _ = notify.notified() => Err(CoreError::DownloadTransportError("paused or cancelled".to_string())),
        };

        self.inner.cancel_signals.lock().remove(task_id);

        match result {
            Ok(bytes_written) => {
                let on_disk_size = std::fs::metadata(&dest).map(|m| m.len()).unwrap_or(bytes_written);
                self.mutate_task(task_id, |t| t.mark_completed(on_disk_size));
            }
            Err(_) => {
                let still_active = {
                    let state = self.inner.state.lock();
                    state
                        .tasks
                        .iter()
                        .find(|t| t.id == task_id)
                        .map(|t| t.status == DownloadStatus::Downloading)
                        .unwrap_or(false)
                };
                if !still_active {
                    // Paused or cancelled out from under us; leave its status alone.
                    return;
                }

                let should_retry = {
                    let mut state = self.inner.state.lock();
                    let task = state.tasks.iter_mut().find(|t| t.id == task_id);
                    match task {
                        Some(t) if t.retry_count < MAX_RETRIES => {
                            t.retry_count += 1;
                            true
                        }
                        Some(t) => {
                            t.status = DownloadStatus::Failed;
                            t.error = Some(format!("failed after {} retries", t.retry_count));
                            false
                        }
                        None => false,
                    }
                };
                self.persist_and_notify();

                if should_retry {
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    // A pause/cancel arriving during the backoff already moved the
                    // task off `Downloading`; don't clobber it back on re-entry.
                    let still_downloading = self.mutate_task_if(
                        task_id,
                        |t| t.status == DownloadStatus::Downloading,
                        |t| t.status = DownloadStatus::Downloading,
                    );
                    if still_downloading {
                        let fut = Box::pin(self.run_download(task_id));
                        fut.await;
                    }
                }
            }
        }
    }

    async fn transfer(&self, task: &DownloadTask, dest: &Path) -> CoreResult<u64> {
        let response = self
            .inner
            .http
            .get(&task.download_url)
            .send()
            .await
            .map_err(|e| CoreError::DownloadTransportError(e.to_string()))?;

        let total = response.content_length().or(task.expected_bytes);
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(CoreError::Io)?;

        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CoreError::DownloadTransportError(e.to_string()))?;
            file.write_all(&chunk).await.map_err(CoreError::Io)?;
            received += chunk.len() as u64;

            self.mutate_task_silent(&task.id, received);
            let _ = self.inner.progress_tx.send(DownloadProgress {
                task_id: task.id.clone(),
                fraction: total.map(|t| (received as f64 / t as f64).min(1.0)).unwrap_or(0.0),
                bytes: received,
                total,
            });
        }

        Ok(received)
    }

    /// Update `bytes_received` without the full persist-and-broadcast path;
    /// progress updates may coalesce, unlike queue-change events.
    fn mutate_task_silent(&self, task_id: &str, bytes_received: u64) {
        let mut state = self.inner.state.lock();
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == task_id) {
            task.bytes_received = bytes_received;
        }
    }
}

fn load_queue(path: &Path) -> Vec<DownloadTask> {
    if !path.exists() {
        return Vec::new();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str::<QueueDocument>(&content).map(|d| d.tasks).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

fn save_queue(path: &Path, tasks: &[DownloadTask]) -> std::io::Result<()> {
    let doc = QueueDocument { tasks: tasks.to_vec() };
    let content = serde_json::to_string_pretty(&doc)?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let tmp = parent.join(".queue.json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn task(id: &str) -> DownloadTask {
        DownloadTask::new(
            id.to_string(),
            "T".to_string(),
            "A".to_string(),
            None,
            None,
            None,
            "https://example.invalid/x.mp3".to_string(),
            Some(100),
        )
    }

    #[tokio::test]
    async fn enqueue_persists_queue_file() {
        let dir = TempDir::new().unwrap();
        let queue_path = dir.path().join("queue.json");
        let scheduler = DownloadScheduler::new(queue_path.clone(), dir.path().join("songs"));
        scheduler.enqueue(task("abc"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue_path.exists());
    }

    #[tokio::test]
    async fn cancel_sets_cancelled_status_and_resets_bytes() {
        let dir = TempDir::new().unwrap();
        let scheduler = DownloadScheduler::new(dir.path().join("queue.json"), dir.path().join("songs"));
        let mut t = task("abc");
        t.bytes_received = 50;
        scheduler.enqueue(t);
        scheduler.cancel("song_abc");

        let state = scheduler.inner.state.lock();
        let found = state.tasks.iter().find(|t| t.id == "song_abc").unwrap();
        assert_eq!(found.status, DownloadStatus::Cancelled);
        assert_eq!(found.bytes_received, 0);
    }

    #[tokio::test]
    async fn retry_on_failed_task_returns_to_pending() {
        let dir = TempDir::new().unwrap();
        let scheduler = DownloadScheduler::new(dir.path().join("queue.json"), dir.path().join("songs"));
        let mut t = task("abc");
        t.status = DownloadStatus::Failed;
        scheduler.enqueue_batch(vec![t]);
        scheduler.retry("song_abc");

        tokio::time::sleep(Duration::from_millis(10)).await;
        let state = scheduler.inner.state.lock();
        let found = state.tasks.iter().find(|t| t.id == "song_abc").unwrap();
        assert_eq!(found.status, DownloadStatus::Pending);
    }

    #[tokio::test]
    async fn delete_album_removes_only_matching_tasks() {
        let dir = TempDir::new().unwrap();
        let scheduler = DownloadScheduler::new(dir.path().join("queue.json"), dir.path().join("songs"));
        let mut in_album = task("a1");
        in_album.album_id = Some("alb1".to_string());
        let standalone = task("a2");
        scheduler.enqueue_batch(vec![in_album, standalone]);

        scheduler.delete_album(Some("alb1"));

        let state = scheduler.inner.state.lock();
        assert_eq!(state.tasks.len(), 1);
        assert_eq!(state.tasks[0].id, "song_a2");
    }
}
