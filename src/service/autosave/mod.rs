use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use derive_new::new;
use tokio::sync::{watch, Mutex};
use tracing::instrument;

use crate::model::{SaveStatus, SlideNumber};
use crate::service::backend::{BackendError, SharedBackend};
use crate::service::cache::LocalCache;
use crate::service::script_store::SharedStore;
use crate::service::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct AutosaveSettings {
    /// trailing window that coalesces edits into one write
    pub debounce: Duration,
    /// how long `success` and `error` stay visible before falling back to `idle`
    pub status_display: Duration,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            status_display: Duration::from_secs(10),
        }
    }
}

/// Turns edits and checkpoints into full-document writes of one session's [ScriptStore](crate::service::script_store::ScriptStore).
///
/// Debounced writes read the store when they fire, so every write carries the whole current map.
#[derive(Debug, Clone)]
pub struct AutosaveCoordinator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: SharedStore,
    backend: SharedBackend,
    cache: Arc<LocalCache>,
    settings: AutosaveSettings,
    suspended: AtomicBool,
    pending: Mutex<Option<Pending>>,
    status_reset: Mutex<Option<Task>>,
    status: watch::Sender<SaveStatus>,
}

/// A debounce waiting to fire. Whoever flips `fired` first does the write.
#[derive(Debug)]
struct Pending {
    task: Task,
    fired: Arc<AtomicBool>,
}

impl AutosaveCoordinator {
    pub fn new(
        store: SharedStore, backend: SharedBackend, cache: Arc<LocalCache>, settings: AutosaveSettings,
    ) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);

        Self {
            inner: Arc::new(Inner {
                store,
                backend,
                cache,
                settings,
                suspended: AtomicBool::new(false),
                pending: Mutex::new(None),
                status_reset: Mutex::new(None),
                status,
            }),
        }
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_suspended(&self) -> bool {
        self.inner.suspended.load(Ordering::Acquire)
    }

    /// Applies an edit of `slide` to the store and arms the debounce.
    pub async fn schedule_save(&self, slide: SlideNumber, content: String, duration: u64) {
        if self.is_suspended() {
            tracing::debug!(slide, "autosave suspended, edit not scheduled");
            return;
        }

        {
            let mut store = self.inner.store.write().await;
            store.set_local(slide, content);
            store.set_duration(slide, duration);
        }

        self.schedule().await;
    }

    /// Arms the debounce for whatever the store holds when it fires. A pending debounce is cancelled.
    pub async fn schedule(&self) {
        if self.is_suspended() {
            return;
        }

        self.inner.clear_settled_status().await;

        let inner = self.inner.clone();
        let debounce = self.inner.settings.debounce;
        let fired = Arc::new(AtomicBool::new(false));
        let task = Task::spawn({
            let fired = fired.clone();
            move |mut stop| async move {
                tokio::select! {
                    _ = tokio::time::sleep(debounce) => {
                        if !fired.swap(true, Ordering::AcqRel) {
                            let _ = inner.write().await;
                        }
                    }
                    _ = &mut stop => {}
                }
            }
        });

        let pending = Pending { task, fired };
        if let Some(previous) = self.inner.pending.lock().await.replace(pending) {
            previous.task.stop();
        }
    }

    /// Writes right away, cancelling any pending debounce. A no-op while suspended.
    pub async fn save_now(&self) -> Result<(), BackendError> {
        if self.is_suspended() {
            tracing::debug!("autosave suspended, checkpoint skipped");
            return Ok(());
        }

        self.inner.cancel_pending().await;
        self.inner.write().await
    }

    /// Writes a debounced edit that has not fired yet. Returns whether a write happened.
    pub async fn flush(&self) -> Result<bool, BackendError> {
        let pending = self.inner.pending.lock().await.take();

        match pending {
            Some(pending) if !self.is_suspended() && !pending.fired.swap(true, Ordering::AcqRel) => {
                pending.task.stop();
                self.inner.write().await.map(|_| true)
            }
            _ => Ok(false),
        }
    }

    /// Stops all saving, cancelling a pending debounce.
    pub async fn suspend(&self) {
        self.inner.suspended.store(true, Ordering::Release);
        self.inner.cancel_pending().await;
        tracing::debug!("autosave suspended");
    }

    pub fn resume(&self) {
        self.inner.suspended.store(false, Ordering::Release);
        tracing::debug!("autosave resumed");
    }

    pub async fn shutdown(&self) {
        self.inner.cancel_pending().await;
        if let Some(task) = self.inner.status_reset.lock().await.take() {
            task.stop();
        }
    }
}

impl Inner {
    async fn cancel_pending(&self) {
        if let Some(pending) = self.pending.lock().await.take() {
            pending.task.stop();
        }
    }

    async fn clear_settled_status(&self) {
        if let Some(task) = self.status_reset.lock().await.take() {
            task.stop();
        }

        self.status.send_if_modified(|status| {
            let settled = status.is_settled();
            if settled {
                *status = SaveStatus::Idle;
            }
            settled
        });
    }

    #[instrument(skip(self), fields(file_id = tracing::field::Empty))]
    async fn write(self: &Arc<Self>) -> Result<(), BackendError> {
        let (file_id, data) = {
            let store = self.store.read().await;
            (store.file_id(), store.data())
        };
        tracing::Span::current().record("file_id", file_id);

        if let Some(task) = self.status_reset.lock().await.take() {
            task.stop();
        }
        self.status.send_replace(SaveStatus::Saving);

        if let Err(error) = self.cache.put(file_id, data.clone()).await {
            tracing::warn!(file_id, %error, "could not mirror the script into the local cache");
        }

        let result = self.backend.save_script(file_id, &data).await;
        match &result {
            Ok(()) => {
                tracing::info!(file_id, slides = data.slides.len(), "script saved");
                self.status.send_replace(SaveStatus::Success);
            }
            Err(error) => {
                tracing::error!(file_id, %error, "could not save the script");
                self.status.send_replace(SaveStatus::Error);
            }
        }

        self.arm_status_reset().await;
        result
    }

    async fn arm_status_reset(self: &Arc<Self>) {
        let inner = self.clone();
        let display = self.settings.status_display;
        let task = Task::spawn(|mut stop| async move {
            tokio::select! {
                _ = tokio::time::sleep(display) => {
                    inner.status.send_if_modified(|status| {
                        let settled = status.is_settled();
                        if settled {
                            *status = SaveStatus::Idle;
                        }
                        settled
                    });
                }
                _ = &mut stop => {}
            }
        });

        if let Some(previous) = self.status_reset.lock().await.replace(task) {
            previous.stop();
        }
    }
}
