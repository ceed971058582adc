use std::sync::Arc;

use snafu::ResultExt;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::instrument;

use crate::model::{
    check_slide, FileId, PageTime, RevisionSnapshot, SaveStatus, ScriptMap, SlideNumber,
    ValidationError,
};
use crate::service::autosave::{AutosaveCoordinator, AutosaveSettings};
use crate::service::backend::SharedBackend;
use crate::service::cache::LocalCache;
use crate::service::generation::ScriptGenerationOrchestrator;
use crate::service::revision::{PreviewOutcome, RevisionHistoryManager};
use crate::service::script_store::{ScriptStore, SharedStore};
use crate::service::task::Task;
use crate::service::timer::{spawn_ticker, SharedTracker, SlideTimeTracker};
use crate::service::undo::UndoStack;

pub use error::*;
pub use keymap::*;
pub use report::*;

mod error;
mod keymap;
mod report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// the script has not been fetched yet
    Loading,
    GoalTimeUnset,
    Ready {
        timer_running: bool,
    },
    Exited,
}

/// One rehearsal of one deck. The only entry point the front-end talks to.
#[derive(Debug)]
pub struct PracticeSession {
    file_id: FileId,
    page_count: u32,
    backend: SharedBackend,
    cache: Arc<LocalCache>,
    store: SharedStore,
    tracker: SharedTracker,
    ticker: Option<Task>,
    undo: UndoStack,
    autosave: AutosaveCoordinator,
    revisions: RevisionHistoryManager,
    generation: ScriptGenerationOrchestrator,
    state: SessionState,
    current: SlideNumber,
    draft: String,
    guide_visible: bool,
}

impl PracticeSession {
    /// A session in [SessionState::Loading]. See [PracticeSession::load].
    pub fn new(
        file_id: FileId, page_count: u32, backend: SharedBackend, cache: Arc<LocalCache>,
        settings: AutosaveSettings,
    ) -> Result<Self, SessionError> {
        if page_count == 0 {
            return Err(ValidationError::EmptyDeck.into());
        }

        let store = Arc::new(RwLock::new(ScriptStore::empty(file_id, page_count)));
        let autosave =
            AutosaveCoordinator::new(store.clone(), backend.clone(), cache.clone(), settings);
        let revisions = RevisionHistoryManager::new(backend.clone(), store.clone(), autosave.clone());
        let generation =
            ScriptGenerationOrchestrator::new(backend.clone(), store.clone(), autosave.clone());

        Ok(Self {
            file_id,
            page_count,
            backend,
            cache,
            store,
            tracker: Arc::new(Mutex::new(SlideTimeTracker::new(1))),
            ticker: None,
            undo: UndoStack::new(),
            autosave,
            revisions,
            generation,
            state: SessionState::Loading,
            current: 1,
            draft: String::new(),
            guide_visible: false,
        })
    }

    pub async fn open(
        file_id: FileId, page_count: u32, backend: SharedBackend, cache: Arc<LocalCache>,
        settings: AutosaveSettings,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(file_id, page_count, backend, cache, settings)?;
        session.load().await?;
        Ok(session)
    }

    /// Fetches the script and moves on to [SessionState::GoalTimeUnset] or [SessionState::Ready].
    #[instrument(skip(self), fields(file_id = self.file_id))]
    pub async fn load(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Loading {
            return InactiveSnafu { state: self.state }.fail();
        }

        let file_id = self.file_id;
        let loaded = ScriptStore::load(file_id, self.page_count, &*self.backend, &self.cache)
            .await
            .context(LoadSnafu { file_id })?;

        *self.tracker.lock().await = SlideTimeTracker::from_durations(&loaded.snapshot(), 1);
        self.current = 1;
        self.draft = loaded.get(1).to_string();
        self.state = if loaded.goal_time() == 0 {
            SessionState::GoalTimeUnset
        } else {
            SessionState::Ready {
                timer_running: false,
            }
        };
        *self.store.write().await = loaded;

        tracing::info!(file_id, state = ?self.state, "practice session opened");
        Ok(())
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_slide(&self) -> SlideNumber {
        self.current
    }

    /// The live editor content of the current slide.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn guide_visible(&self) -> bool {
        self.guide_visible
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.autosave.subscribe()
    }

    pub async fn goal_time(&self) -> PageTime {
        PageTime::from_seconds(self.store.read().await.goal_time())
    }

    pub async fn elapsed(&self, slide: SlideNumber) -> PageTime {
        self.tracker.lock().await.elapsed(slide)
    }

    pub async fn total_time(&self) -> PageTime {
        self.tracker.lock().await.total()
    }

    /// What the editor shows: the previewed revision while one is open, otherwise the draft.
    pub async fn displayed_content(&self) -> String {
        match self.revisions.preview_content(self.current).await {
            Some(content) => content,
            None => self.draft.clone(),
        }
    }

    pub async fn export_text(&self) -> String {
        self.store.read().await.export_text()
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Loading | SessionState::Exited => {
                InactiveSnafu { state: self.state }.fail()
            }
            _ => Ok(()),
        }
    }

    fn ensure_ready(&self) -> Result<bool, SessionError> {
        self.ensure_active()?;
        match self.state {
            SessionState::Ready { timer_running } => Ok(timer_running),
            _ => GoalTimeUnsetSnafu.fail(),
        }
    }

    async fn ensure_editable(&self) -> Result<(), SessionError> {
        self.ensure_active()?;
        if self.revisions.previewing().await.is_some() {
            return PreviewReadOnlySnafu.fail();
        }

        Ok(())
    }

    /// Writes the whole script now. An open preview keeps autosave suspended, so it is closed first.
    async fn commit(&self) {
        if self.revisions.cancel_preview().await {
            tracing::info!(file_id = self.file_id, "revision preview closed by a checkpoint");
        }

        if let Err(error) = self.autosave.save_now().await {
            tracing::warn!(file_id = self.file_id, %error, "checkpoint not saved");
        }
    }

    #[instrument(skip(self), fields(file_id = self.file_id))]
    pub async fn set_goal_time(&mut self, goal: PageTime) -> Result<(), SessionError> {
        self.ensure_active()?;

        self.store.write().await.set_goal_time(goal.total_seconds());
        if self.state == SessionState::GoalTimeUnset {
            self.state = SessionState::Ready {
                timer_running: false,
            };
            self.guide_visible = true;
        }

        tracing::info!(%goal, "goal time set");
        self.commit().await;
        Ok(())
    }

    /// Replaces the current slide's text. The write is debounced.
    pub async fn edit(&mut self, content: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_editable().await?;

        let content = content.into();
        if content == self.draft {
            return Ok(());
        }

        self.undo.record_if_changed(self.current, &self.draft);
        self.draft = content;
        self.schedule_draft().await;

        Ok(())
    }

    /// Brings back the text before the last edit of the current slide. Returns `false` when there is nothing to undo.
    pub async fn undo(&mut self) -> Result<bool, SessionError> {
        self.ensure_editable().await?;

        let Some(prior) = self.undo.pop(self.current) else {
            return Ok(false);
        };

        self.draft = prior;
        self.schedule_draft().await;
        Ok(true)
    }

    async fn schedule_draft(&self) {
        let duration = self.elapsed(self.current).await.total_seconds();
        self.autosave
            .schedule_save(self.current, self.draft.clone(), duration)
            .await;
    }

    /// Moves to `target`, writing the outgoing slide's text and time first.
    #[instrument(skip(self), fields(file_id = self.file_id, from = self.current))]
    pub async fn navigate(&mut self, target: SlideNumber) -> Result<(), SessionError> {
        self.ensure_active()?;
        check_slide(target, self.page_count)?;
        if target == self.current {
            return Ok(());
        }

        let outgoing = self.current;
        let seconds = {
            let mut tracker = self.tracker.lock().await;
            let (_, seconds) = tracker.checkpoint();
            tracker.switch_to(target);
            seconds
        };

        {
            let mut store = self.store.write().await;
            store.set_local(outgoing, self.draft.clone());
            store.set_duration(outgoing, seconds);
        }
        self.commit().await;

        self.undo.clear(outgoing);
        self.current = target;
        self.draft = self.store.read().await.get(target).to_string();

        if let Err(error) = self.backend.update_current_page(self.file_id, target).await {
            tracing::warn!(file_id = self.file_id, slide = target, %error, "could not report the current page");
        }

        tracing::debug!(slide = target, "switched slide");
        Ok(())
    }

    /// Returns `false` on the last slide.
    pub async fn next(&mut self) -> Result<bool, SessionError> {
        self.ensure_active()?;
        if self.current >= self.page_count {
            return Ok(false);
        }

        self.navigate(self.current + 1).await.map(|_| true)
    }

    /// Returns `false` on the first slide.
    pub async fn previous(&mut self) -> Result<bool, SessionError> {
        self.ensure_active()?;
        if self.current <= 1 {
            return Ok(false);
        }

        self.navigate(self.current - 1).await.map(|_| true)
    }

    /// Starts or stops the timer and returns whether it is running now.
    pub async fn toggle_timer(&mut self) -> Result<bool, SessionError> {
        if self.ensure_ready()? {
            self.stop_timer().await;
            self.commit().await;
            Ok(false)
        } else {
            self.tracker.lock().await.start();
            self.ticker = Some(spawn_ticker(self.tracker.clone()));
            self.guide_visible = false;
            self.state = SessionState::Ready {
                timer_running: true,
            };

            tracing::info!(file_id = self.file_id, slide = self.current, "timer started");
            Ok(true)
        }
    }

    /// Stops the ticker and writes the current slide's time into the store.
    async fn stop_timer(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.shutdown().await;
        }

        let (slide, seconds) = {
            let mut tracker = self.tracker.lock().await;
            tracker.stop();
            tracker.checkpoint()
        };
        self.store.write().await.set_duration(slide, seconds);

        if let SessionState::Ready { .. } = self.state {
            self.state = SessionState::Ready {
                timer_running: false,
            };
        }
        tracing::info!(file_id = self.file_id, slide, seconds, "timer stopped");
    }

    /// Zeroes every slide's time, keeping the text, and writes the result.
    pub async fn reset_timer(&mut self) -> Result<(), SessionError> {
        self.ensure_ready()?;

        if let Some(ticker) = self.ticker.take() {
            ticker.shutdown().await;
        }
        self.tracker.lock().await.reset_all();
        self.store.write().await.zero_durations();
        self.state = SessionState::Ready {
            timer_running: false,
        };

        tracing::info!(file_id = self.file_id, "timer reset");
        self.commit().await;
        Ok(())
    }

    /// Ends the rehearsal with one final write of the complete script.
    #[instrument(skip(self), fields(file_id = self.file_id))]
    pub async fn exit(&mut self) -> Result<PracticeReport, SessionError> {
        self.ensure_active()?;

        self.stop_timer().await;
        self.store
            .write()
            .await
            .set_local(self.current, self.draft.clone());
        self.commit().await;
        self.state = SessionState::Exited;

        let (total_time, page_times) = {
            let tracker = self.tracker.lock().await;
            (tracker.total(), tracker.durations())
        };
        let store = self.store.read().await;
        let report = PracticeReport {
            total_time,
            page_times,
            slides: store.slides(),
            goal_time: PageTime::from_seconds(store.goal_time()),
        };

        tracing::info!(total = %report.total_time, goal = %report.goal_time, "practice finished");
        Ok(report)
    }

    pub async fn generate_all(&mut self) -> Result<ScriptMap, SessionError> {
        self.ensure_editable().await?;
        self.autosave.flush().await.ok();

        let slides = self.generation.generate_all().await?;
        self.draft = self.store.read().await.get(self.current).to_string();

        Ok(slides)
    }

    pub async fn regenerate_current(&mut self) -> Result<String, SessionError> {
        self.ensure_editable().await?;

        let content = self
            .generation
            .regenerate_one(self.current, &self.draft)
            .await?;
        self.draft = content.clone();

        Ok(content)
    }

    pub async fn history(&self) -> Result<Vec<RevisionSnapshot>, SessionError> {
        self.ensure_active()?;
        Ok(self.revisions.list().await?)
    }

    /// Shows a past revision read-only, or hides it when it is already shown.
    pub async fn preview(&mut self, filename: &str) -> Result<PreviewOutcome, SessionError> {
        self.ensure_active()?;
        if let Err(error) = self.autosave.flush().await {
            tracing::warn!(file_id = self.file_id, %error, "pending edit not saved before preview");
        }

        Ok(self.revisions.preview(filename).await?)
    }

    pub async fn cancel_preview(&mut self) -> bool {
        self.revisions.cancel_preview().await
    }

    pub async fn previewing(&self) -> Option<String> {
        self.revisions.previewing().await
    }

    /// Makes a past revision the current script.
    pub async fn restore(&mut self, filename: &str) -> Result<(), SessionError> {
        self.ensure_active()?;

        self.revisions.restore(filename).await?;
        self.draft = self.store.read().await.get(self.current).to_string();
        self.undo.clear(self.current);

        Ok(())
    }

    /// Runs the shortcut bound to `press`, if any applies in `view`.
    pub async fn handle_key(
        &mut self, press: KeyPress, view: ViewState,
    ) -> Result<Option<Command>, SessionError> {
        let Some(command) = resolve(press, view) else {
            return Ok(None);
        };

        match command {
            Command::NextSlide => self.next().await.map(|_| ())?,
            Command::PreviousSlide => self.previous().await.map(|_| ())?,
            Command::Undo => self.undo().await.map(|_| ())?,
        }

        Ok(Some(command))
    }

    /// Tears the session down, writing an edit that is still waiting for its debounce.
    pub async fn close(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.shutdown().await;
        }
        self.revisions.cancel_preview().await;

        if let Err(error) = self.autosave.flush().await {
            tracing::warn!(file_id = self.file_id, %error, "last edit not saved on close");
        }
        self.autosave.shutdown().await;

        self.state = SessionState::Exited;
        tracing::info!(file_id = self.file_id, "practice session closed");
    }
}
