use snafu::{ResultExt, Snafu};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::model::{sort_newest_first, RevisionSnapshot, ScriptMap, SlideNumber};
use crate::service::autosave::AutosaveCoordinator;
use crate::service::backend::{BackendError, SharedBackend};
use crate::service::script_store::SharedStore;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RevisionError {
    #[snafu(display("could not list the revisions: {source}"))]
    List { source: BackendError },

    #[snafu(display("could not fetch revision `{filename}`: {source}"))]
    Fetch {
        filename: String,
        source: BackendError,
    },
}

/// What selecting a revision did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    Showing(ScriptMap),
    /// The revision was already shown, the live script is back.
    Cancelled,
}

#[derive(Debug)]
struct Preview {
    filename: String,
    slides: ScriptMap,
}

/// Browses the revisions the backend records on every save.
///
/// A preview is read-only: autosave stays suspended until the preview is cancelled or restored.
#[derive(Debug)]
pub struct RevisionHistoryManager {
    backend: SharedBackend,
    store: SharedStore,
    autosave: AutosaveCoordinator,
    preview: Mutex<Option<Preview>>,
}

impl RevisionHistoryManager {
    pub fn new(backend: SharedBackend, store: SharedStore, autosave: AutosaveCoordinator) -> Self {
        Self {
            backend,
            store,
            autosave,
            preview: Mutex::new(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<RevisionSnapshot>, RevisionError> {
        let file_id = self.store.read().await.file_id();
        let filenames = self.backend.list_revisions(file_id).await.context(ListSnafu)?;

        let mut revisions: Vec<_> = filenames
            .into_iter()
            .map(RevisionSnapshot::from_filename)
            .collect();
        sort_newest_first(&mut revisions);

        tracing::debug!(file_id, count = revisions.len(), "listed revisions");
        Ok(revisions)
    }

    /// Shows `filename` without touching the live script. Selecting the shown revision again cancels the preview.
    #[instrument(skip(self))]
    pub async fn preview(&self, filename: &str) -> Result<PreviewOutcome, RevisionError> {
        let mut preview = self.preview.lock().await;
        if preview.as_ref().is_some_and(|shown| shown.filename == filename) {
            *preview = None;
            self.autosave.resume();
            tracing::info!(filename, "revision preview cancelled");
            return Ok(PreviewOutcome::Cancelled);
        }

        let slides = self.fetch(filename).await?;

        self.autosave.suspend().await;
        *preview = Some(Preview {
            filename: filename.to_string(),
            slides: slides.clone(),
        });

        tracing::info!(filename, "previewing revision");
        Ok(PreviewOutcome::Showing(slides))
    }

    /// Returns to the live script. Nothing is written.
    pub async fn cancel_preview(&self) -> bool {
        let cancelled = self.preview.lock().await.take().is_some();
        if cancelled {
            self.autosave.resume();
        }

        cancelled
    }

    pub async fn previewing(&self) -> Option<String> {
        self.preview
            .lock()
            .await
            .as_ref()
            .map(|preview| preview.filename.clone())
    }

    /// The previewed content of `slide`, while a preview is shown.
    pub async fn preview_content(&self, slide: SlideNumber) -> Option<String> {
        let preview = self.preview.lock().await;
        let preview = preview.as_ref()?;

        Some(
            preview
                .slides
                .get(&slide)
                .map(|page| page.content.clone())
                .unwrap_or_default(),
        )
    }

    /// Makes `filename` the current script: every slide's content is replaced and written right away.
    ///
    /// When the fetch fails the live script and any shown preview stay as they were.
    #[instrument(skip(self))]
    pub async fn restore(&self, filename: &str) -> Result<ScriptMap, RevisionError> {
        let slides = self.fetch(filename).await?;

        let restored = {
            let mut store = self.store.write().await;
            store.replace_contents(&slides);
            store.snapshot()
        };

        self.preview.lock().await.take();
        self.autosave.resume();

        if let Err(error) = self.autosave.save_now().await {
            tracing::warn!(filename, %error, "restored revision is not saved yet");
        }

        tracing::info!(filename, "revision restored");
        Ok(restored)
    }

    async fn fetch(&self, filename: &str) -> Result<ScriptMap, RevisionError> {
        let file_id = self.store.read().await.file_id();
        let data = self
            .backend
            .fetch_script(file_id, Some(filename))
            .await
            .context(FetchSnafu { filename })?;

        Ok(data.slides)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use crate::model::{PageScript, ScriptData};
    use crate::service::autosave::AutosaveSettings;
    use crate::service::backend::testing::FakeBackend;
    use crate::service::cache::LocalCache;
    use crate::service::script_store::ScriptStore;

    use super::*;

    const OLDER: &str = "script_250101120000.json";
    const NEWER: &str = "script_250102090000.json";

    struct Fixture {
        backend: Arc<FakeBackend>,
        store: SharedStore,
        autosave: AutosaveCoordinator,
        history: RevisionHistoryManager,
        _dir: tempfile::TempDir,
    }

    fn revision(contents: &[&str]) -> ScriptData {
        let slides = contents
            .iter()
            .enumerate()
            .map(|(index, content)| (index as u32 + 1, PageScript::new(content.to_string(), 0)))
            .collect();

        ScriptData::new(120, slides)
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(LocalCache::open(dir.path().join("scripts.json")).await);
        let backend = Arc::new(FakeBackend::new(3));
        backend.add_revision(OLDER, revision(&["old 1", "old 2"]));
        backend.add_revision(NEWER, revision(&["new 1", "new 2", "new 3"]));

        let mut live = ScriptStore::empty(4, 3);
        (1..=3).for_each(|slide| {
            live.set_local(slide, format!("live {slide}"));
        });
        let store = Arc::new(RwLock::new(live));
        let autosave = AutosaveCoordinator::new(
            store.clone(),
            backend.clone(),
            cache,
            AutosaveSettings::default(),
        );
        let history = RevisionHistoryManager::new(backend.clone(), store.clone(), autosave.clone());

        Fixture {
            backend,
            store,
            autosave,
            history,
            _dir: dir,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn newest_revision_is_listed_first() {
        let fixture = fixture().await;

        let revisions = fixture.history.list().await.unwrap();
        let names: Vec<_> = revisions.iter().map(|r| r.filename.as_str()).collect();

        assert_eq!(names, vec![NEWER, OLDER]);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_is_read_only_and_toggles() {
        let Fixture {
            backend,
            store,
            autosave,
            history,
            _dir,
        } = fixture().await;

        let outcome = history.preview(OLDER).await.unwrap();
        assert!(matches!(outcome, PreviewOutcome::Showing(ref slides) if slides[&1].content == "old 1"));
        assert!(autosave.is_suspended());
        assert_eq!(history.preview_content(1).await.as_deref(), Some("old 1"));

        autosave.schedule_save(1, "typed over preview".to_string(), 0).await;
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;

        assert_eq!(history.preview(OLDER).await.unwrap(), PreviewOutcome::Cancelled);
        assert!(!autosave.is_suspended());
        assert_eq!(history.previewing().await, None);
        assert_eq!(store.read().await.get(1), "live 1");
        assert!(backend.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn restore_replaces_every_slide_and_commits() {
        let Fixture {
            backend,
            store,
            history,
            _dir,
            ..
        } = fixture().await;

        history.preview(NEWER).await.unwrap();
        let restored = history.restore(OLDER).await.unwrap();

        assert_eq!(restored[&2].content, "old 2");
        assert_eq!(store.read().await.get(1), "old 1");
        assert_eq!(store.read().await.get(3), "live 3");
        assert_eq!(history.previewing().await, None);

        let writes = backend.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].data.slides[&1].content, "old 1");
        assert_eq!(writes[0].data.slides.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_restore_changes_nothing() {
        let Fixture {
            backend,
            store,
            history,
            _dir,
            ..
        } = fixture().await;
        let before = store.read().await.clone();

        let result = history.restore("script_991231235959.json").await;

        assert!(matches!(result, Err(RevisionError::Fetch { .. })));
        assert_eq!(*store.read().await, before);
        assert!(backend.writes().is_empty());
    }
}
