use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use snafu::{Location, ResultExt, Snafu};
use tracing::instrument;

use crate::model::{check_slide, ScriptMap, SlideNumber, ValidationError};
use crate::service::autosave::AutosaveCoordinator;
use crate::service::backend::{BackendError, SharedBackend};
use crate::service::script_store::SharedStore;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GenerationError {
    /// Another generation request has not finished yet.
    #[snafu(display("a script is already being generated"))]
    Busy,

    #[snafu(display("script generation failed at {location}: {source}"))]
    Failure {
        source: BackendError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(transparent)]
    Validation { source: ValidationError },
}

/// Released on every exit path of a generation request.
struct GenerationGuard<'a>(&'a AtomicBool);

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs generator requests for one session, at most one at a time.
#[derive(Debug, Clone)]
pub struct ScriptGenerationOrchestrator {
    backend: SharedBackend,
    store: SharedStore,
    autosave: AutosaveCoordinator,
    generating: Arc<AtomicBool>,
}

impl ScriptGenerationOrchestrator {
    pub fn new(backend: SharedBackend, store: SharedStore, autosave: AutosaveCoordinator) -> Self {
        Self {
            backend,
            store,
            autosave,
            generating: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<GenerationGuard<'_>, GenerationError> {
        self.generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GenerationError::Busy)?;

        Ok(GenerationGuard(&self.generating))
    }

    /// Generates every slide and commits the result. The store is only touched once the whole answer is in.
    #[instrument(skip(self))]
    pub async fn generate_all(&self) -> Result<ScriptMap, GenerationError> {
        let guard = self.acquire()?;
        let file_id = self.store.read().await.file_id();

        tracing::info!(file_id, "generating the whole script");
        let pages = self
            .backend
            .generate_script(file_id)
            .await
            .context(FailureSnafu)?;

        let slides = {
            let mut store = self.store.write().await;
            let applied = store.apply_generated(&pages);
            tracing::info!(file_id, applied, received = pages.len(), "generated script applied");
            store.snapshot()
        };

        self.commit().await;
        drop(guard);

        Ok(slides)
    }

    /// Regenerates one slide, sending its current text as a hint.
    #[instrument(skip(self, existing))]
    pub async fn regenerate_one(
        &self, slide: SlideNumber, existing: &str,
    ) -> Result<String, GenerationError> {
        let (file_id, page_count) = {
            let store = self.store.read().await;
            (store.file_id(), store.page_count())
        };
        check_slide(slide, page_count)?;

        let guard = self.acquire()?;

        tracing::info!(file_id, slide, "regenerating one slide");
        let page = self
            .backend
            .regenerate_page(file_id, slide, Some(existing))
            .await
            .context(FailureSnafu)?;

        self.store.write().await.set_local(slide, page.content.clone());
        self.commit().await;
        drop(guard);

        Ok(page.content)
    }

    async fn commit(&self) {
        if let Err(error) = self.autosave.save_now().await {
            tracing::warn!(%error, "generated script is not saved yet");
        }
    }
}
