use std::fmt::Write as _;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::instrument;

use crate::model::{
    complete_map, FileId, PageScript, ScriptData, ScriptMap, Slide, SlideNumber, TranscriptPage,
};
use crate::service::backend::{BackendError, ScriptBackend};
use crate::service::cache::LocalCache;

pub type SharedStore = Arc<RwLock<ScriptStore>>;

/// The in-memory owner of one file's current script.
///
/// The map always holds exactly the slides `1..=page_count`, so [ScriptStore::snapshot] is
/// a complete document ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStore {
    file_id: FileId,
    page_count: u32,
    goal_time: u64,
    slides: ScriptMap,
}

impl ScriptStore {
    pub fn empty(file_id: FileId, page_count: u32) -> Self {
        Self::from_data(file_id, page_count, ScriptData::default())
    }

    pub fn from_data(file_id: FileId, page_count: u32, data: ScriptData) -> Self {
        Self {
            file_id,
            page_count,
            goal_time: data.goal_time,
            slides: complete_map(&data.slides, page_count),
        }
    }

    /// Opens the script of `file_id`, from the local cache when present, otherwise from the backend.
    ///
    /// An unreachable backend opens an empty script. A file still being processed is reported as
    /// [BackendError::NotReady].
    #[instrument(skip(backend, cache))]
    pub async fn load(
        file_id: FileId, page_count: u32, backend: &dyn ScriptBackend, cache: &LocalCache,
    ) -> Result<Self, BackendError> {
        if let Some(data) = cache.get(file_id).await {
            tracing::debug!(file_id, "script loaded from the local cache");
            return Ok(Self::from_data(file_id, page_count, data));
        }

        match backend.fetch_script(file_id, None).await {
            Ok(data) => {
                let store = Self::from_data(file_id, page_count, data);
                if let Err(error) = cache.put(file_id, store.data()).await {
                    tracing::warn!(file_id, %error, "could not seed the local script cache");
                }

                tracing::info!(file_id, page_count, "script loaded from the backend");
                Ok(store)
            }
            Err(error) if error.is_not_ready() => Err(error),
            Err(error) => {
                tracing::warn!(file_id, %error, "could not fetch the script, starting empty");
                Ok(Self::empty(file_id, page_count))
            }
        }
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn goal_time(&self) -> u64 {
        self.goal_time
    }

    pub fn set_goal_time(&mut self, seconds: u64) {
        self.goal_time = seconds;
    }

    /// Content of `slide`, empty for unknown slides.
    pub fn get(&self, slide: SlideNumber) -> &str {
        self.slides
            .get(&slide)
            .map_or("", |page| page.content.as_str())
    }

    pub fn page(&self, slide: SlideNumber) -> Option<&PageScript> {
        self.slides.get(&slide)
    }

    /// Replaces the content of `slide`. Slides outside the deck are ignored.
    pub fn set_local(&mut self, slide: SlideNumber, content: impl Into<String>) -> bool {
        match self.slides.get_mut(&slide) {
            Some(page) => {
                page.content = content.into();
                true
            }
            None => false,
        }
    }

    pub fn set_duration(&mut self, slide: SlideNumber, seconds: u64) -> bool {
        match self.slides.get_mut(&slide) {
            Some(page) => {
                page.duration = seconds;
                true
            }
            None => false,
        }
    }

    pub fn zero_durations(&mut self) {
        self.slides.values_mut().for_each(|page| page.duration = 0);
    }

    /// Takes the content of every slide present in `slides`. Durations stay as they are.
    pub fn replace_contents(&mut self, slides: &ScriptMap) {
        for (slide, page) in slides {
            self.set_local(*slide, page.content.clone());
        }
    }

    /// Writes generator output into the matching slides and returns how many were applied.
    pub fn apply_generated(&mut self, pages: &[TranscriptPage]) -> usize {
        pages
            .iter()
            .filter(|page| self.set_local(page.page_number, page.content.clone()))
            .count()
    }

    pub fn snapshot(&self) -> ScriptMap {
        self.slides.clone()
    }

    /// The document written to the backend.
    pub fn data(&self) -> ScriptData {
        ScriptData::new(self.goal_time, self.snapshot())
    }

    pub fn slides(&self) -> Vec<Slide> {
        self.slides
            .iter()
            .map(|(&number, page)| Slide::new(number, number, page.content.clone()))
            .collect()
    }

    /// Every slide as printable text, `Slide 01` headers followed by the narration.
    pub fn export_text(&self) -> String {
        self.slides
            .iter()
            .fold(String::new(), |mut text, (number, page)| {
                let _ = write!(text, "Slide {number:02}\n{}\n\n", page.content);
                text
            })
    }
}

#[cfg(test)]
mod tests {
    use crate::service::backend::testing::FakeBackend;

    use super::*;

    #[tokio::test]
    async fn load_fills_missing_slides_and_seeds_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::open(dir.path().join("scripts.json")).await;
        let backend = FakeBackend::new(2);

        let store = ScriptStore::load(5, 4, &backend, &cache).await.unwrap();

        assert_eq!(store.snapshot().keys().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(store.get(2), "slide 2");
        assert_eq!(store.get(4), "");
        assert_eq!(cache.get(5).await, Some(store.data()));
    }

    #[tokio::test]
    async fn cached_copy_wins_over_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::open(dir.path().join("scripts.json")).await;
        let mut cached = ScriptStore::empty(5, 2);
        cached.set_local(1, "draft");
        cache.put(5, cached.data()).await.unwrap();

        let store = ScriptStore::load(5, 2, &FakeBackend::new(2), &cache)
            .await
            .unwrap();

        assert_eq!(store.get(1), "draft");
    }

    #[tokio::test]
    async fn offline_backend_opens_empty_but_not_ready_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::open(dir.path().join("scripts.json")).await;
        let backend = FakeBackend::new(3);

        backend.go_offline(true);
        let store = ScriptStore::load(1, 3, &backend, &cache).await.unwrap();
        assert_eq!(store, ScriptStore::empty(1, 3));

        backend.go_offline(false);
        backend.still_processing(true);
        let error = ScriptStore::load(2, 3, &backend, &cache).await.unwrap_err();
        assert!(error.is_not_ready());
    }

    #[test]
    fn out_of_range_edits_are_ignored() {
        let mut store = ScriptStore::empty(1, 2);

        assert!(!store.set_local(3, "nope"));
        assert!(!store.set_local(0, "nope"));
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn restore_keeps_durations_and_missing_slides() {
        let mut store = ScriptStore::empty(1, 3);
        store.set_local(3, "kept");
        store.set_duration(1, 42);

        let snapshot: ScriptMap = [
            (1, PageScript::new("old one".to_string(), 0)),
            (2, PageScript::new("old two".to_string(), 0)),
        ]
        .into();
        store.replace_contents(&snapshot);

        assert_eq!(store.get(1), "old one");
        assert_eq!(store.get(2), "old two");
        assert_eq!(store.get(3), "kept");
        assert_eq!(store.page(1).unwrap().duration, 42);
    }

    #[test]
    fn generated_pages_outside_the_deck_are_dropped() {
        let mut store = ScriptStore::empty(1, 2);
        let applied = store.apply_generated(&[
            TranscriptPage::new(1, "one".to_string()),
            TranscriptPage::new(5, "five".to_string()),
        ]);

        assert_eq!(applied, 1);
        assert_eq!(store.get(1), "one");
    }

    #[test]
    fn export_lists_every_slide() {
        let mut store = ScriptStore::empty(1, 2);
        store.set_local(1, "Hello");

        assert_eq!(store.export_text(), "Slide 01\nHello\n\nSlide 02\n\n\n");
    }
}
