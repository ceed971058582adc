use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use tokio::time::Instant;

use super::*;
use crate::model::PageScript;

/// A write observed by [FakeBackend].
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub at: Instant,
    pub file_id: FileId,
    pub data: ScriptData,
}

#[derive(Debug, Default)]
struct State {
    live: ScriptData,
    revisions: BTreeMap<String, ScriptData>,
    writes: Vec<RecordedWrite>,
    statuses: VecDeque<FileStatus>,
    status_checks: usize,
    current_pages: Vec<SlideNumber>,
    hints: Vec<Option<String>>,
    fail_saves: bool,
    fail_generation: bool,
    offline: bool,
    not_ready: bool,
    generation_delay: Duration,
    save_delay: Duration,
}

/// In-memory backend recording every write.
#[derive(Debug)]
pub struct FakeBackend {
    page_count: u32,
    state: Mutex<State>,
}

impl FakeBackend {
    /// A backend whose live script has `page_count` slides reading `slide N`.
    pub fn new(page_count: u32) -> Self {
        let slides = (1..=page_count)
            .map(|slide| (slide, PageScript::new(format!("slide {slide}"), 0)))
            .collect();

        Self {
            page_count,
            state: Mutex::new(State {
                live: ScriptData::new(0, slides),
                ..State::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn set_live(&self, data: ScriptData) {
        self.state().live = data;
    }

    pub fn live(&self) -> ScriptData {
        self.state().live.clone()
    }

    pub fn add_revision(&self, filename: &str, data: ScriptData) {
        self.state().revisions.insert(filename.to_string(), data);
    }

    pub fn queue_statuses(&self, statuses: impl IntoIterator<Item = FileStatus>) {
        self.state().statuses.extend(statuses);
    }

    pub fn status_checks(&self) -> usize {
        self.state().status_checks
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state().writes.clone()
    }

    pub fn current_pages(&self) -> Vec<SlideNumber> {
        self.state().current_pages.clone()
    }

    pub fn hints(&self) -> Vec<Option<String>> {
        self.state().hints.clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.state().fail_saves = fail;
    }

    pub fn fail_generation(&self, fail: bool) {
        self.state().fail_generation = fail;
    }

    pub fn go_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn still_processing(&self, not_ready: bool) {
        self.state().not_ready = not_ready;
    }

    pub fn delay_generation(&self, delay: Duration) {
        self.state().generation_delay = delay;
    }

    /// Saves are recorded once `delay` has passed.
    pub fn delay_saves(&self, delay: Duration) {
        self.state().save_delay = delay;
    }

    fn reachable(&self) -> Result<()> {
        let state = self.state();
        if state.not_ready {
            return NotReadySnafu {
                message: "still converting",
            }
            .fail();
        }
        if state.offline {
            return unavailable();
        }

        Ok(())
    }
}

fn unavailable<T>() -> Result<T> {
    StatusSnafu {
        url: "fake://backend",
        status: 503u16,
        message: "service unavailable",
    }
    .fail()
}

#[async_trait]
impl ScriptBackend for FakeBackend {
    async fn fetch_script(&self, _file_id: FileId, revision: Option<&str>) -> Result<ScriptData> {
        self.reachable()?;
        let state = self.state();

        match revision {
            None => Ok(state.live.clone()),
            Some(name) => state
                .revisions
                .get(name)
                .cloned()
                .map_or_else(unavailable, Ok),
        }
    }

    async fn save_script(&self, file_id: FileId, data: &ScriptData) -> Result<()> {
        let delay = self.state().save_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.reachable()?;
        let mut state = self.state();
        if state.fail_saves {
            return unavailable();
        }

        state.writes.push(RecordedWrite {
            at: Instant::now(),
            file_id,
            data: data.clone(),
        });
        state.live = data.clone();

        Ok(())
    }

    async fn list_revisions(&self, _file_id: FileId) -> Result<Vec<String>> {
        self.reachable()?;
        Ok(self.state().revisions.keys().rev().cloned().collect())
    }

    async fn generate_script(&self, _file_id: FileId) -> Result<Vec<TranscriptPage>> {
        let delay = self.state().generation_delay;
        tokio::time::sleep(delay).await;

        if self.state().fail_generation {
            return unavailable();
        }

        Ok((1..=self.page_count)
            .map(|page| TranscriptPage::new(page, format!("generated {page}")))
            .collect())
    }

    async fn regenerate_page(
        &self, _file_id: FileId, page_number: SlideNumber, existing_script: Option<&str>,
    ) -> Result<TranscriptPage> {
        let delay = {
            let mut state = self.state();
            state.hints.push(existing_script.map(str::to_string));
            state.generation_delay
        };
        tokio::time::sleep(delay).await;

        if self.state().fail_generation {
            return unavailable();
        }

        Ok(TranscriptPage::new(
            page_number,
            format!("regenerated {page_number}"),
        ))
    }

    async fn update_current_page(&self, _file_id: FileId, page_number: SlideNumber) -> Result<()> {
        self.reachable()?;
        self.state().current_pages.push(page_number);
        Ok(())
    }

    async fn file_status(&self, file_id: FileId) -> Result<FileInfo> {
        let mut state = self.state();
        state.status_checks += 1;
        if state.offline {
            return unavailable();
        }
        let status = state.statuses.pop_front().unwrap_or(FileStatus::Completed);

        Ok(FileInfo {
            id: file_id,
            original_name: "deck.pdf".to_string(),
            status,
            error_message: (status == FileStatus::Failed).then(|| "conversion failed".to_string()),
        })
    }
}
