use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_new::new;
use snafu::{Location, Snafu};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::instrument;

use crate::model::{FileId, FileInfo, FileStatus, ScriptData, SlideNumber, TranscriptPage};

pub use auth::*;
pub use error::*;
pub use http::*;

mod auth;
mod error;
mod http;

#[cfg(test)]
pub(crate) mod testing;

/// The REST contract of the script storage server.
#[async_trait]
pub trait ScriptBackend: Send + Sync + std::fmt::Debug {
    /// The live script, or the named revision when `revision` is given.
    async fn fetch_script(&self, file_id: FileId, revision: Option<&str>) -> Result<ScriptData>;

    /// Overwrites the live script. The server records a new revision for every save.
    async fn save_script(&self, file_id: FileId, data: &ScriptData) -> Result<()>;

    /// Revision filenames, newest first.
    async fn list_revisions(&self, file_id: FileId) -> Result<Vec<String>>;

    async fn generate_script(&self, file_id: FileId) -> Result<Vec<TranscriptPage>>;

    async fn regenerate_page(
        &self, file_id: FileId, page_number: SlideNumber, existing_script: Option<&str>,
    ) -> Result<TranscriptPage>;

    async fn update_current_page(&self, file_id: FileId, page_number: SlideNumber) -> Result<()>;

    async fn file_status(&self, file_id: FileId) -> Result<FileInfo>;
}

pub type SharedBackend = Arc<dyn ScriptBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum PollError {
    #[snafu(display("file {file_id} is still {status:?}"))]
    StillProcessing { file_id: FileId, status: FileStatus },

    #[snafu(display("processing of file {file_id} failed: {message}"))]
    ProcessingFailed {
        file_id: FileId,
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("file {file_id} was not ready after {attempts} attempts"))]
    TimedOut { file_id: FileId, attempts: usize },

    #[snafu(display("could not check the status of file {file_id}: {source}"))]
    StatusCheck { file_id: FileId, source: BackendError },
}

/// Polls the upload pipeline until the file is processed, giving up after `settings.max_attempts` checks.
#[instrument(skip(backend))]
pub async fn wait_until_ready(
    backend: &dyn ScriptBackend, file_id: FileId, settings: PollSettings,
) -> Result<FileInfo, PollError> {
    let attempts = settings.max_attempts.max(1);
    let strategy = FixedInterval::new(settings.interval).take(attempts - 1);

    let check = || async {
        let info = backend
            .file_status(file_id)
            .await
            .map_err(|source| PollError::StatusCheck { file_id, source })?;

        tracing::debug!(file_id, status = ?info.status, "polled file status");

        match info.status {
            FileStatus::Completed => Ok(info),
            FileStatus::Failed => ProcessingFailedSnafu {
                file_id,
                message: info
                    .error_message
                    .unwrap_or_else(|| "file processing failed".to_string()),
            }
            .fail(),
            status => StillProcessingSnafu { file_id, status }.fail(),
        }
    };

    let still_processing = |error: &PollError| matches!(error, PollError::StillProcessing { .. });

    match RetryIf::spawn(strategy, check, still_processing).await {
        Err(PollError::StillProcessing { .. }) => TimedOutSnafu { file_id, attempts }.fail(),
        result => result,
    }
}
