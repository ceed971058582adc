use serde::{Deserialize, Serialize};
use snafu::Snafu;

pub use file::*;
pub use page_time::*;
pub use revision::*;
pub use script::*;

mod file;
mod page_time;
mod revision;
mod script;

/// Identifier of an uploaded deck on the backend.
pub type FileId = u64;

/// 1-based slide number, equal to the page number of the deck.
pub type SlideNumber = u32;

/// Persistence state shown next to the script editor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Success,
    Error,
}

impl SaveStatus {
    /// `success` and `error` are only displayed for a while before falling back to `idle`.
    pub fn is_settled(self) -> bool {
        matches!(self, SaveStatus::Success | SaveStatus::Error)
    }
}

impl std::fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Saving => "saving",
            SaveStatus::Success => "saved",
            SaveStatus::Error => "save failed",
        };

        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    #[snafu(display("seconds must be below 60, got {seconds}"))]
    SecondsOutOfRange { seconds: u64 },

    #[snafu(display("{minutes} minutes is longer than any rehearsal can run"))]
    TooLong { minutes: u64 },

    #[snafu(display("slide {slide} does not exist, the deck has {page_count} slides"))]
    SlideOutOfRange { slide: SlideNumber, page_count: u32 },

    #[snafu(display("a deck needs at least one slide"))]
    EmptyDeck,

    #[snafu(display("cannot read `{text}` as a time, expected MM:SS"))]
    MalformedTime { text: String },
}

/// Checks that `slide` lies within `1..=page_count`.
pub fn check_slide(slide: SlideNumber, page_count: u32) -> Result<(), ValidationError> {
    if slide == 0 || slide > page_count {
        return SlideOutOfRangeSnafu { slide, page_count }.fail();
    }

    Ok(())
}
