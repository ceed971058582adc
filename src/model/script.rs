use std::collections::BTreeMap;

use derive_new::new;

use super::*;

/// Narration and recorded duration of one slide.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct PageScript {
    #[serde(default)]
    pub content: String,
    /// seconds
    #[serde(default)]
    pub duration: u64,
}

/// Every slide of a deck mapped to its script. Serialized with the slide numbers as string keys.
pub type ScriptMap = BTreeMap<SlideNumber, PageScript>;

/// The document the backend stores for a file: goal time plus the complete script map.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct ScriptData {
    /// seconds, `0` when the presenter has not set one yet
    #[serde(default)]
    pub goal_time: u64,
    #[serde(default)]
    pub slides: ScriptMap,
}

/// One page of generator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptPage {
    pub page_number: SlideNumber,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub slide_number: SlideNumber,
    pub page_number: u32,
    pub content: String,
}

/// A script map holding exactly the slides `1..=page_count`, taking what exists in `slides`.
pub fn complete_map(slides: &ScriptMap, page_count: u32) -> ScriptMap {
    (1..=page_count)
        .map(|slide| (slide, slides.get(&slide).cloned().unwrap_or_default()))
        .collect()
}
