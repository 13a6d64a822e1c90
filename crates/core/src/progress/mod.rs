use serde::{Deserialize, Serialize};
use std::fmt;

/// Human readable labels for the four progress steps, indexed by
/// [`Stage::progress_index`].
pub const STEP_LABELS: [&str; 4] = [
    "Analyzing emotional context...",
    "Generating adaptive voice...",
    "Composing background music...",
    "Finalizing audio export...",
];

/// A named phase of server-side processing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    Init,
    Emotion,
    Tts,
    Mixing,
    Done,
    Error,
    /// Anything the server sends that this client does not know about.
    Other(String),
}

impl From<String> for Stage {
    fn from(value: String) -> Self {
        match value.as_str() {
            "init" => Stage::Init,
            "emotion" => Stage::Emotion,
            "tts" => Stage::Tts,
            "mixing" => Stage::Mixing,
            "done" => Stage::Done,
            "error" => Stage::Error,
            _ => Stage::Other(value),
        }
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.as_str().to_owned()
    }
}

impl Stage {
    /// Position on the progress bar. Only the four working stages have one.
    pub fn progress_index(&self) -> Option<usize> {
        match self {
            Stage::Init => Some(0),
            Stage::Emotion => Some(1),
            Stage::Tts => Some(2),
            Stage::Mixing => Some(3),
            Stage::Done | Stage::Error | Stage::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Init => "init",
            Stage::Emotion => "emotion",
            Stage::Tts => "tts",
            Stage::Mixing => "mixing",
            Stage::Done => "done",
            Stage::Error => "error",
            Stage::Other(s) => s,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message from the progress stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StageEvent {
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

/// Fraction of the progress bar filled for a given index, in `0.0..=1.0`.
pub fn progress_fraction(index: usize) -> f32 {
    let steps = STEP_LABELS.len();
    (index.min(steps - 1) + 1) as f32 / steps as f32
}

/// Labels of the steps reached so far, oldest first.
pub fn completed_steps(index: usize) -> &'static [&'static str] {
    &STEP_LABELS[..=index.min(STEP_LABELS.len() - 1)]
}
