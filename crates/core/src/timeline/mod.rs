use serde::{Deserialize, Serialize};
use std::fmt;

const NEUTRAL_COLOR: &str = "rgb(148, 163, 184)";

/// Emotion label as produced by the server's classifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Love,
    Neutral,
    Other(String),
}

impl Emotion {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "joy" => Emotion::Joy,
            "sadness" => Emotion::Sadness,
            "anger" => Emotion::Anger,
            "fear" => Emotion::Fear,
            "surprise" => Emotion::Surprise,
            "love" => Emotion::Love,
            "neutral" => Emotion::Neutral,
            _ => Emotion::Other(label.to_owned()),
        }
    }

    /// Chart colour for the label, as a CSS `rgb()` string.
    pub fn color(&self) -> &'static str {
        match self {
            Emotion::Joy => "rgb(251, 191, 36)",
            Emotion::Sadness => "rgb(59, 130, 246)",
            Emotion::Anger => "rgb(239, 68, 68)",
            Emotion::Fear => "rgb(132, 204, 22)",
            Emotion::Surprise => "rgb(14, 165, 233)",
            Emotion::Love => "rgb(236, 72, 153)",
            Emotion::Neutral | Emotion::Other(_) => NEUTRAL_COLOR,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Love => "love",
            Emotion::Neutral => "neutral",
            Emotion::Other(s) => s,
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("timeline has {sentences} sentences but {emotions} emotions")]
    LengthMismatch { sentences: usize, emotions: usize },
}

/// Sentence-by-sentence emotion labels for a finished job.
///
/// `sentences[i]` was classified as `emotions[i]`; both vectors always have
/// the same length.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeline")]
pub struct EmotionTimeline {
    sentences: Vec<String>,
    emotions: Vec<String>,
}

#[derive(Deserialize)]
struct RawTimeline {
    sentences: Vec<String>,
    emotions: Vec<String>,
}

impl TryFrom<RawTimeline> for EmotionTimeline {
    type Error = TimelineError;

    fn try_from(raw: RawTimeline) -> Result<Self, Self::Error> {
        Self::new(raw.sentences, raw.emotions)
    }
}

/// One point on the emotional-arc chart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimelinePoint<'a> {
    pub label: String,
    pub sentence: &'a str,
    pub emotion: &'a str,
    pub color: &'static str,
}

impl EmotionTimeline {
    pub fn new(sentences: Vec<String>, emotions: Vec<String>) -> Result<Self, TimelineError> {
        if sentences.len() != emotions.len() {
            return Err(TimelineError::LengthMismatch {
                sentences: sentences.len(),
                emotions: emotions.len(),
            });
        }
        Ok(Self {
            sentences,
            emotions,
        })
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    pub fn emotions(&self) -> &[String] {
        &self.emotions
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sentences
            .iter()
            .map(String::as_str)
            .zip(self.emotions.iter().map(String::as_str))
    }

    /// Chart points labelled `S1`, `S2`, ...
    pub fn points(&self) -> Vec<TimelinePoint<'_>> {
        self.iter()
            .enumerate()
            .map(|(i, (sentence, emotion))| TimelinePoint {
                label: format!("S{}", i + 1),
                sentence,
                emotion,
                color: Emotion::parse(emotion).color(),
            })
            .collect()
    }

    /// Distinct emotion labels in first-seen order, for the category axis.
    pub fn distinct_emotions(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for emotion in &self.emotions {
            if !seen.contains(&emotion.as_str()) {
                seen.push(emotion);
            }
        }
        seen
    }

    /// `Sentence,Emotion` CSV. Sentences are always quoted with embedded
    /// quotes doubled; emotions are written as-is.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("Sentence,Emotion\n");
        let rows: Vec<String> = self
            .iter()
            .map(|(sentence, emotion)| {
                format!("\"{}\",{}", sentence.replace('"', "\"\""), emotion)
            })
            .collect();
        out.push_str(&rows.join("\n"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline(sentences: &[&str], emotions: &[&str]) -> EmotionTimeline {
        EmotionTimeline::new(
            sentences.iter().map(|s| s.to_string()).collect(),
            emotions.iter().map(|s| s.to_string()).collect(),
        )
        .expect("aligned")
    }

    #[test]
    fn csv_quotes_sentences_with_commas() {
        let t = timeline(&["A,B", "C"], &["joy", "anger"]);
        assert_eq!(t.to_csv(), "Sentence,Emotion\n\"A,B\",joy\n\"C\",anger");
    }

    #[test]
    fn csv_doubles_embedded_quotes() {
        let t = timeline(&["She said \"run\""], &["fear"]);
        assert_eq!(t.to_csv(), "Sentence,Emotion\n\"She said \"\"run\"\"\",fear");
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = EmotionTimeline::new(vec!["a".into(), "b".into()], vec!["joy".into()])
            .unwrap_err();
        assert_eq!(
            err,
            TimelineError::LengthMismatch {
                sentences: 2,
                emotions: 1
            }
        );

        let json = r#"{"sentences":["a"],"emotions":[]}"#;
        assert!(serde_json::from_str::<EmotionTimeline>(json).is_err());
    }

    #[test]
    fn deserializes_server_payload() {
        let json = r#"{"sentences":["It was dark.","Then light."],"emotions":["fear","joy"]}"#;
        let t: EmotionTimeline = serde_json::from_str(json).expect("valid timeline");
        assert_eq!(t.len(), 2);
        assert_eq!(t.emotions(), &["fear".to_string(), "joy".to_string()]);
    }

    #[test]
    fn colors_are_case_insensitive_with_neutral_fallback() {
        assert_eq!(Emotion::parse("JOY").color(), "rgb(251, 191, 36)");
        assert_eq!(Emotion::parse("Sadness").color(), "rgb(59, 130, 246)");
        assert_eq!(Emotion::parse("disgust").color(), NEUTRAL_COLOR);
        assert_eq!(Emotion::parse("neutral").color(), NEUTRAL_COLOR);
    }

    #[test]
    fn points_and_axis_categories() {
        let t = timeline(&["a", "b", "c"], &["joy", "anger", "joy"]);
        let points = t.points();
        assert_eq!(
            points.iter().map(|p| p.label.as_str()).collect::<Vec<_>>(),
            vec!["S1", "S2", "S3"]
        );
        assert_eq!(points[1].color, "rgb(239, 68, 68)");
        assert_eq!(t.distinct_emotions(), vec!["joy", "anger"]);
    }
}
