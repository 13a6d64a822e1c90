mod http;
pub mod sse;

use crate::artifact::AudioArtifact;
use crate::timeline::EmotionTimeline;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use http::HttpStoryApi;

/// Server-issued token identifying one job.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressId(pub String);

impl ProgressId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw `data` payloads of the progress stream, in arrival order. The stream
/// ends when the server closes the connection.
pub type ProgressStream = BoxStream<'static, Result<String, ApiError>>;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http error {0}: {1}")]
    HttpStatus(u16, String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// The story server as seen by the workflow controller.
pub trait StoryApi: Send + Sync {
    /// `POST /api/story`
    fn create_job(&self, story: String) -> BoxFuture<'_, Result<ProgressId, ApiError>>;

    /// `GET /api/progress/{id}`
    fn progress(&self, id: ProgressId) -> BoxFuture<'_, Result<ProgressStream, ApiError>>;

    /// `GET /api/audio/{id}`
    fn fetch_audio(&self, id: ProgressId) -> BoxFuture<'_, Result<AudioArtifact, ApiError>>;

    /// `GET /api/emotions/{id}`
    fn fetch_timeline(&self, id: ProgressId) -> BoxFuture<'_, Result<EmotionTimeline, ApiError>>;
}

impl<T: StoryApi + ?Sized> StoryApi for std::sync::Arc<T> {
    fn create_job(&self, story: String) -> BoxFuture<'_, Result<ProgressId, ApiError>> {
        (**self).create_job(story)
    }

    fn progress(&self, id: ProgressId) -> BoxFuture<'_, Result<ProgressStream, ApiError>> {
        (**self).progress(id)
    }

    fn fetch_audio(&self, id: ProgressId) -> BoxFuture<'_, Result<AudioArtifact, ApiError>> {
        (**self).fetch_audio(id)
    }

    fn fetch_timeline(&self, id: ProgressId) -> BoxFuture<'_, Result<EmotionTimeline, ApiError>> {
        (**self).fetch_timeline(id)
    }
}
