use crate::api::sse::SseDecoder;
use crate::api::{ApiError, ProgressId, ProgressStream, StoryApi};
use crate::artifact::AudioArtifact;
use crate::config::{ApiBaseUrl, ClientConfig};
use crate::timeline::EmotionTimeline;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `StoryApi` over HTTP. The progress stream has no overall timeout; the
/// other requests are bounded by `request_timeout`.
#[derive(Clone)]
pub struct HttpStoryApi {
    client: Client,
    base: ApiBaseUrl,
    request_timeout: Duration,
}

impl HttpStoryApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ApiError::Http)?;

        Ok(Self {
            client,
            base: config.api_base.clone(),
            request_timeout: config.request_timeout,
        })
    }

    fn url(&self, route: &str, id: &ProgressId) -> String {
        self.base
            .endpoint(&format!("{route}/{}", urlencoding::encode(id.as_str())))
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ApiError::HttpStatus(status.as_u16(), error_text))
    }
}

#[derive(Serialize)]
struct CreateJobRequest {
    story: String,
}

#[derive(Deserialize)]
struct CreateJobResponse {
    progress_id: ProgressId,
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

fn decode_events(body: BoxStream<'static, reqwest::Result<Bytes>>) -> ProgressStream {
    let state = SseState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                return Some((Ok(data), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => match state.decoder.feed(&chunk) {
                    Ok(messages) => state.pending.extend(messages.into_iter().map(|m| m.data)),
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(ApiError::InvalidResponse(e.to_string())), state));
                    }
                },
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(ApiError::Http(e)), state));
                }
                None => {
                    state.finished = true;
                    match state.decoder.finish() {
                        Ok(Some(message)) => state.pending.push_back(message.data),
                        Ok(None) => {}
                        Err(e) => return Some((Err(ApiError::InvalidResponse(e.to_string())), state)),
                    }
                }
            }
        }
    })
    .boxed()
}

impl StoryApi for HttpStoryApi {
    fn create_job(&self, story: String) -> BoxFuture<'_, Result<ProgressId, ApiError>> {
        async move {
            let url = self.base.endpoint("api/story");
            tracing::debug!(%url, chars = story.chars().count(), "submitting story");

            let response = self
                .client
                .post(&url)
                .timeout(self.request_timeout)
                .json(&CreateJobRequest { story })
                .send()
                .await?;
            let response = Self::check(response).await?;

            let created: CreateJobResponse = response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON: {e}")))?;
            if created.progress_id.as_str().is_empty() {
                return Err(ApiError::InvalidResponse("empty progress_id".to_string()));
            }
            Ok(created.progress_id)
        }
        .boxed()
    }

    fn progress(&self, id: ProgressId) -> BoxFuture<'_, Result<ProgressStream, ApiError>> {
        async move {
            let url = self.url("api/progress", &id);
            tracing::debug!(%url, "opening progress stream");

            let response = self
                .client
                .get(&url)
                .header(header::ACCEPT, "text/event-stream")
                .send()
                .await?;
            let response = Self::check(response).await?;

            Ok(decode_events(response.bytes_stream().boxed()))
        }
        .boxed()
    }

    fn fetch_audio(&self, id: ProgressId) -> BoxFuture<'_, Result<AudioArtifact, ApiError>> {
        async move {
            let url = self.url("api/audio", &id);
            let response = self
                .client
                .get(&url)
                .timeout(self.request_timeout)
                .send()
                .await?;
            let response = Self::check(response).await?;

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Err(ApiError::InvalidResponse("empty audio payload".to_string()));
            }

            tracing::debug!(progress_id = %id, bytes = bytes.len(), "audio fetched");
            Ok(AudioArtifact::new(bytes, content_type))
        }
        .boxed()
    }

    fn fetch_timeline(&self, id: ProgressId) -> BoxFuture<'_, Result<EmotionTimeline, ApiError>> {
        async move {
            let url = self.url("api/emotions", &id);
            let response = self
                .client
                .get(&url)
                .timeout(self.request_timeout)
                .send()
                .await?;
            let response = Self::check(response).await?;

            let body = response.bytes().await?;
            serde_json::from_slice(&body)
                .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse timeline: {e}")))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::sse::MAX_MESSAGE_BYTES;

    fn body(chunks: &[&'static str]) -> BoxStream<'static, reqwest::Result<Bytes>> {
        let items: Vec<reqwest::Result<Bytes>> = chunks
            .iter()
            .copied()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn decode_events_yields_payloads_in_order() {
        let events: Vec<String> = decode_events(body(&[
            "data: {\"stage\": \"init\"}\n\nda",
            "ta: {\"stage\": \"done\"}\n\n",
        ]))
        .map(|r| r.expect("no transport error"))
        .collect()
        .await;
        assert_eq!(
            events,
            vec!["{\"stage\": \"init\"}", "{\"stage\": \"done\"}"]
        );
    }

    #[tokio::test]
    async fn decode_events_flushes_unterminated_tail() {
        let events: Vec<String> = decode_events(body(&["data: {\"stage\": \"error\"}"]))
            .map(|r| r.expect("no transport error"))
            .collect()
            .await;
        assert_eq!(events, vec!["{\"stage\": \"error\"}"]);
    }

    #[tokio::test]
    async fn decode_events_stops_on_oversized_line() {
        let endless: &'static str = Box::leak("x".repeat(MAX_MESSAGE_BYTES + 1).into_boxed_str());
        let events: Vec<Result<String, ApiError>> =
            decode_events(body(&["data: {\"stage\": \"init\"}\n\n", endless, "\n\n"]))
                .collect()
                .await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().expect("first event"), "{\"stage\": \"init\"}");
        assert!(matches!(events[1], Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn progress_ids_are_percent_encoded() {
        let api = HttpStoryApi::new(&ClientConfig::default()).expect("client");
        let url = api.url("api/audio", &ProgressId("a b/c".to_owned()));
        assert_eq!(url, "http://localhost:5000/api/audio/a%20b%2Fc");
    }
}
