//! Submission workflow: one story in, streamed progress, audio and
//! emotion timeline out.
//!
//! The controller owns at most one job at a time. Each job runs as a tokio
//! task that publishes into a shared [`watch`] channel; every write is
//! tagged with the job's generation and dropped if a newer job has started
//! since, so a superseded stream can never touch current state.

use crate::api::{ProgressId, ProgressStream, StoryApi};
use crate::artifact::AudioArtifact;
use crate::progress::{Stage, StageEvent};
use crate::storage::{DraftStore, StorageError, STORY_KEY};
use crate::timeline::EmotionTimeline;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;


const LOG_TARGET: &str = "workflow";
const DEFAULT_REPORTED_ERROR: &str = "Processing failed.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitting,
    Streaming,
    Completing,
    Succeeded,
    Failed,
}

impl Phase {
    /// A job is in flight until its stream finishes; `submit` is refused meanwhile.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Phase::Submitting | Phase::Streaming)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Phase::Succeeded | Phase::Failed)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("job creation failed: {0}")]
    Creation(String),

    #[error("progress stream failed: {0}")]
    StreamTransport(String),

    #[error("server reported failure: {0}")]
    StreamReported(String),

    #[error("no progress event within {0:?}")]
    StreamTimeout(Duration),

    #[error("audio fetch failed after completion: {0}")]
    ArtifactFetch(String),
}

impl WorkflowError {
    /// Text suitable for showing to the person who submitted the story.
    pub fn user_message(&self) -> &str {
        match self {
            WorkflowError::Creation(_) => "Failed to send story to server.",
            WorkflowError::StreamTransport(_) => "Connection error during processing.",
            WorkflowError::StreamReported(message) => message,
            WorkflowError::StreamTimeout(_) => "Processing stalled: no progress from server.",
            WorkflowError::ArtifactFetch(_) => {
                "Audio generation completed but failed to load audio file."
            }
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejected {
    #[error("story is empty")]
    EmptyStory,
    #[error("a submission is already in flight")]
    InFlight,
}

/// Everything a rendering surface needs to draw the current job.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowSnapshot {
    /// Incremented on every accepted submission; `0` before the first one.
    pub generation: u64,
    pub phase: Phase,
    pub progress_id: Option<ProgressId>,
    pub stage: Option<Stage>,
    pub message: Option<String>,
    pub progress_index: usize,
    pub artifact: Option<Arc<AudioArtifact>>,
    pub timeline: Option<Arc<EmotionTimeline>>,
    pub error: Option<WorkflowError>,
}

impl WorkflowSnapshot {
    fn idle() -> Self {
        Self {
            generation: 0,
            phase: Phase::Idle,
            progress_id: None,
            stage: None,
            message: None,
            progress_index: 0,
            artifact: None,
            timeline: None,
            error: None,
        }
    }

    fn submitting(generation: u64) -> Self {
        Self {
            generation,
            phase: Phase::Submitting,
            ..Self::idle()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Longest silence tolerated on the progress stream. `None` waits forever.
    pub stage_timeout: Option<Duration>,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            stage_timeout: Some(Duration::from_secs(
                crate::config::DEFAULT_STAGE_TIMEOUT_SECS,
            )),
        }
    }
}

pub struct WorkflowController<A, S> {
    api: Arc<A>,
    store: S,
    draft: String,
    options: WorkflowOptions,
    state: Arc<watch::Sender<WorkflowSnapshot>>,
    job: Option<JoinHandle<()>>,
}

impl<A, S> WorkflowController<A, S>
where
    A: StoryApi + 'static,
    S: DraftStore,
{
    /// Builds a controller and restores the saved draft from `store`.
    pub fn new(api: A, store: S, options: WorkflowOptions) -> Self {
        let draft = match store.get(STORY_KEY) {
            Ok(saved) => saved.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "could not restore story draft");
                String::new()
            }
        };
        let (state, _) = watch::channel(WorkflowSnapshot::idle());

        Self {
            api: Arc::new(api),
            store,
            draft,
            options,
            state: Arc::new(state),
            job: None,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replaces the draft and writes it through to the store.
    pub fn set_draft(&mut self, text: impl Into<String>) -> Result<(), StorageError> {
        self.draft = text.into();
        self.store.set(STORY_KEY, &self.draft)
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.state.borrow().clone()
    }

    /// Starts a job for `story`. Refused without any network traffic when
    /// the story is blank or another job is still in flight.
    ///
    /// The draft is written through [`DraftStore::set`] before this returns.
    /// A failed write is logged and does not stop the submission.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, story: impl Into<String>) -> Result<u64, SubmitRejected> {
        let story = story.into();
        if story.trim().is_empty() {
            return Err(SubmitRejected::EmptyStory);
        }
        if self.state.borrow().phase.is_in_flight() {
            return Err(SubmitRejected::InFlight);
        }
        Ok(self.start(story))
    }

    /// Submits whatever is currently in the draft.
    pub fn submit_draft(&mut self) -> Result<u64, SubmitRejected> {
        let story = self.draft.clone();
        self.submit(story)
    }

    /// Like [`submit`](Self::submit), but an in-flight job is cancelled
    /// instead of refusing the new one.
    pub fn restart(&mut self, story: impl Into<String>) -> Result<u64, SubmitRejected> {
        let story = story.into();
        if story.trim().is_empty() {
            return Err(SubmitRejected::EmptyStory);
        }
        Ok(self.start(story))
    }

    /// Waits until the current job has succeeded or failed and returns its
    /// final snapshot. Returns immediately when nothing was ever submitted.
    pub async fn settled(&self) -> WorkflowSnapshot {
        let mut rx = self.state.subscribe();
        let result = rx
            .wait_for(|s| s.phase == Phase::Idle || s.phase.is_settled())
            .await
            .map(|s| s.clone());
        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    fn start(&mut self, story: String) -> u64 {
        if let Some(previous) = self.job.take() {
            previous.abort();
        }

        if let Err(e) = self.set_draft(story.clone()) {
            tracing::warn!(target: LOG_TARGET, error = %e, "could not save story draft");
        }

        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = s.generation + 1;
            *s = WorkflowSnapshot::submitting(generation);
        });
        tracing::info!(target: LOG_TARGET, generation, chars = story.chars().count(), "story submitted");

        let job = Job {
            generation,
            api: Arc::clone(&self.api),
            state: Arc::clone(&self.state),
            stage_timeout: self.options.stage_timeout,
        };
        self.job = Some(tokio::spawn(job.run(story)));
        generation
    }
}

impl<A, S> Drop for WorkflowController<A, S> {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job.abort();
        }
    }
}

enum StreamEnd {
    Done,
    Superseded,
}

struct Job<A> {
    generation: u64,
    api: Arc<A>,
    state: Arc<watch::Sender<WorkflowSnapshot>>,
    stage_timeout: Option<Duration>,
}

impl<A: StoryApi> Job<A> {
    async fn run(self, story: String) {
        let id = match self.api.create_job(story).await {
            Ok(id) => id,
            Err(e) => {
                self.fail(WorkflowError::Creation(e.to_string()));
                return;
            }
        };
        tracing::info!(target: LOG_TARGET, generation = self.generation, progress_id = %id, "job created");

        let current = self.update(|s| {
            s.phase = Phase::Streaming;
            s.progress_id = Some(id.clone());
        });
        if !current {
            return;
        }

        let stream = match self.open(&id).await {
            Ok(stream) => stream,
            Err(e) => {
                self.fail(e);
                return;
            }
        };

        match self.follow(stream, &id).await {
            Ok(StreamEnd::Done) => self.complete(id).await,
            Ok(StreamEnd::Superseded) => {}
            Err(e) => self.fail(e),
        }
    }

    /// Opens the progress stream. Waiting for the response headers counts
    /// against the stage timeout like waiting for an event does.
    async fn open(&self, id: &ProgressId) -> Result<ProgressStream, WorkflowError> {
        let opened = match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, self.api.progress(id.clone()))
                .await
                .map_err(|_| WorkflowError::StreamTimeout(limit))?,
            None => self.api.progress(id.clone()).await,
        };
        opened.map_err(|e| WorkflowError::StreamTransport(e.to_string()))
    }

    /// Applies progress events until the server reports `done` or `error`.
    /// The stream is dropped on return, which closes the connection.
    async fn follow(
        &self,
        mut stream: ProgressStream,
        id: &ProgressId,
    ) -> Result<StreamEnd, WorkflowError> {
        loop {
            let next = match self.stage_timeout {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| WorkflowError::StreamTimeout(limit))?,
                None => stream.next().await,
            };

            let data = match next {
                Some(Ok(data)) => data,
                Some(Err(e)) => return Err(WorkflowError::StreamTransport(e.to_string())),
                None => {
                    return Err(WorkflowError::StreamTransport(
                        "stream closed before completion".to_string(),
                    ))
                }
            };

            let event = match StageEvent::parse(&data) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(target: LOG_TARGET, progress_id = %id, error = %e, payload = %data, "ignoring malformed progress event");
                    continue;
                }
            };
            tracing::debug!(target: LOG_TARGET, progress_id = %id, stage = %event.stage, message = ?event.message, "progress event");

            match event.stage {
                Stage::Done => {
                    let current = self.update(|s| {
                        s.phase = Phase::Completing;
                        s.stage = Some(Stage::Done);
                        if let Some(message) = event.message {
                            s.message = Some(message);
                        }
                    });
                    return Ok(if current {
                        StreamEnd::Done
                    } else {
                        StreamEnd::Superseded
                    });
                }
                Stage::Error => {
                    let message = event
                        .message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_REPORTED_ERROR.to_string());
                    return Err(WorkflowError::StreamReported(message));
                }
                stage => {
                    if !self.apply(stage, event.message, id) {
                        return Ok(StreamEnd::Superseded);
                    }
                }
            }
        }
    }

    fn apply(&self, stage: Stage, message: Option<String>, id: &ProgressId) -> bool {
        self.update(|s| {
            if let Some(message) = message {
                s.message = Some(message);
            }
            match stage.progress_index() {
                Some(index) if index >= s.progress_index => {
                    s.progress_index = index;
                    s.stage = Some(stage);
                }
                Some(index) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        progress_id = %id,
                        stage = %stage,
                        index,
                        current = s.progress_index,
                        "out-of-order stage, progress not moved back"
                    );
                }
                None => {
                    tracing::debug!(target: LOG_TARGET, progress_id = %id, stage = %stage, "unrecognized stage");
                }
            }
        })
    }

    async fn complete(&self, id: ProgressId) {
        let (audio, timeline) = tokio::join!(
            self.api.fetch_audio(id.clone()),
            self.api.fetch_timeline(id.clone())
        );

        let timeline = match timeline {
            Ok(timeline) => Some(Arc::new(timeline)),
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, progress_id = %id, error = %e, "emotion timeline unavailable");
                None
            }
        };

        match audio {
            Ok(artifact) => {
                tracing::info!(
                    target: LOG_TARGET,
                    progress_id = %id,
                    bytes = artifact.len(),
                    sentences = timeline.as_ref().map(|t| t.len()),
                    "job succeeded"
                );
                self.update(|s| {
                    s.phase = Phase::Succeeded;
                    s.artifact = Some(Arc::new(artifact));
                    s.timeline = timeline;
                });
            }
            Err(e) => self.fail(WorkflowError::ArtifactFetch(e.to_string())),
        }
    }

    fn fail(&self, error: WorkflowError) {
        tracing::warn!(target: LOG_TARGET, generation = self.generation, error = %error, "job failed");
        self.update(|s| {
            s.phase = Phase::Failed;
            s.error = Some(error);
        });
    }

    /// Mutates shared state if this job is still the current one.
    fn update(&self, f: impl FnOnce(&mut WorkflowSnapshot)) -> bool {
        let generation = self.generation;
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            f(s);
            true
        })
    }
}
