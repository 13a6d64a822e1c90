#![deny(warnings)]

use anyhow::Context;
use clap::{ArgGroup, Parser};
use emovox_core::api::HttpStoryApi;
use emovox_core::artifact::DEFAULT_AUDIO_FILE_NAME;
use emovox_core::config::{
    resolve_string_with_default, resolve_u64_with_default, ApiBaseUrl, ClientConfig, Env,
    StageTimeout, StdEnv, DEFAULT_API_URL, DEFAULT_DRAFT_PATH, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_STAGE_TIMEOUT_SECS, ENV_API_URL, ENV_DRAFT_PATH, ENV_STAGE_TIMEOUT_SECS,
};
use emovox_core::progress::{completed_steps, progress_fraction, STEP_LABELS};
use emovox_core::samples;
use emovox_core::storage::FileDraftStore;
use emovox_core::workflow::{Phase, WorkflowController, WorkflowOptions, WorkflowSnapshot};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emovox")]
#[command(about = "Turn a short story into emotion-aware narrated audio")]
#[command(group(
    ArgGroup::new("source")
        .required(false)
        .multiple(false)
        .args(["story", "story_file", "sample"])
))]
struct Args {
    /// Story text. Without a source the saved draft is used.
    #[arg(long)]
    story: Option<String>,

    #[arg(long)]
    story_file: Option<PathBuf>,

    /// Built-in sample story, 1 to 4.
    #[arg(long)]
    sample: Option<usize>,

    #[arg(long)]
    api_url: Option<String>,

    #[arg(long, default_value = DEFAULT_AUDIO_FILE_NAME)]
    out: PathBuf,

    #[arg(long, default_value = "emotion_timeline.csv")]
    csv: PathBuf,

    #[arg(long)]
    draft_path: Option<String>,

    /// Seconds without a progress event before giving up; 0 waits forever.
    #[arg(long)]
    stage_timeout_secs: Option<u64>,

    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let cfg = build_config(&args, &env)?;

    tracing::info!(
        api_url = %cfg.api_base.as_str(),
        stage_timeout_secs = cfg.stage_timeout.secs,
        draft = %cfg.draft_path.display(),
        "config loaded"
    );

    run(args, cfg).await
}

async fn run(args: Args, cfg: ClientConfig) -> anyhow::Result<()> {
    let api = HttpStoryApi::new(&cfg)?;
    let store = FileDraftStore::new(&cfg.draft_path);
    let options = WorkflowOptions {
        stage_timeout: cfg.stage_timeout.duration(),
    };
    let mut controller = WorkflowController::new(api, store, options);

    let story = match story_from_args(&args)? {
        Some(story) => story,
        None => {
            tracing::info!("no story given, using saved draft");
            controller.draft().to_owned()
        }
    };

    controller
        .submit(story)
        .context("story was not submitted (is it empty?)")?;

    let mut updates = controller.subscribe();
    let snapshot = loop {
        let snapshot = updates.borrow_and_update().clone();
        report(&snapshot);
        if snapshot.phase.is_settled() {
            break snapshot;
        }
        updates
            .changed()
            .await
            .context("workflow stopped unexpectedly")?;
    };

    if let Some(error) = &snapshot.error {
        tracing::error!(error = %error, "story processing failed");
        anyhow::bail!("{}", error.user_message());
    }

    if let Some(artifact) = &snapshot.artifact {
        artifact
            .save(&args.out)
            .await
            .with_context(|| format!("writing {}", args.out.display()))?;
        match artifact.probe() {
            Ok(info) => tracing::info!(
                path = %args.out.display(),
                sample_rate_hz = info.sample_rate_hz,
                channels = info.channels,
                duration_secs = info.duration.map(|d| d.as_secs_f64()),
                "audio saved"
            ),
            Err(e) => tracing::warn!(path = %args.out.display(), error = %e, "audio saved, format unknown"),
        }
    }

    if let Some(timeline) = &snapshot.timeline {
        for point in timeline.points() {
            tracing::info!(label = %point.label, emotion = point.emotion, "{}", point.sentence);
        }
        tokio::fs::write(&args.csv, timeline.to_csv())
            .await
            .with_context(|| format!("writing {}", args.csv.display()))?;
        tracing::info!(
            path = %args.csv.display(),
            sentences = timeline.len(),
            emotions = ?timeline.distinct_emotions(),
            "timeline saved"
        );
    } else {
        tracing::info!("no emotion timeline available");
    }

    Ok(())
}

fn report(snapshot: &WorkflowSnapshot) {
    match snapshot.phase {
        Phase::Submitting => tracing::info!("sending story to server"),
        Phase::Streaming => tracing::info!(
            stage = snapshot.stage.as_ref().map(|s| s.as_str()).unwrap_or(""),
            message = snapshot.message.as_deref().unwrap_or(""),
            "{}",
            progress_line(snapshot.progress_index)
        ),
        Phase::Completing => tracing::info!("processing complete, downloading results"),
        Phase::Idle | Phase::Succeeded | Phase::Failed => {}
    }
}

/// `[2/4]  50% Analyzing emotions...` style status for a progress index.
fn progress_line(index: usize) -> String {
    let reached = completed_steps(index);
    format!(
        "[{}/{}] {:>3.0}% {}",
        reached.len(),
        STEP_LABELS.len(),
        progress_fraction(index) * 100.0,
        reached.last().copied().unwrap_or_default()
    )
}

fn story_from_args(args: &Args) -> anyhow::Result<Option<String>> {
    if let Some(story) = &args.story {
        return Ok(Some(story.clone()));
    }
    if let Some(path) = &args.story_file {
        let story = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        return Ok(Some(story));
    }
    if let Some(number) = args.sample {
        let story = samples::sample(number).with_context(|| {
            format!(
                "--sample must be between 1 and {}",
                samples::SAMPLE_STORIES.len()
            )
        })?;
        return Ok(Some(story.to_owned()));
    }
    Ok(None)
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn build_config(args: &Args, env: &impl Env) -> anyhow::Result<ClientConfig> {
    let api_base = ApiBaseUrl::new(&resolve_string_with_default(
        args.api_url.clone(),
        ENV_API_URL,
        env,
        DEFAULT_API_URL,
    ))?;
    let stage_timeout = StageTimeout::new(resolve_u64_with_default(
        args.stage_timeout_secs,
        ENV_STAGE_TIMEOUT_SECS,
        env,
        DEFAULT_STAGE_TIMEOUT_SECS,
    )?);
    let draft_path = PathBuf::from(resolve_string_with_default(
        args.draft_path.clone(),
        ENV_DRAFT_PATH,
        env,
        DEFAULT_DRAFT_PATH,
    ));

    let cfg = ClientConfig {
        api_base,
        stage_timeout,
        draft_path,
        ..ClientConfig::default()
    }
    .with_request_timeout_secs(args.request_timeout_secs)?;
    Ok(cfg)
}
