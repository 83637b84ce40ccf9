use std::io::Write;
use std::process::ExitCode;

use framescope::cli::{CliArgs, CliSources, Command, parse_cli};
use framescope::pipeline::SimilarityQuery;
use framescope::progress::ingest_spinner;
use framescope::settings::resolve_settings;
use framescope::{
    IngestReport, PipelineError, PipelineResult, build_extractor, build_pipeline,
    build_query_pipeline,
};
use framescope_types::{Frame, SimilarityResult, VideoAsset};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let (cli, sources) = parse_cli();
    init_logging(cli.verbose);

    match run(&cli, &sources).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let report = json!({
                "error": {
                    "kind": err.kind(),
                    "message": err.to_string(),
                }
            });
            eprintln!("{report}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &CliArgs, sources: &CliSources) -> PipelineResult<()> {
    let settings = resolve_settings(cli, sources)?;
    if let Some(path) = settings.config_path.as_deref() {
        debug!(path = %path.display(), "loaded configuration file");
    }

    match &cli.command {
        Command::Backends => {
            let backends: Vec<BackendEntry> = settings
                .decoder
                .available_backends()
                .await
                .into_iter()
                .map(|backend| BackendEntry {
                    name: backend.as_str(),
                    selected: backend == settings.decoder.backend,
                })
                .collect();
            emit(cli, &BackendsOutput { backends })
        }
        Command::Probe { video } => {
            let extractor = build_extractor(&settings).await?;
            let metadata = extractor.probe(video).await?;
            emit(
                cli,
                &ProbeOutput {
                    path: video.display().to_string(),
                    duration_seconds: metadata.duration_seconds,
                    width: metadata.width,
                    height: metadata.height,
                },
            )
        }
        Command::Ingest {
            video, video_id, ..
        } => {
            let pipeline = build_pipeline(&settings).await?;
            let asset = pipeline.register_video(video).await?;
            let video_id = video_id.clone().unwrap_or_else(|| asset.id.clone());

            let spinner = ingest_spinner(&video_id);
            let result = pipeline
                .ingest(video, &video_id, settings.interval_seconds)
                .await;
            spinner.finish_and_clear();
            let mut report = result?;
            report.strip_vectors();
            emit(
                cli,
                &IngestOutput {
                    video: &asset,
                    remote_active: pipeline.store().remote_active(),
                    report: &report,
                },
            )
        }
        Command::Similar { frame_id, k } => {
            let query = SimilarityQuery::new(frame_id.clone(), *k)?;
            let pipeline = build_query_pipeline(&settings).await?;
            let results = pipeline.find_similar(&query).await?;
            emit(
                cli,
                &SimilarOutput {
                    reference_frame_id: query.frame_id(),
                    k: query.k(),
                    results: &results,
                },
            )
        }
        Command::Frames { video_id } => {
            let pipeline = build_query_pipeline(&settings).await?;
            let mut frames = pipeline
                .frames_for_video(video_id, settings.interval_seconds)
                .await?;
            let with_vector = frames.iter().filter(|f| f.has_feature_vector()).count();
            for frame in &mut frames {
                frame.feature_vector = None;
            }
            emit(
                cli,
                &FramesOutput {
                    video_id,
                    with_vector,
                    frames: &frames,
                },
            )
        }
    }
}

#[derive(Serialize)]
struct BackendEntry {
    name: &'static str,
    selected: bool,
}

#[derive(Serialize)]
struct BackendsOutput {
    backends: Vec<BackendEntry>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProbeOutput {
    path: String,
    duration_seconds: Option<f64>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestOutput<'a> {
    video: &'a VideoAsset,
    remote_active: bool,
    report: &'a IngestReport,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimilarOutput<'a> {
    reference_frame_id: &'a str,
    k: usize,
    results: &'a [SimilarityResult],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FramesOutput<'a> {
    video_id: &'a str,
    with_vector: usize,
    frames: &'a [Frame],
}

fn emit<T: Serialize>(cli: &CliArgs, value: &T) -> PipelineResult<()> {
    let encoded = if cli.pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|err| PipelineError::Task {
        message: format!("failed to encode output: {err}"),
    })?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{encoded}").map_err(|err| PipelineError::Task {
        message: format!("failed to write output: {err}"),
    })
}
