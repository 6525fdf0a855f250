use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use centering_core::{CapturedImage, FrameSpec, LandmarkSet, Measurement, Real};
use centering_pipeline::{
    CalibrationStore, JsonFileStorage, LogEntry, MeasurementSession, MemoryStorage,
    SessionConfig, SessionMetadata, SessionState,
};
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Replay a recorded landmark stream and operator actions through a
/// measurement session.
#[derive(Debug, Parser)]
#[command(author, version, about = "Virtual centering measurement replay")]
struct Args {
    /// Path to the JSON replay script.
    #[arg(long)]
    script: PathBuf,

    /// Optional path to a JSON SessionConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding persisted calibrations. Without it calibrations
    /// live only for this run.
    #[arg(long)]
    calibration_dir: Option<PathBuf>,

    /// Capture device identity the calibration is stored under.
    #[arg(long, default_value = "default")]
    device_id: String,

    /// Operator note recorded in the report (overrides the script's).
    #[arg(long)]
    description: Option<String>,
}

/// A recorded session: the ordered frame and the steps to replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReplayScript {
    #[serde(default)]
    frame: FrameSpec,
    /// Operator note, e.g. an order number.
    #[serde(default)]
    description: Option<String>,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Step {
    /// One detector frame.
    Frame { landmarks: LandmarkSet },
    /// Freeze; `image` is read relative to the script's directory.
    Capture {
        #[serde(default)]
        image: Option<PathBuf>,
    },
    Press { x: Real, y: Real },
    Drag { x: Real, y: Real },
    Release,
    Retake,
    Validate,
    Cancel,
    Calibrate,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Frame { .. } => "frame",
            Step::Capture { .. } => "capture",
            Step::Press { .. } => "press",
            Step::Drag { .. } => "drag",
            Step::Release => "release",
            Step::Retake => "retake",
            Step::Validate => "validate",
            Step::Cancel => "cancel",
            Step::Calibrate => "calibrate",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReplayReport {
    metadata: SessionMetadata,
    state: SessionState,
    measurement: Option<Measurement>,
    log: Vec<LogEntry>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
}

fn load_image(path: &Path) -> Result<CapturedImage> {
    let data = fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    };
    Ok(CapturedImage::new(mime, data))
}

fn run_replay(
    session: &mut MeasurementSession,
    script: &ReplayScript,
    base_dir: &Path,
) -> Result<()> {
    for (index, step) in script.steps.iter().enumerate() {
        let ctx = || format!("step {index} ({})", step.name());
        match step {
            Step::Frame { landmarks } => {
                // A frame without signal is routine; keep replaying.
                if let Err(err) = session.on_landmarks(landmarks.clone()) {
                    tracing::warn!("step {index}: frame skipped: {err}");
                }
            }
            Step::Capture { image } => {
                let image = image
                    .as_ref()
                    .map(|p| load_image(&base_dir.join(p)))
                    .transpose()
                    .with_context(ctx)?;
                let m = session.capture(image).with_context(ctx)?;
                tracing::info!("captured: PD {:.1} mm", m.pd_mm);
            }
            Step::Press { x, y } => {
                let grabbed = session.press(*x, *y).with_context(ctx)?;
                tracing::debug!("press ({x}, {y}) -> {grabbed:?}");
            }
            Step::Drag { x, y } => {
                session.drag_to(*x, *y).with_context(ctx)?;
            }
            Step::Release => {
                session.release().with_context(ctx)?;
            }
            Step::Retake => session.retake().with_context(ctx)?,
            Step::Validate => {
                let m = session.validate().with_context(ctx)?;
                tracing::info!("validated:\n{m}");
            }
            Step::Cancel => session.cancel().with_context(ctx)?,
            Step::Calibrate => {
                let data = session.calibrate().with_context(ctx)?;
                tracing::info!("calibrated: {:.4} px/mm", data.pixels_per_mm);
            }
        }
    }
    Ok(())
}

fn run_replay_from_files(
    script_path: &Path,
    config_path: Option<&Path>,
    calibration_dir: Option<&Path>,
    device_id: &str,
    description: Option<&str>,
) -> Result<String> {
    let script: ReplayScript = load_json_file(script_path)?;
    if script.steps.is_empty() {
        bail!("{} contains no steps", script_path.display());
    }

    let config = match config_path {
        Some(path) => load_json_file::<SessionConfig>(path)?,
        None => SessionConfig::default(),
    };
    let store = match calibration_dir {
        Some(dir) => CalibrationStore::new(device_id, JsonFileStorage::new(dir)),
        None => CalibrationStore::new(device_id, MemoryStorage::new()),
    };

    let mut session = match description.or(script.description.as_deref()) {
        Some(note) => MeasurementSession::with_description(config, script.frame, store, note)?,
        None => MeasurementSession::new(config, script.frame, store)?,
    };
    let base_dir = script_path.parent().unwrap_or_else(|| Path::new("."));
    run_replay(&mut session, &script, base_dir)?;

    if session.state() != SessionState::Validated {
        tracing::warn!("replay ended in state {}", session.state());
    }
    let report = ReplayReport {
        metadata: session.metadata.clone(),
        state: session.state(),
        measurement: session.current_measurement().cloned(),
        log: session.log.clone(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = run_replay_from_files(
        &args.script,
        args.config.as_deref(),
        args.calibration_dir.as_deref(),
        &args.device_id,
        args.description.as_deref(),
    )?;
    println!("{json}");
    Ok(())
}
