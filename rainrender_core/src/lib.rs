//! Render a rain recording into cleaned, layered, looped and
//! device-targeted files by driving an external audio engine.
//!
//! The work is a fixed sequence of stages (see [`stages::Stage`]). Each
//! stage is described as an [`engine::Invocation`] and executed through an
//! [`engine::Engine`], one after the other; the first failure stops the run.

pub mod engine;
pub mod filter;
pub mod paths;
pub mod pipeline;
pub mod probe;
pub mod report;
pub mod settings;
pub mod stages;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

pub use engine::{Engine, EngineError, FfmpegEngine, Invocation};
pub use filter::FilterError;
pub use paths::RenderPaths;
pub use pipeline::{check_loopable, plan_renders, PlannedStage};
pub use probe::{ProbedDuration, FALLBACK_DURATION_SECS};
pub use report::{list_outputs, OutputEntry};
pub use settings::{Bitrate, RenderSettings, SettingsError};
pub use stages::Stage;

/// Errors that can occur while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The input path does not name an existing file.
    #[error("input file does not exist: {}", .0.display())]
    MissingInput(PathBuf),

    /// No base name can be derived from the input path.
    #[error("failed to derive a base name from '{}'", .0.display())]
    InvalidInputName(PathBuf),

    /// Wrapper around IO errors encountered while preparing the output directory.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The render settings break a cross-field or encoding limit.
    #[error("invalid render settings")]
    Settings(#[from] SettingsError),

    /// A setting is outside the range its filter accepts.
    #[error("invalid filter parameters")]
    Filter(#[from] FilterError),

    /// The probed recording is too short to splice into a loop.
    #[error(
        "input lasts about {secs}s but splicing a loop needs at least {min_secs}s \
         (twice the cross-fade)"
    )]
    TooShort { secs: u64, min_secs: f64 },

    /// The engine could not be used at all.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A stage's invocation failed; later stages were not run.
    #[error("{stage} stage failed")]
    Stage {
        stage: Stage,
        #[source]
        source: EngineError,
    },

    /// A stage reported success but left no usable output behind.
    #[error("{stage} stage produced no output at '{}'", .path.display())]
    MissingArtifact { stage: Stage, path: PathBuf },
}

impl RenderError {
    /// Exit code of the engine process behind a stage failure, if any.
    pub fn engine_exit_code(&self) -> Option<i32> {
        match self {
            RenderError::Stage { source, .. } => source.exit_code(),
            _ => None,
        }
    }
}

/// Everything one render needs: the input, the derived paths and the settings.
#[derive(Clone, Debug)]
pub struct Config {
    input_path: PathBuf,
    paths: RenderPaths,
    settings: RenderSettings,
}

/// Builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    input: PathBuf,
    settings: RenderSettings,
}

impl ConfigBuilder {
    /// Replace the whole set of render settings.
    pub fn settings(mut self, settings: RenderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Toggle the rumble tone and distant-storm variant.
    pub fn rumble(mut self, enabled: bool) -> Self {
        self.settings.rumble_enabled = enabled;
        self
    }

    /// Toggle the echo on the layered mix.
    pub fn echo(mut self, enabled: bool) -> Self {
        self.settings.echo_enabled = enabled;
        self
    }

    /// Validate the input and settings, and derive the output paths.
    ///
    /// Every stage is built once here, so a bad parameter is reported before
    /// any process runs.
    pub fn build(self) -> Result<Config, RenderError> {
        if !self.input.is_file() {
            return Err(RenderError::MissingInput(self.input));
        }
        self.settings.validate()?;

        // Symlinks stay unresolved: the output directory is named after the
        // path as given.
        let input_path = if self.input.is_absolute() {
            self.input
        } else {
            env::current_dir()?.join(&self.input)
        };
        let paths = RenderPaths::derive(&input_path)?;
        let config = Config {
            input_path,
            paths,
            settings: self.settings,
        };

        plan_renders(&config, config.settings.fallback_duration_secs)?;
        Ok(config)
    }
}

impl Config {
    /// Configuration with the default settings.
    pub fn new<P: AsRef<Path>>(input: P) -> Result<Self, RenderError> {
        Self::builder(input).build()
    }

    pub fn builder<P: AsRef<Path>>(input: P) -> ConfigBuilder {
        ConfigBuilder {
            input: input.as_ref().to_path_buf(),
            settings: RenderSettings::default(),
        }
    }

    /// Absolute path of the recording to render, with symlinks left unresolved.
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn paths(&self) -> &RenderPaths {
        &self.paths
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }
}

/// Progress notifications emitted by [`run_with_progress`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressEvent<'a> {
    /// The input was probed; `duration.fallback` marks a substituted value.
    Probed { duration: ProbedDuration },
    /// The output directory exists and `stages` steps are about to run.
    Planned { stages: usize, output_dir: &'a Path },
    /// A stage is about to run.
    StageStarted {
        index: usize,
        total: usize,
        stage: Stage,
        output: &'a Path,
    },
    /// A stage finished and its output is in place.
    StageFinished { index: usize, stage: Stage },
    Finish,
}

/// Outcome of a successful render.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSummary {
    pub output_dir: PathBuf,
    /// Outputs in the order they were produced.
    pub outputs: Vec<PathBuf>,
    pub duration: ProbedDuration,
}

/// Render using the supplied [`Config`] and engine.
pub fn run(config: &Config, engine: &dyn Engine) -> Result<RenderSummary, RenderError> {
    run_with_progress(config, engine, |_| {})
}

/// Render, reporting progress through `on_event`.
///
/// The input is probed and checked to be long enough for the loop splice.
/// The output directory is then created and the stages run in order. The first failing stage aborts the render; files written by
/// earlier stages are left in place.
pub fn run_with_progress<F>(
    config: &Config,
    engine: &dyn Engine,
    mut on_event: F,
) -> Result<RenderSummary, RenderError>
where
    F: FnMut(ProgressEvent<'_>),
{
    let duration = probe::probe_duration(
        engine,
        config.input_path(),
        config.settings().fallback_duration_secs,
    );
    on_event(ProgressEvent::Probed { duration });
    check_loopable(config.settings(), duration)?;

    let plan = plan_renders(config, duration.secs)?;
    let output_dir = config.paths().output_dir.as_path();
    fs::create_dir_all(output_dir)?;
    on_event(ProgressEvent::Planned {
        stages: plan.len(),
        output_dir,
    });

    let total = plan.len();
    for (position, step) in plan.iter().enumerate() {
        let index = position + 1;
        on_event(ProgressEvent::StageStarted {
            index,
            total,
            stage: step.stage,
            output: step.output(),
        });
        info!(
            "[{index}/{total}] {} -> '{}'",
            step.stage.describe(),
            step.output().display()
        );

        engine
            .execute(&step.invocation)
            .map_err(|source| RenderError::Stage {
                stage: step.stage,
                source,
            })?;
        ensure_output(step)?;

        on_event(ProgressEvent::StageFinished {
            index,
            stage: step.stage,
        });
    }

    on_event(ProgressEvent::Finish);

    Ok(RenderSummary {
        output_dir: output_dir.to_path_buf(),
        outputs: plan.iter().map(|step| step.output().to_path_buf()).collect(),
        duration,
    })
}

fn ensure_output(step: &PlannedStage) -> Result<(), RenderError> {
    let produced = fs::metadata(step.output())
        .map(|metadata| metadata.is_file() && metadata.len() > 0)
        .unwrap_or(false);
    if produced {
        Ok(())
    } else {
        Err(RenderError::MissingArtifact {
            stage: step.stage,
            path: step.output().to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing.wav");
        let err = Config::new(&input).unwrap_err();
        assert!(matches!(err, RenderError::MissingInput(ref path) if path == &input));
        assert!(err.to_string().contains("missing.wav"));
        assert!(!dir.path().join("missing_renders").exists());
    }

    #[test]
    fn directory_is_not_an_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::new(dir.path()).unwrap_err();
        assert!(matches!(err, RenderError::MissingInput(_)));
    }

    #[test]
    fn build_rejects_invalid_filter_settings() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rain.wav");
        fs::write(&input, b"RIFF").unwrap();

        let settings = RenderSettings {
            denoise_floor_db: 0.0,
            ..RenderSettings::default()
        };
        let err = Config::builder(&input).settings(settings).build().unwrap_err();
        assert!(matches!(err, RenderError::Filter(FilterError::OutOfRange { .. })));
    }

    #[test]
    fn toggles_override_settings() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rain.wav");
        fs::write(&input, b"RIFF").unwrap();

        let config = Config::builder(&input).rumble(true).echo(false).build().unwrap();
        assert!(config.settings().rumble_enabled);
        assert!(!config.settings().echo_enabled);
        assert_eq!(
            config.paths().output_dir.file_name().and_then(|name| name.to_str()),
            Some("rain_renders")
        );
    }

    #[test]
    fn stage_failure_exposes_engine_exit_code() {
        let err = RenderError::Stage {
            stage: Stage::Loop,
            source: EngineError::Failed {
                program: String::from("ffmpeg"),
                status: Some(187),
                stderr: String::new(),
            },
        };
        assert_eq!(err.engine_exit_code(), Some(187));
        assert_eq!(err.to_string(), "loop stage failed");
    }
}
