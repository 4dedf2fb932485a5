//! The seam between the pipeline and the external audio engine.
//!
//! Stages describe their work as an [`Invocation`]; an [`Engine`] turns it
//! into a process. [`FfmpegEngine`] drives the real `ffmpeg`/`ffprobe`
//! binaries, tests substitute their own implementation.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use thiserror::Error;

use crate::filter::{Filter, FilterChain};
use crate::settings::Bitrate;

/// Number of trailing stderr lines kept when an invocation fails.
const STDERR_TAIL_LINES: usize = 20;

/// Errors produced while talking to the external engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The tool could not be found or does not answer `-version`.
    #[error(
        "{tool} is not available; install ffmpeg (it ships both ffmpeg and ffprobe) \
         and make sure it is on PATH"
    )]
    ToolMissing { tool: String },

    /// The process could not be started for a reason other than absence.
    #[error("failed to launch {program}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("{program} exited with {}{}", status_label(.status), stderr_suffix(.stderr))]
    Failed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl EngineError {
    /// Exit code of the failed process, when it exited normally with one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            EngineError::Failed { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => String::from("a signal"),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Where an invocation reads audio from.
#[derive(Clone, Debug, PartialEq)]
pub enum Source {
    File(PathBuf),
    /// A lavfi generator such as `anoisesrc` or `sine`.
    Generator(Filter),
}

/// Output codec of an invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    Mp3(Bitrate),
    PcmS16,
}

/// A fully described engine run: inputs, filter chain, encoding and output.
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    inputs: Vec<Source>,
    filters: FilterChain,
    sample_rate: u32,
    codec: Codec,
    output: PathBuf,
}

impl Invocation {
    pub fn new(output: impl Into<PathBuf>, sample_rate: u32, codec: Codec) -> Self {
        Self {
            inputs: Vec::new(),
            filters: FilterChain::new(),
            sample_rate,
            codec,
            output: output.into(),
        }
    }

    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(Source::File(path.into()));
        self
    }

    pub fn generator(mut self, filter: Filter) -> Self {
        self.inputs.push(Source::Generator(filter));
        self
    }

    pub fn filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn inputs(&self) -> &[Source] {
        &self.inputs
    }

    /// Paths of the file inputs, in input order.
    pub fn input_files(&self) -> impl Iterator<Item = &Path> {
        self.inputs.iter().filter_map(|source| match source {
            Source::File(path) => Some(path.as_path()),
            Source::Generator(_) => None,
        })
    }

    pub fn filter_chain(&self) -> &FilterChain {
        &self.filters
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Command-line arguments for `ffmpeg`, output path last.
    ///
    /// Metadata is carried over from the first input whenever that input is
    /// a file; generated sources have none to preserve.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]
            .into_iter()
            .map(OsString::from)
            .collect();

        for source in &self.inputs {
            match source {
                Source::File(path) => {
                    args.push("-i".into());
                    args.push(path.as_os_str().to_owned());
                }
                Source::Generator(filter) => {
                    args.push("-f".into());
                    args.push("lavfi".into());
                    args.push("-i".into());
                    args.push(filter.to_string().into());
                }
            }
        }

        if !self.filters.is_empty() {
            let flag = if self.filters.is_complex() {
                "-filter_complex"
            } else {
                "-af"
            };
            args.push(flag.into());
            args.push(self.filters.to_string().into());
        }

        if matches!(self.inputs.first(), Some(Source::File(_))) {
            args.push("-map_metadata".into());
            args.push("0".into());
        }

        args.push("-ar".into());
        args.push(self.sample_rate.to_string().into());

        match self.codec {
            Codec::Mp3(bitrate) => {
                args.push("-c:a".into());
                args.push("libmp3lame".into());
                args.push("-b:a".into());
                args.push(bitrate.to_string().into());
            }
            Codec::PcmS16 => {
                args.push("-c:a".into());
                args.push("pcm_s16le".into());
            }
        }

        args.push(self.output.as_os_str().to_owned());
        args
    }
}

/// Something that can run invocations and probe durations.
pub trait Engine {
    /// Confirm the engine's tools can be launched.
    fn check_available(&self) -> Result<(), EngineError>;

    /// Raw duration report for `input`, in seconds as printed by the prober.
    fn probe_duration(&self, input: &Path) -> Result<String, EngineError>;

    /// Run one invocation to completion.
    fn execute(&self, invocation: &Invocation) -> Result<(), EngineError>;
}

/// [`Engine`] backed by the `ffmpeg` and `ffprobe` executables.
#[derive(Clone, Debug)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Shell-style rendering of the command an invocation runs.
    pub fn command_line(&self, invocation: &Invocation) -> String {
        render_command(&self.ffmpeg, &invocation.args())
    }

    fn check_tool(tool: &Path) -> Result<(), EngineError> {
        let status = Command::new(tool)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => Err(EngineError::ToolMissing {
                tool: tool.display().to_string(),
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(EngineError::ToolMissing {
                tool: tool.display().to_string(),
            }),
            Err(source) => Err(EngineError::Launch {
                program: tool.display().to_string(),
                source,
            }),
        }
    }
}

impl Engine for FfmpegEngine {
    fn check_available(&self) -> Result<(), EngineError> {
        Self::check_tool(&self.ffmpeg)?;
        Self::check_tool(&self.ffprobe)
    }

    fn probe_duration(&self, input: &Path) -> Result<String, EngineError> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            input.as_os_str().to_owned(),
        ];
        debug!("probing: {}", render_command(&self.ffprobe, &args));
        let output = run(&self.ffprobe, &args)?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    fn execute(&self, invocation: &Invocation) -> Result<(), EngineError> {
        let args = invocation.args();
        debug!("running: {}", render_command(&self.ffmpeg, &args));
        run(&self.ffmpeg, &args).map(|_| ())
    }
}

/// Run `program` to completion and return its stdout.
fn run(program: &Path, args: &[OsString]) -> Result<Vec<u8>, EngineError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                EngineError::ToolMissing {
                    tool: program.display().to_string(),
                }
            } else {
                EngineError::Launch {
                    program: program.display().to_string(),
                    source,
                }
            }
        })?;

    if !output.status.success() {
        return Err(EngineError::Failed {
            program: program.display().to_string(),
            status: output.status.code(),
            stderr: stderr_tail(&output.stderr),
        });
    }

    Ok(output.stdout)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

fn render_command(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| {
            let part = part.to_string_lossy();
            if part.is_empty() || part.contains(|c: char| c.is_whitespace() || "'\"[];".contains(c)) {
                format!("\"{}\"", part.replace('"', "\\\""))
            } else {
                part.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
