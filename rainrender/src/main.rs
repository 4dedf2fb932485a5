mod cli;

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::ArgMatches;
use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;
use rainrender_core::{
    check_loopable, list_outputs, plan_renders, probe, run_with_progress, Config, Engine, FfmpegEngine,
    ProgressEvent, RenderError,
};

use crate::cli::build_cli;

/// Exit status for usage and environment errors.
const FAILURE_EXIT_CODE: i32 = 1;

fn main() {
    env_logger::init();

    let matches = match build_cli().try_get_matches() {
        Ok(matches) => matches,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let _ = err.print();
                process::exit(FAILURE_EXIT_CODE);
            }
        },
    };

    if let Err(err) = render(&matches) {
        eprintln!("Error: {err:?}");
        process::exit(exit_code(&err));
    }
}

/// The engine's own exit status when a stage failed, otherwise 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<RenderError>())
        .and_then(RenderError::engine_exit_code)
        .filter(|code| *code != 0)
        .unwrap_or(FAILURE_EXIT_CODE)
}

fn render(matches: &ArgMatches) -> anyhow::Result<()> {
    let input_path = matches
        .get_one::<PathBuf>("file_path")
        .expect("required argument");
    let ffmpeg = matches
        .get_one::<PathBuf>("ffmpeg")
        .expect("defaulted argument");
    let ffprobe = matches
        .get_one::<PathBuf>("ffprobe")
        .expect("defaulted argument");
    let rumble = matches.get_flag("rumble");
    let echo = !matches.get_flag("no-echo");
    let dry_run = matches.get_flag("dry-run");

    let engine = FfmpegEngine::new(ffmpeg, ffprobe);
    if !dry_run {
        engine.check_available()?;
    }

    let config = Config::builder(input_path)
        .rumble(rumble)
        .echo(echo)
        .build()
        .with_context(|| format!("failed to prepare render of '{}'", input_path.display()))?;

    info!(
        "rendering '{}' into '{}'",
        config.input_path().display(),
        config.paths().output_dir.display()
    );

    if dry_run {
        return print_plan(&config, &engine);
    }

    let progress = ProgressBar::new(0);
    progress.set_draw_target(ProgressDrawTarget::stderr());
    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(bar_style);

    let progress_handle = progress.clone();
    let result = run_with_progress(&config, &engine, move |event| match event {
        ProgressEvent::Probed { duration } => {
            if duration.fallback {
                progress_handle.suspend(|| {
                    println!(
                        "warning: could not determine the input duration; using {}s for generated beds",
                        duration.secs
                    )
                });
            }
        }
        ProgressEvent::Planned { stages, .. } => {
            progress_handle.set_length(stages as u64);
            progress_handle.enable_steady_tick(Duration::from_millis(100));
        }
        ProgressEvent::StageStarted {
            index,
            total,
            stage,
            output,
        } => {
            progress_handle.suspend(|| {
                println!(
                    "==> [{index}/{total}] {}: {}",
                    stage.describe(),
                    output.display()
                )
            });
            progress_handle.set_message(stage.to_string());
        }
        ProgressEvent::StageFinished { .. } => progress_handle.inc(1),
        ProgressEvent::Finish => progress_handle.set_message(String::from("Completed")),
    })
    .with_context(|| format!("failed to render '{}'", input_path.display()));

    progress.finish_and_clear();

    let summary = result?;
    print_listing(&summary.output_dir)
}

fn print_plan(config: &Config, engine: &FfmpegEngine) -> anyhow::Result<()> {
    let settings = config.settings();
    let duration = probe::probe_duration(
        engine,
        config.input_path(),
        settings.fallback_duration_secs,
    );
    if duration.fallback {
        println!(
            "warning: could not determine the input duration; using {}s for generated beds",
            duration.secs
        );
    }

    check_loopable(settings, duration)?;

    let plan = plan_renders(config, duration.secs)?;
    println!(
        "Dry run: would render {} file(s) into {}:",
        plan.len(),
        config.paths().output_dir.display()
    );
    for (position, step) in plan.iter().enumerate() {
        println!(
            "  [{}/{}] {}: {}",
            position + 1,
            plan.len(),
            step.stage.describe(),
            step.output().display()
        );
        println!("        {}", engine.command_line(&step.invocation));
    }

    Ok(())
}

fn print_listing(output_dir: &Path) -> anyhow::Result<()> {
    let entries = list_outputs(output_dir)
        .with_context(|| format!("failed to list '{}'", output_dir.display()))?;

    println!("Renders in {}:", output_dir.display());
    for entry in entries {
        println!(
            "  {:>10}  {}",
            HumanBytes(entry.size).to_string(),
            entry.name
        );
    }

    Ok(())
}
