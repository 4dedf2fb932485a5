use std::path::{Path, PathBuf};

use crate::engine::Invocation;
use crate::probe::ProbedDuration;
use crate::settings::RenderSettings;
use crate::stages::{self, Stage};
use crate::{Config, RenderError};

/// One step of a render: which stage runs and what it invokes.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedStage {
    pub stage: Stage,
    pub invocation: Invocation,
}

impl PlannedStage {
    pub fn output(&self) -> &Path {
        self.invocation.output()
    }
}

/// Build every stage of the render in execution order.
///
/// Each stage's output path is handed explicitly to the stages that consume
/// it. `duration_secs` sizes the generated noise bed and rumble tone.
pub fn plan_renders(config: &Config, duration_secs: u64) -> Result<Vec<PlannedStage>, RenderError> {
    let settings = config.settings();
    let paths = config.paths();
    let mut plan = Vec::new();

    let clean = push(
        &mut plan,
        Stage::Clean,
        stages::clean(config.input_path(), &paths.clean, settings)?,
    );
    let mixed = push(
        &mut plan,
        Stage::Layer,
        stages::layer(&clean, &paths.mixed, settings, duration_secs)?,
    );
    let looped = push(
        &mut plan,
        Stage::Loop,
        stages::splice_loop(&mixed, &paths.looped, settings)?,
    );
    let final_mix = push(
        &mut plan,
        Stage::Normalize,
        stages::normalize(&looped, &paths.final_mix, settings)?,
    );
    push(
        &mut plan,
        Stage::Phone,
        stages::phone(&final_mix, &paths.phone, settings)?,
    );
    let room = push(
        &mut plan,
        Stage::Room,
        stages::room(&final_mix, &paths.room, settings)?,
    );

    if settings.rumble_enabled {
        let tone = push(
            &mut plan,
            Stage::RumbleTone,
            stages::rumble_tone(&paths.rumble_tone, settings, duration_secs)?,
        );
        push(
            &mut plan,
            Stage::Storm,
            stages::storm(&room, &tone, &paths.storm, settings)?,
        );
    }

    Ok(plan)
}

/// Reject a recording too short for the loop splice, which needs at least
/// twice the cross-fade.
///
/// A probed value is truncated, so the recording lasts less than
/// `secs + 1`; only recordings certain to be too short are rejected. A
/// fallback duration says nothing about the recording and always passes.
pub fn check_loopable(settings: &RenderSettings, duration: ProbedDuration) -> Result<(), RenderError> {
    let min_secs = settings.crossfade_secs * 2.0;
    if !duration.fallback && duration.secs.saturating_add(1) as f64 <= min_secs {
        return Err(RenderError::TooShort {
            secs: duration.secs,
            min_secs,
        });
    }
    Ok(())
}

fn push(plan: &mut Vec<PlannedStage>, stage: Stage, invocation: Invocation) -> PathBuf {
    let output = invocation.output().to_path_buf();
    plan.push(PlannedStage { stage, invocation });
    output
}
