use std::path::{Path, PathBuf};

use crate::RenderError;

/// Suffix appended to the input's base name to form the output directory.
pub const OUTPUT_DIR_SUFFIX: &str = "_renders";

pub const CLEAN_FILE: &str = "rain_clean.mp3";
pub const MIXED_FILE: &str = "rain_mixed.mp3";
pub const LOOP_FILE: &str = "rain_loop.mp3";
pub const FINAL_FILE: &str = "rain_final.mp3";
pub const PHONE_FILE: &str = "rain_phone.mp3";
pub const ROOM_FILE: &str = "rain_room.mp3";
pub const RUMBLE_TONE_FILE: &str = "lowrumble.wav";
pub const STORM_FILE: &str = "rain_distantstorm.mp3";

/// Every path a render touches, derived from the input path alone.
///
/// The output directory sits next to the input: `music/storm.wav` renders
/// into `music/storm_renders/`. Only the final extension is stripped, so
/// `a.b.mp3` yields `a.b_renders`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderPaths {
    pub base_name: String,
    pub output_dir: PathBuf,
    pub clean: PathBuf,
    pub mixed: PathBuf,
    pub looped: PathBuf,
    pub final_mix: PathBuf,
    pub phone: PathBuf,
    pub room: PathBuf,
    pub rumble_tone: PathBuf,
    pub storm: PathBuf,
}

impl RenderPaths {
    pub fn derive(input: &Path) -> Result<Self, RenderError> {
        let base_name = input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| RenderError::InvalidInputName(input.to_path_buf()))?
            .to_owned();

        let parent = input.parent().unwrap_or_else(|| Path::new(""));
        let output_dir = parent.join(format!("{base_name}{OUTPUT_DIR_SUFFIX}"));

        Ok(Self {
            clean: output_dir.join(CLEAN_FILE),
            mixed: output_dir.join(MIXED_FILE),
            looped: output_dir.join(LOOP_FILE),
            final_mix: output_dir.join(FINAL_FILE),
            phone: output_dir.join(PHONE_FILE),
            room: output_dir.join(ROOM_FILE),
            rumble_tone: output_dir.join(RUMBLE_TONE_FILE),
            storm: output_dir.join(STORM_FILE),
            base_name,
            output_dir,
        })
    }

    /// Outputs in the order the stages produce them.
    pub fn outputs(&self, rumble: bool) -> Vec<&Path> {
        let mut outputs = vec![
            self.clean.as_path(),
            self.mixed.as_path(),
            self.looped.as_path(),
            self.final_mix.as_path(),
            self.phone.as_path(),
            self.room.as_path(),
        ];
        if rumble {
            outputs.push(self.rumble_tone.as_path());
            outputs.push(self.storm.as_path());
        }
        outputs
    }
}
