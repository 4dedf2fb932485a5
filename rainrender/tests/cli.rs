use assert_cmd::Command;
use predicates::prelude::*;
use std::error::Error;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const RENDERS: [&str; 6] = [
    "rain_clean.mp3",
    "rain_final.mp3",
    "rain_loop.mp3",
    "rain_mixed.mp3",
    "rain_phone.mp3",
    "rain_room.mp3",
];

/// Generate a small single-channel WAV file for testing.
///
/// The fixture is produced on the fly by emitting a PCM RIFF header followed
/// by a procedurally generated sine wave, so no binary assets are committed.
fn write_test_tone<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    duration_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let total_samples = ((sample_rate as u64 * duration_ms).max(1_000) + 999) / 1_000;
    let mut samples = Vec::with_capacity(total_samples as usize * 2);

    for n in 0..total_samples {
        let theta = (n as f32 / sample_rate as f32) * 2.0 * std::f32::consts::PI * 440.0;
        let sample = (theta.sin() * i16::MAX as f32 * 0.5) as i16;
        samples.extend_from_slice(&sample.to_le_bytes());
    }

    let mut file = File::create(path)?;
    let data_len = samples.len() as u32;
    let chunk_size = 36u32 + data_len;
    file.write_all(b"RIFF")?;
    file.write_all(&chunk_size.to_le_bytes())?;
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?; // PCM header size
    file.write_all(&1u16.to_le_bytes())?; // audio format = PCM
    file.write_all(&1u16.to_le_bytes())?; // channels
    file.write_all(&sample_rate.to_le_bytes())?;
    let byte_rate = sample_rate * 2;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&2u16.to_le_bytes())?; // block align
    file.write_all(&16u16.to_le_bytes())?; // bits per sample
    file.write_all(b"data")?;
    file.write_all(&data_len.to_le_bytes())?;
    file.write_all(&samples)?;
    Ok(())
}

fn file_names(dir: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    names.sort();
    Ok(names)
}

/// Shell-script stand-ins for ffmpeg and ffprobe.
///
/// The fake ffmpeg appends its arguments to a log and writes a few bytes to
/// its last argument, which is always the output path.
#[cfg(unix)]
struct FakeTools {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    log: PathBuf,
}

#[cfg(unix)]
impl FakeTools {
    fn new(dir: &Path, probe_report: &str, fail_on: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let log = dir.join("ffmpeg.log");
        let fail_clause = fail_on
            .map(|name| {
                format!(
                    "case \"$out\" in *{name}) echo 'Conversion failed!' >&2; exit 3;; esac\n"
                )
            })
            .unwrap_or_default();

        let ffmpeg = dir.join("fake-ffmpeg");
        write_script(
            &ffmpeg,
            &format!(
                "#!/bin/sh\n\
                 if [ \"$1\" = \"-version\" ]; then exit 0; fi\n\
                 echo \"$*\" >> '{}'\n\
                 for arg in \"$@\"; do out=\"$arg\"; done\n\
                 {fail_clause}\
                 printf 'fake audio' > \"$out\"\n",
                log.display()
            ),
        )?;

        let ffprobe = dir.join("fake-ffprobe");
        write_script(
            &ffprobe,
            &format!(
                "#!/bin/sh\n\
                 if [ \"$1\" = \"-version\" ]; then exit 0; fi\n\
                 echo '{probe_report}'\n"
            ),
        )?;

        Ok(Self {
            ffmpeg,
            ffprobe,
            log,
        })
    }

    fn command(&self) -> Result<Command, Box<dyn Error>> {
        let mut cmd = Command::cargo_bin("rainrender")?;
        cmd.env("RAINRENDER_FFMPEG", &self.ffmpeg)
            .env("RAINRENDER_FFPROBE", &self.ffprobe);
        Ok(cmd)
    }

    fn log(&self) -> Result<String, Box<dyn Error>> {
        Ok(fs::read_to_string(&self.log)?)
    }
}

#[cfg(unix)]
fn write_script(path: &Path, contents: &str) -> Result<(), Box<dyn Error>> {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, contents)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_renders_six_files_into_derived_directory() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input = work_dir.path().join("rain.wav");
    write_test_tone(&input, 8_000, 500)?;
    let tools = FakeTools::new(work_dir.path(), "60.000000", None)?;

    tools
        .command()?
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("==> [1/6]"))
        .stdout(predicate::str::contains("==> [6/6]"))
        .stdout(predicate::str::contains("rain_room.mp3"));

    let output_dir = work_dir.path().join("rain_renders");
    assert_eq!(file_names(&output_dir)?, RENDERS);
    assert_eq!(tools.log()?.lines().count(), 6);
    assert!(tools.log()?.contains("duration=60"));

    work_dir.close()?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_rumble_adds_tone_and_storm_files() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input = work_dir.path().join("rain.wav");
    write_test_tone(&input, 8_000, 500)?;
    let tools = FakeTools::new(work_dir.path(), "60.000000", None)?;

    tools.command()?.arg("--rumble").arg(&input).assert().success();

    let names = file_names(&work_dir.path().join("rain_renders"))?;
    assert_eq!(names.len(), 8);
    assert!(names.contains(&"lowrumble.wav".to_owned()));
    assert!(names.contains(&"rain_distantstorm.mp3".to_owned()));

    work_dir.close()?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_falls_back_when_duration_is_unusable() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input = work_dir.path().join("rain.wav");
    write_test_tone(&input, 8_000, 500)?;
    let tools = FakeTools::new(work_dir.path(), "N/A", None)?;

    tools
        .command()?
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("using 3720s"));

    assert!(tools.log()?.contains("duration=3720"));
    assert_eq!(file_names(&work_dir.path().join("rain_renders"))?, RENDERS);

    work_dir.close()?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_stops_and_propagates_engine_exit_status() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input = work_dir.path().join("rain.wav");
    write_test_tone(&input, 8_000, 500)?;
    let tools = FakeTools::new(work_dir.path(), "60", Some("rain_loop.mp3"))?;

    tools
        .command()?
        .arg(&input)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("loop stage failed"))
        .stderr(predicate::str::contains("Conversion failed!"));

    let names = file_names(&work_dir.path().join("rain_renders"))?;
    assert_eq!(names, ["rain_clean.mp3", "rain_mixed.mp3"]);
    assert_eq!(tools.log()?.lines().count(), 3);

    work_dir.close()?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_reports_missing_input_file() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let tools = FakeTools::new(work_dir.path(), "60", None)?;
    let input = work_dir.path().join("missing.wav");

    tools
        .command()?
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("input file does not exist"))
        .stderr(predicate::str::contains("missing.wav"));

    assert!(!work_dir.path().join("missing_renders").exists());

    work_dir.close()?;
    Ok(())
}

#[test]
fn cli_reports_missing_engine_with_install_hint() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input = work_dir.path().join("rain.wav");
    write_test_tone(&input, 8_000, 500)?;

    let mut cmd = Command::cargo_bin("rainrender")?;
    cmd.env("RAINRENDER_FFMPEG", work_dir.path().join("no-such-ffmpeg"))
        .env("RAINRENDER_FFPROBE", work_dir.path().join("no-such-ffprobe"))
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("install ffmpeg"));

    assert!(!work_dir.path().join("rain_renders").exists());

    work_dir.close()?;
    Ok(())
}

#[test]
fn cli_requires_an_input_argument() -> Result<(), Box<dyn Error>> {
    Command::cargo_bin("rainrender")?
        .assert()
        .code(1)
        .stderr(predicate::str::contains("FILE_PATH"));
    Ok(())
}

#[test]
fn cli_dry_run_prints_plan_without_creating_files() -> Result<(), Box<dyn Error>> {
    let work_dir = tempdir()?;
    let input = work_dir.path().join("storm.wav");
    write_test_tone(&input, 8_000, 500)?;

    let mut cmd = Command::cargo_bin("rainrender")?;
    cmd.env("RAINRENDER_FFMPEG", "ffmpeg")
        .env("RAINRENDER_FFPROBE", work_dir.path().join("no-such-ffprobe"))
        .arg("--dry-run")
        .arg("--rumble")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run: would render 8 file(s)"))
        .stdout(predicate::str::contains("storm_renders"))
        .stdout(predicate::str::contains("rain_distantstorm.mp3"))
        .stdout(predicate::str::contains("[body][head]acrossfade=d=6:c1=tri:c2=tri"))
        .stdout(predicate::str::contains("duration=3720"));

    assert!(!work_dir.path().join("storm_renders").exists());

    work_dir.close()?;
    Ok(())
}

fn real_engine_available() -> bool {
    let ffprobe = std::process::Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    let encoders = std::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output();

    match encoders {
        Ok(output) if output.status.success() && ffprobe => {
            String::from_utf8_lossy(&output.stdout).contains("libmp3lame")
        }
        _ => false,
    }
}

/// Requires ffmpeg with libmp3lame; skips gracefully if unavailable.
#[test]
fn cli_renders_real_audio_with_installed_ffmpeg() -> Result<(), Box<dyn Error>> {
    if !real_engine_available() {
        eprintln!("Skipping end-to-end render: ffmpeg with libmp3lame not available");
        return Ok(());
    }

    let work_dir = tempdir()?;
    let input = work_dir.path().join("rain.wav");
    write_test_tone(&input, 44_100, 20_000)?;

    let mut cmd = Command::cargo_bin("rainrender")?;
    cmd.env("RAINRENDER_FFMPEG", "ffmpeg")
        .env("RAINRENDER_FFPROBE", "ffprobe")
        .arg("--rumble")
        .arg(&input)
        .assert()
        .success();

    let output_dir = work_dir.path().join("rain_renders");
    let names = file_names(&output_dir)?;
    assert_eq!(names.len(), 8);
    for name in names {
        let size = fs::metadata(output_dir.join(&name))?.len();
        assert!(size > 0, "{name} is empty");
    }

    work_dir.close()?;
    Ok(())
}
