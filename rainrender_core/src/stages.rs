//! Builders for each stage of the render.
//!
//! A stage builder is a pure function of its input paths and the settings;
//! it returns the [`Invocation`] that produces the stage's output. Nothing
//! here touches the file system or the engine.

use std::fmt;
use std::path::Path;

use crate::engine::{Codec, Invocation};
use crate::filter::{Filter, FilterChain, FilterError, MixDuration, NoiseColor};
use crate::settings::{Bitrate, RenderSettings};

/// The stages of a render, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Clean,
    Layer,
    Loop,
    Normalize,
    Phone,
    Room,
    RumbleTone,
    Storm,
}

impl Stage {
    /// One-line description used by progress reporting.
    pub fn describe(self) -> &'static str {
        match self {
            Stage::Clean => "Cleaning (resample, low-pass, denoise)",
            Stage::Layer => "Layering pink noise under the clean track",
            Stage::Loop => "Splicing a seamless loop",
            Stage::Normalize => "Normalizing loudness",
            Stage::Phone => "Exporting phone version",
            Stage::Room => "Exporting room version",
            Stage::RumbleTone => "Generating low rumble tone",
            Stage::Storm => "Mixing distant storm undertone",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Clean => "clean",
            Stage::Layer => "layer",
            Stage::Loop => "loop",
            Stage::Normalize => "normalize",
            Stage::Phone => "phone",
            Stage::Room => "room",
            Stage::RumbleTone => "rumble tone",
            Stage::Storm => "storm",
        })
    }
}

fn mp3(output: &Path, settings: &RenderSettings, bitrate: Bitrate) -> Invocation {
    Invocation::new(output, settings.sample_rate, Codec::Mp3(bitrate))
}

/// Stage 1: resample, low-pass and denoise the raw recording.
pub fn clean(
    input: &Path,
    output: &Path,
    settings: &RenderSettings,
) -> Result<Invocation, FilterError> {
    let chain = FilterChain::new()
        .then(Filter::aresample(settings.sample_rate)?)
        .then(Filter::lowpass(settings.lowpass_hz, settings.sample_rate)?)
        .then(Filter::afftdn(settings.denoise_floor_db)?);

    Ok(mp3(output, settings, settings.clean_bitrate)
        .input(input)
        .filters(chain))
}

/// Stage 2: mix a pink-noise bed of `duration_secs` under the clean track.
///
/// The mix lasts as long as the clean track, so a fallback duration longer
/// than the recording never extends it.
pub fn layer(
    clean: &Path,
    output: &Path,
    settings: &RenderSettings,
    duration_secs: u64,
) -> Result<Invocation, FilterError> {
    let noise = Filter::anoisesrc(
        NoiseColor::Pink,
        settings.pink_noise_amplitude,
        duration_secs,
        settings.sample_rate,
    )?;

    let mut chain = FilterChain::from_inputs(2).then(Filter::amix(
        &[1.0, settings.pink_noise_weight],
        MixDuration::First,
    )?);
    if settings.echo_enabled {
        chain.push(Filter::aecho(
            settings.echo_in_gain,
            settings.echo_out_gain,
            settings.echo_delay_ms,
            settings.echo_decay,
        )?);
    }

    Ok(mp3(output, settings, settings.final_bitrate)
        .input(clean)
        .generator(noise)
        .filters(chain))
}

/// Stage 3: cross-fade the track's tail into its head.
///
/// The first copy of the mixed track is cut to its body (everything after
/// the first `crossfade_secs`), the second to its head (the first
/// `crossfade_secs`). Fading the body's tail into the head makes the output
/// end where it starts, so it repeats without a seam. The loop is
/// `crossfade_secs` shorter than the mix and needs a mix at least twice that
/// long.
pub fn splice_loop(
    mixed: &Path,
    output: &Path,
    settings: &RenderSettings,
) -> Result<Invocation, FilterError> {
    let fade = settings.crossfade_secs;
    let crossfade = Filter::acrossfade(fade)?;
    let body = FilterChain::from_input(0)
        .then(Filter::atrim(Some(fade), None)?)
        .then(Filter::reset_timestamps());
    let head = FilterChain::from_input(1)
        .then(Filter::atrim(None, Some(fade))?)
        .then(Filter::reset_timestamps());
    let chain = FilterChain::joining(vec![("body", body), ("head", head)])
        .then(crossfade);

    Ok(mp3(output, settings, settings.final_bitrate)
        .input(mixed)
        .input(mixed)
        .filters(chain))
}

/// Stage 4: loudness-normalize the loop.
pub fn normalize(
    looped: &Path,
    output: &Path,
    settings: &RenderSettings,
) -> Result<Invocation, FilterError> {
    let chain = FilterChain::new().then(Filter::loudnorm(
        settings.loudness_target_lufs,
        settings.true_peak_db,
        settings.loudness_range,
    )?);

    Ok(mp3(output, settings, settings.final_bitrate)
        .input(looped)
        .filters(chain))
}

/// Stage 5: narrow the band for phone speakers and drop the bitrate.
pub fn phone(
    final_mix: &Path,
    output: &Path,
    settings: &RenderSettings,
) -> Result<Invocation, FilterError> {
    let chain = FilterChain::new()
        .then(Filter::highpass(
            settings.phone_highpass_hz,
            settings.sample_rate,
        )?)
        .then(Filter::lowpass(settings.phone_lowpass_hz, settings.sample_rate)?);

    Ok(mp3(output, settings, settings.phone_bitrate)
        .input(final_mix)
        .filters(chain))
}

/// Stage 6: warm bass shelf and gentle top roll-off for room speakers.
pub fn room(
    final_mix: &Path,
    output: &Path,
    settings: &RenderSettings,
) -> Result<Invocation, FilterError> {
    let chain = FilterChain::new()
        .then(Filter::bass(
            settings.bass_gain_db,
            settings.bass_freq_hz,
            settings.bass_width,
            settings.sample_rate,
        )?)
        .then(Filter::lowpass(settings.room_lowpass_hz, settings.sample_rate)?);

    Ok(mp3(output, settings, settings.final_bitrate)
        .input(final_mix)
        .filters(chain))
}

/// Stage 7a: an attenuated low sine tone of `duration_secs`, written as WAV.
pub fn rumble_tone(
    output: &Path,
    settings: &RenderSettings,
    duration_secs: u64,
) -> Result<Invocation, FilterError> {
    let tone = Filter::sine(settings.rumble_freq_hz, duration_secs, settings.sample_rate)?;
    let chain = FilterChain::new().then(Filter::volume(settings.rumble_level)?);

    Ok(Invocation::new(output, settings.sample_rate, Codec::PcmS16)
        .generator(tone)
        .filters(chain))
}

/// Stage 7b: mix the rumble tone under the room export.
pub fn storm(
    room: &Path,
    tone: &Path,
    output: &Path,
    settings: &RenderSettings,
) -> Result<Invocation, FilterError> {
    let chain = FilterChain::from_inputs(2).then(Filter::amix(
        &[1.0, settings.rumble_weight],
        MixDuration::First,
    )?);

    Ok(mp3(output, settings, settings.final_bitrate)
        .input(room)
        .input(tone)
        .filters(chain))
}
