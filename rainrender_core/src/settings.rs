use std::fmt;

use thiserror::Error;

use crate::probe::FALLBACK_DURATION_SECS;

/// Errors raised by [`RenderSettings::validate`].
///
/// Per-filter ranges (cut-offs, gains, noise floors) are checked by the
/// filter constructors; this covers the values that never reach a filter
/// directly or that relate two settings to each other.
#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("phone high-pass ({highpass} Hz) must sit below the phone low-pass ({lowpass} Hz)")]
    InvertedPhoneBand { highpass: f64, lowpass: f64 },

    #[error("fallback duration must be greater than zero seconds")]
    ZeroFallbackDuration,
}

/// MP3 bitrate in kilobits per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bitrate(u32);

impl Bitrate {
    pub const fn kbps(kbps: u32) -> Self {
        Self(kbps)
    }

    pub fn as_kbps(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.0)
    }
}

/// Tuning for every stage of the render.
///
/// [`Default`] holds the stock values. Ranges in the field docs are what
/// [`validate`](Self::validate) and the filter constructors enforce.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    /// Output sample rate of every stage, 8000..=192000 Hz.
    pub sample_rate: u32,

    /// Clean stage low-pass cut-off; above 0 and below Nyquist.
    pub lowpass_hz: f64,
    /// Clean stage denoiser noise floor, -80..=-20 dB.
    pub denoise_floor_db: f64,
    /// Bitrate of `rain_clean.mp3`, 32..=320 kbps.
    pub clean_bitrate: Bitrate,

    /// Weight of the pink-noise bed against the clean track (weight 1), 0..=1.
    pub pink_noise_weight: f64,
    /// Amplitude of the generated pink noise, 0..=1.
    pub pink_noise_amplitude: f64,

    /// Append an echo to the layered mix.
    pub echo_enabled: bool,
    /// Echo input gain, above 0 and at most 1.
    pub echo_in_gain: f64,
    /// Echo output gain, above 0 and at most 1.
    pub echo_out_gain: f64,
    /// Echo delay, above 0 and at most 90000 ms.
    pub echo_delay_ms: f64,
    /// Echo decay, above 0 and at most 1.
    pub echo_decay: f64,

    /// Length of the tail/head cross-fade, above 0 and at most 60 s.
    pub crossfade_secs: f64,
    /// Bitrate of the mixed, looped, final, room and storm files, 32..=320 kbps.
    pub final_bitrate: Bitrate,

    /// Integrated loudness target, -70..=-5 LUFS.
    pub loudness_target_lufs: f64,
    /// Maximum true peak, -9..=0 dBTP.
    pub true_peak_db: f64,
    /// Loudness range target, 1..=50 LU.
    pub loudness_range: f64,

    /// Phone export high-pass; must sit below `phone_lowpass_hz`.
    pub phone_highpass_hz: f64,
    /// Phone export low-pass; below Nyquist.
    pub phone_lowpass_hz: f64,
    /// Bitrate of `rain_phone.mp3`, 32..=320 kbps.
    pub phone_bitrate: Bitrate,

    /// Room export bass shelf gain, -900..=900 dB.
    pub bass_gain_db: f64,
    /// Room export bass shelf centre frequency.
    pub bass_freq_hz: f64,
    /// Room export bass shelf width (Q).
    pub bass_width: f64,
    /// Room export low-pass cut-off.
    pub room_lowpass_hz: f64,

    /// Render `lowrumble.wav` and `rain_distantstorm.mp3`.
    pub rumble_enabled: bool,
    /// Rumble tone frequency, 1..=200 Hz.
    pub rumble_freq_hz: f64,
    /// Linear attenuation applied to the rumble tone, above 0 and at most 1.
    pub rumble_level: f64,
    /// Weight of the rumble tone against the room track (weight 1), 0..=1.
    pub rumble_weight: f64,

    /// Length used for generated beds when the input cannot be probed.
    pub fallback_duration_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            lowpass_hz: 8_000.0,
            denoise_floor_db: -25.0,
            clean_bitrate: Bitrate::kbps(192),
            pink_noise_weight: 0.12,
            pink_noise_amplitude: 1.0,
            echo_enabled: true,
            echo_in_gain: 0.8,
            echo_out_gain: 0.5,
            echo_delay_ms: 60.0,
            echo_decay: 0.3,
            crossfade_secs: 6.0,
            final_bitrate: Bitrate::kbps(192),
            loudness_target_lufs: -16.0,
            true_peak_db: -1.5,
            loudness_range: 11.0,
            phone_highpass_hz: 150.0,
            phone_lowpass_hz: 7_000.0,
            phone_bitrate: Bitrate::kbps(96),
            bass_gain_db: 6.0,
            bass_freq_hz: 90.0,
            bass_width: 0.6,
            room_lowpass_hz: 12_000.0,
            rumble_enabled: false,
            rumble_freq_hz: 40.0,
            rumble_level: 0.08,
            rumble_weight: 0.35,
            fallback_duration_secs: FALLBACK_DURATION_SECS,
        }
    }
}

impl RenderSettings {
    /// Check the settings that are not covered by a filter constructor.
    pub fn validate(&self) -> Result<(), SettingsError> {
        range("sample_rate", f64::from(self.sample_rate), 8_000.0, 192_000.0)?;
        for (name, bitrate) in [
            ("clean_bitrate", self.clean_bitrate),
            ("final_bitrate", self.final_bitrate),
            ("phone_bitrate", self.phone_bitrate),
        ] {
            range(name, f64::from(bitrate.as_kbps()), 32.0, 320.0)?;
        }
        range("pink_noise_weight", self.pink_noise_weight, 0.0, 1.0)?;
        range("rumble_weight", self.rumble_weight, 0.0, 1.0)?;
        range("rumble_freq_hz", self.rumble_freq_hz, 1.0, 200.0)?;

        if self.phone_highpass_hz >= self.phone_lowpass_hz {
            return Err(SettingsError::InvertedPhoneBand {
                highpass: self.phone_highpass_hz,
                lowpass: self.phone_lowpass_hz,
            });
        }

        if self.fallback_duration_secs == 0 {
            return Err(SettingsError::ZeroFallbackDuration);
        }

        Ok(())
    }
}

fn range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), SettingsError> {
    // NaN fails both comparisons, so test for the accepted interval instead.
    if !(min..=max).contains(&value) {
        return Err(SettingsError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}
