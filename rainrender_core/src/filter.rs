//! Typed construction of ffmpeg filter expressions.
//!
//! Every [`Filter`] is produced by a constructor that validates its
//! parameters, so a malformed value is reported before the engine is ever
//! launched. Filters are rendered to ffmpeg's `name=key=value:key=value`
//! syntax through [`fmt::Display`].

use std::fmt;

use thiserror::Error;

/// Errors raised when a filter parameter is outside the range the engine accepts.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    /// The parameter was NaN or infinite.
    #[error("{filter}: {param} must be a finite number")]
    NotFinite {
        filter: &'static str,
        param: &'static str,
    },

    /// The parameter fell outside an inclusive range.
    #[error("{filter}: {param} must be within {min}..={max}, got {value}")]
    OutOfRange {
        filter: &'static str,
        param: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The parameter must be strictly greater than `min` and at most `max`.
    #[error("{filter}: {param} must be greater than {min} and at most {max}, got {value}")]
    NotAbove {
        filter: &'static str,
        param: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A mix was requested with fewer than two inputs or with no audible input.
    #[error("amix: needs at least two weights with at least one above zero, got {count}")]
    InvalidMix { count: usize },

    /// A trim was requested without a start or an end.
    #[error("atrim: needs a start, an end, or both")]
    EmptyTrim,
}

/// Colour of a generated noise bed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

impl fmt::Display for NoiseColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NoiseColor::White => "white",
            NoiseColor::Pink => "pink",
            NoiseColor::Brown => "brown",
        })
    }
}

/// How long a mix lasts relative to its inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MixDuration {
    Longest,
    Shortest,
    /// Trim the mix to the first input, so generated beds never extend the track.
    First,
}

impl fmt::Display for MixDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MixDuration::Longest => "longest",
            MixDuration::Shortest => "shortest",
            MixDuration::First => "first",
        })
    }
}

/// A single validated filter.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    name: &'static str,
    options: Vec<(&'static str, String)>,
}

impl Filter {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            options: Vec::new(),
        }
    }

    fn option(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.options.push((key, value.to_string()));
        self
    }

    /// Name of the underlying ffmpeg filter.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Value of a rendered option, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Resample to `sample_rate` Hz.
    pub fn aresample(sample_rate: u32) -> Result<Self, FilterError> {
        within("aresample", "osr", f64::from(sample_rate), 8_000.0, 192_000.0)?;
        Ok(Self::new("aresample").option("osr", sample_rate))
    }

    /// Second-order low-pass at `frequency` Hz, which must sit below Nyquist.
    pub fn lowpass(frequency: f64, sample_rate: u32) -> Result<Self, FilterError> {
        let frequency = above("lowpass", "f", frequency, 0.0, nyquist(sample_rate))?;
        Ok(Self::new("lowpass").option("f", frequency))
    }

    /// Second-order high-pass at `frequency` Hz, which must sit below Nyquist.
    pub fn highpass(frequency: f64, sample_rate: u32) -> Result<Self, FilterError> {
        let frequency = above("highpass", "f", frequency, 0.0, nyquist(sample_rate))?;
        Ok(Self::new("highpass").option("f", frequency))
    }

    /// FFT denoiser with the given noise floor in dB.
    pub fn afftdn(noise_floor_db: f64) -> Result<Self, FilterError> {
        let noise_floor_db = within("afftdn", "nf", noise_floor_db, -80.0, -20.0)?;
        Ok(Self::new("afftdn").option("nf", noise_floor_db))
    }

    /// Single-tap echo.
    pub fn aecho(
        in_gain: f64,
        out_gain: f64,
        delay_ms: f64,
        decay: f64,
    ) -> Result<Self, FilterError> {
        let in_gain = above("aecho", "in_gain", in_gain, 0.0, 1.0)?;
        let out_gain = above("aecho", "out_gain", out_gain, 0.0, 1.0)?;
        let delay_ms = above("aecho", "delays", delay_ms, 0.0, 90_000.0)?;
        let decay = above("aecho", "decays", decay, 0.0, 1.0)?;
        Ok(Self::new("aecho")
            .option("in_gain", in_gain)
            .option("out_gain", out_gain)
            .option("delays", delay_ms)
            .option("decays", decay))
    }

    /// Noise generator source lasting `duration_secs`.
    pub fn anoisesrc(
        color: NoiseColor,
        amplitude: f64,
        duration_secs: u64,
        sample_rate: u32,
    ) -> Result<Self, FilterError> {
        let amplitude = within("anoisesrc", "amplitude", amplitude, 0.0, 1.0)?;
        positive_secs("anoisesrc", duration_secs)?;
        Ok(Self::new("anoisesrc")
            .option("color", color)
            .option("amplitude", amplitude)
            .option("sample_rate", sample_rate)
            .option("duration", duration_secs))
    }

    /// Sine tone source lasting `duration_secs`.
    pub fn sine(frequency: f64, duration_secs: u64, sample_rate: u32) -> Result<Self, FilterError> {
        let frequency = above("sine", "frequency", frequency, 0.0, nyquist(sample_rate))?;
        positive_secs("sine", duration_secs)?;
        Ok(Self::new("sine")
            .option("frequency", frequency)
            .option("sample_rate", sample_rate)
            .option("duration", duration_secs))
    }

    /// Weighted mix of as many inputs as there are weights.
    pub fn amix(weights: &[f64], duration: MixDuration) -> Result<Self, FilterError> {
        if weights.len() < 2 {
            return Err(FilterError::InvalidMix {
                count: weights.len(),
            });
        }
        for weight in weights {
            within("amix", "weights", *weight, 0.0, 1.0)?;
        }
        if weights.iter().all(|weight| *weight == 0.0) {
            return Err(FilterError::InvalidMix {
                count: weights.len(),
            });
        }

        let rendered = weights
            .iter()
            .map(|weight| weight.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Self::new("amix")
            .option("inputs", weights.len())
            .option("duration", duration)
            .option("weights", format!("'{rendered}'")))
    }

    /// Cross-fade between two inputs using triangular curves on both sides.
    pub fn acrossfade(duration_secs: f64) -> Result<Self, FilterError> {
        let duration_secs = above("acrossfade", "d", duration_secs, 0.0, 60.0)?;
        Ok(Self::new("acrossfade")
            .option("d", duration_secs)
            .option("c1", "tri")
            .option("c2", "tri"))
    }

    /// Keep only the part of the stream between `start_secs` and `end_secs`.
    ///
    /// Either bound may be left open, but not both. Timestamps are kept, so a
    /// trimmed stream is normally followed by [`Filter::reset_timestamps`].
    pub fn atrim(start_secs: Option<f64>, end_secs: Option<f64>) -> Result<Self, FilterError> {
        let mut filter = Self::new("atrim");
        let lower = match start_secs {
            Some(start) => {
                let start = within("atrim", "start", start, 0.0, MAX_SECS)?;
                filter = filter.option("start", start);
                start
            }
            None => 0.0,
        };
        match end_secs {
            Some(end) => {
                let end = above("atrim", "end", end, lower, MAX_SECS)?;
                filter = filter.option("end", end);
            }
            None if start_secs.is_none() => return Err(FilterError::EmptyTrim),
            None => {}
        }
        Ok(filter)
    }

    /// Restart the stream's timestamps at zero.
    pub fn reset_timestamps() -> Self {
        Self::new("asetpts").option("expr", "PTS-STARTPTS")
    }

    /// EBU R128 loudness normalization.
    pub fn loudnorm(
        integrated_lufs: f64,
        true_peak_db: f64,
        loudness_range: f64,
    ) -> Result<Self, FilterError> {
        let integrated_lufs = within("loudnorm", "I", integrated_lufs, -70.0, -5.0)?;
        let true_peak_db = within("loudnorm", "TP", true_peak_db, -9.0, 0.0)?;
        let loudness_range = within("loudnorm", "LRA", loudness_range, 1.0, 50.0)?;
        Ok(Self::new("loudnorm")
            .option("I", integrated_lufs)
            .option("TP", true_peak_db)
            .option("LRA", loudness_range))
    }

    /// Low-shelf bass boost (or cut for negative gain).
    pub fn bass(
        gain_db: f64,
        frequency: f64,
        width: f64,
        sample_rate: u32,
    ) -> Result<Self, FilterError> {
        let gain_db = within("bass", "g", gain_db, -900.0, 900.0)?;
        let frequency = above("bass", "f", frequency, 0.0, nyquist(sample_rate))?;
        let width = above("bass", "w", width, 0.0, 99_999.0)?;
        Ok(Self::new("bass")
            .option("g", gain_db)
            .option("f", frequency)
            .option("w", width))
    }

    /// Attenuate by a linear factor.
    pub fn volume(factor: f64) -> Result<Self, FilterError> {
        let factor = above("volume", "volume", factor, 0.0, 1.0)?;
        Ok(Self::new("volume").option("volume", factor))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for (index, (key, value)) in self.options.iter().enumerate() {
            let separator = if index == 0 { '=' } else { ':' };
            write!(f, "{separator}{key}={value}")?;
        }
        Ok(())
    }
}

/// A linear chain of filters, optionally fed from labelled input pads.
///
/// Without pads the chain renders as a simple `-af` expression; with pads it
/// becomes a `-filter_complex` graph such as `[0:a][1:a]amix=...`. A chain
/// built with [`FilterChain::joining`] renders its feeding chains first,
/// each ending in its label: `[0:a]atrim=..[body];[1:a]..[head];[body][head]..`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterChain {
    feeds: Vec<(&'static str, FilterChain)>,
    pads: Vec<String>,
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain consuming the audio stream of the first `count` inputs.
    pub fn from_inputs(count: usize) -> Self {
        Self {
            pads: (0..count).map(|index| format!("{index}:a")).collect(),
            ..Self::default()
        }
    }

    /// Chain consuming the audio stream of input `index` only.
    pub fn from_input(index: usize) -> Self {
        Self {
            pads: vec![format!("{index}:a")],
            ..Self::default()
        }
    }

    /// Chain fed by the output of other chains, in order, under their labels.
    pub fn joining(feeds: Vec<(&'static str, FilterChain)>) -> Self {
        Self {
            pads: feeds.iter().map(|(label, _)| (*label).to_owned()).collect(),
            feeds,
            filters: Vec::new(),
        }
    }

    pub fn then(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// Filters of the final link; feeding chains are reached through [`FilterChain::feeds`].
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn feeds(&self) -> &[(&'static str, FilterChain)] {
        &self.feeds
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether the chain must be passed as `-filter_complex`.
    pub fn is_complex(&self) -> bool {
        !self.pads.is_empty()
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, feed) in &self.feeds {
            write!(f, "{feed}[{label}];")?;
        }
        for pad in &self.pads {
            write!(f, "[{pad}]")?;
        }
        for (index, filter) in self.filters.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        Ok(())
    }
}

/// Upper bound for any time offset, roughly 136 years.
const MAX_SECS: f64 = u32::MAX as f64;

fn nyquist(sample_rate: u32) -> f64 {
    f64::from(sample_rate) / 2.0
}

fn finite(filter: &'static str, param: &'static str, value: f64) -> Result<f64, FilterError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FilterError::NotFinite { filter, param })
    }
}

fn within(
    filter: &'static str,
    param: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, FilterError> {
    let value = finite(filter, param, value)?;
    if value < min || value > max {
        return Err(FilterError::OutOfRange {
            filter,
            param,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn above(
    filter: &'static str,
    param: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, FilterError> {
    let value = finite(filter, param, value)?;
    if value <= min || value > max {
        return Err(FilterError::NotAbove {
            filter,
            param,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn positive_secs(filter: &'static str, duration_secs: u64) -> Result<(), FilterError> {
    if duration_secs == 0 {
        return Err(FilterError::NotAbove {
            filter,
            param: "duration",
            value: 0.0,
            min: 0.0,
            max: MAX_SECS,
        });
    }
    Ok(())
}
