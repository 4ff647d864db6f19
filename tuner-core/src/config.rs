//! # Configuration Module
//!
//! Immutable process-wide settings for the tuner pipeline. A [`TunerConfig`]
//! is built once at startup and handed by reference to every component.
//!
//! ## Defaults
//! - Sample Rate: 48 kHz
//! - Duty divisor: 10 (4800-sample chunks, one report every 100 ms)
//! - Channels: 2 interleaved, channel index 1 analyzed

use std::time::Duration;

use crate::error::ConfigError;

/// Default sample rate of the input device in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Default number of chunks per second.
///
/// Smaller chunks make the tuner more responsive to note changes but
/// coarsen the frequency resolution (`sample_rate / chunk_size` Hz per bin).
pub const DEFAULT_DUTY_DIVISOR: u32 = 10;

/// Default interleaved channel count requested from the device.
pub const DEFAULT_CHANNELS: u16 = 2;

/// Default channel kept from the interleaved buffer.
pub const DEFAULT_SELECTED_CHANNEL: u16 = 1;

/// Sample rate and frame size, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRateConfig {
    sample_rate: u32,
    duty_divisor: u32,
    chunk_size: usize,
}

impl SampleRateConfig {
    /// Builds a config with `chunk_size = sample_rate / duty_divisor`.
    pub fn new(sample_rate: u32, duty_divisor: u32) -> Result<Self, ConfigError> {
        if duty_divisor == 0 {
            return Err(ConfigError::ZeroDivisor);
        }
        let chunk_size = (sample_rate / duty_divisor) as usize;
        if chunk_size == 0 {
            return Err(ConfigError::EmptyChunk {
                sample_rate,
                duty_divisor,
            });
        }
        Ok(Self {
            sample_rate,
            duty_divisor,
            chunk_size,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duty_divisor(&self) -> u32 {
        self.duty_divisor
    }

    /// Number of samples per frame.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Real-time duration of one frame of audio.
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.chunk_size as f64 / self.sample_rate as f64)
    }

    /// Width of one spectral bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.chunk_size as f32
    }
}

impl Default for SampleRateConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            duty_divisor: DEFAULT_DUTY_DIVISOR,
            chunk_size: (DEFAULT_SAMPLE_RATE / DEFAULT_DUTY_DIVISOR) as usize,
        }
    }
}

/// Interleaved channel layout of the input stream and the channel analyzed.
///
/// Many interfaces deliver stereo even for a mono instrument input, so the
/// stream is opened with several channels and only one is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    channels: u16,
    selected: u16,
}

impl ChannelLayout {
    pub fn new(channels: u16, selected: u16) -> Result<Self, ConfigError> {
        if selected >= channels {
            return Err(ConfigError::ChannelOutOfRange { selected, channels });
        }
        Ok(Self { channels, selected })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn selected(&self) -> u16 {
        self.selected
    }

    /// Bytes occupied by one interleaved sample-frame of 16-bit samples.
    pub fn stride_bytes(&self) -> usize {
        self.channels as usize * 2
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            selected: DEFAULT_SELECTED_CHANNEL,
        }
    }
}

/// Everything the pipeline needs to know about its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunerConfig {
    pub rate: SampleRateConfig,
    pub layout: ChannelLayout,
    /// Upper bound on a single blocking read. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
}

impl TunerConfig {
    pub fn new(rate: SampleRateConfig, layout: ChannelLayout) -> Self {
        Self {
            rate,
            layout,
            read_timeout: None,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
}
