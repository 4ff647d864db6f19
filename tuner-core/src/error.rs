//! # Error Types
//!
//! Failures the pipeline can encounter, grouped by the component that raises
//! them. Frame failures are fatal to the loop; overruns are warnings.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Invalid startup configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("duty divisor must be non-zero")]
    ZeroDivisor,

    #[error("sample rate {sample_rate} Hz divided by {duty_divisor} leaves an empty chunk")]
    EmptyChunk { sample_rate: u32, duty_divisor: u32 },

    #[error("channel {selected} does not exist in a {channels}-channel layout")]
    ChannelOutOfRange { selected: u16, channels: u16 },

    #[error("a pitch table needs at least one target")]
    EmptyPitchTable,

    #[error("target '{label}' has a non-finite frequency")]
    NonFiniteTarget { label: String },
}

/// Errors raised by an [`AudioStream`](crate::audio::AudioStream) read.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    #[error("no audio arrived within {0:?}")]
    Timeout(Duration),

    #[error("audio device error: {0}")]
    Device(String),
}

/// Fatal failures of the frame source. None of these are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("stream underrun: expected {expected} bytes, got {got}")]
    StreamUnderrun { expected: usize, got: usize },

    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    #[error("stream read timed out after {0:?}")]
    StreamTimeout(Duration),

    #[error("audio device error: {0}")]
    Device(String),
}

impl From<StreamError> for FrameError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Timeout(after) => FrameError::StreamTimeout(after),
            StreamError::Device(msg) => FrameError::Device(msg),
        }
    }
}

/// The FFT rejected the buffers it was handed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("spectral analysis failed: {0}")]
pub struct AnalysisError(pub String);

/// A cycle that took longer than one frame of real time.
///
/// Reported every time it happens. A growing `consecutive` count means the
/// pipeline is falling behind the live stream.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "cycle overrun: took {elapsed:?} for a {period:?} period ({consecutive} in a row)"
)]
pub struct CycleOverrun {
    pub elapsed: Duration,
    pub period: Duration,
    pub consecutive: u32,
}

impl CycleOverrun {
    /// How far past the period the cycle ran.
    pub fn excess(&self) -> Duration {
        self.elapsed.saturating_sub(self.period)
    }
}

/// Reasons the pipeline driver stops with an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("report sink failed: {0}")]
    Sink(#[from] io::Error),
}
