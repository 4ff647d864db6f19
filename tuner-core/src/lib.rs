// tuner-core/src/lib.rs

//! The core logic for the guitar tuner.
//! This crate is responsible for audio acquisition, spectral analysis,
//! target matching and pacing of the detection loop. It is completely
//! headless and contains no console or GUI code.

pub mod audio;
pub mod cadence;
pub mod config;
pub mod error;
pub mod fft;
pub mod frame;
pub mod pipeline;
pub mod tuning;

use std::fmt;

use serde::Serialize;

pub use config::{ChannelLayout, SampleRateConfig, TunerConfig};
pub use error::{AnalysisError, ConfigError, CycleOverrun, FrameError, PipelineError, StreamError};
pub use pipeline::{Pipeline, PipelineState, ReportSink, RunSummary};
pub use tuning::{TargetPitchTable, match_pitch};

/// Represents the result of a single detection cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    /// The dominant frequency of the frame in Hz.
    pub measured_hz: f32,
    /// Label of the closest target pitch.
    pub label: String,
    /// Frequency of the closest target pitch in Hz.
    pub target_hz: f32,
}

impl DetectionResult {
    /// Deviation of the measurement from its target in cents.
    ///
    /// `None` when nothing was measured (silence reports 0 Hz).
    pub fn cents_off(&self) -> Option<f32> {
        if self.measured_hz.is_finite() && self.measured_hz > 0.0 && self.target_hz > 0.0 {
            Some(tuning::calculate_cents_deviation(
                self.measured_hz,
                self.target_hz,
            ))
        } else {
            None
        }
    }
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Current freq: {:.1} Hz which is closest to note: {} which is {} Hz",
            self.measured_hz, self.label, self.target_hz
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_the_report_line() {
        let result = DetectionResult {
            measured_hz: 90.0,
            label: "E2".to_string(),
            target_hz: 82.0,
        };
        assert_eq!(
            result.to_string(),
            "Current freq: 90.0 Hz which is closest to note: E2 which is 82 Hz"
        );
    }

    #[test]
    fn silence_has_no_cents() {
        let result = DetectionResult {
            measured_hz: 0.0,
            label: "E2".to_string(),
            target_hz: 82.0,
        };
        assert_eq!(result.cents_off(), None);

        let in_tune = DetectionResult {
            measured_hz: 110.0,
            label: "A2".to_string(),
            target_hz: 110.0,
        };
        assert_eq!(in_tune.cents_off(), Some(0.0));
    }
}
