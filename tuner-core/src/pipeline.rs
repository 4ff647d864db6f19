//! # Pipeline Module
//!
//! The detection loop: acquire a frame, find its dominant frequency, match
//! it to a target pitch, report, then wait out the rest of the period.
//!
//! The loop is an explicit state machine. The stop signal is only checked
//! when leaving `Idle`, so a cycle that has started always finishes (or
//! fails) before the loop stops. The input stream is closed exactly once on
//! every exit path.

use std::io;
use std::time::Instant;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::DetectionResult;
use crate::audio::AudioStream;
use crate::cadence::{CadenceController, Clock, CycleTiming, SystemClock};
use crate::config::TunerConfig;
use crate::error::{CycleOverrun, PipelineError};
use crate::fft::SpectralAnalyzer;
use crate::frame::{AudioFrame, FrameSource};
use crate::tuning::{TargetPitchTable, match_pitch};

/// Receives the output of the pipeline.
pub trait ReportSink {
    /// Called once per completed cycle.
    fn report(&mut self, result: &DetectionResult) -> io::Result<()>;

    /// Called each time a cycle overruns its period.
    fn overrun(&mut self, _overrun: &CycleOverrun) -> io::Result<()> {
        Ok(())
    }
}

impl<K: ReportSink + ?Sized> ReportSink for &mut K {
    fn report(&mut self, result: &DetectionResult) -> io::Result<()> {
        (**self).report(result)
    }

    fn overrun(&mut self, overrun: &CycleOverrun) -> io::Result<()> {
        (**self).overrun(overrun)
    }
}

/// Observable state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Acquiring,
    Analyzing,
    Matching,
    Delaying,
    Stopped,
}

/// State plus the data carried between transitions of one cycle.
enum Cycle {
    Idle,
    Acquiring { started: Instant },
    Analyzing { started: Instant, frame: AudioFrame },
    Matching { started: Instant, measured_hz: f32 },
    Delaying { timing: CycleTiming },
    Stopped,
}

impl Cycle {
    fn state(&self) -> PipelineState {
        match self {
            Cycle::Idle => PipelineState::Idle,
            Cycle::Acquiring { .. } => PipelineState::Acquiring,
            Cycle::Analyzing { .. } => PipelineState::Analyzing,
            Cycle::Matching { .. } => PipelineState::Matching,
            Cycle::Delaying { .. } => PipelineState::Delaying,
            Cycle::Stopped => PipelineState::Stopped,
        }
    }
}

/// Counters of a pipeline run that ended on the stop signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub overruns: u64,
}

/// Drives frame acquisition, analysis, matching and reporting at a fixed
/// cadence.
pub struct Pipeline<'t, S: AudioStream, K: ReportSink, C: Clock = SystemClock> {
    source: FrameSource<S>,
    analyzer: SpectralAnalyzer,
    table: &'t TargetPitchTable,
    cadence: CadenceController<C>,
    sink: K,
    stop: Receiver<()>,
    cycle: Cycle,
    summary: RunSummary,
}

impl<'t, S: AudioStream, K: ReportSink> Pipeline<'t, S, K, SystemClock> {
    /// Builds a pipeline paced by the wall clock.
    pub fn new(
        stream: S,
        config: &TunerConfig,
        table: &'t TargetPitchTable,
        sink: K,
        stop: Receiver<()>,
    ) -> Self {
        Self::with_clock(stream, config, table, sink, stop, SystemClock)
    }
}

impl<'t, S: AudioStream, K: ReportSink, C: Clock> Pipeline<'t, S, K, C> {
    pub fn with_clock(
        stream: S,
        config: &TunerConfig,
        table: &'t TargetPitchTable,
        sink: K,
        stop: Receiver<()>,
        clock: C,
    ) -> Self {
        Self {
            source: FrameSource::new(stream, &config.rate, config.layout),
            analyzer: SpectralAnalyzer::new(&config.rate),
            table,
            cadence: CadenceController::new(config.rate.period(), clock),
            sink,
            stop,
            cycle: Cycle::Idle,
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.cycle.state()
    }

    /// Runs until the stop signal arrives or a cycle fails.
    ///
    /// # Returns
    /// * `Ok(summary)` - Stopped on request
    /// * `Err(e)` - A frame could not be acquired or the sink failed
    pub fn run(mut self) -> Result<RunSummary, PipelineError> {
        log::info!(
            "Pipeline starting: {} samples per frame, period {:?}",
            self.source.chunk_size(),
            self.cadence.period()
        );
        self.cadence.warm_up();

        let outcome = loop {
            match self.step() {
                Ok(PipelineState::Stopped) => break Ok(self.summary),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };

        self.cycle = Cycle::Stopped;
        self.source.close();

        match &outcome {
            Ok(summary) => log::info!(
                "Pipeline stopped after {} cycles ({} overruns)",
                summary.cycles,
                summary.overruns
            ),
            Err(e) => log::error!("Pipeline aborted: {}", e),
        }
        outcome
    }

    /// Performs one state transition and returns the new state.
    pub fn step(&mut self) -> Result<PipelineState, PipelineError> {
        let next = match std::mem::replace(&mut self.cycle, Cycle::Stopped) {
            Cycle::Idle => {
                if self.stop_requested() {
                    Cycle::Stopped
                } else {
                    Cycle::Acquiring {
                        started: self.cadence.begin(),
                    }
                }
            }
            Cycle::Acquiring { started } => {
                let frame = self.source.next_frame()?;
                Cycle::Analyzing { started, frame }
            }
            Cycle::Analyzing { started, frame } => {
                let measured_hz = self.analyzer.dominant_frequency(&frame)?;
                log::trace!("Dominant frequency {} Hz", measured_hz);
                Cycle::Matching {
                    started,
                    measured_hz,
                }
            }
            Cycle::Matching {
                started,
                measured_hz,
            } => {
                let (label, target_hz) = match_pitch(measured_hz, self.table);
                let result = DetectionResult {
                    measured_hz,
                    label: label.to_string(),
                    target_hz,
                };
                let timing = self.cadence.finish(started);
                self.emit(&result, &timing)?;
                Cycle::Delaying { timing }
            }
            Cycle::Delaying { timing } => {
                self.cadence.delay(&timing);
                Cycle::Idle
            }
            Cycle::Stopped => Cycle::Stopped,
        };

        self.cycle = next;
        Ok(self.cycle.state())
    }

    fn emit(&mut self, result: &DetectionResult, timing: &CycleTiming) -> Result<(), PipelineError> {
        self.summary.cycles += 1;
        log::debug!(
            "Cycle {}: {} (took {:?})",
            self.summary.cycles,
            result,
            timing.elapsed()
        );

        self.sink.report(result)?;

        if let Some(overrun) = self.cadence.overrun(timing) {
            self.summary.overruns += 1;
            log::warn!("{}", overrun);
            self.sink.overrun(&overrun)?;
        }
        Ok(())
    }

    /// A stop message or a dropped sender both end the loop.
    fn stop_requested(&self) -> bool {
        match self.stop.try_recv() {
            Ok(()) => {
                log::info!("Stop signal received");
                true
            }
            Err(TryRecvError::Disconnected) => {
                log::info!("Stop signal channel closed");
                true
            }
            Err(TryRecvError::Empty) => false,
        }
    }
}
