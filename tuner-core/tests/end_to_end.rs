use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tuner_core::audio::AudioStream;
use tuner_core::cadence::Clock;
use tuner_core::fft::SpectralAnalyzer;
use tuner_core::frame::decode_frame;
use tuner_core::{
    ChannelLayout, DetectionResult, FrameError, Pipeline, PipelineError, ReportSink,
    SampleRateConfig, StreamError, TargetPitchTable, TunerConfig, match_pitch,
};

/// Never actually sleeps; records what was asked for.
#[derive(Default)]
struct InstantClock {
    slept: RefCell<Vec<Duration>>,
}

impl Clock for InstantClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}

struct Replay {
    blocks: VecDeque<Vec<u8>>,
    closes: Rc<Cell<usize>>,
}

impl AudioStream for Replay {
    fn channels(&self) -> u16 {
        2
    }

    fn read(&mut self, _frames: usize) -> Result<Vec<u8>, StreamError> {
        Ok(self.blocks.pop_front().unwrap_or_default())
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get() + 1);
    }
}

#[derive(Default)]
struct Lines(Vec<String>, Vec<DetectionResult>);

impl ReportSink for Lines {
    fn report(&mut self, result: &DetectionResult) -> io::Result<()> {
        self.0.push(result.to_string());
        self.1.push(result.clone());
        Ok(())
    }
}

/// A stereo buffer with `freq` on channel 1 and silence on channel 0.
fn stereo_tone(freq: f32, rate: &SampleRateConfig) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(rate.chunk_size() * 4);
    for i in 0..rate.chunk_size() {
        let t = i as f64 / rate.sample_rate() as f64;
        let s = (12_000.0 * (2.0 * std::f64::consts::PI * freq as f64 * t).sin()).round() as i16;
        bytes.extend_from_slice(&0i16.to_le_bytes());
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

fn detect(freq: f32) -> (String, f32, f32) {
    let config = TunerConfig::default();
    let bytes = stereo_tone(freq, &config.rate);
    let frame = decode_frame(&bytes, config.rate.chunk_size(), &config.layout).unwrap();
    let mut analyzer = SpectralAnalyzer::new(&config.rate);
    let measured = analyzer.dominant_frequency(&frame).unwrap();
    let (label, target) = match_pitch(measured, TargetPitchTable::standard_guitar());
    (label.to_string(), target, measured)
}

#[test]
fn a_string_tone_matches_a2() {
    let (label, target, measured) = detect(110.0);
    assert_eq!(measured, 110.0);
    assert_eq!(label, "A2");
    assert_eq!(target, 110.0);
}

#[test]
fn tone_between_strings_matches_the_closer_one() {
    let (label, target, measured) = detect(90.0);
    assert_eq!(measured, 90.0);
    assert_eq!(label, "E2");
    assert_eq!(target, 82.0);
}

#[test]
fn every_open_string_is_recognised() {
    for (freq, expected) in [(82.0, "E2"), (147.0, "D3"), (196.0, "G3"), (247.0, "B3"), (330.0, "E4")] {
        let (label, _, _) = detect(freq);
        assert_eq!(label, expected, "tone at {} Hz", freq);
    }
}

#[test]
fn pipeline_reports_then_releases_stream_on_failure() {
    let config = TunerConfig::default();
    let closes = Rc::new(Cell::new(0));
    let stream = Replay {
        blocks: VecDeque::from([
            stereo_tone(110.0, &config.rate),
            vec![0; config.rate.chunk_size() * 4],
            stereo_tone(90.0, &config.rate),
        ]),
        closes: closes.clone(),
    };
    let (_stop_tx, stop_rx) = crossbeam_channel::unbounded();
    let mut sink = Lines::default();
    let clock = InstantClock::default();

    let err = Pipeline::with_clock(
        stream,
        &config,
        TargetPitchTable::standard_guitar(),
        &mut sink,
        stop_rx,
        &clock,
    )
    .run()
    .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Frame(FrameError::StreamUnderrun { got: 0, .. })
    ));
    assert_eq!(
        sink.0,
        vec![
            "Current freq: 110.0 Hz which is closest to note: A2 which is 110 Hz",
            "Current freq: 0.0 Hz which is closest to note: E2 which is 82 Hz",
            "Current freq: 90.0 Hz which is closest to note: E2 which is 82 Hz",
        ]
    );
    assert_eq!(sink.1[1].cents_off(), None);
    assert_eq!(closes.get(), 1);
    // Warm-up plus three cycles, none of which came close to the period.
    assert_eq!(clock.slept.borrow().len(), 4);
    assert_eq!(clock.slept.borrow()[0], config.rate.period());
}

#[test]
fn mono_stream_with_stereo_layout_is_rejected() {
    struct Mono;
    impl AudioStream for Mono {
        fn channels(&self) -> u16 {
            1
        }
        fn read(&mut self, frames: usize) -> Result<Vec<u8>, StreamError> {
            Ok(vec![0; frames * 2])
        }
        fn close(&mut self) {}
    }

    let config = TunerConfig::new(
        SampleRateConfig::new(8_000, 10).unwrap(),
        ChannelLayout::default(),
    );
    let (_stop_tx, stop_rx) = crossbeam_channel::unbounded();
    let clock = InstantClock::default();
    let err = Pipeline::with_clock(
        Mono,
        &config,
        TargetPitchTable::standard_guitar(),
        Lines::default(),
        stop_rx,
        &clock,
    )
    .run()
    .unwrap_err();
    assert!(matches!(err, PipelineError::Frame(FrameError::FormatMismatch(_))));
}
