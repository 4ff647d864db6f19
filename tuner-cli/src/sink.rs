//! Report sinks for the console: one human-readable line per cycle, or one
//! JSON object per event for other programs to consume.

use std::io::{self, Write};

use serde::Serialize;
use tuner_core::{CycleOverrun, DetectionResult, ReportSink};

/// Writes `Current freq: ...` lines.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn report(&mut self, result: &DetectionResult) -> io::Result<()> {
        writeln!(self.out, "{}", result)?;
        self.out.flush()
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Detection {
        #[serde(flatten)]
        result: &'a DetectionResult,
        cents_off: Option<f32>,
    },
    Overrun {
        elapsed_ms: f64,
        period_ms: f64,
        consecutive: u32,
    },
}

/// Writes one JSON object per line, for detections and overruns alike.
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_event(&mut self, event: &Event<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> ReportSink for JsonSink<W> {
    fn report(&mut self, result: &DetectionResult) -> io::Result<()> {
        self.write_event(&Event::Detection {
            result,
            cents_off: result.cents_off(),
        })
    }

    fn overrun(&mut self, overrun: &CycleOverrun) -> io::Result<()> {
        self.write_event(&Event::Overrun {
            elapsed_ms: overrun.elapsed.as_micros() as f64 / 1000.0,
            period_ms: overrun.period.as_micros() as f64 / 1000.0,
            consecutive: overrun.consecutive,
        })
    }
}
