//! # Frame Source Module
//!
//! Turns the raw interleaved byte stream delivered by an [`AudioStream`] into
//! one mono [`AudioFrame`] per cycle.
//!
//! ## Byte Layout
//! Samples are 16-bit signed integers, **little-endian**, interleaved by
//! channel: `[c0 c1 .. cN-1][c0 c1 .. cN-1]...`. The frame keeps a single
//! channel chosen by the [`ChannelLayout`].

use crate::audio::AudioStream;
use crate::config::{ChannelLayout, SampleRateConfig};
use crate::error::FrameError;

/// One fixed-length block of mono samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decodes `frames` interleaved sample-frames and keeps the selected channel.
///
/// The buffer must hold exactly `frames * channels * 2` bytes. A shorter
/// buffer is an underrun; anything else that does not fit the layout is a
/// format mismatch.
pub fn decode_frame(
    bytes: &[u8],
    frames: usize,
    layout: &ChannelLayout,
) -> Result<AudioFrame, FrameError> {
    if layout.selected() >= layout.channels() {
        return Err(FrameError::FormatMismatch(format!(
            "channel {} selected from {} channels",
            layout.selected(),
            layout.channels()
        )));
    }

    let stride = layout.stride_bytes();
    let expected = frames * stride;
    if bytes.len() < expected {
        return Err(FrameError::StreamUnderrun {
            expected,
            got: bytes.len(),
        });
    }
    if bytes.len() != expected {
        return Err(FrameError::FormatMismatch(format!(
            "{} bytes do not reshape into {} frames of {} channels",
            bytes.len(),
            frames,
            layout.channels()
        )));
    }

    let offset = layout.selected() as usize * 2;
    let samples = bytes
        .chunks_exact(stride)
        .map(|frame| i16::from_le_bytes([frame[offset], frame[offset + 1]]))
        .collect();

    Ok(AudioFrame { samples })
}

/// Pulls fixed-size mono frames from an open stream.
///
/// The source owns the stream and closes it exactly once, either through
/// [`FrameSource::close`] or when dropped.
pub struct FrameSource<S: AudioStream> {
    stream: S,
    chunk_size: usize,
    layout: ChannelLayout,
    closed: bool,
}

impl<S: AudioStream> FrameSource<S> {
    pub fn new(stream: S, rate: &SampleRateConfig, layout: ChannelLayout) -> Self {
        Self {
            stream,
            chunk_size: rate.chunk_size(),
            layout,
            closed: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Blocks until a full frame is available and returns it.
    pub fn next_frame(&mut self) -> Result<AudioFrame, FrameError> {
        if self.closed {
            return Err(FrameError::StreamUnderrun {
                expected: self.chunk_size * self.layout.stride_bytes(),
                got: 0,
            });
        }

        let channels = self.stream.channels();
        if channels != self.layout.channels() {
            return Err(FrameError::FormatMismatch(format!(
                "stream delivers {} channels, layout expects {}",
                channels,
                self.layout.channels()
            )));
        }

        let bytes = self.stream.read(self.chunk_size)?;
        decode_frame(&bytes, self.chunk_size, &self.layout)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the underlying stream. Later calls are no-ops.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stream.close();
            log::debug!("Audio stream closed");
        }
    }
}

impl<S: AudioStream> Drop for FrameSource<S> {
    fn drop(&mut self) {
        self.close();
    }
}
