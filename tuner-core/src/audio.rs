//! # Audio Capture Module
//!
//! This module defines the stream contract the pipeline reads from and a
//! live implementation of it on top of CPAL (Cross-Platform Audio Library).
//!
//! ## Stream Contract
//! - `open`: device index, sample rate and channel count come from the caller
//! - `read`: blocks until `frames * channels` 16-bit little-endian samples
//!   are available and returns them as raw bytes
//! - `close`: stops the device stream
//!
//! ## Features
//! - Input device listing and selection by index
//! - Accepts i16, u16, i32, f32 and f64 devices, converted to i16
//! - Device errors end a blocked read instead of leaving it waiting
//! - Optional read timeout that bounds the whole read and keeps frame
//!   alignment intact

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender};

use crate::config::TunerConfig;
use crate::error::StreamError;

/// A running, interleaved 16-bit input stream.
pub trait AudioStream {
    /// Interleaved channel count of the bytes returned by [`read`](Self::read).
    fn channels(&self) -> u16;

    /// Blocks until `frames` interleaved sample-frames are available.
    ///
    /// Returns `frames * channels * 2` little-endian bytes, or fewer if the
    /// stream ended before enough data arrived.
    fn read(&mut self, frames: usize) -> Result<Vec<u8>, StreamError>;

    /// Stops the stream and releases the device.
    fn close(&mut self);
}

/// Collects byte blocks from the capture callback and hands them out in
/// exact sizes.
///
/// A read waits on the block and error channels together, so a device error
/// ends it even while no audio is flowing. The timeout is a deadline for the
/// whole read. Bytes received before a timeout stay queued, so the next read
/// resumes on the same frame boundary.
struct BlockReader {
    blocks: Receiver<Vec<u8>>,
    errors: Receiver<String>,
    pending: Vec<u8>,
    timeout: Option<Duration>,
}

enum Arrival {
    Block(Vec<u8>),
    Ended,
    Failed(String),
    ErrorsClosed,
    TimedOut,
}

impl BlockReader {
    fn new(
        blocks: Receiver<Vec<u8>>,
        errors: Receiver<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            blocks,
            errors,
            pending: Vec::new(),
            timeout,
        }
    }

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, StreamError> {
        let limit = self.timeout;
        let deadline = limit.map(|t| Instant::now() + t);

        loop {
            // Errors win over data that is already queued.
            if let Ok(msg) = self.errors.try_recv() {
                return Err(StreamError::Device(msg));
            }
            if self.pending.len() >= len {
                break;
            }

            let timer = match deadline {
                Some(at) => crossbeam_channel::at(at),
                None => crossbeam_channel::never(),
            };
            let arrival = crossbeam_channel::select! {
                recv(self.blocks) -> msg => msg.map_or(Arrival::Ended, Arrival::Block),
                recv(self.errors) -> msg => msg.map_or(Arrival::ErrorsClosed, Arrival::Failed),
                recv(timer) -> _ => Arrival::TimedOut,
            };

            match arrival {
                Arrival::Block(block) => self.pending.extend_from_slice(&block),
                Arrival::Ended => break,
                Arrival::Failed(msg) => return Err(StreamError::Device(msg)),
                Arrival::ErrorsClosed => self.errors = crossbeam_channel::never(),
                Arrival::TimedOut => {
                    return Err(StreamError::Timeout(limit.unwrap_or_default()));
                }
            }
        }

        let take = len.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }
}

/// Live input stream backed by a CPAL device.
pub struct CpalInputStream {
    stream: Option<cpal::Stream>,
    reader: BlockReader,
    channels: u16,
}

impl CpalInputStream {
    /// Opens and starts an input stream.
    ///
    /// # Arguments
    /// * `device_index` - Index into [`input_device_names`], or `None` for the
    ///   host's default input device
    /// * `config` - Sample rate, channel count and read timeout
    ///
    /// # Returns
    /// * `Ok(stream)` - A running stream
    /// * `Err(e)` - No such device, or the device cannot capture with the
    ///   requested rate and channel count
    pub fn open(device_index: Option<usize>, config: &TunerConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_index {
            Some(index) => host
                .input_devices()?
                .nth(index)
                .ok_or_else(|| anyhow!("Input device index {} not found", index))?,
            None => host
                .default_input_device()
                .ok_or_else(|| anyhow!("No input device available"))?,
        };

        log::info!("Using audio input device: {}", device.name()?);

        let sample_rate = config.rate.sample_rate();
        let channels = config.layout.channels();
        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported = find_supported_config(configs, sample_rate, channels).ok_or_else(|| {
            anyhow!(
                "Device cannot capture {} channels at {} Hz",
                channels,
                sample_rate
            )
        })?;

        let supported = supported.with_sample_rate(cpal::SampleRate(sample_rate));
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();

        log::info!(
            "Audio config: {:?} @ {} Hz, channels: {}, chunk: {} samples",
            sample_format,
            sample_rate,
            channels,
            config.rate.chunk_size()
        );

        let (block_tx, block_rx) = crossbeam_channel::unbounded();
        let (error_tx, error_rx) = crossbeam_channel::bounded(16);

        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, block_tx, error_tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, block_tx, error_tx)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, block_tx, error_tx)?,
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, block_tx, error_tx)?,
            SampleFormat::F64 => build_stream::<f64>(&device, &stream_config, block_tx, error_tx)?,
            other => return Err(anyhow!("Unsupported sample format {:?}", other)),
        };

        stream.play()?;
        log::info!("Audio stream opened");

        Ok(Self {
            stream: Some(stream),
            reader: BlockReader::new(block_rx, error_rx, config.read_timeout),
            channels,
        })
    }
}

impl AudioStream for CpalInputStream {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn read(&mut self, frames: usize) -> Result<Vec<u8>, StreamError> {
        self.reader.read_exact(frames * self.channels as usize * 2)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Stop the callback before the stream is dropped.
            if let Err(e) = stream.pause() {
                log::warn!("Error pausing stream: {}", e);
            }
            drop(stream);
        }
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Lists the names of the host's input devices, in index order.
pub fn input_device_names() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let names = host
        .input_devices()?
        .map(|device| device.name().unwrap_or_else(|_| "Unknown Device".to_string()))
        .collect();
    Ok(names)
}

/// Builds an input stream that converts every sample to i16 and forwards
/// the interleaved block as little-endian bytes.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    blocks: Sender<Vec<u8>>,
    errors: Sender<String>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut block = Vec::with_capacity(data.len() * 2);
            for &sample in data {
                block.extend_from_slice(&sample.to_sample::<i16>().to_le_bytes());
            }
            // The reader is gone once the pipeline stops.
            let _ = blocks.send(block);
        },
        move |err| {
            let _ = errors.try_send(err.to_string());
        },
        None,
    )?;
    Ok(stream)
}

/// Finds a supported configuration for the requested rate and channel count.
///
/// Integer formats are preferred since they convert to i16 without
/// rescaling.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
    channels: u16,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| {
            c.channels() == channels
                && c.min_sample_rate().0 <= target_rate
                && c.max_sample_rate().0 >= target_rate
        })
        .min_by_key(|c| match c.sample_format() {
            SampleFormat::I16 => 0,
            SampleFormat::F32 => 1,
            SampleFormat::I32 => 2,
            SampleFormat::U16 => 3,
            SampleFormat::F64 => 4,
            _ => 5,
        })
}
