//! # Guitar Tuner - Console Front End
//!
//! Lists the input devices, asks which one to use, then prints the closest
//! guitar string for every frame of audio until `q` is entered.
//!
//! ## Architecture
//! - **Main Thread**: runs the detection pipeline from `tuner-core`
//! - **Stdin Thread**: watches for `q` and sends the stop signal
//! - **Audio Thread**: owned by CPAL, forwards captured samples to the pipeline

mod sink;

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossbeam_channel::Sender;
use tuner_core::audio::{self, CpalInputStream};
use tuner_core::config::{
    DEFAULT_CHANNELS, DEFAULT_DUTY_DIVISOR, DEFAULT_SAMPLE_RATE, DEFAULT_SELECTED_CHANNEL,
};
use tuner_core::{
    ChannelLayout, Pipeline, ReportSink, SampleRateConfig, TargetPitchTable, TunerConfig,
};

use sink::{JsonSink, TextSink};

/// command-line interface for the guitar tuner
#[derive(Parser, Debug)]
#[command(name = "guitar-tuner")]
#[command(about = "real-time guitar string detection from a live input")]
struct Cli {
    /// input device index (use --list-devices to see options)
    #[arg(short, long)]
    device: Option<usize>,

    /// list available input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// sample rate of the input device in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// frames per second; each frame holds sample_rate / divisor samples
    #[arg(long, default_value_t = DEFAULT_DUTY_DIVISOR)]
    divisor: u32,

    /// interleaved channels to open the device with
    #[arg(long, default_value_t = DEFAULT_CHANNELS)]
    channels: u16,

    /// channel to analyze (0-based)
    #[arg(long, default_value_t = DEFAULT_SELECTED_CHANNEL)]
    channel: u16,

    /// give up when a whole frame has not arrived within this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// print one JSON object per line instead of text
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn tuner_config(&self) -> Result<TunerConfig> {
        let rate = SampleRateConfig::new(self.sample_rate, self.divisor)?;
        let layout = ChannelLayout::new(self.channels, self.channel)?;
        Ok(TunerConfig::new(rate, layout)
            .with_read_timeout(self.timeout_ms.map(Duration::from_millis)))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.list_devices {
        print_devices()?;
        return Ok(());
    }

    let config = cli.tuner_config()?;
    let device_index = match cli.device {
        Some(index) => index,
        None => prompt_for_device()?,
    };

    let stream = CpalInputStream::open(Some(device_index), &config)?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    spawn_stop_watcher(stop_tx.clone());
    log::info!("Type q and press Enter to stop");

    let stdout = io::stdout();
    let mut sink: Box<dyn ReportSink> = if cli.json {
        Box::new(JsonSink::new(stdout.lock()))
    } else {
        Box::new(TextSink::new(stdout.lock()))
    };

    let summary = Pipeline::new(
        stream,
        &config,
        TargetPitchTable::standard_guitar(),
        &mut *sink,
        stop_rx,
    )
    .run()?;

    // Held until here so a closed stdin does not read as a stop request.
    drop(stop_tx);

    log::info!(
        "Finished: {} reports, {} overruns",
        summary.cycles,
        summary.overruns
    );
    Ok(())
}

/// Prints every input device as `Device: <index> - <name>`.
fn print_devices() -> Result<()> {
    let names = audio::input_device_names()?;
    if names.is_empty() {
        return Err(anyhow!("No input devices found"));
    }
    for (index, name) in names.iter().enumerate() {
        println!("Device: {} - {}", index, name);
    }
    Ok(())
}

/// Lists the devices and reads the chosen index from stdin.
fn prompt_for_device() -> Result<usize> {
    print_devices()?;
    print!("Which device do you want to use? ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    line.trim()
        .parse()
        .with_context(|| format!("'{}' is not a device index", line.trim()))
}

/// Sends the stop signal when `q` or `quit` is entered.
fn spawn_stop_watcher(stop: Sender<()>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if matches!(line.trim(), "q" | "quit") {
                log::info!("Stop requested from console");
                let _ = stop.try_send(());
                break;
            }
        }
    });
}
