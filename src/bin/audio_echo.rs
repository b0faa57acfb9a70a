use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use audio_echo::engine::{EchoEngine, SimulatedBackend};
use audio_echo::telemetry::EchoStats;
use audio_echo::{init_logging, EchoConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "audio_echo", about = "Full-duplex audio echo harness")]
struct Cli {
    /// Configuration file (defaults to assets/echo_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the default input/output devices and their native configuration
    Probe,
    /// Echo the default microphone to the default speaker for a fixed time
    Run {
        #[arg(long, default_value_t = 48000)]
        sample_rate: i32,
        #[arg(long, default_value_t = 192)]
        frames_per_buffer: i32,
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
    /// Push a test tone through the simulated backend and measure pass-through
    Simulate {
        #[arg(long, default_value_t = 48000)]
        sample_rate: i32,
        #[arg(long, default_value_t = 192)]
        frames_per_buffer: i32,
        #[arg(long, default_value_t = 100)]
        periods: u32,
    },
}

#[derive(Serialize)]
struct SimulationReport {
    periods: u32,
    /// First period whose render buffer carried captured audio
    first_echo_period: Option<u32>,
    /// Rendered samples equal to the captured tone, in order
    matched_samples: u64,
    stats: EchoStats,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EchoConfig::load_from_file(path),
        None => EchoConfig::load(),
    };
    init_logging(config.logging.level_filter());

    match cli.command {
        Commands::Probe => run_probe(),
        Commands::Run {
            sample_rate,
            frames_per_buffer,
            seconds,
        } => run_live(config, sample_rate, frames_per_buffer, seconds),
        Commands::Simulate {
            sample_rate,
            frames_per_buffer,
            periods,
        } => run_simulate(config, sample_rate, frames_per_buffer, periods),
    }
}

#[cfg(not(target_os = "android"))]
fn run_probe() -> Result<ExitCode> {
    let report = audio_echo::engine::backend::probe_default_devices();
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.input.is_none() || report.output.is_none() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::from(0))
}

#[cfg(target_os = "android")]
fn run_probe() -> Result<ExitCode> {
    bail!("probe is only available on desktop hosts")
}

fn run_live(
    config: EchoConfig,
    sample_rate: i32,
    frames_per_buffer: i32,
    seconds: u64,
) -> Result<ExitCode> {
    let mut engine = EchoEngine::new(
        Arc::new(audio_echo::engine::PlatformBackend::new()),
        config,
    );
    start_duplex(&mut engine, sample_rate, frames_per_buffer)?;

    eprintln!("Echoing for {} s, speak into the microphone...", seconds);
    std::thread::sleep(std::time::Duration::from_secs(seconds));

    let stats = engine.stats();
    engine.stop_echo().context("stopping echo")?;
    if engine.take_fault() {
        eprintln!("Warning: a stream reported a fault during the session");
    }
    engine.delete_engine().context("deleting engine")?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(ExitCode::from(0))
}

fn run_simulate(
    config: EchoConfig,
    sample_rate: i32,
    frames_per_buffer: i32,
    periods: u32,
) -> Result<ExitCode> {
    let backend = SimulatedBackend::new();
    let mut engine = EchoEngine::new(Arc::new(backend.clone()), config);
    start_duplex(&mut engine, sample_rate, frames_per_buffer)?;

    let format = match engine.format() {
        Some(format) => *format,
        None => bail!("engine has no format after create_engine"),
    };
    let samples = format.samples_per_buffer();
    let mut capture = vec![0i16; samples];
    let mut render = vec![0i16; samples];
    let mut tone = ToneGenerator::new(440.0, format.sample_rate(), format.channels());
    let mut expected = ToneGenerator::new(440.0, format.sample_rate(), format.channels());

    let mut first_echo_period = None;
    let mut matched_samples = 0u64;
    for period in 0..periods {
        tone.fill(&mut capture);
        backend.capture(&capture);
        backend.render(&mut render);

        if first_echo_period.is_none() && render.iter().any(|&s| s != 0) {
            first_echo_period = Some(period);
        }
        for &sample in &render {
            if sample == expected.next_sample() {
                matched_samples += 1;
            }
        }
    }

    let stats = engine.stats();
    engine.stop_echo().context("stopping echo")?;
    engine.delete_engine().context("deleting engine")?;

    let report = SimulationReport {
        periods,
        first_echo_period,
        matched_samples,
        stats,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if first_echo_period.is_none() && periods > 0 {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::from(0))
}

fn start_duplex(engine: &mut EchoEngine, sample_rate: i32, frames_per_buffer: i32) -> Result<()> {
    engine
        .create_engine(sample_rate, frames_per_buffer)
        .context("creating engine")?;
    engine.create_player().context("creating player")?;
    engine.create_recorder().context("creating recorder")?;
    engine.start_echo().context("starting echo")?;
    Ok(())
}

/// Interleaved sine tone, identical on every channel of a frame
struct ToneGenerator {
    phase: f64,
    step: f64,
    channels: usize,
    channel: usize,
    current: i16,
}

impl ToneGenerator {
    fn new(frequency: f64, sample_rate: u32, channels: u16) -> Self {
        Self {
            phase: 0.0,
            step: 2.0 * std::f64::consts::PI * frequency / sample_rate as f64,
            channels: channels as usize,
            channel: 0,
            current: 0,
        }
    }

    fn next_sample(&mut self) -> i16 {
        if self.channel == 0 {
            // Offset keeps the tone clear of zero, so silence is never a match.
            self.current = (self.phase.sin() * 8000.0) as i16 | 1;
            self.phase += self.step;
        }
        self.channel = (self.channel + 1) % self.channels;
        self.current
    }

    fn fill(&mut self, buffer: &mut [i16]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }
}
