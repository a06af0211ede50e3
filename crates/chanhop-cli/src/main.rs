//! Channel Monitor Command-Line Interface
//!
//! Watches the uplink of a running base station and moves the station to
//! another channel once the CUSUM detector reports the channel occupied.
//!
//! - `monitor`: drive the scripted base station (SQLite config + start/stop
//!   scripts) from the simulated radio pipeline
//! - `simulate`: run the whole loop in software and stop after N hand-offs
//! - `arfcn`: print the channel plan for a downlink frequency

use anyhow::{anyhow, bail, Context, Result};
use chanhop_core::basestation::{
    BaseStation, ScriptedBaseStation, DEFAULT_CONFIG_DB, DEFAULT_START_SCRIPT, DEFAULT_STOP_SCRIPT,
};
use chanhop_core::config::{parse_eng, ChanhopConfig, HopConfig, MonitorConfig};
use chanhop_core::controller::{HandoffController, RunSummary};
use chanhop_core::frame_source::FrameQueue;
use chanhop_core::frontend::{apply_gain, FrontEnd};
use chanhop_core::plan::{arfcn_for_downlink, next_downlink};
use chanhop_core::tuning::Tuner;
use chanhop_sim::{
    Carrier, ChannelModel, SimBaseStation, SimFrontEnd, SimFrontEndConfig, SpectrumChannel,
    SpectrumChannelConfig, Sweeper, SweeperConfig,
};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Occupied bandwidth of one simulated carrier (one GSM channel)
const CARRIER_BANDWIDTH_HZ: f64 = 200e3;

#[derive(Parser)]
#[command(name = "chanhop")]
#[command(author, version, about = "Spectrum monitor with automatic base-station hand-off", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration file; command-line flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the uplink and hand the scripted base station off when occupied
    #[command(allow_negative_numbers = true)]
    Monitor {
        /// Initial downlink frequency (Hz, accepts 940M)
        #[arg(value_parser = parse_eng)]
        down_freq: f64,

        #[command(flatten)]
        radio: RadioArgs,

        #[command(flatten)]
        sim: SimArgs,

        /// Base station configuration database
        #[arg(long, default_value = DEFAULT_CONFIG_DB)]
        db: PathBuf,

        /// Script that starts the base station
        #[arg(long, default_value = DEFAULT_START_SCRIPT)]
        start_script: String,

        /// Script that stops the base station
        #[arg(long, default_value = DEFAULT_STOP_SCRIPT)]
        stop_script: String,
    },

    /// Run the hand-off loop against a simulated base station
    #[command(allow_negative_numbers = true)]
    Simulate {
        /// Initial downlink frequency (Hz, accepts 940M)
        #[arg(value_parser = parse_eng)]
        down_freq: f64,

        #[command(flatten)]
        radio: RadioArgs,

        #[command(flatten)]
        sim: SimArgs,

        /// Stop after this many hand-offs
        #[arg(long, default_value = "3")]
        handoffs: u64,
    },

    /// Show ARFCN, uplink and next hop for a downlink frequency
    Arfcn {
        /// Downlink frequency (Hz, accepts 940M)
        #[arg(value_parser = parse_eng)]
        down_freq: f64,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Receiver and spectrum pipeline options
#[derive(Args, Debug, Default)]
struct RadioArgs {
    /// Device address args
    #[arg(short = 'a', long = "args")]
    device_addr: Option<String>,

    /// Subdevice of the receiver
    #[arg(long = "spec")]
    subdev_spec: Option<String>,

    /// Receive antenna
    #[arg(short = 'A', long)]
    antenna: Option<String>,

    /// Sample rate in Hz
    #[arg(short = 's', long = "samp-rate", value_parser = parse_eng)]
    sample_rate: Option<f64>,

    /// Gain in dB (default is midpoint)
    #[arg(short = 'g', long, value_parser = parse_eng)]
    gain: Option<f64>,

    /// Time delay after tuning in seconds
    #[arg(long, value_parser = parse_eng)]
    tune_delay: Option<f64>,

    /// Time to dwell at a given frequency in seconds
    #[arg(long, value_parser = parse_eng)]
    dwell_delay: Option<f64>,

    /// Channel bandwidth of FFT bins in Hz
    #[arg(short = 'b', long, value_parser = parse_eng)]
    channel_bandwidth: Option<f64>,

    /// LO offset in Hz
    #[arg(short = 'l', long, allow_hyphen_values = true, value_parser = parse_eng)]
    lo_offset: Option<f64>,

    /// Squelch threshold in dB
    #[arg(short = 'q', long, allow_hyphen_values = true, value_parser = parse_eng)]
    squelch_threshold: Option<f64>,

    /// FFT size
    #[arg(short = 'F', long)]
    fft_size: Option<usize>,

    /// Attempt to enable realtime scheduling
    #[arg(long)]
    real_time: bool,
}

impl RadioArgs {
    /// Overlay the flags that were given onto `config`
    fn apply(self, config: &mut MonitorConfig) {
        if let Some(addr) = self.device_addr {
            config.device_addr = addr;
        }
        if self.subdev_spec.is_some() {
            config.subdev_spec = self.subdev_spec;
        }
        if self.antenna.is_some() {
            config.antenna = self.antenna;
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if self.gain.is_some() {
            config.gain = self.gain;
        }
        if let Some(delay) = self.tune_delay {
            config.tune_delay = delay;
        }
        if let Some(delay) = self.dwell_delay {
            config.dwell_delay = delay;
        }
        if let Some(bw) = self.channel_bandwidth {
            config.channel_bandwidth = bw;
        }
        if let Some(offset) = self.lo_offset {
            config.lo_offset = offset;
        }
        if self.squelch_threshold.is_some() {
            config.squelch_threshold = self.squelch_threshold;
        }
        if self.fft_size.is_some() {
            config.fft_size = self.fft_size;
        }
        config.real_time |= self.real_time;
    }
}

/// Simulated band contents
#[derive(Args, Debug)]
struct SimArgs {
    /// Occupied uplink carrier as FREQ:DB (repeatable, e.g. 895M:-70)
    #[arg(long = "occupied", value_parser = parse_carrier)]
    carriers: Vec<Carrier>,

    /// Channel model (ideal, awgn, rayleigh)
    #[arg(long, default_value = "awgn", value_parser = parse_model)]
    model: ChannelModel,

    /// Noise floor in dB
    #[arg(long, default_value = "-110", allow_hyphen_values = true, value_parser = parse_eng)]
    noise_floor: f64,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

impl SimArgs {
    fn channel_config(&self) -> SpectrumChannelConfig {
        SpectrumChannelConfig {
            model: self.model,
            noise_floor_db: self.noise_floor,
            carriers: self.carriers.clone(),
            seed: self.seed,
        }
    }
}

fn parse_carrier(s: &str) -> Result<Carrier, String> {
    let (freq, power) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FREQ:DB, got '{}'", s))?;
    let freq = parse_eng(freq).map_err(|e| e.to_string())?;
    let power = parse_eng(power).map_err(|e| e.to_string())?;
    Ok(Carrier::new(freq, CARRIER_BANDWIDTH_HZ, power))
}

fn parse_model(s: &str) -> Result<ChannelModel, String> {
    ChannelModel::from_str(s).ok_or_else(|| format!("unknown channel model '{}'", s))
}

fn seconds(value: f64, name: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid {}: {}", name, value))
}

/// Try to switch the process to SCHED_FIFO
#[cfg(target_os = "linux")]
fn enable_realtime() -> std::io::Result<()> {
    unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = libc::sched_get_priority_min(libc::SCHED_FIFO);

        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn enable_realtime() -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "realtime scheduling not supported on this platform",
    ))
}

/// Wire the radio pipeline to a controller and run until it returns
fn run_handoff<B: BaseStation>(
    config: &ChanhopConfig,
    down_hz: f64,
    base_station: B,
    sim: &SimArgs,
    max_handoffs: Option<u64>,
) -> Result<RunSummary> {
    let monitor = &config.monitor;

    arfcn_for_downlink(down_hz, &config.hop).context("invalid initial channel")?;

    let idle = thread::Builder::new()
        .name("idle".to_string())
        .spawn(|| {})
        .context("Failed to spawn idle thread")?;

    if monitor.real_time {
        match enable_realtime() {
            Ok(()) => info!("realtime scheduling enabled"),
            Err(e) => warn!("failed to enable realtime scheduling: {}", e),
        }
    }

    info!("using device {}", monitor.device_addr);
    if let Some(spec) = &monitor.subdev_spec {
        debug!("subdevice {}", spec);
    }
    if let Some(antenna) = &monitor.antenna {
        debug!("antenna {}", antenna);
    }

    let mut frontend = SimFrontEnd::new(SimFrontEndConfig {
        sample_rate: monitor.sample_rate,
        ..Default::default()
    });
    let rate = frontend.sample_rate();
    apply_gain(&mut frontend, monitor.gain);

    let fft_size = monitor.fft_size(rate).context("invalid FFT geometry")?;
    if fft_size / 2 + config.detector.half_width_bins >= fft_size {
        bail!(
            "FFT size {} is too small for a {}-bin half-width",
            fft_size,
            config.detector.half_width_bins
        );
    }
    info!(
        "fft size {} tune delay {} frames dwell delay {} frames",
        fft_size,
        monitor.tune_delay_frames(rate, fft_size),
        monitor.dwell_delay_frames(rate, fft_size)
    );

    let queue = FrameQueue::new(1);
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut controller = HandoffController::new(
        queue.clone(),
        base_station,
        down_hz,
        rate,
        config.detector,
        config.hop,
    )
    .with_shutdown(shutdown.clone());
    if let Some(max) = max_handoffs {
        controller = controller.with_max_handoffs(max);
    }

    // Setup Ctrl+C handler
    let interrupt_queue = queue.clone();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
        interrupt_queue.close();
    })
    .context("Failed to set Ctrl+C handler")?;

    let tuner = Tuner::new(
        frontend,
        controller.uplink_handle(),
        queue.clone(),
        monitor.lo_offset,
        config.hop.backlog_poll_interval,
    );
    let sweeper = Sweeper::new(
        tuner,
        SpectrumChannel::new(sim.channel_config()),
        queue.clone(),
        SweeperConfig {
            fft_size,
            sample_rate: rate,
            tune_delay: seconds(monitor.tune_delay, "tune delay")?,
            dwell_delay: seconds(monitor.dwell_delay, "dwell delay")?,
            dwell_frames: monitor.dwell_delay_frames(rate, fft_size),
        },
    )
    .spawn()
    .context("Failed to start sweeper")?;

    let outcome = controller.run();
    queue.close();

    let swept = sweeper
        .join()
        .map_err(|_| anyhow!("sweeper thread panicked"))?;
    idle.join().map_err(|_| anyhow!("idle thread panicked"))?;

    let summary = outcome.context("hand-off controller failed")?;
    let dwells = swept.context("sampling pipeline failed")?;
    info!(
        "{} hand-offs, {} frames ({} skipped), {} dwells",
        summary.handoffs, summary.frames_processed, summary.frames_skipped, dwells
    );
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("Hand-offs:        {}", summary.handoffs);
    println!("Frames processed: {}", summary.frames_processed);
    println!("Frames skipped:   {}", summary.frames_skipped);
}

fn cmd_monitor(
    config: &ChanhopConfig,
    down_hz: f64,
    sim: &SimArgs,
    db: PathBuf,
    start_script: String,
    stop_script: String,
) -> Result<()> {
    let base_station = ScriptedBaseStation::new(&db, &start_script, &stop_script);
    info!(
        "base station config {}, scripts {} / {}",
        base_station.db_path().display(),
        base_station.start_script().display(),
        base_station.stop_script().display()
    );

    let summary = run_handoff(config, down_hz, base_station, sim, None)?;
    print_summary(&summary);
    Ok(())
}

fn cmd_simulate(config: &ChanhopConfig, down_hz: f64, sim: &SimArgs, handoffs: u64) -> Result<()> {
    let base_station = SimBaseStation::new();
    let log = base_station.log();

    let summary = run_handoff(config, down_hz, base_station, sim, Some(handoffs))?;
    print_summary(&summary);
    println!("Channels visited: {:?}", log.channels());
    Ok(())
}

fn cmd_arfcn(hop: &HopConfig, down_hz: f64) -> Result<()> {
    let arfcn = arfcn_for_downlink(down_hz, hop)
        .with_context(|| format!("no channel for {} Hz", down_hz))?;
    let next = next_downlink(down_hz, hop.band_edge_hz, hop.hop_step_hz);

    println!("Downlink: {} Hz", down_hz);
    println!("Uplink:   {} Hz", down_hz - hop.duplex_offset_hz);
    println!("ARFCN:    {}", arfcn);
    println!("Next hop: {} Hz", next);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The per-frame trace is logged at INFO, so that is the floor
    let log_level = match cli.verbose {
        0 | 1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => ChanhopConfig::from_json_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ChanhopConfig::default(),
    };

    match cli.command {
        Commands::Monitor {
            down_freq,
            radio,
            sim,
            db,
            start_script,
            stop_script,
        } => {
            radio.apply(&mut config.monitor);
            cmd_monitor(&config, down_freq, &sim, db, start_script, stop_script)
        }
        Commands::Simulate {
            down_freq,
            radio,
            sim,
            handoffs,
        } => {
            radio.apply(&mut config.monitor);
            cmd_simulate(&config, down_freq, &sim, handoffs)
        }
        Commands::Arfcn { down_freq } => cmd_arfcn(&config.hop, down_freq),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_carrier() {
        let carrier = parse_carrier("895M:-70").unwrap();
        assert_eq!(carrier.center_hz, 895e6);
        assert_eq!(carrier.power_db, -70.0);
        assert_eq!(carrier.bandwidth_hz, CARRIER_BANDWIDTH_HZ);

        assert!(parse_carrier("895M").is_err());
        assert!(parse_carrier("abc:-70").is_err());
    }

    #[test]
    fn test_simulate_args() {
        let cli = Cli::try_parse_from([
            "chanhop",
            "-vv",
            "simulate",
            "940M",
            "--occupied",
            "895M:-70",
            "--occupied",
            "905M:-65",
            "--model",
            "ideal",
            "-l",
            "-250k",
            "--handoffs",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);

        match cli.command {
            Commands::Simulate {
                down_freq,
                radio,
                sim,
                handoffs,
            } => {
                assert_eq!(down_freq, 940e6);
                assert_eq!(handoffs, 2);
                assert_eq!(sim.carriers.len(), 2);
                assert_eq!(sim.model, ChannelModel::Ideal);
                assert_eq!(radio.lo_offset, Some(-250e3));
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_radio_args_override_config() {
        let mut config = MonitorConfig {
            sample_rate: 2e6,
            tune_delay: 0.5,
            ..Default::default()
        };
        let radio = RadioArgs {
            sample_rate: Some(1e6),
            gain: Some(20.0),
            fft_size: Some(512),
            ..Default::default()
        };
        radio.apply(&mut config);

        assert_eq!(config.sample_rate, 1e6);
        assert_eq!(config.gain, Some(20.0));
        assert_eq!(config.fft_size(config.sample_rate).unwrap(), 512);
        // Untouched by the flags
        assert_eq!(config.tune_delay, 0.5);
        assert_eq!(config.device_addr, "addr=192.168.20.2");
    }

    #[test]
    fn test_arfcn_command_rejects_low_band() {
        assert!(cmd_arfcn(&HopConfig::default(), 900e6).is_err());
        assert!(cmd_arfcn(&HopConfig::default(), 940e6).is_ok());
    }
}
