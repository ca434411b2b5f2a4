//! `temple`: play temple rituals and check page accessibility.
//!
//! Usage:
//!   temple rituals list [--catalog FILE]
//!   temple rituals play opening --dry-run
//!   temple rituals play closing --rate 4 --midi-device 0
//!   temple rituals devices
//!   temple a11y page.json
//!
//! `RUST_LOG` controls log output (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use oracle_temple::a11y::{validate_temple_accessibility, Document};
use oracle_temple::platform::recording::RecordingHost;
use oracle_temple::platform::speech::LogSpeech;
use oracle_temple::platform::AudioHost;
use oracle_temple::{ClockMode, Engine, EngineConfig, RitualCatalog, RitualSequencer, SequencerConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "temple", version, about = "Oracle Temple rituals and accessibility check", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Work with ritual sequences.
    #[command(subcommand)]
    Rituals(RitualsCommand),

    /// Validate a JSON page snapshot and print the compliance report.
    A11y {
        /// Page snapshot: `{"elements": [...], "stylesheets": [...]}`.
        snapshot: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum RitualsCommand {
    /// List rituals with their durations and event counts.
    List {
        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Play one ritual to completion.
    Play(PlayArgs),

    /// List MIDI output ports.
    Devices,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// JSON catalog merged over the built-in rituals.
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Ritual name, e.g. opening, listening, closing.
    name: String,

    #[command(flatten)]
    catalog: CatalogArgs,

    /// Sequencer settings as JSON (grace, chime shape, whisper style).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Logical milliseconds per wall millisecond.
    #[arg(long, default_value_t = 1.0)]
    rate: f64,

    /// Run on the offline clock; finishes instantly.
    #[arg(long)]
    dry_run: bool,

    /// Play on this MIDI output port instead of recording.
    #[arg(long)]
    midi_device: Option<usize>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Rituals(RitualsCommand::List { catalog }) => list_rituals(&catalog),
        Command::Rituals(RitualsCommand::Play(args)) => play_ritual(args),
        Command::Rituals(RitualsCommand::Devices) => list_devices(),
        Command::A11y { snapshot } => check_accessibility(&snapshot),
    }
}

fn load_catalog(args: &CatalogArgs) -> Result<RitualCatalog> {
    let mut catalog = RitualCatalog::temple();
    if let Some(path) = &args.catalog {
        let extra = RitualCatalog::load(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?;
        catalog.merge(extra);
    }
    Ok(catalog)
}

fn list_rituals(args: &CatalogArgs) -> Result<()> {
    let catalog = load_catalog(args)?;
    let config = SequencerConfig::default();

    println!("{:<16} {:>10} {:>10} {:>7}", "RITUAL", "DURATION", "LIFETIME", "EVENTS");
    for (name, ritual) in catalog.iter() {
        let duration = ritual
            .duration
            .map_or_else(|| "-".to_string(), |d| format!("{d} ms"));
        let lifetime = ritual.lifetime_ms(config.default_event_ms, config.grace_ms);
        println!(
            "{:<16} {:>10} {:>10} {:>7}",
            name,
            duration,
            format!("{lifetime} ms"),
            ritual.sequence.len()
        );
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<SequencerConfig> {
    let Some(path) = path else {
        return Ok(SequencerConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid sequencer config {}", path.display()))
}

fn play_ritual(args: PlayArgs) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    if !catalog.contains(&args.name) {
        let known: Vec<_> = catalog.names().collect();
        bail!("unknown ritual '{}' (available: {})", args.name, known.join(", "));
    }
    let config = load_config(args.config.as_ref())?;

    let mode = if args.dry_run {
        ClockMode::Offline
    } else {
        ClockMode::Realtime
    };
    let mut engine = Engine::new(
        mode,
        EngineConfig {
            rate: args.rate,
            ..Default::default()
        },
    );

    let recorder = RecordingHost::new(engine.timeline());
    let host: Box<dyn AudioHost> = match args.midi_device {
        Some(port) => midi_host(port, &engine)?,
        None => Box::new(recorder.clone()),
    };

    let seq = RitualSequencer::new(engine.timeline(), host)
        .with_catalog(catalog)
        .with_config(config)
        .with_speech(LogSpeech::default());
    seq.initialize();
    if !seq.is_available() {
        bail!("no audio output available");
    }

    let done = seq.play_ritual(&args.name);
    match mode {
        ClockMode::Offline => {
            engine.run_offline_to_idle();
        }
        ClockMode::Realtime => engine.run_until_idle(),
    }
    if !done.is_complete() {
        bail!("ritual '{}' did not complete", args.name);
    }
    seq.shutdown();

    if args.midi_device.is_none() {
        println!("{:>9} {:>9} {:>8}  ENVELOPE", "START", "FREQ", "LENGTH");
        for tone in recorder.tones() {
            let length = tone
                .spec
                .length_ms
                .map_or_else(|| "held".to_string(), |l| format!("{l} ms"));
            println!(
                "{:>9} {:>9} {:>8}  {:?}",
                format!("{:.0} ms", tone.started_ms),
                format!("{:.0} Hz", tone.spec.frequency_hz),
                length,
                tone.spec.envelope
            );
        }
    }
    println!("ritual '{}' complete at {:.0} ms", args.name, engine.now_ms());
    Ok(())
}

#[cfg(feature = "midi")]
fn midi_host(port: usize, engine: &Engine) -> Result<Box<dyn AudioHost>> {
    Ok(Box::new(oracle_temple::platform::midi::MidiHost::new(port, engine.timeline())))
}

#[cfg(not(feature = "midi"))]
fn midi_host(_port: usize, _engine: &Engine) -> Result<Box<dyn AudioHost>> {
    bail!("built without MIDI support; rebuild with `--features midi`")
}

#[cfg(feature = "midi")]
fn list_devices() -> Result<()> {
    let ports = oracle_temple::platform::midi::list_ports().context("failed to enumerate MIDI ports")?;
    if ports.is_empty() {
        println!("No MIDI output devices found.");
        return Ok(());
    }
    println!("Available MIDI output devices:");
    for (i, name) in ports.iter().enumerate() {
        println!("  {i}: {name}");
    }
    Ok(())
}

#[cfg(not(feature = "midi"))]
fn list_devices() -> Result<()> {
    bail!("built without MIDI support; rebuild with `--features midi`")
}

fn check_accessibility(snapshot: &Path) -> Result<()> {
    let page = Document::load(snapshot)
        .with_context(|| format!("failed to load page snapshot {}", snapshot.display()))?;
    let report = validate_temple_accessibility(&page);
    report.log();
    println!("{report}");
    Ok(())
}
