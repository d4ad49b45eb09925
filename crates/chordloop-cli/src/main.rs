//! chordloop: generative chord and arpeggio sequencer

mod config;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use chordloop_core::{build_sequence, ArpMode, ChordDictionary, ChordSpec, ChordTable, TICKS_PER_MEASURE};
use chordloop_services::{render_to_wav, AudioEngine, LivePlayer, NativeEngine, RecordingEngine, Session};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{config_path, load_config, load_config_from, save_config, AppConfig};

#[derive(Parser)]
#[command(name = "chordloop")]
#[command(about = "Layered arpeggios over a looping chord progression", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the session tempo
    #[arg(long, global = true)]
    bpm: Option<f64>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the session to a WAV file
    Render {
        /// Length in measures
        #[arg(short, long, default_value = "16")]
        measures: u64,

        /// Output WAV file path
        #[arg(short, long, default_value = "chordloop.wav")]
        out: PathBuf,

        /// Sample rate in Hz (defaults to the config value)
        #[arg(short, long)]
        sample_rate: Option<u32>,
    },

    /// Play the session on the default output device
    Play {
        /// How long to play
        #[arg(short, long, default_value = "60")]
        seconds: f64,
    },

    /// Print the notes the session would fire, without audio
    Trace {
        /// Length in measures
        #[arg(short, long, default_value = "4")]
        measures: u64,
    },

    /// List known chord names
    Chords,

    /// Print the arpeggio for one chord
    Arp {
        chord: String,
        note: String,
        octave: i8,
        #[arg(default_value = "up")]
        mode: ArpMode,
    },

    /// Print the effective config, optionally saving it
    Config {
        /// Write it to the config path
        #[arg(long)]
        write: bool,
    },
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "chordloop=debug" } else { "chordloop=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();
    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config(),
    };
    if let Some(bpm) = cli.bpm {
        if !(bpm.is_finite() && bpm > 0.0) {
            bail!("tempo must be positive, got {bpm}");
        }
        config.session.bpm = bpm;
    }
    Ok(config)
}

fn build_session<E: AudioEngine>(engine: E, config: &AppConfig) -> Session<E> {
    let mut session = Session::new(engine, config.session.clone());
    for voice in config.voices_or_preset() {
        session.add_voice(voice);
    }
    session
}

fn render(config: &AppConfig, measures: u64, out: &Path, sample_rate: Option<u32>) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(sr) = sample_rate {
        config.session.sample_rate = sr;
    }
    let engine = NativeEngine::new(config.session.sample_rate);
    let mut session = build_session(engine, &config);
    let stats = render_to_wav(&mut session, measures, out)
        .with_context(|| format!("rendering to {}", out.display()))?;
    println!(
        "Wrote {} ({} frames, {} notes, {} chord changes)",
        out.display(),
        stats.frames,
        stats.notes,
        stats.progression_ticks
    );
    Ok(())
}

fn play_length(seconds: f64) -> anyhow::Result<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(length) => Ok(length),
        Err(_) => bail!("play length must be a finite, non-negative number of seconds, got {seconds}"),
    }
}

fn play(config: &AppConfig, seconds: f64) -> anyhow::Result<()> {
    let length = play_length(seconds)?;
    let engine = NativeEngine::new(config.session.sample_rate);
    let session = build_session(engine, config);
    let player = LivePlayer::start(session)?;
    player.play();

    let deadline = Instant::now().checked_add(length).context("play length is too long")?;
    let mut last_clock = 0;
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(100));
        let clock = player.status().clock();
        if clock != last_clock {
            last_clock = clock;
            info!(clock, cursor = player.status().cursor(), "Chord change");
        }
    }

    player.stop();
    // let the release tails ring
    thread::sleep(Duration::from_millis(300));
    let skipped = player.status().skipped_orphans();
    player.shutdown();
    println!("Played {seconds:.0}s, {last_clock} chord changes, {skipped} skipped notes");
    Ok(())
}

fn trace(config: &AppConfig, measures: u64) {
    let mut session = build_session(RecordingEngine::new(), config);
    session.play();
    session.advance(measures * TICKS_PER_MEASURE);
    for t in session.engine().triggers() {
        println!("{:>9.3}s  {:<9} {:<5} {:.3}s", t.time, t.synth.to_string(), t.pitch.to_string(), t.duration);
    }
    println!(
        "{} notes, {} chord changes, last chord {}",
        session.engine().triggers().len(),
        session.clock(),
        session.current_chord().unwrap_or("-")
    );
}

fn arp(chord: &str, note: &str, octave: i8, mode: ArpMode) {
    let table = ChordTable::new();
    let sequence = build_sequence(&table, &ChordSpec::new(chord, note, octave), mode);
    if sequence.is_empty() {
        println!("(no tones for {chord} on {note}{octave})");
        return;
    }
    let names: Vec<String> = sequence.iter().map(ToString::to_string).collect();
    println!("{}", names.join(" "));
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let config = resolve_config(&cli)?;

    match &cli.command {
        Commands::Render {
            measures,
            out,
            sample_rate,
        } => render(&config, *measures, out, *sample_rate)?,
        Commands::Play { seconds } => play(&config, *seconds)?,
        Commands::Trace { measures } => trace(&config, *measures),
        Commands::Chords => {
            for name in ChordTable::new().chord_names() {
                println!("{name}");
            }
        }
        Commands::Arp {
            chord,
            note,
            octave,
            mode,
        } => arp(chord, note, *octave, *mode),
        Commands::Config { write } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if *write {
                let path = cli.config.clone().unwrap_or_else(config_path);
                save_config(&config, &path)?;
                info!(path = %path.display(), "Saved config");
            }
        }
    }
    Ok(())
}
