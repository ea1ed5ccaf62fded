//! forcetrack - play and inspect tracker songs from the command line

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use forcetrack::audio::device::output_devices;
use forcetrack::{AudioDevice, Config, Mixer, PlaybackEvent, SampleBank, Sequencer, SongDocument};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Rate the mixer starts at until a device tells it otherwise.
const FALLBACK_SAMPLE_RATE: u32 = 44_100;
/// How long sources are left to ring after playback stops.
const RELEASE_TAIL: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "forcetrack")]
#[command(about = "Grid step sequencer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a song through the audio device
    Play {
        song: PathBuf,

        /// Play only this pattern instead of the whole song
        #[arg(short, long)]
        pattern: Option<usize>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Summarise a song file
    Info { song: PathBuf },
    /// Write an empty song
    New {
        output: PathBuf,

        #[arg(short, long, default_value = "1")]
        patterns: usize,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List output devices
    Devices,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Commands::Play {
            song,
            pattern,
            config,
        } => play(&song, pattern, &Config::load_or_default(config.as_deref())),
        Commands::Info { song } => print_info(&song),
        Commands::New {
            output,
            patterns,
            config,
        } => new_song(&output, patterns, &Config::load_or_default(config.as_deref())),
        Commands::Devices => {
            for name in output_devices() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn play(path: &Path, pattern: Option<usize>, config: &Config) -> anyhow::Result<()> {
    let document =
        SongDocument::load(path).with_context(|| format!("failed to open song {path:?}"))?;

    let mixer = Mixer::new(FALLBACK_SAMPLE_RATE);
    let device = AudioDevice::open(&mixer, config.audio.device.as_deref())
        .context("failed to open audio output")?;

    let mut sequencer = Sequencer::new(mixer);
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let requests = sequencer.load_document(document, base_dir);

    let mut bank = SampleBank::new();
    let mut pending = Some(bank.load(requests));

    let started = match pattern {
        Some(index) => sequencer.play_pattern(Some(index)),
        None => sequencer.play_song(),
    };
    if !started {
        bail!("nothing to play: song has {} patterns", sequencer.pattern_count());
    }

    let frame = Duration::from_millis(config.host.frame_interval_ms.max(1));
    let clock = Instant::now();

    while sequencer.is_playing() {
        if let Some(report) = pending.as_mut().and_then(|load| load.poll(&mut bank)) {
            info!(
                "samples ready: {} loaded, {} failed",
                report.loaded.len(),
                report.failed.len()
            );
            pending = None;
        }

        sequencer.tick(clock.elapsed().as_secs_f64() * 1000.0, &bank);

        for event in sequencer.poll_events() {
            match event {
                PlaybackEvent::PatternChanged(index) => println!("pattern {index}"),
                PlaybackEvent::Stopped => println!("stopped"),
                event => debug!("{event:?}"),
            }
        }

        thread::sleep(frame);
    }

    if let Some(load) = pending {
        warn!("{} samples still loading at exit", load.remaining());
    }

    thread::sleep(RELEASE_TAIL);
    drop(device);
    Ok(())
}

fn print_info(path: &Path) -> anyhow::Result<()> {
    let document =
        SongDocument::load(path).with_context(|| format!("failed to open song {path:?}"))?;

    println!("{} {}", document.format, document.version);
    println!("{} patterns", document.patterns.len());
    for (index, pattern) in document.patterns.iter().enumerate() {
        let notes: usize = pattern
            .tracks
            .iter()
            .map(|track| track.notes.iter().flatten().count())
            .sum();
        println!(
            "  {index:>3}: {} tracks x {} steps @ {} ({notes} notes)",
            pattern.tracks.len(),
            pattern.notes_per_track,
            pattern.tempo
        );
    }

    println!("{} samples", document.samples.len());
    for sample in &document.samples {
        let filename = sample
            .filename
            .as_deref()
            .map_or_else(|| "-".into(), |f| f.display().to_string());
        println!("  {}: {} ({filename})", sample.index, sample.name);
    }

    Ok(())
}

fn new_song(path: &Path, patterns: usize, config: &Config) -> anyhow::Result<()> {
    let patterns: Vec<_> = (0..patterns.max(1))
        .map(|_| config.pattern.new_pattern())
        .collect();

    SongDocument::from_patterns(&patterns)
        .save(path)
        .with_context(|| format!("failed to write song {path:?}"))?;

    println!("wrote {} patterns to {}", patterns.len(), path.display());
    Ok(())
}
