// Canon generator CLI entry point.
//
// Builds a config (defaults, then an optional JSON file, then flag
// overrides), generates a canon and writes it to MIDI.
// The pipeline: validation -> chord progression -> skeleton solve ->
// elaboration solve -> MIDI output.
//
// Usage:
//   cargo run -p canonic_music -- [output.mid] [--config FILE] [--form FORM]
//     [--bars N] [--voices N] [--max-jump N] [--low P] [--high P]
//     [--tonic PC] [--minor] [--seed N] [--tempo BPM] [--json FILE]
//
// Forms: round, crab, palindrome
//
// Set RUST_LOG=debug to see solver statistics.

use canonic_music::canon::{Canon, pitch_class_name};
use canonic_music::config::{CanonForm, Config};
use canonic_music::key::{Key, Mode};
use canonic_music::midi;
use canonic_prng::CanonRng;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, about = "Generate a round, crab canon or palindrome", long_about = None)]
struct Args {
    /// MIDI file to write
    #[clap(default_value = "canon.mid")]
    output: PathBuf,

    /// JSON config file; flags below override its values
    #[clap(long)]
    config: Option<PathBuf>,

    /// Canon form: round, crab or palindrome
    #[clap(long)]
    form: Option<CanonForm>,

    /// Number of bars in the melody
    #[clap(long)]
    bars: Option<usize>,

    /// Number of voices (1-4)
    #[clap(long)]
    voices: Option<usize>,

    /// Largest leap between root notes, in semitones
    #[clap(long)]
    max_jump: Option<u8>,

    /// Lowest MIDI pitch
    #[clap(long)]
    low: Option<u8>,

    /// Highest MIDI pitch
    #[clap(long)]
    high: Option<u8>,

    /// Tonic pitch class (0 = C, 2 = D, ...)
    #[clap(long)]
    tonic: Option<u8>,

    /// Use the natural minor mode
    #[clap(long)]
    minor: bool,

    /// Random seed; omit for a time-based seed
    #[clap(long)]
    seed: Option<u64>,

    /// Tempo in beats per minute
    #[clap(long, default_value_t = 100)]
    tempo: u16,

    /// Also write the canon as JSON to this file
    #[clap(long)]
    json: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => Config::from_json(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    if let Some(form) = args.form {
        config.form = form;
    }
    if let Some(bars) = args.bars {
        config.bars = bars;
    }
    if let Some(voices) = args.voices {
        config.voices = voices;
    }
    if let Some(max_jump) = args.max_jump {
        config.max_jump = max_jump;
    }
    if let Some(low) = args.low {
        config.low = low;
    }
    if let Some(high) = args.high {
        config.high = high;
    }
    if args.tonic.is_some() || args.minor {
        let tonic = args.tonic.unwrap_or(config.key.tonic);
        let mode = if args.minor { Mode::Minor } else { config.key.mode };
        config.key = Key::new(tonic, mode);
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = build_config(&args)?;

    println!("=== Canon Generator ===");
    println!("Output: {}", args.output.display());
    println!("Form: {}", config.form);
    println!(
        "Key: {} (tonic = {})",
        config.key,
        pitch_class_name(config.key.tonic)
    );
    println!("Range: {}..={}", config.low, config.high);
    println!(
        "Bars: {} of {} beats, {} voice(s)",
        config.bars, config.beats_per_bar, config.voices
    );
    println!("Tempo: {} BPM", args.tempo);
    if let Some(s) = args.seed {
        println!("Seed: {}", s);
    }
    println!();

    let mut rng = match args.seed {
        Some(s) => CanonRng::new(s),
        None => CanonRng::from_time(),
    };

    println!("[1/2] Solving skeleton and elaboration...");
    let canon = Canon::generate(&config, &mut rng)?;
    print!("{}", canon.summary());

    if let Some(path) = &args.json {
        std::fs::write(path, canon.to_json()?)?;
        println!("  Wrote JSON to {}", path.display());
    }

    println!("[2/2] Writing MIDI to {}...", args.output.display());
    std::fs::write(&args.output, midi::encode(&canon, args.tempo)?)?;
    let beats = canon.duration();
    let seconds = *beats.numer() as f64 / *beats.denom() as f64 * 60.0 / f64::from(args.tempo.max(1));
    println!("  Done! Duration: {:.0}s", seconds);

    println!();
    println!("Play with: timidity {} (or any MIDI player)", args.output.display());
    Ok(())
}
