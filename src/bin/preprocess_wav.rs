//! CLI tool for cleaning a WAV file for TTS training.
//!
//! Runs the full preprocessing chain (mono mixdown, loudness normalization,
//! leading-silence trimming, resampling) and writes the cleaned waveform.
//! Optionally prints the log-mel spectrogram shape for a quick sanity check.
//!
//! Usage:
//!     cargo run --bin preprocess_wav -- input.wav
//!     cargo run --bin preprocess_wav -- input.wav -o cleaned.wav --output-sr 16000

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tts_preprocess::{load_wav, AudioPreprocessor, PreprocessorConfig};

/// Clean a WAV file for speech-synthesis training
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input WAV file
    input: PathBuf,

    /// Output WAV file (defaults to <input stem>_cleaned.wav)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target sample rate in Hz (defaults to the input file's rate)
    #[arg(long)]
    output_sr: Option<u32>,

    /// Number of mel buckets
    #[arg(long, default_value_t = 80)]
    n_mels: usize,

    /// STFT hop length in samples
    #[arg(long, default_value_t = 256)]
    hop_length: usize,

    /// STFT window size in samples
    #[arg(long, default_value_t = 1024)]
    n_fft: usize,

    /// Also compute the log-mel spectrogram and print its shape
    #[arg(long)]
    mel: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let (wave, input_sr) = load_wav(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    tracing::info!(
        path = %args.input.display(),
        sample_rate = input_sr,
        channels = wave.num_channels(),
        samples = wave.len(),
        "loaded input"
    );

    let ap = AudioPreprocessor::new(PreprocessorConfig {
        input_sr,
        output_sr: args.output_sr,
        melspec_buckets: args.n_mels,
        hop_length: args.hop_length,
        n_fft: args.n_fft,
    })?;

    let cleaned = ap.normalize_audio(&wave)?;

    let output = args.output.unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        args.input.with_file_name(format!("{stem}_cleaned.wav"))
    });
    cleaned
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({:.2}s at {} Hz, peak {:.3})",
        output.display(),
        cleaned.duration(),
        cleaned.sample_rate,
        cleaned.peak()
    );

    if args.mel {
        let mel = ap.audio_to_mel_spec(&wave, true)?;
        let n_frames = mel.first().map_or(0, |row| row.len());
        println!("Log-mel spectrogram: {} mels x {} frames", mel.len(), n_frames);
    }

    Ok(())
}
