//! Audio buffers, channel handling, and WAV file I/O.

use std::path::Path;

use candle_core::{Device, Tensor};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{PreprocessError, Result};

/// A raw input waveform, either mono or multi-channel (channel-major).
///
/// Spectral analysis requires mono data, so every pipeline entry point
/// funnels through [`Waveform::to_mono`] first. Higher-dimensional audio is
/// unrepresentable by construction; the remaining shape errors (zero
/// channels, ragged channel lengths) surface as
/// [`PreprocessError::InvalidInput`].
#[derive(Debug, Clone)]
pub enum Waveform {
    /// A single channel of samples.
    Mono(Vec<f32>),
    /// One `Vec<f32>` per channel, all of equal length.
    MultiChannel(Vec<Vec<f32>>),
}

impl Waveform {
    /// Collapse to a single channel by averaging across channels.
    ///
    /// Idempotent: mono input is returned unchanged.
    pub fn to_mono(&self) -> Result<Vec<f32>> {
        match self {
            Waveform::Mono(samples) => Ok(samples.clone()),
            Waveform::MultiChannel(channels) => {
                let first_len = match channels.first() {
                    Some(ch) => ch.len(),
                    None => {
                        return Err(PreprocessError::InvalidInput(
                            "multi-channel waveform has no channels".to_string(),
                        ))
                    }
                };
                if channels.iter().any(|ch| ch.len() != first_len) {
                    return Err(PreprocessError::InvalidInput(
                        "channels have unequal lengths".to_string(),
                    ));
                }
                let scale = 1.0 / channels.len() as f32;
                let mono = (0..first_len)
                    .map(|i| channels.iter().map(|ch| ch[i]).sum::<f32>() * scale)
                    .collect();
                Ok(mono)
            }
        }
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        match self {
            Waveform::Mono(_) => 1,
            Waveform::MultiChannel(channels) => channels.len(),
        }
    }

    /// Number of sample frames per channel.
    pub fn len(&self) -> usize {
        match self {
            Waveform::Mono(samples) => samples.len(),
            Waveform::MultiChannel(channels) => channels.first().map_or(0, |ch| ch.len()),
        }
    }

    /// Whether the waveform contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<f32>> for Waveform {
    fn from(samples: Vec<f32>) -> Self {
        Waveform::Mono(samples)
    }
}

/// Mono audio buffer holding raw waveform data.
///
/// Samples are stored as 32-bit floats, nominally in the range \[-1.0, 1.0\].
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono audio samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new audio buffer.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Peak absolute amplitude.
    pub fn peak(&self) -> f32 {
        self.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
    }

    /// Convert to a 1-D candle tensor.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::new(self.samples.as_slice(), device)?)
    }

    /// Save to a 16-bit WAV file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_wav(path, &self.samples, self.sample_rate)
    }
}

/// Load a WAV file, preserving its channel layout.
///
/// Returns the waveform (mono or channel-major multi-channel) and the file's
/// sample rate. Integer formats are rescaled to \[-1.0, 1.0\].
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<(Waveform, u32)> {
    let reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let waveform = if channels <= 1 {
        Waveform::Mono(interleaved)
    } else {
        let frames = interleaved.len() / channels;
        let mut split = vec![Vec::with_capacity(frames); channels];
        for (i, &sample) in interleaved.iter().enumerate() {
            split[i % channels].push(sample);
        }
        Waveform::MultiChannel(split)
    };

    Ok((waveform, sample_rate))
}

/// Save mono samples to a 16-bit WAV file.
pub fn save_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
