//! Sample-rate conversion using rubato.
//!
//! The conversion itself is delegated to rubato's windowed-sinc and
//! polynomial resamplers; this module wraps them in a strategy selected once
//! at preprocessor construction: identity when the output rate matches the
//! input rate (or is unset), a real rate converter otherwise.

use rubato::{
    FastFixedIn, PolynomialDegree, Resampler as RubatoResampler, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::error::{PreprocessError, Result};

const CHUNK_SIZE: usize = 1024;

/// Resampling quality preset.
#[derive(Debug, Clone, Copy, Default)]
pub enum ResampleQuality {
    /// Cubic polynomial interpolation, fastest.
    Fast,
    /// Windowed sinc, balanced speed and quality.
    #[default]
    Normal,
    /// Windowed sinc with a longer kernel, slowest.
    High,
}

/// Rate-conversion strategy fixed at construction time.
#[derive(Debug, Clone, Copy)]
pub enum ResampleStrategy {
    /// Output rate equals input rate (or was unset): pass samples through.
    Identity,
    /// Real sample-rate conversion.
    Convert {
        /// Source rate in Hz.
        from: u32,
        /// Target rate in Hz.
        to: u32,
        /// Quality preset for the conversion.
        quality: ResampleQuality,
    },
}

impl ResampleStrategy {
    /// Select a strategy for the given rate pairing.
    pub fn select(input_sr: u32, output_sr: Option<u32>) -> Self {
        match output_sr {
            Some(to) if to != input_sr => ResampleStrategy::Convert {
                from: input_sr,
                to,
                quality: ResampleQuality::default(),
            },
            _ => ResampleStrategy::Identity,
        }
    }

    /// The sample rate of this strategy's output for the given input rate.
    pub fn output_rate(&self, input_sr: u32) -> u32 {
        match self {
            ResampleStrategy::Identity => input_sr,
            ResampleStrategy::Convert { to, .. } => *to,
        }
    }

    /// Apply the strategy to a mono waveform.
    ///
    /// `Identity` is exact (a plain copy); `Convert` runs a fresh rubato
    /// resampler, so repeated calls are independent and thread-safe.
    pub fn apply(&self, samples: &[f32]) -> Result<Vec<f32>> {
        match *self {
            ResampleStrategy::Identity => Ok(samples.to_vec()),
            ResampleStrategy::Convert { from, to, quality } => {
                resample_with_quality(samples, from, to, quality)
            }
        }
    }
}

/// Resample a mono waveform with the default quality preset.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    resample_with_quality(samples, from, to, ResampleQuality::default())
}

/// Resample a mono waveform with an explicit quality preset.
pub fn resample_with_quality(
    samples: &[f32],
    from: u32,
    to: u32,
    quality: ResampleQuality,
) -> Result<Vec<f32>> {
    if from == 0 || to == 0 {
        return Err(PreprocessError::InvalidInput(
            "sample rates must be positive".to_string(),
        ));
    }
    if from == to {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let ratio = to as f64 / from as f64;
    debug!(from, to, ratio, ?quality, "resampling");

    match quality {
        ResampleQuality::Fast => {
            let mut resampler =
                FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, CHUNK_SIZE, 1)
                    .map_err(|e| PreprocessError::Resample(e.to_string()))?;
            process_chunks(&mut resampler, samples)
        }
        ResampleQuality::Normal | ResampleQuality::High => {
            let sinc_len = if matches!(quality, ResampleQuality::High) {
                256
            } else {
                128
            };
            let params = SincInterpolationParameters {
                sinc_len,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: sinc_len,
                window: WindowFunction::BlackmanHarris2,
            };
            let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
                .map_err(|e| PreprocessError::Resample(e.to_string()))?;
            process_chunks(&mut resampler, samples)
        }
    }
}

/// Feed the waveform through the resampler in fixed-size chunks, padding the
/// final chunk with zeros.
fn process_chunks<R: RubatoResampler<f32>>(resampler: &mut R, samples: &[f32]) -> Result<Vec<f32>> {
    let mut output = Vec::new();
    let mut pos = 0;

    while pos < samples.len() {
        let end = (pos + CHUNK_SIZE).min(samples.len());
        let chunk = &samples[pos..end];

        let input: Vec<Vec<f32>> = if chunk.len() < CHUNK_SIZE {
            let mut padded = chunk.to_vec();
            padded.resize(CHUNK_SIZE, 0.0);
            vec![padded]
        } else {
            vec![chunk.to_vec()]
        };

        let result = resampler
            .process(&input, None)
            .map_err(|e| PreprocessError::Resample(e.to_string()))?;
        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }

        pos += CHUNK_SIZE;
    }

    Ok(output)
}
