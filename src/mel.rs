//! Log-mel spectrogram computation.
//!
//! Matches the librosa conventions used by common TTS training recipes:
//! centered STFT with reflect padding, Hann window, magnitude (not power)
//! spectrum, Slaney mel scale with Slaney area normalization, and
//! `log10(max(eps, mel))` compression.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

use crate::error::{PreprocessError, Result};
use candle_core::{Device, Tensor};

/// Default mel filterbank frequency floor in Hz.
pub const DEFAULT_FMIN: f32 = 40.0;

/// Default mel filterbank frequency ceiling in Hz (clamped to Nyquist).
pub const DEFAULT_FMAX: f32 = 8000.0;

/// Floor applied before the base-10 logarithm so silent frames produce
/// `log10(eps)` instead of negative infinity.
pub const LOG_FLOOR_EPS: f32 = 1e-10;

/// Configuration for log-mel spectrogram computation.
#[derive(Debug, Clone)]
pub struct MelConfig {
    /// Sample rate of input audio.
    pub sample_rate: u32,
    /// FFT window size.
    pub n_fft: usize,
    /// Hop length between frames.
    pub hop_length: usize,
    /// Number of mel bands.
    pub n_mels: usize,
    /// Minimum frequency for the mel filterbank.
    pub fmin: f32,
    /// Maximum frequency for the mel filterbank; `None` means Nyquist.
    /// Values above Nyquist are clamped.
    pub fmax: Option<f32>,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            n_fft: 1024,
            hop_length: 256,
            n_mels: 80,
            fmin: DEFAULT_FMIN,
            fmax: Some(DEFAULT_FMAX),
        }
    }
}

impl MelConfig {
    /// Config with the crate defaults at a different sample rate.
    pub fn for_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }
}

/// Log-mel spectrogram extractor with a precomputed filterbank and window.
///
/// A pure function of its inputs after construction: identical samples
/// always produce identical output, and computation takes `&self`, so one
/// extractor may be shared across threads.
pub struct MelSpectrogram {
    config: MelConfig,
    /// Precomputed mel filterbank, `[n_mels][n_fft / 2 + 1]`.
    mel_basis: Vec<Vec<f32>>,
    /// Precomputed periodic Hann window of length `n_fft`.
    window: Vec<f32>,
}

impl MelSpectrogram {
    /// Create a new extractor, validating the configuration.
    pub fn new(config: MelConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(PreprocessError::InvalidInput(
                "sample rate must be positive".to_string(),
            ));
        }
        if config.n_fft == 0 || config.hop_length == 0 || config.n_mels == 0 {
            return Err(PreprocessError::InvalidInput(
                "n_fft, hop_length and n_mels must be positive".to_string(),
            ));
        }
        if config.hop_length > config.n_fft {
            return Err(PreprocessError::InvalidInput(format!(
                "hop_length {} exceeds n_fft {}",
                config.hop_length, config.n_fft
            )));
        }

        let nyquist = config.sample_rate as f32 / 2.0;
        let fmax = config.fmax.unwrap_or(nyquist).min(nyquist);
        let mel_basis = mel_filterbank(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            config.fmin,
            fmax,
        );
        let window = hann_window(config.n_fft);

        Ok(Self {
            config,
            mel_basis,
            window,
        })
    }

    /// The configuration this extractor was built with.
    pub fn config(&self) -> &MelConfig {
        &self.config
    }

    /// Compute the log-mel spectrogram of a mono waveform.
    ///
    /// Output is mel-major: `out[m][t]` is mel band `m` at frame `t`, with
    /// exactly `1 + samples.len() / hop_length` frames (centered STFT).
    /// Values are `log10` magnitudes floored at [`LOG_FLOOR_EPS`].
    pub fn compute(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>> {
        if samples.is_empty() {
            return Err(PreprocessError::InvalidInput(
                "cannot compute a spectrogram of an empty waveform".to_string(),
            ));
        }

        let spectrum = self.stft_magnitudes(samples);

        // Frames-major mel energies, then log-compress into mel-major output.
        let n_frames = spectrum.len();
        let mut out = vec![vec![0.0f32; n_frames]; self.config.n_mels];
        for (t, frame) in spectrum.iter().enumerate() {
            for (m, filter) in self.mel_basis.iter().enumerate() {
                let energy: f32 = filter
                    .iter()
                    .zip(frame.iter())
                    .map(|(w, mag)| w * mag)
                    .sum();
                out[m][t] = energy.max(LOG_FLOOR_EPS).log10();
            }
        }
        Ok(out)
    }

    /// Compute the log-mel spectrogram as a candle tensor of shape
    /// `[n_mels, n_frames]`.
    pub fn compute_tensor(&self, samples: &[f32], device: &Device) -> Result<Tensor> {
        let mel = self.compute(samples)?;
        let n_mels = mel.len();
        let n_frames = mel.first().map_or(0, |row| row.len());
        let flat: Vec<f32> = mel.into_iter().flatten().collect();
        Ok(Tensor::from_vec(flat, (n_mels, n_frames), device)?)
    }

    /// Number of STFT frames produced for an input of the given length.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        1 + num_samples / self.config.hop_length
    }

    /// Centered STFT magnitude spectrum, frames-major,
    /// `[n_frames][n_fft / 2 + 1]`.
    ///
    /// The signal is reflect-padded by `n_fft / 2` on each side (librosa's
    /// `center=True` convention), giving `1 + len / hop_length` frames.
    fn stft_magnitudes(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let padded = reflect_pad(samples, n_fft / 2);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);

        let n_frames = (padded.len() - n_fft) / hop + 1;
        let n_bins = n_fft / 2 + 1;
        let mut frames = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0f32); n_fft];

        for t in 0..n_frames {
            let start = t * hop;
            for (j, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + j] * self.window[j], 0.0);
            }
            fft.process(&mut buffer);
            frames.push(buffer[..n_bins].iter().map(|c| c.norm()).collect());
        }
        frames
    }
}

/// Reflect-pad a signal by `pad` samples on each side, mirroring around the
/// first and last sample. Indices are clamped for signals shorter than the
/// pad width.
fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let n = samples.len();
    let mut out = Vec::with_capacity(n + 2 * pad);
    for i in (1..=pad).rev() {
        out.push(samples[i.min(n - 1)]);
    }
    out.extend_from_slice(samples);
    for i in 0..pad {
        let idx = if n >= 2 + i { n - 2 - i } else { 0 };
        out.push(samples[idx]);
    }
    out
}

/// Periodic Hann window.
fn hann_window(length: usize) -> Vec<f32> {
    (0..length)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / length as f32).cos()))
        .collect()
}

/// Convert frequency in Hz to mel (Slaney / O'Shaughnessy): linear below
/// 1 kHz, logarithmic above. This is the librosa default (`htk=False`).
fn hz_to_mel(f: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    const LOGSTEP: f32 = 0.068_751_74; // ln(6.4) / 27

    if f < MIN_LOG_HZ {
        f / F_SP
    } else {
        MIN_LOG_MEL + (f / MIN_LOG_HZ).ln() / LOGSTEP
    }
}

/// Convert mel to Hz (Slaney / O'Shaughnessy).
fn mel_to_hz(m: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
    const LOGSTEP: f32 = 0.068_751_74;

    if m < MIN_LOG_MEL {
        m * F_SP
    } else {
        MIN_LOG_HZ * ((m - MIN_LOG_MEL) * LOGSTEP).exp()
    }
}

/// Build a triangular mel filterbank matrix, `[n_mels][n_fft / 2 + 1]`,
/// with Slaney area normalization (matches `librosa.filters.mel` defaults).
fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;

    // n_mels + 2 edge frequencies, equally spaced on the mel scale.
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let hz_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
        .collect();

    let bin_hz: Vec<f32> = (0..n_bins)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let mut basis = vec![vec![0.0f32; n_bins]; n_mels];
    for (m, filter) in basis.iter_mut().enumerate() {
        let (lower, center, upper) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
        // Slaney normalization keeps per-channel energy roughly constant.
        let enorm = if upper > lower { 2.0 / (upper - lower) } else { 0.0 };

        for (j, &freq) in bin_hz.iter().enumerate() {
            let weight = if freq >= lower && freq <= center && center > lower {
                (freq - lower) / (center - lower)
            } else if freq > center && freq <= upper && upper > center {
                (upper - freq) / (upper - center)
            } else {
                0.0
            };
            filter[j] = weight * enorm;
        }
    }
    basis
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn sine(freq: f32, sample_rate: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = MelConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.n_fft, 1024);
        assert_eq!(config.hop_length, 256);
        assert_eq!(config.n_mels, 80);
        assert!((config.fmin - 40.0).abs() < 1e-6);
        assert_eq!(config.fmax, Some(8000.0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(MelSpectrogram::new(MelConfig {
            sample_rate: 0,
            ..Default::default()
        })
        .is_err());
        assert!(MelSpectrogram::new(MelConfig {
            hop_length: 0,
            ..Default::default()
        })
        .is_err());
        assert!(MelSpectrogram::new(MelConfig {
            hop_length: 2048,
            n_fft: 1024,
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(256);
        assert_eq!(window.len(), 256);
        assert!(window[0] < 1e-6);
        assert!(window[128] > 0.99);
        assert!((window[64] - window[192]).abs() < 1e-5);
    }

    #[test]
    fn test_filterbank_shape_and_nonnegativity() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        assert_eq!(mel.mel_basis.len(), 80);
        assert_eq!(mel.mel_basis[0].len(), 513); // 1024 / 2 + 1
        for filter in &mel.mel_basis {
            assert!(filter.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_fmax_clamped_to_nyquist() {
        // 8 kHz ceiling exceeds Nyquist at 8 kHz sample rate; must not panic
        // and must still produce valid filters.
        let mel = MelSpectrogram::new(MelConfig {
            sample_rate: 8000,
            ..Default::default()
        })
        .unwrap();
        assert!(mel
            .mel_basis
            .iter()
            .any(|f| f.iter().any(|&w| w > 0.0)));
    }

    #[test]
    fn test_frame_count_formula() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        for len in [1024usize, 4096, 16000, 16001] {
            let spec = mel.compute(&sine(440.0, 16000, len)).unwrap();
            let expected = 1 + len / 256;
            assert_eq!(spec[0].len(), expected, "length {len}");
            assert_eq!(spec[0].len(), mel.num_frames(len));
        }
    }

    #[test]
    fn test_one_second_at_16k_is_80_by_63() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        let spec = mel.compute(&sine(440.0, 16000, 16000)).unwrap();
        assert_eq!(spec.len(), 80);
        assert_eq!(spec[0].len(), 63);
    }

    #[test]
    fn test_silence_hits_the_log_floor() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        let spec = mel.compute(&vec![0.0f32; 4096]).unwrap();
        let floor = LOG_FLOOR_EPS.log10();
        for row in &spec {
            for &v in row {
                assert!((v - floor).abs() < 1e-6);
                assert!(v.is_finite());
            }
        }
    }

    #[test]
    fn test_tone_energy_lands_in_matching_band() {
        // A 1 kHz tone should put its loudest mel band well above the floor
        // and well above the bands near the top of the range.
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        let spec = mel.compute(&sine(1000.0, 16000, 16000)).unwrap();

        let band_peaks: Vec<f32> = spec
            .iter()
            .map(|row| row.iter().copied().fold(f32::NEG_INFINITY, f32::max))
            .collect();
        let loudest = band_peaks
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(loudest > 10 && loudest < 70, "peak band {loudest}");
    }

    #[test]
    fn test_determinism() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        let samples = sine(440.0, 16000, 8000);
        let a = mel.compute(&samples).unwrap();
        let b = mel.compute(&samples).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input_is_invalid() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        assert!(matches!(
            mel.compute(&[]),
            Err(PreprocessError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_compute_tensor_shape() {
        let mel = MelSpectrogram::new(MelConfig::default()).unwrap();
        let tensor = mel
            .compute_tensor(&sine(440.0, 16000, 16000), &Device::Cpu)
            .unwrap();
        assert_eq!(tensor.dims(), &[80, 63]);
    }

    #[test]
    fn test_reflect_pad() {
        let padded = reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_reflect_pad_short_signal() {
        // Pad wider than the signal clamps instead of panicking.
        let padded = reflect_pad(&[1.0, 2.0], 4);
        assert_eq!(padded.len(), 10);
    }
}
