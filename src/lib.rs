//! # tts-preprocess
//!
//! Single-pass audio preprocessing for speech-synthesis training data.
//! Given a raw waveform at an arbitrary input sample rate, the pipeline
//! produces:
//!
//! - a cleaned waveform: mono, loudness-normalized, leading silence trimmed,
//!   resampled to the configured output rate, and
//! - a log-mel spectrogram suitable as a TTS training target, computed from a
//!   mu-law round-tripped waveform to match a quantized-waveform model's
//!   training distribution.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tts_preprocess::{AudioPreprocessor, PreprocessorConfig};
//!
//! let (wave, input_sr) = tts_preprocess::load_wav("speech.wav")?;
//! let ap = AudioPreprocessor::new(PreprocessorConfig {
//!     input_sr,
//!     output_sr: Some(16000),
//!     ..Default::default()
//! })?;
//!
//! let cleaned = ap.normalize_audio(&wave)?;
//! cleaned.save("speech_cleaned.wav")?;
//!
//! let mel = ap.audio_to_mel_spec(&wave, true)?; // [n_mels][n_frames]
//! ```
//!
//! ## Pipeline
//!
//! The cleaning chain is order-significant:
//!
//! ```text
//! raw → mono mixdown → loudness normalize (-30 LUFS, then peak)
//!     → trim leading silence → resample → (mu-law round trip) → log-mel
//! ```
//!
//! Defaults (`n_fft` 1024, `hop_length` 256, 80 mel buckets) are tuned for a
//! 16 kHz signal; other rates may need other values. Doubling the rate
//! should double `hop_length` and `n_fft` to keep frame timing comparable.
//!
//! ## Concurrency
//!
//! An [`AudioPreprocessor`] is immutable after construction and every
//! operation takes `&self`, so one instance can be shared across worker
//! threads. Each call is an independent, deterministic computation.

pub mod error;
pub mod io;
pub mod loudness;
pub mod mel;
pub mod mulaw;
pub mod resample;
pub mod vad;

use candle_core::{Device, Tensor};
use tracing::debug;

pub use error::{PreprocessError, Result};
pub use io::{load_wav, save_wav, AudioBuffer, Waveform};
pub use loudness::{LoudnessMeter, TARGET_LUFS};
pub use mel::{MelConfig, MelSpectrogram, LOG_FLOOR_EPS};
pub use resample::{resample, ResampleQuality, ResampleStrategy};
pub use vad::SilenceTrimmer;

/// Constructor-time configuration for [`AudioPreprocessor`], immutable after
/// construction.
#[derive(Debug, Clone)]
pub struct PreprocessorConfig {
    /// Sample rate of incoming audio, in Hz.
    pub input_sr: u32,
    /// Target sample rate for cleaned audio; `None` keeps the input rate.
    pub output_sr: Option<u32>,
    /// Number of mel buckets (default: 80).
    pub melspec_buckets: usize,
    /// STFT hop length in samples (default: 256).
    pub hop_length: usize,
    /// STFT window size in samples (default: 1024).
    pub n_fft: usize,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            input_sr: 16000,
            output_sr: None,
            melspec_buckets: 80,
            hop_length: 256,
            n_fft: 1024,
        }
    }
}

impl PreprocessorConfig {
    /// Defaults with an explicit sample-rate pairing.
    pub fn for_rates(input_sr: u32, output_sr: Option<u32>) -> Self {
        Self {
            input_sr,
            output_sr,
            ..Self::default()
        }
    }
}

/// A waveform representation returned by
/// [`AudioPreprocessor::audio_to_wave_tensor`]: either float samples or
/// 8-bit mu-law codes, each tagged with its sample rate.
#[derive(Debug, Clone)]
pub enum WaveTensor {
    /// Float samples in \[-1, 1\].
    Float(AudioBuffer),
    /// Mu-law codes in \[0, 255\].
    MuLaw {
        /// Quantized amplitude codes.
        codes: Vec<u8>,
        /// Sample rate the codes were produced at, in Hz.
        sample_rate: u32,
    },
}

impl WaveTensor {
    /// Sample rate of the contained waveform.
    pub fn sample_rate(&self) -> u32 {
        match self {
            WaveTensor::Float(buffer) => buffer.sample_rate,
            WaveTensor::MuLaw { sample_rate, .. } => *sample_rate,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            WaveTensor::Float(buffer) => buffer.len(),
            WaveTensor::MuLaw { codes, .. } => codes.len(),
        }
    }

    /// Whether the waveform is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to a 1-D candle tensor (F32 for float samples, U8 for codes).
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        match self {
            WaveTensor::Float(buffer) => buffer.to_tensor(device),
            WaveTensor::MuLaw { codes, .. } => Ok(Tensor::new(codes.as_slice(), device)?),
        }
    }
}

/// Stateful configuration object owning the full preprocessing chain.
///
/// Built once per sample-rate pairing and reused across many waveforms.
/// All sub-operations (loudness meter, silence trimmer, resample strategy,
/// mel extractors) are constructed up front and read-only afterwards.
pub struct AudioPreprocessor {
    config: PreprocessorConfig,
    final_sr: u32,
    meter: LoudnessMeter,
    trimmer: SilenceTrimmer,
    strategy: ResampleStrategy,
    /// Mel extractor at the input rate.
    mel_input: MelSpectrogram,
    /// Mel extractor at the output rate, when it differs from the input rate.
    mel_output: Option<MelSpectrogram>,
}

impl AudioPreprocessor {
    /// Build a preprocessor, validating the configuration.
    pub fn new(config: PreprocessorConfig) -> Result<Self> {
        if config.input_sr == 0 {
            return Err(PreprocessError::InvalidInput(
                "input sample rate must be positive".to_string(),
            ));
        }
        if config.output_sr == Some(0) {
            return Err(PreprocessError::InvalidInput(
                "output sample rate must be positive".to_string(),
            ));
        }

        let strategy = ResampleStrategy::select(config.input_sr, config.output_sr);
        let final_sr = strategy.output_rate(config.input_sr);

        let mel_input = MelSpectrogram::new(Self::mel_config_for(&config, config.input_sr))?;
        let mel_output = if final_sr != config.input_sr {
            Some(MelSpectrogram::new(Self::mel_config_for(&config, final_sr))?)
        } else {
            None
        };

        let meter = LoudnessMeter::new(config.input_sr)?;

        debug!(
            input_sr = config.input_sr,
            final_sr,
            n_fft = config.n_fft,
            hop_length = config.hop_length,
            n_mels = config.melspec_buckets,
            "audio preprocessor ready"
        );

        Ok(Self {
            config,
            final_sr,
            meter,
            trimmer: SilenceTrimmer::default(),
            strategy,
            mel_input,
            mel_output,
        })
    }

    fn mel_config_for(config: &PreprocessorConfig, sample_rate: u32) -> MelConfig {
        MelConfig {
            sample_rate,
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            n_mels: config.melspec_buckets,
            ..MelConfig::default()
        }
    }

    /// Sample rate expected on input waveforms.
    pub fn input_rate(&self) -> u32 {
        self.config.input_sr
    }

    /// Sample rate of cleaned output waveforms.
    pub fn final_rate(&self) -> u32 {
        self.final_sr
    }

    /// Clean a waveform: mono mixdown, loudness normalization to -30 LUFS
    /// followed by peak normalization into \[-1, 1\], leading-silence
    /// trimming, and resampling to the output rate.
    ///
    /// The steps run in exactly that order. Degenerate all-zero input
    /// passes through each stage unchanged rather than failing (see
    /// [`loudness::normalize_loudness`] for the floor policy); empty input
    /// is rejected as invalid.
    pub fn normalize_audio(&self, audio: &Waveform) -> Result<AudioBuffer> {
        let mono = audio.to_mono()?;
        if mono.is_empty() {
            return Err(PreprocessError::InvalidInput(
                "cannot normalize an empty waveform".to_string(),
            ));
        }

        let leveled = loudness::normalize_loudness(&mono, &self.meter, TARGET_LUFS)?;
        let trimmed = self.trimmer.trim_leading(&leveled, self.config.input_sr);
        let resampled = self.strategy.apply(&trimmed)?;

        Ok(AudioBuffer::new(resampled, self.final_sr))
    }

    /// Compute a log-mel spectrogram of a mono waveform at an explicit
    /// sampling rate.
    ///
    /// Output is mel-major, shape `[melspec_buckets][1 + len / hop_length]`.
    /// Rates matching the configured input or output rate reuse the
    /// precomputed extractors; any other rate builds one on the fly.
    pub fn logmelfilterbank(&self, samples: &[f32], sampling_rate: u32) -> Result<Vec<Vec<f32>>> {
        if sampling_rate == self.config.input_sr {
            return self.mel_input.compute(samples);
        }
        if let Some(mel) = &self.mel_output {
            if sampling_rate == self.final_sr {
                return mel.compute(samples);
            }
        }
        let mel = MelSpectrogram::new(Self::mel_config_for(&self.config, sampling_rate))?;
        mel.compute(samples)
    }

    /// Log-mel spectrogram at the input sample rate.
    pub fn mel_spec_orig_sr(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>> {
        self.mel_input.compute(samples)
    }

    /// Log-mel spectrogram at the output sample rate.
    pub fn mel_spec_new_sr(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>> {
        match &self.mel_output {
            Some(mel) => mel.compute(samples),
            None => self.mel_input.compute(samples),
        }
    }

    /// Return a waveform representation selected by two flags:
    ///
    /// | `normalize` | `mulaw` | result |
    /// |-------------|---------|--------|
    /// | false | false | mono raw waveform, unchanged, at the input rate |
    /// | true  | false | cleaned float waveform at the output rate |
    /// | false | true  | mu-law codes of the mono raw waveform, input rate |
    /// | true  | true  | mu-law codes of the cleaned waveform, output rate |
    ///
    /// Multi-channel input is mixed down in every branch so consumers always
    /// see 1-D data; mixdown is the identity on already-mono input.
    pub fn audio_to_wave_tensor(
        &self,
        audio: &Waveform,
        normalize: bool,
        mulaw: bool,
    ) -> Result<WaveTensor> {
        let (samples, sample_rate) = if normalize {
            let cleaned = self.normalize_audio(audio)?;
            (cleaned.samples, cleaned.sample_rate)
        } else {
            (audio.to_mono()?, self.config.input_sr)
        };

        if mulaw {
            Ok(WaveTensor::MuLaw {
                codes: mulaw::mu_encode(&samples),
                sample_rate,
            })
        } else {
            Ok(WaveTensor::Float(AudioBuffer::new(samples, sample_rate)))
        }
    }

    /// Log-mel spectrogram of a waveform, mel-major.
    ///
    /// With `normalize == true` the spectrogram is computed at the output
    /// rate from the fully cleaned waveform; with `false`, at the input rate
    /// from the raw mono waveform. In both branches the waveform first goes
    /// through a mu-law encode/decode round trip, a deliberate lossy
    /// pre-filter matching the amplitude distribution a quantized-waveform
    /// model sees during training.
    pub fn audio_to_mel_spec(&self, audio: &Waveform, normalize: bool) -> Result<Vec<Vec<f32>>> {
        if normalize {
            let cleaned = self.normalize_audio(audio)?;
            let round_tripped = mulaw::mu_round_trip(&cleaned.samples);
            self.mel_spec_new_sr(&round_tripped)
        } else {
            let mono = audio.to_mono()?;
            let round_tripped = mulaw::mu_round_trip(&mono);
            self.mel_spec_orig_sr(&round_tripped)
        }
    }

    /// Same as [`audio_to_mel_spec`](Self::audio_to_mel_spec) but returned
    /// as a candle tensor of shape `[melspec_buckets, n_frames]`.
    pub fn audio_to_mel_spec_tensor(
        &self,
        audio: &Waveform,
        normalize: bool,
        device: &Device,
    ) -> Result<Tensor> {
        let mel = self.audio_to_mel_spec(audio, normalize)?;
        let n_mels = mel.len();
        let n_frames = mel.first().map_or(0, |row| row.len());
        let flat: Vec<f32> = mel.into_iter().flatten().collect();
        Ok(Tensor::from_vec(flat, (n_mels, n_frames), device)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(amplitude: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_config_defaults() {
        let config = PreprocessorConfig::default();
        assert_eq!(config.input_sr, 16000);
        assert_eq!(config.output_sr, None);
        assert_eq!(config.melspec_buckets, 80);
        assert_eq!(config.hop_length, 256);
        assert_eq!(config.n_fft, 1024);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        assert!(AudioPreprocessor::new(PreprocessorConfig::for_rates(0, None)).is_err());
        assert!(AudioPreprocessor::new(PreprocessorConfig::for_rates(16000, Some(0))).is_err());
    }

    #[test]
    fn test_final_rate_follows_strategy() {
        let same = AudioPreprocessor::new(PreprocessorConfig::for_rates(16000, None)).unwrap();
        assert_eq!(same.final_rate(), 16000);

        let converting =
            AudioPreprocessor::new(PreprocessorConfig::for_rates(48000, Some(16000))).unwrap();
        assert_eq!(converting.final_rate(), 16000);
    }

    #[test]
    fn test_normalize_audio_peaks_at_unity() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::for_rates(16000, None)).unwrap();
        let wave = Waveform::Mono(sine(0.1, 16000, 1.0));
        let cleaned = ap.normalize_audio(&wave).unwrap();
        assert_eq!(cleaned.sample_rate, 16000);
        assert!((cleaned.peak() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_normalize_audio_rejects_empty() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::default()).unwrap();
        assert!(matches!(
            ap.normalize_audio(&Waveform::Mono(vec![])),
            Err(PreprocessError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_normalize_audio_silence_does_not_blow_up() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::default()).unwrap();
        let cleaned = ap
            .normalize_audio(&Waveform::Mono(vec![0.0; 16000]))
            .unwrap();
        assert!(cleaned.samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_wave_tensor_raw_is_unchanged() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::default()).unwrap();
        let samples = sine(0.5, 16000, 0.25);
        let out = ap
            .audio_to_wave_tensor(&Waveform::Mono(samples.clone()), false, false)
            .unwrap();
        match out {
            WaveTensor::Float(buffer) => {
                assert_eq!(buffer.samples, samples);
                assert_eq!(buffer.sample_rate, 16000);
            }
            WaveTensor::MuLaw { .. } => panic!("expected float waveform"),
        }
    }

    #[test]
    fn test_wave_tensor_four_combinations() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::for_rates(16000, Some(8000))).unwrap();
        let wave = Waveform::Mono(sine(0.5, 16000, 0.5));

        for (normalize, mulaw) in [(false, false), (false, true), (true, false), (true, true)] {
            let out = ap.audio_to_wave_tensor(&wave, normalize, mulaw).unwrap();
            assert!(!out.is_empty());
            let expected_rate = if normalize { 8000 } else { 16000 };
            assert_eq!(out.sample_rate(), expected_rate);
            match (&out, mulaw) {
                (WaveTensor::MuLaw { .. }, true) | (WaveTensor::Float(_), false) => {}
                _ => panic!("wrong variant for mulaw={mulaw}"),
            }
        }
    }

    #[test]
    fn test_raw_mel_branch_uses_mu_law_round_trip() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::default()).unwrap();
        let samples = sine(0.5, 16000, 1.0);

        let via_accessor = ap
            .audio_to_mel_spec(&Waveform::Mono(samples.clone()), false)
            .unwrap();
        let manual = ap
            .mel_spec_orig_sr(&mulaw::mu_round_trip(&samples))
            .unwrap();
        assert_eq!(via_accessor, manual);

        // And differs from the mel of the pristine waveform.
        let pristine = ap.mel_spec_orig_sr(&samples).unwrap();
        assert_ne!(via_accessor, pristine);
    }

    #[test]
    fn test_mel_spec_shape() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::default()).unwrap();
        let mel = ap
            .audio_to_mel_spec(&Waveform::Mono(sine(0.5, 16000, 1.0)), false)
            .unwrap();
        assert_eq!(mel.len(), 80);
        assert_eq!(mel[0].len(), 63);
    }

    #[test]
    fn test_mel_spec_tensor_shape() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::default()).unwrap();
        let tensor = ap
            .audio_to_mel_spec_tensor(
                &Waveform::Mono(sine(0.5, 16000, 1.0)),
                false,
                &Device::Cpu,
            )
            .unwrap();
        assert_eq!(tensor.dims(), &[80, 63]);
    }

    #[test]
    fn test_logmelfilterbank_at_unconfigured_rate() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::default()).unwrap();
        let mel = ap.logmelfilterbank(&sine(0.5, 22050, 1.0), 22050).unwrap();
        assert_eq!(mel.len(), 80);
    }

    #[test]
    fn test_multichannel_input_is_mixed_down() {
        let ap = AudioPreprocessor::new(PreprocessorConfig::default()).unwrap();
        let left = sine(0.5, 16000, 0.5);
        let right = sine(0.25, 16000, 0.5);
        let wave = Waveform::MultiChannel(vec![left, right]);
        let cleaned = ap.normalize_audio(&wave).unwrap();
        assert!(!cleaned.is_empty());
    }
}
