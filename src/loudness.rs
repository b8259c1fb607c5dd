//! Integrated loudness measurement (ITU-R BS.1770-4) and loudness
//! normalization.
//!
//! The meter applies the two-stage K-weighting pre-filter (high-shelf +
//! high-pass), integrates mean-square energy over 400 ms blocks with 75 %
//! overlap, and gates blocks absolutely at -70 LUFS and relatively at
//! 10 LU below the ungated mean.

use tracing::{debug, warn};

use crate::error::{PreprocessError, Result};

/// Fixed loudness target for the preprocessing pipeline, in LUFS.
pub const TARGET_LUFS: f32 = -30.0;

/// Numerical floor for divisions and logs.
const EPSILON: f32 = 1e-10;

/// Absolute gate threshold (BS.1770-4).
const ABSOLUTE_GATE_LUFS: f64 = -70.0;

/// Gating block duration and step (400 ms blocks, 75 % overlap).
const BLOCK_DURATION_S: f64 = 0.400;
const BLOCK_STEP_S: f64 = 0.100;

/// Second-order IIR section, Direct Form II transposed.
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x + self.z2 - self.a1 * y;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

/// High-shelf stage of the K-weighting filter (+4 dB above ~1681.97 Hz),
/// RBJ cookbook coefficients evaluated at the meter's sample rate.
fn k_weighting_shelf(sample_rate: f32) -> Biquad {
    let gain_db = 3.999_843_8_f32;
    let f0 = 1_681.974_5_f32;
    let q = 0.707_175_2_f32;

    let a = 10.0f32.powf(gain_db / 40.0);
    let w0 = 2.0 * std::f32::consts::PI * f0 / sample_rate;
    let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
    let alpha = sin_w0 / (2.0 * q);
    let sqrt_a = a.sqrt();

    let b0 = a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha);
    let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0);
    let b2 = a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha);
    let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha;
    let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0);
    let a2 = (a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha;

    Biquad {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: a1 / a0,
        a2: a2 / a0,
        z1: 0.0,
        z2: 0.0,
    }
}

/// High-pass stage of the K-weighting filter (~38.14 Hz).
fn k_weighting_highpass(sample_rate: f32) -> Biquad {
    let f0 = 38.135_47_f32;
    let q = 0.500_327_f32;

    let w0 = 2.0 * std::f32::consts::PI * f0 / sample_rate;
    let (sin_w0, cos_w0) = (w0.sin(), w0.cos());
    let alpha = sin_w0 / (2.0 * q);

    let b0 = (1.0 + cos_w0) / 2.0;
    let b1 = -(1.0 + cos_w0);
    let b2 = (1.0 + cos_w0) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;

    Biquad {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: a1 / a0,
        a2: a2 / a0,
        z1: 0.0,
        z2: 0.0,
    }
}

/// Integrated loudness meter for mono audio at a fixed sample rate.
///
/// Construction is cheap; the meter holds no per-call state and is safe to
/// share behind `&self`.
pub struct LoudnessMeter {
    sample_rate: u32,
}

impl LoudnessMeter {
    /// Create a meter for the given sample rate.
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PreprocessError::InvalidInput(
                "sample rate must be positive".to_string(),
            ));
        }
        Ok(Self { sample_rate })
    }

    /// Measure integrated loudness in LUFS.
    ///
    /// Returns `f32::NEG_INFINITY` when every gating block falls below the
    /// absolute gate (silence or near-silence). Inputs shorter than one
    /// 400 ms gating block are integrated as a single block.
    pub fn integrated_loudness(&self, samples: &[f32]) -> Result<f32> {
        if samples.is_empty() {
            return Err(PreprocessError::InvalidInput(
                "cannot measure loudness of an empty waveform".to_string(),
            ));
        }

        let sr = self.sample_rate as f32;
        let mut shelf = k_weighting_shelf(sr);
        let mut highpass = k_weighting_highpass(sr);
        let weighted: Vec<f32> = samples
            .iter()
            .map(|&s| highpass.process(shelf.process(s)))
            .collect();

        let block_len = ((self.sample_rate as f64 * BLOCK_DURATION_S) as usize).max(1);
        let step = ((self.sample_rate as f64 * BLOCK_STEP_S) as usize).max(1);

        let mut block_energies: Vec<f64> = Vec::new();
        if weighted.len() < block_len {
            block_energies.push(mean_square(&weighted));
        } else {
            let mut start = 0;
            while start + block_len <= weighted.len() {
                block_energies.push(mean_square(&weighted[start..start + block_len]));
                start += step;
            }
        }

        // Absolute gate at -70 LUFS.
        let abs_gate_energy = lufs_to_energy(ABSOLUTE_GATE_LUFS);
        let abs_gated: Vec<f64> = block_energies
            .iter()
            .copied()
            .filter(|&z| z > abs_gate_energy)
            .collect();
        if abs_gated.is_empty() {
            debug!("all gating blocks below the absolute gate, loudness undefined");
            return Ok(f32::NEG_INFINITY);
        }

        // Relative gate 10 LU below the mean of absolutely-gated blocks.
        let ungated_mean = abs_gated.iter().sum::<f64>() / abs_gated.len() as f64;
        let rel_gate_energy = lufs_to_energy(energy_to_lufs(ungated_mean) - 10.0);
        let gated: Vec<f64> = abs_gated
            .into_iter()
            .filter(|&z| z > rel_gate_energy)
            .collect();
        if gated.is_empty() {
            return Ok(f32::NEG_INFINITY);
        }

        let mean = gated.iter().sum::<f64>() / gated.len() as f64;
        Ok(energy_to_lufs(mean) as f32)
    }
}

fn mean_square(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / samples.len() as f64
}

fn energy_to_lufs(z: f64) -> f64 {
    -0.691 + 10.0 * z.max(f64::MIN_POSITIVE).log10()
}

fn lufs_to_energy(lufs: f64) -> f64 {
    10.0f64.powf((lufs + 0.691) / 10.0)
}

/// Loudness-normalize then peak-normalize a mono waveform.
///
/// First rescales so integrated loudness equals `target_lufs`, then divides
/// by the peak absolute amplitude so the result lies in \[-1, 1\]. The peak
/// division intentionally rescales loudness away from the target for signals
/// whose crest factor differs from full scale; the pipeline cares about the
/// combined result, not the intermediate level.
///
/// Floor policy for degenerate input: when loudness is unmeasurable (all
/// blocks gated out) the loudness gain is skipped, and when the peak is at
/// or below the numerical floor the peak division is skipped, so all-zero
/// input passes through unchanged rather than producing NaN/Inf or an error.
pub fn normalize_loudness(
    samples: &[f32],
    meter: &LoudnessMeter,
    target_lufs: f32,
) -> Result<Vec<f32>> {
    let measured = meter.integrated_loudness(samples)?;

    let mut leveled: Vec<f32> = if measured.is_finite() {
        let gain = 10.0f32.powf((target_lufs - measured) / 20.0);
        debug!(measured, target_lufs, gain, "applying loudness gain");
        samples.iter().map(|&s| s * gain).collect()
    } else {
        warn!("loudness unmeasurable, skipping loudness gain");
        samples.to_vec()
    };

    let peak = leveled.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > EPSILON {
        for s in &mut leveled {
            *s /= peak;
        }
    } else {
        warn!("peak at or below numerical floor, skipping peak normalization");
    }

    Ok(leveled)
}
