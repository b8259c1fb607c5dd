//! Leading-silence removal via short-time energy gating.
//!
//! A lightweight voice-activity front end: the signal is scanned in short
//! frames and everything before the first frame whose RMS level clears the
//! activation threshold is dropped (minus a small pre-roll so soft onsets
//! are not clipped). Only leading silence is removed; trailing silence is
//! left alone.

use tracing::debug;

const EPSILON: f32 = 1e-10;

/// Configuration for the leading-silence trimmer.
#[derive(Debug, Clone)]
pub struct SilenceTrimmer {
    /// Activation threshold in dBFS (default: -40.0). Frames whose RMS level
    /// is at or below this are considered silence.
    pub threshold_db: f32,
    /// Analysis frame duration in milliseconds (default: 10).
    pub frame_ms: u32,
    /// Number of frames kept before the first active frame (default: 2).
    pub pre_roll_frames: usize,
}

impl Default for SilenceTrimmer {
    fn default() -> Self {
        Self {
            threshold_db: -40.0,
            frame_ms: 10,
            pre_roll_frames: 2,
        }
    }
}

impl SilenceTrimmer {
    /// Remove leading silence from a mono waveform.
    ///
    /// When no frame clears the threshold (entirely silent input) the
    /// waveform is returned unchanged, matching the pipeline's policy of
    /// degrading gracefully on degenerate input.
    pub fn trim_leading(&self, samples: &[f32], sample_rate: u32) -> Vec<f32> {
        let frame_len = ((sample_rate as u64 * self.frame_ms as u64 / 1000) as usize).max(1);

        let first_active = samples
            .chunks(frame_len)
            .position(|frame| rms_db(frame) > self.threshold_db);

        match first_active {
            Some(idx) => {
                let start = idx.saturating_sub(self.pre_roll_frames) * frame_len;
                debug!(
                    trimmed_samples = start,
                    total = samples.len(),
                    "trimmed leading silence"
                );
                samples[start..].to_vec()
            }
            None => {
                debug!("no activity above threshold, leaving waveform untouched");
                samples.to_vec()
            }
        }
    }
}

fn rms_db(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return f32::NEG_INFINITY;
    }
    let rms = (frame.iter().map(|&x| x * x).sum::<f32>() / frame.len() as f32).sqrt();
    20.0 * rms.max(EPSILON).log10()
}
