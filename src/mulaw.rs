//! Mu-law companding: lossy 8-bit quantization of waveform amplitude.
//!
//! Brings float samples in \[-1, 1\] down to 256 discrete codes so a softmax
//! over amplitudes becomes feasible for quantized-waveform modeling. The
//! codes are good to model with but bad to listen to — run [`mu_decode`]
//! before saving or playing the audio.

/// Companding constant for 8-bit mu-law (u8 code space).
const MU: f32 = 255.0;

/// Encode float samples in \[-1, 1\] to mu-law codes in \[0, 255\].
///
/// Samples outside \[-1, 1\] are clamped first. Standard telephony
/// companding: `sign(x) * ln(1 + mu|x|) / ln(1 + mu)`, then uniform
/// quantization of the companded value.
pub fn mu_encode(samples: &[f32]) -> Vec<u8> {
    let denom = (1.0 + MU).ln();
    samples
        .iter()
        .map(|&s| {
            let x = s.clamp(-1.0, 1.0);
            let companded = x.signum() * (1.0 + MU * x.abs()).ln() / denom;
            // Map [-1, 1] onto [0, 255]; the as-cast saturates at the ends.
            ((companded + 1.0) / 2.0 * MU + 0.5) as u8
        })
        .collect()
}

/// Decode mu-law codes back to float samples in \[-1, 1\].
///
/// Approximate inverse of [`mu_encode`]; the round trip is lossy with an
/// error bounded by the local companding step (largest near full scale).
pub fn mu_decode(codes: &[u8]) -> Vec<f32> {
    codes
        .iter()
        .map(|&c| {
            let y = (c as f32 / MU) * 2.0 - 1.0;
            y.signum() * ((1.0 + MU).powf(y.abs()) - 1.0) / MU
        })
        .collect()
}

/// Encode then immediately decode.
///
/// This deliberate quality reduction matches the amplitude distribution a
/// quantized-waveform model is trained on, and is applied before every mel
/// spectrogram computed by the preprocessor.
pub fn mu_round_trip(samples: &[f32]) -> Vec<f32> {
    mu_decode(&mu_encode(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_encode_range() {
        let samples = vec![-1.0, -0.5, 0.0, 0.5, 1.0];
        let codes = mu_encode(&samples);
        assert_eq!(codes.len(), 5);
        assert_eq!(codes[0], 0);
        assert_eq!(codes[4], 255);
        // Zero lands in the middle of the code space.
        assert!(codes[2] == 127 || codes[2] == 128);
    }

    #[test]
    fn test_encode_is_monotonic() {
        let samples: Vec<f32> = (0..=200).map(|i| i as f32 / 100.0 - 1.0).collect();
        let codes = mu_encode(&samples);
        for pair in codes.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let codes = mu_encode(&[-2.0, 2.0]);
        assert_eq!(codes, vec![0, 255]);
    }

    #[test]
    fn test_decode_stays_in_range() {
        let all_codes: Vec<u8> = (0..=255).collect();
        for v in mu_decode(&all_codes) {
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_round_trip_error_small_amplitude() {
        // Low-level signals sit in the fine-grained region of the compander.
        let samples: Vec<f32> = (0..1600)
            .map(|i| 0.1 * (2.0 * PI * 440.0 * i as f32 / 16000.0).sin())
            .collect();
        let restored = mu_round_trip(&samples);
        for (a, b) in samples.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 5e-3, "error too large: {a} vs {b}");
        }
    }

    #[test]
    fn test_round_trip_error_half_scale() {
        let samples: Vec<f32> = (0..1600)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 16000.0).sin())
            .collect();
        let restored = mu_round_trip(&samples);
        for (a, b) in samples.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 2.5e-2, "error too large: {a} vs {b}");
        }
    }

    #[test]
    fn test_round_trip_near_zero() {
        let restored = mu_round_trip(&[0.0]);
        assert!(restored[0].abs() < 5e-3);
    }
}
