//! Level measurement and gain utilities

/// Compute RMS energy
pub fn compute_rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|x| x * x).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Compute peak amplitude
pub fn compute_peak(signal: &[f32]) -> f32 {
    signal.iter().map(|x| x.abs()).fold(0.0f32, f32::max)
}

/// Convert a level in dB to a linear amplitude factor
pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Convert a linear amplitude to dB (floored at [`crate::DB_MIN`])
pub fn linear_to_db(amplitude: f64) -> f64 {
    20.0 * amplitude.max(db_to_linear(crate::DB_MIN)).log10()
}

/// Scale every sample by a linear gain factor
pub fn apply_gain(signal: &[f32], gain: f32) -> Vec<f32> {
    signal.iter().map(|x| x * gain).collect()
}

/// Zero-pad (or truncate) a signal to an exact length
pub fn pad_to_length(signal: Vec<f32>, length: usize) -> Vec<f32> {
    let mut out = signal;
    out.resize(length, 0.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_constant() {
        let signal = vec![0.5f32; 1000];
        assert!((compute_rms(&signal) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_peak() {
        let signal = vec![0.1, -0.8, 0.3];
        assert!((compute_peak(&signal) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_db_round_trip() {
        for db in [-60.0, -26.0, 0.0, 6.0] {
            assert!((linear_to_db(db_to_linear(db)) - db).abs() < 1e-9);
        }
    }

    #[test]
    fn test_linear_to_db_floors_at_min() {
        assert!((linear_to_db(0.0) - crate::DB_MIN).abs() < 1e-9);
    }

    #[test]
    fn test_pad_to_length() {
        let padded = pad_to_length(vec![1.0, 2.0], 4);
        assert_eq!(padded, vec![1.0, 2.0, 0.0, 0.0]);
        let truncated = pad_to_length(vec![1.0, 2.0, 3.0], 2);
        assert_eq!(truncated, vec![1.0, 2.0]);
    }
}
