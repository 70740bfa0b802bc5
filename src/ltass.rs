//! Long-term average speech spectrum (LTASS) noise shaping
//!
//! Builds a per-frequency-bin magnitude template approximating the long-term
//! average speech spectrum per ITU-T P.50 and scales it to an arbitrary
//! target power level. Two interchangeable strategies exist: the full-band
//! reference-filter response (default) and the deprecated closed-form
//! polynomial fit, which is only valid up to 8 kHz. Their templates differ
//! above roughly 8 kHz; both are kept for compatibility with historical
//! output.

use crate::audio::filter::{freqz, FilterBa};
use crate::{Error, Result};
use lazy_static::lazy_static;
use std::f64::consts::PI;

/// Sample rate at which the full-band reference filter is defined
pub const REFERENCE_FILTER_RATE: f64 = 48_000.0;

/// Validity range of the P.50 clause 4.1 polynomial (Hz)
const POLY_FMIN: f64 = 100.0;
const POLY_FMAX: f64 = 8_000.0;

/// Default target level of speech-shaped noise in dBPa (ITU-T P.50)
pub const DEFAULT_TARGET_LEVEL_DBPA: f64 = -4.7;

const REFERENCE_TAPS: usize = 1025;
const REFERENCE_GRID: usize = 2049;

/// LTASS template strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LtassModel {
    /// Magnitude response of the fixed full-band reference filter
    /// (valid to 20 kHz)
    ReferenceFilter,
    /// Closed-form cubic-in-log-frequency fit, ITU-T P.50 clause 4.1.
    /// Only valid up to 8 kHz; kept for compatibility with older output.
    Polynomial,
}

impl Default for LtassModel {
    fn default() -> Self {
        LtassModel::ReferenceFilter
    }
}

/// P.50 clause 4.1 spectral density in dB at a frequency in Hz
/// (equation 4-1, shifted from SPL to the working reference)
fn spectral_density_db(freq: f64) -> f64 {
    let lf = freq.max(1.0).log10();
    -376.44 + 465.439 * lf - 157.745 * lf * lf + 16.7124 * lf * lf * lf - 94.0
}

/// Slope of the spectral density in dB per decade
fn spectral_density_slope(freq: f64) -> f64 {
    let lf = freq.max(1.0).log10();
    465.439 - 2.0 * 157.745 * lf + 3.0 * 16.7124 * lf * lf
}

/// Target magnitude of the full-band reference filter in dB (relative)
///
/// Inside the polynomial's validity range this is the P.50 shape; outside it
/// the curve continues with the edge slope in log-frequency, with an
/// additional steep rolloff beyond 20 kHz.
fn reference_target_db(freq: f64) -> f64 {
    let db = if freq < POLY_FMIN {
        spectral_density_db(POLY_FMIN)
            + spectral_density_slope(POLY_FMIN) * (freq.max(1.0).log10() - POLY_FMIN.log10())
    } else if freq <= POLY_FMAX {
        spectral_density_db(freq)
    } else {
        let mut db = spectral_density_db(POLY_FMAX)
            + spectral_density_slope(POLY_FMAX) * (freq.log10() - POLY_FMAX.log10());
        if freq > 20_000.0 {
            db -= 80.0 * (freq / 20_000.0).log10();
        }
        db
    };
    db.max(crate::DB_MIN)
}

/// Design the fixed full-band reference filter once: a linear-phase FIR built
/// by frequency sampling of the target shape, Hamming-windowed.
fn design_reference_filter() -> FilterBa {
    let grid_db: Vec<f64> = (0..REFERENCE_GRID)
        .map(|k| {
            let f = k as f64 * (REFERENCE_FILTER_RATE / 2.0) / (REFERENCE_GRID - 1) as f64;
            reference_target_db(f)
        })
        .collect();
    let peak = grid_db.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut mag: Vec<f64> = grid_db
        .iter()
        .map(|&d| 10f64.powf((d - peak) / 20.0))
        .collect();
    mag[0] = 0.0;

    let delay = (REFERENCE_TAPS - 1) as f64 / 2.0;
    let norm = 1.0 / (2 * (REFERENCE_GRID - 1)) as f64;
    let taps: Vec<f64> = (0..REFERENCE_TAPS)
        .map(|n| {
            let mut acc = 0.0;
            for k in 0..REFERENCE_GRID {
                let w = PI * k as f64 / (REFERENCE_GRID - 1) as f64;
                let sided = if k == 0 || k == REFERENCE_GRID - 1 {
                    1.0
                } else {
                    2.0
                };
                acc += sided * mag[k] * (w * (n as f64 - delay)).cos();
            }
            let ham =
                0.54 - 0.46 * (2.0 * PI * n as f64 / (REFERENCE_TAPS - 1) as f64).cos();
            acc * norm * ham
        })
        .collect();

    FilterBa::fir(taps)
}

lazy_static! {
    static ref REFERENCE_FILTER: FilterBa = design_reference_filter();
}

impl LtassModel {
    /// Per-bin relative LTASS levels in dB at the requested frequencies
    ///
    /// Levels are floored at [`crate::DB_MIN`] before log conversion. The
    /// result is a relative shape; use [`scale_to_level`] to hit a target
    /// aggregate power.
    pub fn levels(&self, freqs: &[f64]) -> Result<Vec<f64>> {
        if freqs.is_empty() {
            return Err(Error::NumericDegeneracy("empty frequency vector".into()));
        }
        match self {
            LtassModel::ReferenceFilter => Ok(self.reference_levels(freqs)),
            LtassModel::Polynomial => self.polynomial_levels(freqs),
        }
    }

    fn reference_levels(&self, freqs: &[f64]) -> Vec<f64> {
        let floor_lin = 10f64.powf(crate::DB_MIN / 20.0);
        freqs
            .iter()
            .map(|&f| {
                let h = freqz(&REFERENCE_FILTER, f, REFERENCE_FILTER_RATE).norm();
                20.0 * h.max(floor_lin).log10()
            })
            .collect()
    }

    fn polynomial_levels(&self, freqs: &[f64]) -> Result<Vec<f64>> {
        let density: Vec<f64> = freqs.iter().map(|&f| spectral_density_db(f)).collect();

        // fit a linear interpolant in log-frequency to the valid sub-range
        // and evaluate it everywhere; P.50 is undefined outside 100 Hz-8 kHz
        let nearest = |target: f64| {
            freqs
                .iter()
                .enumerate()
                .min_by(|a, b| {
                    (a.1 - target)
                        .abs()
                        .partial_cmp(&(b.1 - target).abs())
                        .unwrap()
                })
                .map(|(i, _)| i)
                .unwrap_or(0)
        };
        let idx_min = nearest(POLY_FMIN);
        let idx_max = nearest(POLY_FMAX);
        if idx_max <= idx_min + 1 {
            return Err(Error::NumericDegeneracy(
                "too few frequency bins inside the P.50 validity range".into(),
            ));
        }

        let log_f: Vec<f64> = freqs.iter().map(|&f| f.max(1.0).log10()).collect();
        let nodes = &log_f[idx_min..=idx_max];
        let values = &density[idx_min..=idx_max];

        let bandwidth = freqs[freqs.len() - 1] - freqs[0];
        if bandwidth <= 0.0 {
            return Err(Error::NumericDegeneracy(
                "frequency vector spans zero bandwidth".into(),
            ));
        }
        let corr = 10.0 * bandwidth.log10();

        let levels = log_f
            .iter()
            .map(|&x| (interp_extrapolate(nodes, values, x) + corr).max(crate::DB_MIN))
            .collect();
        Ok(levels)
    }
}

/// Piecewise-linear interpolation over sorted nodes with linear extrapolation
/// from the end segments
fn interp_extrapolate(nodes: &[f64], values: &[f64], x: f64) -> f64 {
    debug_assert!(nodes.len() >= 2 && nodes.len() == values.len());
    let n = nodes.len();

    let seg = if x <= nodes[0] {
        0
    } else if x >= nodes[n - 1] {
        n - 2
    } else {
        match nodes.partition_point(|&v| v <= x) {
            0 => 0,
            p => (p - 1).min(n - 2),
        }
    };

    let (x0, x1) = (nodes[seg], nodes[seg + 1]);
    let (y0, y1) = (values[seg], values[seg + 1]);
    if (x1 - x0).abs() < 1e-300 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Aggregate power level of a dB template: 10*log10(sum(10^(L/10)) / n)
pub fn aggregate_level_db(levels: &[f64]) -> f64 {
    let mean_power: f64 =
        levels.iter().map(|&l| 10f64.powf(l / 10.0)).sum::<f64>() / levels.len() as f64;
    10.0 * mean_power.log10()
}

/// Shift a dB template so its aggregate power equals the target exactly,
/// regardless of spectral shape
pub fn scale_to_level(levels: &[f64], target_db: f64) -> Vec<f64> {
    let diff = target_db - aggregate_level_db(levels);
    levels.iter().map(|&l| l + diff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stft::fft_frequencies;

    #[test]
    fn test_scale_to_level_exact() {
        let freqs = fft_frequencies(48000, 1024);
        for model in [LtassModel::ReferenceFilter, LtassModel::Polynomial] {
            let shape = model.levels(&freqs).unwrap();
            for target in [-26.0, -4.7, 0.0, 12.0] {
                let scaled = scale_to_level(&shape, target);
                assert!(
                    (aggregate_level_db(&scaled) - target).abs() < 1e-9,
                    "{:?} target {} got {}",
                    model,
                    target,
                    aggregate_level_db(&scaled)
                );
            }
        }
    }

    #[test]
    fn test_reference_shape_is_speechlike() {
        let freqs: Vec<f64> = vec![100.0, 200.0, 315.0, 1000.0, 4000.0, 8000.0];
        let levels = LtassModel::ReferenceFilter.levels(&freqs).unwrap();
        // the LTASS peaks in the low hundreds of Hz and falls off above 1 kHz
        let peak_idx = levels
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        assert!(freqs[peak_idx] >= 100.0 && freqs[peak_idx] <= 500.0);
        assert!(levels[3] > levels[4] && levels[4] > levels[5]);
    }

    #[test]
    fn test_strategies_agree_in_band_diverge_above_8k() {
        let freqs = fft_frequencies(48000, 8192);
        let reference = LtassModel::ReferenceFilter.levels(&freqs).unwrap();
        let polynomial = LtassModel::Polynomial.levels(&freqs).unwrap();

        let ref_scaled = scale_to_level(&reference, 0.0);
        let poly_scaled = scale_to_level(&polynomial, 0.0);

        // mid-band shapes track each other within a few dB
        for (i, &f) in freqs.iter().enumerate() {
            if (500.0..=4000.0).contains(&f) {
                assert!(
                    (ref_scaled[i] - poly_scaled[i]).abs() < 4.0,
                    "divergence {} dB at {} Hz",
                    (ref_scaled[i] - poly_scaled[i]).abs(),
                    f
                );
            }
        }

        // well above the polynomial's validity the templates part ways
        let idx_hi = freqs.iter().position(|&f| f >= 23_500.0).unwrap();
        assert!((ref_scaled[idx_hi] - poly_scaled[idx_hi]).abs() > 2.0);
    }

    #[test]
    fn test_floor_applied_before_log() {
        let freqs = vec![100.0, 1000.0, 23_999.0];
        let levels = LtassModel::ReferenceFilter.levels(&freqs).unwrap();
        for &l in &levels {
            assert!(l >= crate::DB_MIN - 1e-9);
        }
    }

    #[test]
    fn test_empty_frequencies_rejected() {
        assert!(LtassModel::ReferenceFilter.levels(&[]).is_err());
    }
}
