//! Active speech level measurement, ITU-T P.56 method B
//!
//! Multi-threshold envelope-based activity detector with hangover logic and
//! bisection interpolation. Usable standalone or to calibrate degraded output
//! to a target active level.

pub mod prefilter;

pub use prefilter::Prefilter;

use crate::audio::filter::{apply_cascade, lfilter, FilterBa};
use crate::audio::{apply_gain, compute_peak, db_to_linear};
use crate::{Error, Result};

const EPS: f64 = 2.2204e-16;

/// Level reported when no threshold ever reaches the margin
/// (signal effectively silent by this measure)
pub const SILENT_LEVEL_DB: f64 = -100.0;

/// Hard ceiling on bisection iterations; the search converges geometrically
/// and the tolerance relaxes beyond 20 iterations, so this only guards
/// against pathological inputs
const MAX_BISECT_ITERATIONS: usize = 1000;

/// Measurement options with the P.56 method B defaults
#[derive(Debug, Clone, Copy)]
pub struct AslOptions {
    /// Assumed quantization depth in bits; defines the threshold ladder
    pub nbits: u32,
    /// Margin in dB between threshold and active speech level
    pub margin_db: f64,
    /// Hangover time in seconds
    pub hangover_s: f64,
    /// Envelope smoothing time constant in seconds
    pub time_constant_s: f64,
}

impl Default for AslOptions {
    fn default() -> Self {
        Self {
            nbits: 16,
            margin_db: 15.9,
            hangover_s: 0.2,
            time_constant_s: 0.03,
        }
    }
}

/// Active speech level measurement result
#[derive(Debug, Clone, Copy)]
pub struct AslResult {
    /// Active speech level in dB relative to full scale
    pub level_db: f64,
    /// Fraction of samples deemed active, in [0, 1]
    pub activity: f64,
}

/// Per-threshold detector state: activity count plus hangover counter
/// (one fixed array entry per threshold, built and discarded per invocation)
#[derive(Debug, Clone, Copy)]
struct ThresholdState {
    threshold: f64,
    activity: u64,
    hangover: u64,
}

/// Bisection interpolation between two (count, threshold) pairs to find the
/// crossing where count - threshold equals the margin. Tolerance starts at
/// `tol` dB and is relaxed by 10% per iteration beyond 20 if not converging.
fn bisect_interpolate(
    upcount: f64,
    lwcount: f64,
    upthr: f64,
    lwthr: f64,
    margin: f64,
    tol: f64,
) -> f64 {
    let mut tol = tol.abs();

    if (upcount - upthr - margin).abs() < tol {
        return upcount;
    }
    if (lwcount - lwthr - margin).abs() < tol {
        return lwcount;
    }

    let mut midcount = (upcount + lwcount) / 2.0;
    let mut midthr = (upthr + lwthr) / 2.0;
    for iterno in 1..=MAX_BISECT_ITERATIONS {
        let diff = midcount - midthr - margin;
        if diff.abs() <= tol {
            break;
        }
        if iterno > 20 {
            tol *= 1.1;
        }
        if diff > tol {
            midcount = (upcount + midcount) / 2.0;
            midthr = (upthr + midthr) / 2.0;
        } else if diff < -tol {
            midcount = (midcount + lwcount) / 2.0;
            midthr = (midthr + lwthr) / 2.0;
        }
    }

    midcount
}

fn measure_f64(x: &[f64], sample_rate: u32, opts: &AslOptions) -> Result<AslResult> {
    if x.is_empty() {
        return Err(Error::NumericDegeneracy("empty signal".into()));
    }
    if sample_rate == 0 {
        return Err(Error::InvalidParameter("sample rate must be > 0".into()));
    }
    let nbits = opts.nbits.clamp(2, 32);
    let thres_no = (nbits - 1) as usize;
    let fs = sample_rate as f64;

    let hangover_limit = (fs * opts.hangover_s).ceil() as u64;
    let g = (-1.0 / (fs * opts.time_constant_s)).exp();

    // thresholds from one quantizing level up to half the maximum code
    let mut states: Vec<ThresholdState> = (0..thres_no)
        .map(|j| ThresholdState {
            threshold: 2f64.powi(j as i32 - thres_no as i32),
            activity: 0,
            hangover: hangover_limit,
        })
        .collect();

    let sq: f64 = x.iter().map(|&v| v * v).sum();

    // envelope detection: two cascaded one-pole smoothers on |x|
    let smoother = FilterBa {
        b: vec![1.0 - g],
        a: vec![1.0, -g],
    };
    let x_abs: Vec<f64> = x.iter().map(|v| v.abs()).collect();
    let envelope = lfilter(&smoother, &lfilter(&smoother, &x_abs));

    for &q in &envelope {
        // ascending threshold scan; once a threshold is inactive with its
        // hangover exhausted, all higher thresholds are skipped too
        for state in states.iter_mut() {
            if q >= state.threshold {
                state.activity += 1;
                state.hangover = 0;
            } else if state.hangover < hangover_limit {
                state.activity += 1;
                state.hangover += 1;
            } else {
                break;
            }
        }
    }

    if states[0].activity == 0 {
        return Err(Error::ActivityNotDetected);
    }

    let count_db = |activity: u64, with_eps: bool| {
        let denom = if with_eps {
            activity as f64 + EPS
        } else {
            activity as f64
        };
        10.0 * (sq / denom + EPS).log10()
    };
    let threshold_db = |c: f64| 20.0 * (c + EPS).log10();

    let a0 = count_db(states[0].activity, false);
    let c0 = threshold_db(states[0].threshold);
    if a0 - c0 < opts.margin_db {
        return Err(Error::MarginNotMet {
            margin_db: opts.margin_db,
        });
    }

    let mut prev_a = a0;
    let mut prev_c = c0;
    for state in states.iter().skip(1) {
        if state.activity == 0 {
            continue;
        }
        let a = count_db(state.activity, true);
        let c = threshold_db(state.threshold);
        if a - c <= opts.margin_db {
            let level_db = bisect_interpolate(a, prev_a, c, prev_c, opts.margin_db, 0.5);
            let activity = (sq / x.len() as f64) / 10f64.powf(level_db / 10.0);
            return Ok(AslResult { level_db, activity });
        }
        prev_a = a;
        prev_c = c;
    }

    // no threshold ever reached the margin
    Ok(AslResult {
        level_db: SILENT_LEVEL_DB,
        activity: 0.0,
    })
}

/// Measure the active speech level of a signal (ITU-T P.56 method B)
///
/// # Errors
/// [`Error::ActivityNotDetected`] when the lowest threshold never trips,
/// [`Error::MarginNotMet`] when the long-term level fails to clear the margin
/// over the lowest threshold.
pub fn active_speech_level(
    signal: &[f32],
    sample_rate: u32,
    opts: &AslOptions,
) -> Result<AslResult> {
    let x: Vec<f64> = signal.iter().map(|&v| v as f64).collect();
    measure_f64(&x, sample_rate, opts)
}

/// Extended measurement: optional band-limiting pre-filter plus amplitude
/// safety rescaling
///
/// If the input peak magnitude falls outside `[min_amplitude, max_amplitude]`
/// the signal is rescaled by the inverse of its peak to avoid numeric
/// degeneracy, and the returned level is compensated by the corresponding dB
/// offset. The peak check looks at the unfiltered input; the rescale decision
/// does not depend on the chosen pre-filter.
pub fn active_speech_level_ex(
    signal: &[f32],
    sample_rate: u32,
    prefilter: Prefilter,
    min_amplitude: f64,
    max_amplitude: f64,
    opts: &AslOptions,
) -> Result<AslResult> {
    let peak = compute_peak(signal) as f64;

    let filters = prefilter.design(sample_rate)?;
    let x: Vec<f64> = signal.iter().map(|&v| v as f64).collect();
    let mut y = match prefilter {
        Prefilter::None => x,
        _ => apply_cascade(&filters, &x),
    };

    let offset_db = if peak > 0.0 && (peak > max_amplitude || peak < min_amplitude) {
        for v in y.iter_mut() {
            *v /= peak;
        }
        20.0 * peak.log10()
    } else {
        0.0
    };

    let result = measure_f64(&y, sample_rate, opts)?;
    Ok(AslResult {
        level_db: result.level_db + offset_db,
        activity: result.activity,
    })
}

/// Scale a signal so that its measured active speech level equals the target
///
/// # Returns
/// The scaled signal and the applied linear gain
pub fn scale_to_asl(
    signal: &[f32],
    sample_rate: u32,
    target_db: f64,
    opts: &AslOptions,
) -> Result<(Vec<f32>, f64)> {
    let measured = active_speech_level(signal, sample_rate, opts)?;
    let gain = db_to_linear(target_db - measured.level_db);
    log::debug!(
        "ASL calibration: measured {:.2} dB, target {:.2} dB, gain {:.4}",
        measured.level_db,
        target_db,
        gain
    );
    Ok((apply_gain(signal, gain as f32), gain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn gaussian(n: usize, rms: f64, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let u1 = rng.gen::<f64>().max(1e-12);
                let u2 = rng.gen::<f64>();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                (z * rms) as f32
            })
            .collect()
    }

    #[test]
    fn test_gaussian_noise_matches_long_term_level() {
        // fully active noise: ASL equals the long-term level
        let fs = 48_000;
        let x = gaussian(fs as usize * 5, 0.05, 42);
        let result = active_speech_level(&x, fs, &AslOptions::default()).unwrap();

        let sq: f64 = x.iter().map(|&v| (v as f64).powi(2)).sum();
        let long_term_db = 10.0 * (sq / x.len() as f64).log10();

        assert!(
            (result.level_db - long_term_db).abs() < 0.5,
            "ASL {:.2} vs long-term {:.2}",
            result.level_db,
            long_term_db
        );
        assert!(result.activity > 0.8 && result.activity < 1.15);
    }

    #[test]
    fn test_silence_raises_activity_not_detected() {
        let x = vec![0.0f32; 48_000];
        assert!(matches!(
            active_speech_level(&x, 48_000, &AslOptions::default()),
            Err(Error::ActivityNotDetected)
        ));
    }

    #[test]
    fn test_empty_signal_is_degenerate() {
        assert!(matches!(
            active_speech_level(&[], 48_000, &AslOptions::default()),
            Err(Error::NumericDegeneracy(_))
        ));
    }

    #[test]
    fn test_power_of_two_scaling_shifts_level_exactly() {
        let fs = 48_000;
        let x = gaussian(fs as usize * 2, 0.05, 7);
        let opts = AslOptions::default();
        let base = active_speech_level(&x, fs, &opts).unwrap();

        let scaled: Vec<f32> = x.iter().map(|&v| v * 0.25).collect();
        let shifted = active_speech_level(&scaled, fs, &opts).unwrap();

        // scaling by 2^-2 maps the threshold ladder onto itself
        let expected = base.level_db + 20.0 * 0.25f64.log10();
        assert!(
            (shifted.level_db - expected).abs() < 1e-6,
            "expected {:.4}, got {:.4}",
            expected,
            shifted.level_db
        );
    }

    #[test]
    fn test_extended_rescale_compensation() {
        let fs = 48_000;
        let x = gaussian(fs as usize * 2, 0.05, 11);
        let opts = AslOptions::default();
        let base = active_speech_level_ex(&x, fs, Prefilter::None, 0.1, 1.0, &opts).unwrap();

        for scale in [0.001f64, 5.0] {
            let scaled: Vec<f32> = x.iter().map(|&v| (v as f64 * scale) as f32).collect();
            let result =
                active_speech_level_ex(&scaled, fs, Prefilter::None, 0.1, 1.0, &opts).unwrap();
            let expected = base.level_db + 20.0 * scale.log10();
            assert!(
                (result.level_db - expected).abs() < 0.11,
                "scale {}: expected {:.3}, got {:.3}",
                scale,
                expected,
                result.level_db
            );
        }
    }

    #[test]
    fn test_scale_to_asl_hits_target() {
        let fs = 48_000;
        let x = gaussian(fs as usize * 2, 0.02, 23);
        let (calibrated, gain) = scale_to_asl(&x, fs, -26.0, &AslOptions::default()).unwrap();
        assert!(gain > 0.0);
        let check = active_speech_level(&calibrated, fs, &AslOptions::default()).unwrap();
        assert!(
            (check.level_db + 26.0).abs() < 0.11,
            "calibrated ASL {:.3}",
            check.level_db
        );
    }

    #[test]
    fn test_hangover_counts_trailing_samples_active() {
        // a single burst followed by silence: hangover keeps samples active
        // for H seconds past the burst
        let fs = 8_000u32;
        let mut x = vec![0.0f32; fs as usize * 2];
        for i in 0..fs as usize / 2 {
            x[i] = 0.25 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / fs as f32).sin();
        }
        let result = active_speech_level(&x, fs, &AslOptions::default()).unwrap();
        // half the signal is a burst; the activity factor reflects the burst
        // plus hangover, well below full-signal activity
        assert!(result.activity > 0.15 && result.activity < 0.7);
        assert!(result.level_db < 0.0 && result.level_db > -40.0);
    }

    #[test]
    fn test_bisect_interpolate_midpoint() {
        // symmetric bracket whose crossing sits exactly in the middle
        let level = bisect_interpolate(-20.0, -18.0, -40.0, -30.0, 15.9, 0.5);
        assert!(level <= -18.0 && level >= -20.0);
        let thr = level - 15.9; // implied threshold at the crossing is inside the bracket too
        assert!(thr >= -40.0 - 0.5 && thr <= -30.0 + 0.5);
    }
}
