//! Spectral-subtraction speech degradation
//!
//! Mixes a clean signal with calibrated speech-shaped noise and removes a
//! controllable fraction of that noise with a generalized Wiener filter. The
//! per-bin gain is applied to the original noise-free spectrum, so the
//! degradation manifests purely as spectral coloration and attenuation of
//! speech energy, modeling imperfect noise suppression rather than literal
//! noise addition.

use crate::audio::pad_to_length;
use crate::ltass::{scale_to_level, LtassModel};
use crate::stft::{fft_frequencies, forward, inverse, WindowType};
use crate::{Error, Result};
use ndarray::{Array2, Axis, Zip};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper clamp applied to the over-subtraction factor
///
/// Two revisions of the historical configuration corpus clamp to different
/// bounds; both profiles stay selectable for compatibility testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsfLimit {
    /// Over-subtraction clamped to [0, 1]
    Strict,
    /// Over-subtraction clamped to [0, 2]
    Legacy,
}

impl OsfLimit {
    /// Maximum over-subtraction factor under this profile
    pub fn max_osf(&self) -> f64 {
        match self {
            OsfLimit::Strict => 1.0,
            OsfLimit::Legacy => 2.0,
        }
    }
}

impl Default for OsfLimit {
    fn default() -> Self {
        OsfLimit::Strict
    }
}

/// Degradation parameters
///
/// All parameters are validated by clamping before use, never rejected:
/// overlap to [0, 0.99], over-subtraction to [0, limit], floor factor to >= 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradeConfig {
    /// FFT size
    pub n_fft: usize,
    /// Analysis window overlap fraction
    pub overlap: f64,
    /// Analysis/synthesis window
    pub window: WindowType,
    /// Generalized Wiener exponent; 1 yields classical magnitude subtraction,
    /// large values approach a binary mask
    pub power_exponent: f64,
    /// Over-subtraction factor; 1.0 trades most musical tones for least
    /// residual noise, 0.0 the reverse
    pub over_subtraction: f64,
    /// Clamping profile for the over-subtraction factor
    pub over_subtraction_limit: OsfLimit,
    /// Noise-envelope smoothing time constant in seconds
    pub tc_noise_s: f64,
    /// Mixture-envelope smoothing time constant in seconds
    pub tc_speech_s: f64,
    /// Noise floor as a fraction of the mixture envelope
    pub floor_subtract_factor: f64,
    /// LTASS template strategy for the speech-shaped noise
    pub ltass_model: LtassModel,
}

impl Default for DegradeConfig {
    fn default() -> Self {
        Self {
            n_fft: crate::N_FFT,
            overlap: crate::OVERLAP,
            window: WindowType::Hann,
            power_exponent: 2.0,
            over_subtraction: 0.99,
            over_subtraction_limit: OsfLimit::default(),
            tc_noise_s: 0.100,
            tc_speech_s: 0.100,
            floor_subtract_factor: 0.0,
            ltass_model: LtassModel::default(),
        }
    }
}

impl DegradeConfig {
    /// Clamped copy of the parameters (the validation policy: clamp where a
    /// safe value exists, fail only where clamping is impossible)
    fn clamped(&self) -> Self {
        let mut c = self.clone();
        c.overlap = c.overlap.clamp(0.0, 0.99);
        c.over_subtraction = c
            .over_subtraction
            .clamp(0.0, c.over_subtraction_limit.max_osf());
        c.floor_subtract_factor = c.floor_subtract_factor.max(0.0);
        c
    }

    /// Hop length derived from FFT size and overlap
    pub fn hop_length(&self) -> usize {
        ((self.n_fft as f64 * (1.0 - self.overlap.clamp(0.0, 0.99))) as usize).max(1)
    }

    /// Load parameters from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: DegradeConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save parameters to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// One-pole (exponential) smoothing along the time-frame axis:
/// y[t] = (1-a) x[t] + a y[t-1] with zero initial state
fn smooth_frames(env: &mut Array2<f32>, a: f32) {
    for mut row in env.axis_iter_mut(Axis(0)) {
        let mut state = 0.0f32;
        for v in row.iter_mut() {
            state = (1.0 - a) * *v + a * state;
            *v = state;
        }
    }
}

fn smoothing_coefficient(tc_s: f64, frame_rate: f64) -> f32 {
    if tc_s <= 0.0 || frame_rate <= 0.0 {
        return 0.0;
    }
    (-1.0 / (tc_s * frame_rate)).exp() as f32
}

/// Unit-variance Gaussian noise from caller-supplied randomness (Box-Muller)
fn gaussian_noise<R: Rng>(len: usize, rng: &mut R) -> Vec<f32> {
    (0..len)
        .map(|_| {
            let u1 = rng.gen::<f64>().max(1e-12);
            let u2 = rng.gen::<f64>();
            ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
        })
        .collect()
}

/// Degrade a clean signal by spectral subtraction of calibrated
/// speech-shaped noise
///
/// The noise is synthesized at `speech_level_db - snr_db`; smoothed magnitude
/// envelopes of the mixture and the noise feed an over/floor-limited
/// subtraction and a generalized Wiener gain in [0, 1], which is applied to
/// the clean spectrum before resynthesis. The output has the same length and
/// nominal scale as the input. The caller owns the random generator, so a
/// fixed seed reproduces the exact same degradation.
pub fn apply_spectral_subtraction<R: Rng>(
    signal: &[f32],
    sample_rate: u32,
    speech_level_db: f64,
    snr_db: f64,
    config: &DegradeConfig,
    rng: &mut R,
) -> Result<Vec<f32>> {
    let cfg = config.clamped();
    let hop_length = cfg.hop_length();
    let frame_rate = sample_rate as f64 / ((1.0 - cfg.overlap) * cfg.n_fft as f64);

    log::debug!(
        "spectral subtraction: n_fft={} hop={} osf={:.2} floor={:.2} p={:.2}",
        cfg.n_fft,
        hop_length,
        cfg.over_subtraction,
        cfg.floor_subtract_factor,
        cfg.power_exponent
    );

    // clean signal and unit-variance white noise into the frequency domain
    let clean = forward(signal, cfg.n_fft, hop_length, cfg.window, true)?;
    let white = gaussian_noise(signal.len(), rng);
    let mut noise = forward(&white, cfg.n_fft, hop_length, cfg.window, true)?;

    // shape the noise to the LTASS template at the target level
    let freqs = fft_frequencies(sample_rate, cfg.n_fft);
    let template = cfg.ltass_model.levels(&freqs)?;
    let template = scale_to_level(&template, speech_level_db - snr_db);
    for (bin, mut row) in noise.axis_iter_mut(Axis(0)).enumerate() {
        let gain = 10f64.powf(template[bin] / 20.0) as f32;
        row.mapv_inplace(|c| c * gain);
    }

    let mixture = &clean + &noise;

    // smoothed magnitude envelopes, independent time constants
    let mut env_mixture = mixture.mapv(|c| c.norm());
    let mut env_noise = noise.mapv(|c| c.norm());
    smooth_frames(&mut env_mixture, smoothing_coefficient(cfg.tc_speech_s, frame_rate));
    smooth_frames(&mut env_noise, smoothing_coefficient(cfg.tc_noise_s, frame_rate));

    // over-subtraction with floor, then the generalized Wiener gain
    let osf = cfg.over_subtraction as f32;
    let floor = cfg.floor_subtract_factor as f32;
    let p = cfg.power_exponent as f32;

    let mut processed = clean;
    Zip::from(&mut processed)
        .and(&env_mixture)
        .and(&env_noise)
        .for_each(|s, &y, &n| {
            let estimate = (y - osf * n).max(floor * y);
            let num = estimate.powf(p);
            let den = num + n.powf(p);
            let gain = if den > 0.0 {
                (num / den).powf(1.0 / p)
            } else {
                0.0
            };
            *s *= gain;
        });

    let degraded = inverse(&processed, hop_length, cfg.window, true)?;
    Ok(pad_to_length(degraded, signal.len()))
}
