//! Short-time Fourier transform and its inverse
//!
//! Frame-wise frequency analysis/synthesis of a time signal with centered
//! framing. Unmodified coefficients reconstruct the original signal up to a
//! fixed boundary transient; the tail may come back a few samples short, the
//! caller is expected to zero-pad.

use crate::{Error, Result};
use ndarray::Array2;
use num_complex::Complex;
use realfft::RealFftPlanner;
use std::f32::consts::PI;

/// Analysis/synthesis window shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Hann,
    Hamming,
    Rectangular,
}

impl Default for WindowType {
    fn default() -> Self {
        WindowType::Hann
    }
}

impl WindowType {
    /// Window sample vector of the given length (periodic form)
    pub fn samples(&self, size: usize) -> Vec<f32> {
        match self {
            WindowType::Hann => (0..size)
                .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / size as f32).cos()))
                .collect(),
            WindowType::Hamming => (0..size)
                .map(|n| 0.54 - 0.46 * (2.0 * PI * n as f32 / size as f32).cos())
                .collect(),
            WindowType::Rectangular => vec![1.0; size],
        }
    }
}

fn check_params(n_fft: usize, hop_length: usize) -> Result<()> {
    if hop_length == 0 {
        return Err(Error::InvalidParameter("hop length must be > 0".into()));
    }
    if n_fft < 2 || n_fft % 2 != 0 {
        return Err(Error::InvalidParameter(format!(
            "unsupported transform size {}: must be even and >= 2",
            n_fft
        )));
    }
    Ok(())
}

/// Center frequencies of the transform bins, linearly spaced from 0 to Nyquist
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f64> {
    let n_bins = n_fft / 2 + 1;
    (0..n_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect()
}

/// Compute the forward short-time transform
///
/// With `center` the signal is padded symmetrically by `n_fft / 2` on both
/// ends so that frame `k` is centered at sample `k * hop_length`.
///
/// # Returns
/// Complex frame matrix of shape `(n_fft/2 + 1, num_frames)`
pub fn forward(
    signal: &[f32],
    n_fft: usize,
    hop_length: usize,
    window: WindowType,
    center: bool,
) -> Result<Array2<Complex<f32>>> {
    check_params(n_fft, hop_length)?;
    if signal.is_empty() {
        return Err(Error::NumericDegeneracy("empty signal".into()));
    }

    let win = window.samples(n_fft);

    let pad = if center { n_fft / 2 } else { 0 };
    let mut padded = vec![0.0f32; pad];
    padded.extend_from_slice(signal);
    padded.extend(std::iter::repeat(0.0f32).take(pad));
    if padded.len() < n_fft {
        padded.resize(n_fft, 0.0);
    }

    let num_frames = (padded.len() - n_fft) / hop_length + 1;
    let n_bins = n_fft / 2 + 1;

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut frames = Array2::zeros((n_bins, num_frames));
    let mut input = vec![0.0f32; n_fft];
    let mut output = vec![Complex::new(0.0f32, 0.0f32); n_bins];

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_length;
        for i in 0..n_fft {
            input[i] = padded[start + i] * win[i];
        }

        fft.process(&mut input, &mut output)
            .map_err(|e| Error::Audio(format!("FFT failed: {}", e)))?;

        for (bin, &val) in output.iter().enumerate() {
            frames[[bin, frame_idx]] = val;
        }
    }

    Ok(frames)
}

/// Invert a frame matrix back to a time-domain signal
///
/// Overlap-add with window-square-sum normalization; removes the centering pad
/// applied by [`forward`]. Samples never covered by a window (possible with
/// hop > n_fft) stay zero.
pub fn inverse(
    frames: &Array2<Complex<f32>>,
    hop_length: usize,
    window: WindowType,
    center: bool,
) -> Result<Vec<f32>> {
    let (n_bins, num_frames) = frames.dim();
    if n_bins < 2 {
        return Err(Error::InvalidParameter(format!(
            "frame matrix has {} bins, expected n_fft/2 + 1 >= 2",
            n_bins
        )));
    }
    let n_fft = (n_bins - 1) * 2;
    check_params(n_fft, hop_length)?;
    if num_frames == 0 {
        return Err(Error::NumericDegeneracy("empty frame matrix".into()));
    }

    let win = window.samples(n_fft);

    let mut planner = RealFftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);

    let out_len = n_fft + hop_length * (num_frames - 1);
    let mut accum = vec![0.0f32; out_len];
    let mut win_sum = vec![0.0f32; out_len];

    let mut spectrum = vec![Complex::new(0.0f32, 0.0f32); n_bins];
    let mut frame = vec![0.0f32; n_fft];
    let scale = 1.0 / n_fft as f32;

    for frame_idx in 0..num_frames {
        for bin in 0..n_bins {
            spectrum[bin] = frames[[bin, frame_idx]];
        }
        // DC and Nyquist must be purely real for a real-valued inverse
        spectrum[0].im = 0.0;
        spectrum[n_bins - 1].im = 0.0;

        ifft.process(&mut spectrum, &mut frame)
            .map_err(|e| Error::Audio(format!("inverse FFT failed: {}", e)))?;

        let start = frame_idx * hop_length;
        for i in 0..n_fft {
            accum[start + i] += frame[i] * scale * win[i];
            win_sum[start + i] += win[i] * win[i];
        }
    }

    for i in 0..out_len {
        if win_sum[i] > 1e-10 {
            accum[i] /= win_sum[i];
        }
    }

    if center {
        let pad = n_fft / 2;
        if out_len <= 2 * pad {
            return Ok(Vec::new());
        }
        Ok(accum[pad..out_len - pad].to_vec())
    } else {
        Ok(accum)
    }
}

/// Averaged one-sided power spectrum in dB (Welch estimate)
///
/// Hann-windowed segments of `nperseg` samples advanced by `step`, periodogram
/// averaged with 'spectrum' scaling, floored at [`crate::DB_MIN`].
///
/// # Returns
/// `(frequencies, levels_db)` with `nperseg/2 + 1` entries each
pub fn spectrum_db(
    signal: &[f32],
    sample_rate: u32,
    nperseg: usize,
    step: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    check_params(nperseg, step)?;
    if signal.len() < nperseg {
        return Err(Error::NumericDegeneracy(format!(
            "signal of {} samples is shorter than one segment of {}",
            signal.len(),
            nperseg
        )));
    }

    let win = WindowType::Hann.samples(nperseg);
    let win_gain: f64 = win.iter().map(|&w| w as f64).sum();

    let n_bins = nperseg / 2 + 1;
    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(nperseg);

    let mut power = vec![0.0f64; n_bins];
    let mut input = vec![0.0f32; nperseg];
    let mut output = vec![Complex::new(0.0f32, 0.0f32); n_bins];

    let num_segments = (signal.len() - nperseg) / step + 1;
    for seg in 0..num_segments {
        let start = seg * step;
        for i in 0..nperseg {
            input[i] = signal[start + i] * win[i];
        }
        fft.process(&mut input, &mut output)
            .map_err(|e| Error::Audio(format!("FFT failed: {}", e)))?;
        for k in 0..n_bins {
            power[k] += output[k].norm_sqr() as f64;
        }
    }

    let db_min_lin = 10f64.powf(crate::DB_MIN / 10.0);
    let scale = 1.0 / (win_gain * win_gain * num_segments as f64);
    let levels = (0..n_bins)
        .map(|k| {
            // one-sided spectrum: double everything except DC and Nyquist
            let one_sided = if k == 0 || k == n_bins - 1 { 1.0 } else { 2.0 };
            10.0 * (power[k] * scale * one_sided).max(db_min_lin).log10()
        })
        .collect();

    Ok((fft_frequencies(sample_rate, nperseg), levels))
}
