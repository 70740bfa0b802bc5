//! IIR/FIR filter primitives and Butterworth bandpass design
//!
//! Transfer functions are kept in `(b, a)` form in f64; design goes through
//! the classical chain of analog prototype poles, lowpass-to-bandpass
//! transform and bilinear mapping.

use crate::{Error, Result};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Digital filter in transfer-function form
#[derive(Debug, Clone)]
pub struct FilterBa {
    /// Numerator coefficients
    pub b: Vec<f64>,
    /// Denominator coefficients, a[0] = 1
    pub a: Vec<f64>,
}

impl FilterBa {
    /// Pass-through identity filter
    pub fn identity() -> Self {
        Self {
            b: vec![1.0],
            a: vec![1.0],
        }
    }

    /// FIR filter from taps
    pub fn fir(taps: Vec<f64>) -> Self {
        Self {
            b: taps,
            a: vec![1.0],
        }
    }
}

/// Apply a filter to a signal (direct form II transposed)
pub fn lfilter(filter: &FilterBa, x: &[f64]) -> Vec<f64> {
    let b = &filter.b;
    let a = &filter.a;
    let order = b.len().max(a.len());

    let mut bn = b.clone();
    bn.resize(order, 0.0);
    let mut an = a.clone();
    an.resize(order, 0.0);

    let mut state = vec![0.0f64; order.saturating_sub(1)];
    let mut y = Vec::with_capacity(x.len());

    for &xn in x {
        let yn = bn[0] * xn + state.first().copied().unwrap_or(0.0);
        for i in 0..state.len() {
            let next = state.get(i + 1).copied().unwrap_or(0.0);
            state[i] = bn[i + 1] * xn + next - an[i + 1] * yn;
        }
        y.push(yn);
    }

    y
}

/// Apply a cascade of filters sequentially
pub fn apply_cascade(filters: &[FilterBa], x: &[f64]) -> Vec<f64> {
    let mut y = x.to_vec();
    for f in filters {
        y = lfilter(f, &y);
    }
    y
}

/// Evaluate the frequency response of a `(b, a)` filter at a single frequency
pub fn freqz(filter: &FilterBa, freq_hz: f64, sample_rate: f64) -> Complex64 {
    let w = 2.0 * PI * freq_hz / sample_rate;
    let zinv = Complex64::from_polar(1.0, -w);

    // Horner over descending powers: H(z) = sum b_k z^-k / sum a_k z^-k
    let mut num = Complex64::new(0.0, 0.0);
    for &bb in filter.b.iter().rev() {
        num = num * zinv + bb;
    }
    let mut den = Complex64::new(0.0, 0.0);
    for &aa in filter.a.iter().rev() {
        den = den * zinv + aa;
    }
    num / den
}

/// Magnitude response of a filter cascade in dB at a single frequency
pub fn cascade_response_db(filters: &[FilterBa], freq_hz: f64, sample_rate: f64) -> f64 {
    filters
        .iter()
        .map(|f| {
            let h = freqz(f, freq_hz, sample_rate).norm();
            20.0 * h.max(1e-300).log10()
        })
        .sum()
}

/// Bandpass design specification in Hz/dB at a given sample rate
#[derive(Debug, Clone, Copy)]
pub struct BandpassSpec {
    /// Passband edges (Hz)
    pub passband: [f64; 2],
    /// Stopband edges (Hz)
    pub stopband: [f64; 2],
    /// Maximum passband ripple (dB)
    pub max_ripple_db: f64,
    /// Minimum stopband attenuation (dB)
    pub min_attenuation_db: f64,
}

/// Minimum Butterworth order and natural frequencies (Hz) meeting a bandpass
/// spec (buttord equivalent for digital bandpass filters)
pub fn bandpass_order(spec: &BandpassSpec, sample_rate: f64) -> Result<(usize, [f64; 2])> {
    let nyquist = sample_rate / 2.0;
    for &edge in spec.passband.iter().chain(spec.stopband.iter()) {
        if edge <= 0.0 || edge >= nyquist {
            return Err(Error::InvalidParameter(format!(
                "band edge {} Hz outside (0, {}) Hz",
                edge, nyquist
            )));
        }
    }

    // pre-warp all edges to the analog domain
    let passb = [
        (PI * spec.passband[0] / sample_rate).tan(),
        (PI * spec.passband[1] / sample_rate).tan(),
    ];
    let stopb = [
        (PI * spec.stopband[0] / sample_rate).tan(),
        (PI * spec.stopband[1] / sample_rate).tan(),
    ];

    let nat_at = |s: f64| (s * s - passb[0] * passb[1]) / (s * (passb[0] - passb[1]));
    let nat = nat_at(stopb[0]).abs().min(nat_at(stopb[1]).abs());
    if nat <= 1.0 {
        return Err(Error::InvalidParameter(
            "stopband edges do not separate from the passband".into(),
        ));
    }

    let gpass = 10f64.powf(0.1 * spec.max_ripple_db.abs());
    let gstop = 10f64.powf(0.1 * spec.min_attenuation_db.abs());
    let order = (0.5 * ((gstop - 1.0) / (gpass - 1.0)).log10() / nat.log10()).ceil() as usize;
    if order == 0 {
        return Err(Error::InvalidParameter(
            "bandpass spec is met by a zero-order filter".into(),
        ));
    }

    // natural frequency that hits the passband ripple exactly at the edges
    let w0 = (gpass - 1.0).powf(-1.0 / (2.0 * order as f64));
    let half_bw = w0 * (passb[1] - passb[0]) / 2.0;
    let disc = (half_bw * half_bw + passb[0] * passb[1]).sqrt();
    let mut wn = [(-half_bw + disc).abs(), (half_bw + disc).abs()];
    if wn[0] > wn[1] {
        wn.swap(0, 1);
    }

    // warp back to Hz
    let wn_hz = [
        wn[0].atan() * sample_rate / PI,
        wn[1].atan() * sample_rate / PI,
    ];
    Ok((order, wn_hz))
}

fn poly_from_roots(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * r;
        }
        coeffs = next;
    }
    coeffs
}

/// Digital Butterworth bandpass filter of the given order with natural
/// frequencies in Hz (butter equivalent)
pub fn butter_bandpass(order: usize, wn_hz: [f64; 2], sample_rate: f64) -> Result<FilterBa> {
    if order == 0 {
        return Err(Error::InvalidParameter("filter order must be > 0".into()));
    }
    let n = order as i32;

    // analog lowpass prototype poles on the unit circle
    let prototype: Vec<Complex64> = (0..order)
        .map(|k| {
            let theta = PI * (2 * k as i32 + 1 - n) as f64 / (2.0 * n as f64);
            -Complex64::from_polar(1.0, theta)
        })
        .collect();

    // pre-warp the band edges (bilinear reference rate of 2 Hz)
    let fs2 = 2.0;
    let warped = [
        2.0 * fs2 * (PI * wn_hz[0] / sample_rate).tan(),
        2.0 * fs2 * (PI * wn_hz[1] / sample_rate).tan(),
    ];
    let bw = warped[1] - warped[0];
    let wo = (warped[0] * warped[1]).sqrt();

    // lowpass -> bandpass on poles/zeros; prototype has no finite zeros, the
    // transform contributes `order` zeros at s = 0
    let mut poles = Vec::with_capacity(2 * order);
    for &p in &prototype {
        let scaled = p * (bw / 2.0);
        let shift = (scaled * scaled - Complex64::new(wo * wo, 0.0)).sqrt();
        poles.push(scaled + shift);
        poles.push(scaled - shift);
    }
    let zeros = vec![Complex64::new(0.0, 0.0); order];
    let gain = bw.powi(n);

    // bilinear transform to the z-domain
    let fs4 = 2.0 * fs2;
    let z_digital: Vec<Complex64> = zeros
        .iter()
        .map(|&z| (Complex64::new(fs4, 0.0) + z) / (Complex64::new(fs4, 0.0) - z))
        .collect();
    let p_digital: Vec<Complex64> = poles
        .iter()
        .map(|&p| (Complex64::new(fs4, 0.0) + p) / (Complex64::new(fs4, 0.0) - p))
        .collect();

    let num: Complex64 = zeros
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &z| acc * (fs4 - z));
    let den: Complex64 = poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs4 - p));
    let k_digital = gain * (num / den).re;

    // degree matching: remaining zeros go to z = -1
    let mut z_full = z_digital;
    z_full.resize(p_digital.len(), Complex64::new(-1.0, 0.0));

    let b: Vec<f64> = poly_from_roots(&z_full)
        .iter()
        .map(|c| (c * k_digital).re)
        .collect();
    let a: Vec<f64> = poly_from_roots(&p_digital).iter().map(|c| c.re).collect();

    Ok(FilterBa { b, a })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lfilter_moving_average() {
        let f = FilterBa {
            b: vec![0.5, 0.5],
            a: vec![1.0],
        };
        let y = lfilter(&f, &[1.0, 1.0, 1.0, 1.0]);
        assert!((y[0] - 0.5).abs() < 1e-12);
        for &v in &y[1..] {
            assert!((v - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_lfilter_one_pole_converges() {
        // y[n] = (1-g) x[n] + g y[n-1] approaches a constant input
        let g = 0.9f64;
        let f = FilterBa {
            b: vec![1.0 - g],
            a: vec![1.0, -g],
        };
        let y = lfilter(&f, &vec![1.0; 500]);
        assert!((y[499] - 1.0).abs() < 1e-6);
        assert!(y[0] < y[10] && y[10] < y[499]);
    }

    #[test]
    fn test_identity_filter() {
        let x = vec![0.3, -0.2, 0.9];
        let y = lfilter(&FilterBa::identity(), &x);
        assert_eq!(x, y);
    }

    #[test]
    fn test_freqz_of_identity_is_unity() {
        let h = freqz(&FilterBa::identity(), 1234.0, 48000.0);
        assert!((h.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_butter_bandpass_response() {
        let spec = BandpassSpec {
            passband: [160.0, 7000.0],
            stopband: [16.0, 23999.0],
            max_ripple_db: 0.25,
            min_attenuation_db: 51.0,
        };
        let (order, wn) = bandpass_order(&spec, 48000.0).unwrap();
        assert!(order >= 2);
        let f = butter_bandpass(order, wn, 48000.0).unwrap();

        let h_mid = 20.0 * freqz(&f, 1000.0, 48000.0).norm().log10();
        assert!(h_mid.abs() < 0.25, "midband response {} dB", h_mid);

        let h_edge = 20.0 * freqz(&f, 160.0, 48000.0).norm().log10();
        assert!(h_edge > -0.3 && h_edge < 0.1, "edge response {} dB", h_edge);

        let h_stop_low = 20.0 * freqz(&f, 16.0, 48000.0).norm().max(1e-300).log10();
        assert!(h_stop_low < -51.0, "low stopband response {} dB", h_stop_low);

        let h_stop_high = 20.0
            * freqz(&f, 23999.0, 48000.0)
                .norm()
                .max(1e-300)
                .log10();
        assert!(h_stop_high < -51.0, "high stopband {} dB", h_stop_high);
    }

    #[test]
    fn test_bandpass_order_rejects_bad_edges() {
        let spec = BandpassSpec {
            passband: [160.0, 7000.0],
            stopband: [16.0, 30000.0],
            max_ripple_db: 0.25,
            min_attenuation_db: 51.0,
        };
        assert!(bandpass_order(&spec, 48000.0).is_err());
    }
}
