//! Band-limiting pre-filters for extended level measurement
//!
//! Each bandwidth class maps to a Butterworth bandpass cascade designed at
//! the measurement sample rate. Wider bands relax the per-stage attenuation
//! requirement and make up for it with repeated identical stages.

use crate::audio::filter::{bandpass_order, butter_bandpass, BandpassSpec, FilterBa};
use crate::Result;

/// Pre-filter bandwidth class applied before level measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prefilter {
    /// Measure the signal as-is
    #[default]
    None,
    /// 160 Hz - 7 kHz passband
    Narrowband,
    /// 50 Hz - 14 kHz passband, two stages
    SuperWideband,
    /// 20 Hz - 20 kHz passband, three stages
    Fullband,
}

impl Prefilter {
    /// Design spec and stage count for this bandwidth class
    fn spec(&self) -> Option<(BandpassSpec, usize)> {
        match self {
            Prefilter::None => None,
            Prefilter::Narrowband => Some((
                BandpassSpec {
                    passband: [160.0, 7_000.0],
                    stopband: [16.0, 23_999.0],
                    max_ripple_db: 0.25,
                    min_attenuation_db: 51.0,
                },
                1,
            )),
            Prefilter::SuperWideband => Some((
                BandpassSpec {
                    passband: [50.0, 14_000.0],
                    stopband: [16.0, 23_999.0],
                    max_ripple_db: 0.25,
                    min_attenuation_db: 26.0,
                },
                2,
            )),
            Prefilter::Fullband => Some((
                BandpassSpec {
                    passband: [20.0, 20_000.0],
                    stopband: [9.0, 23_999.0],
                    max_ripple_db: 0.25,
                    min_attenuation_db: 17.5,
                },
                3,
            )),
        }
    }

    /// Design the filter cascade for the given sample rate
    ///
    /// Returns an empty cascade for [`Prefilter::None`]. Stopband edges
    /// beyond Nyquist are clamped just below it so the same class works at
    /// lower measurement rates.
    pub fn design(&self, sample_rate: u32) -> Result<Vec<FilterBa>> {
        let Some((mut spec, stages)) = self.spec() else {
            return Ok(Vec::new());
        };
        let nyquist = sample_rate as f64 / 2.0;
        if spec.stopband[1] >= nyquist {
            spec.stopband[1] = nyquist - 1.0;
        }
        if spec.passband[1] >= spec.stopband[1] {
            spec.passband[1] = spec.stopband[1] * 0.98;
        }

        let (order, wn) = bandpass_order(&spec, sample_rate as f64)?;
        let stage = butter_bandpass(order, wn, sample_rate as f64)?;
        Ok(vec![stage; stages])
    }
}

impl std::fmt::Display for Prefilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Prefilter::None => "none",
            Prefilter::Narrowband => "narrowband",
            Prefilter::SuperWideband => "super-wideband",
            Prefilter::Fullband => "fullband",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::filter::cascade_response_db;

    #[test]
    fn test_none_is_empty_cascade() {
        assert!(Prefilter::None.design(48_000).unwrap().is_empty());
    }

    #[test]
    fn test_narrowband_single_stage() {
        let cascade = Prefilter::Narrowband.design(48_000).unwrap();
        assert_eq!(cascade.len(), 1);
    }

    #[test]
    fn test_superwideband_meets_spec_at_48k() {
        let cascade = Prefilter::SuperWideband.design(48_000).unwrap();
        assert_eq!(cascade.len(), 2);

        // passband edges within ripple, stopband edges attenuated
        let h = |f: f64| cascade_response_db(&cascade, f, 48_000.0);
        assert!(h(1_000.0).abs() < 0.5, "midband {:.3} dB", h(1_000.0));
        assert!(h(50.0) > -0.6 && h(50.0) < 0.1);
        assert!(h(14_000.0) > -0.6 && h(14_000.0) < 0.1);
        assert!(h(16.0) < -26.0, "low stop {:.1} dB", h(16.0));
        assert!(h(23_500.0) < -26.0, "high stop {:.1} dB", h(23_500.0));
    }

    #[test]
    fn test_fullband_meets_spec_at_48k() {
        let cascade = Prefilter::Fullband.design(48_000).unwrap();
        assert_eq!(cascade.len(), 3);

        let h = |f: f64| cascade_response_db(&cascade, f, 48_000.0);
        assert!(h(1_000.0).abs() < 0.75);
        assert!(h(9.0) < -17.5, "low stop {:.1} dB", h(9.0));
    }

    #[test]
    fn test_narrowband_at_16k_clamps_upper_edges() {
        // at 16 kHz the nominal 23999 Hz stopband edge is above Nyquist;
        // the design clamps it instead of failing
        let cascade = Prefilter::Narrowband.design(16_000).unwrap();
        assert_eq!(cascade.len(), 1);
        let h = |f: f64| cascade_response_db(&cascade, f, 16_000.0);
        assert!(h(1_000.0).abs() < 0.5);
        assert!(h(16.0) < -40.0);
    }
}
