//! specdegrade - Calibrated speech degradation and active speech level measurement
//!
//! This crate synthesizes degraded speech signals for testing noise-reduction
//! and speech-quality algorithms, and measures the active speech level (ASL)
//! of a waveform per ITU-T Recommendation P.56 (method B).
//!
//! # Features
//! - Spectral-subtraction degradation with calibrated speech-shaped noise
//! - Long-term average speech spectrum (LTASS) noise shaping per ITU-T P.50
//! - ITU-T P.56 active speech level with standard band-limiting pre-filters
//! - Deterministic, seedable noise generation for reproducible test material
//!
//! # Example
//! ```no_run
//! use rand::SeedableRng;
//! use specdegrade::degrade::{apply_spectral_subtraction, DegradeConfig};
//! use specdegrade::asl::{active_speech_level, AslOptions};
//!
//! let clean = vec![0.0f32; 48_000];
//! let mut rng = rand::rngs::StdRng::seed_from_u64(1234);
//! let config = DegradeConfig::default();
//! let degraded =
//!     apply_spectral_subtraction(&clean, 48_000, -26.0, 10.0, &config, &mut rng).unwrap();
//! let result = active_speech_level(&degraded, 48_000, &AslOptions::default()).unwrap();
//! println!("ASL: {:.1} dBov", result.level_db);
//! ```

// Allow traditional for loops - often clearer for audio DSP code
#![allow(clippy::needless_range_loop)]

pub mod asl;
pub mod audio;
pub mod degrade;
pub mod error;
pub mod ltass;
pub mod stft;

pub use asl::{
    active_speech_level, active_speech_level_ex, scale_to_asl, AslOptions, AslResult, Prefilter,
};
pub use degrade::{apply_spectral_subtraction, DegradeConfig};
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default FFT size for spectral processing
pub const N_FFT: usize = 8192;

/// Default analysis window overlap fraction
pub const OVERLAP: f64 = 0.75;

/// Lowest representable level in dB; templates and spectra are floored here
/// before log conversion
pub const DB_MIN: f64 = -100.0;
