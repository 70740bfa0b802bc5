//! Audio containers, WAV I/O, and level/filter utilities

mod dsp;
pub mod filter;
mod io;

pub use dsp::{apply_gain, compute_peak, compute_rms, db_to_linear, linear_to_db, pad_to_length};
pub use io::{load_audio, save_audio, save_samples, AudioData};
