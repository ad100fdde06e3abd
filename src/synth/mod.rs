//! Waveform synthesis for the three coil channels.
//!
//! Pure chunk computation plus the small amount of phase-tracking state needed
//! to keep consecutive chunks continuous while parameters change underneath.

mod chunk;
mod waves;

pub use chunk::{Axis, WaveformChunk, CHANNELS};
pub use waves::{WaveSynthesizer, CALIBRATION_FREQ_HZ};
