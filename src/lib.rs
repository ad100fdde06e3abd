//! coildrive - Rotating magnetic field generator for 3-axis coil rigs
//!
//! Synthesizes phase-continuous sine waveforms for three orthogonal coil
//! pairs and streams them to an output device in fixed-size chunks. Field
//! orientation, frequency, and amplitude are adjustable while streaming.

pub mod choreo;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod params;
pub mod synth;
pub mod viz;

pub use config::CoildriveConfig;
pub use engine::BufferedStreamer;
pub use params::ParameterStore;
