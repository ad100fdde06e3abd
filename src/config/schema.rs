//! Configuration schema definitions

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::params::SignalParameters;
use crate::synth::CHANNELS;

/// Main configuration for coildrive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoildriveConfig {
    /// Output device settings
    pub output: OutputConfig,

    /// Default signal values applied at startup
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Input device settings
    #[serde(default)]
    pub input: InputConfig,
}

impl CoildriveConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.output.sample_rate < 1000 || self.output.sample_rate > 192000 {
            bail!("Sample rate must be between 1000 and 192000");
        }
        if self.output.chunk_size < 2 {
            bail!("Chunk size must be at least 2");
        }
        if self.output.sample_rate as usize % self.output.chunk_size != 0 {
            bail!(
                "Sample rate {} must be evenly divisible by chunk size {}",
                self.output.sample_rate,
                self.output.chunk_size
            );
        }
        if self.output.channels.len() != CHANNELS {
            bail!("Exactly {} output channels must be configured", CHANNELS);
        }
        if self.output.buffer_chunks < 3 {
            bail!("Device buffer must hold at least 3 chunks (2 primed + 1 in flight)");
        }
        if self.defaults.multiplier < 0.0 {
            bail!("Default multiplier must be non-negative");
        }
        if self.input.dead_zone < 0.0 || self.input.dead_zone > 1.0 {
            bail!("Dead zone must be between 0.0 and 1.0");
        }
        Ok(())
    }
}

/// Output device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output device name (None = default device)
    pub device: Option<String>,

    /// Physical channel indices bound to the x, y, z coils
    #[serde(default = "default_channels")]
    pub channels: Vec<u32>,

    /// Generation rate in samples per second (default: 8000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Samples per refill chunk (default: 200)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Device buffer capacity in chunks (default: 4)
    #[serde(default = "default_buffer_chunks")]
    pub buffer_chunks: usize,
}

fn default_channels() -> Vec<u32> {
    vec![0, 1, 2]
}
fn default_sample_rate() -> u32 {
    8000
}
fn default_chunk_size() -> usize {
    200
}
fn default_buffer_chunks() -> usize {
    4
}

/// Default signal values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Amplitude multiplier (default: 1.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Frequency in Hz (default: 20)
    #[serde(default = "default_frequency")]
    pub frequency: f64,

    /// Field camber in degrees (default: 60)
    #[serde(default = "default_camber")]
    pub camber: f64,

    /// Heading in degrees (default: 270)
    #[serde(default = "default_zphase")]
    pub zphase: f64,

    /// Z coil asymmetry coefficient (default: 0.653)
    #[serde(default = "default_zcoeff")]
    pub zcoeff: f64,

    /// Calibration amplitudes for x, y, z (default: 1.0 each)
    #[serde(default = "default_calib_amps")]
    pub calib_amps: [f64; CHANNELS],
}

fn default_multiplier() -> f64 {
    1.0
}
fn default_frequency() -> f64 {
    20.0
}
fn default_camber() -> f64 {
    60.0
}
fn default_zphase() -> f64 {
    270.0
}
fn default_zcoeff() -> f64 {
    0.653
}
fn default_calib_amps() -> [f64; CHANNELS] {
    [1.0; CHANNELS]
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            multiplier: default_multiplier(),
            frequency: default_frequency(),
            camber: default_camber(),
            zphase: default_zphase(),
            zcoeff: default_zcoeff(),
            calib_amps: default_calib_amps(),
        }
    }
}

impl From<&DefaultsConfig> for SignalParameters {
    fn from(defaults: &DefaultsConfig) -> Self {
        Self {
            multiplier: defaults.multiplier,
            frequency: defaults.frequency,
            camber: defaults.camber,
            zphase: defaults.zphase,
            zcoeff: defaults.zcoeff,
            calib_amps: defaults.calib_amps,
            ..Self::default()
        }
    }
}

/// Input device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Stick magnitude below which no heading update is emitted (default: 0.3)
    #[serde(default = "default_dead_zone")]
    pub dead_zone: f64,
}

fn default_dead_zone() -> f64 {
    0.3
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dead_zone: default_dead_zone(),
        }
    }
}
