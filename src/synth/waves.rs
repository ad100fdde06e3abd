//! Chunk computation with cross-chunk phase tracking.
//!
//! Each chunk spans one "angular chunk" of the requested wave. When the wave
//! count per chunk is fractional, the leftover fraction accumulates in a
//! per-mode counter so the next chunk picks up exactly where the previous one
//! stopped. Changing frequency restarts the wave from its zero-phase origin.

use std::f64::consts::PI;

use crate::error::ConfigError;
use crate::params::{OutputMode, SignalParameters};

use super::chunk::{WaveformChunk, CHANNELS};

/// Fixed tone frequency used for calibration output, in Hz.
pub const CALIBRATION_FREQ_HZ: f64 = 20.0;

/// Phase offsets of the calibration channels, in radians (0°, 90°, 180°).
const CALIBRATION_OFFSETS: [f64; CHANNELS] = [0.0, PI / 2.0, PI];

/// Cross-chunk continuity state for one synthesis mode.
#[derive(Debug, Clone, Copy)]
struct PhaseState {
    last_freq: f64,
    counter: u64,
}

impl PhaseState {
    fn new() -> Self {
        // NaN never compares equal, so the first chunk always starts at
        // counter zero regardless of the requested frequency.
        Self {
            last_freq: f64::NAN,
            counter: 0,
        }
    }

    /// Advance for one chunk at `freq` and return the counter to use.
    fn advance(&mut self, freq: f64) -> u64 {
        if freq == self.last_freq {
            self.counter += 1;
        } else {
            self.counter = 0;
            self.last_freq = freq;
        }
        self.counter
    }
}

/// Computes one chunk of per-channel samples from a parameter snapshot.
///
/// Owns the phase state for both output modes so toggling calibration on and
/// off corrupts neither counter. No I/O; the only mutation is that state.
#[derive(Debug)]
pub struct WaveSynthesizer {
    sample_rate: u32,
    chunk_len: usize,
    chunks_per_sec: u32,
    normal: PhaseState,
    calibration: PhaseState,
}

impl WaveSynthesizer {
    /// Validate the rate/chunk pairing and build a synthesizer.
    ///
    /// The sample rate must divide evenly into chunks; a remainder would make
    /// the leftover-fraction bookkeeping silently wrong, so it is rejected
    /// outright instead of rounded.
    pub fn new(sample_rate: u32, chunk_len: usize) -> Result<Self, ConfigError> {
        if chunk_len < 2 {
            return Err(ConfigError::ChunkTooShort { chunk: chunk_len });
        }
        if sample_rate as usize % chunk_len != 0 {
            return Err(ConfigError::UnevenChunkRate {
                rate: sample_rate,
                chunk: chunk_len,
            });
        }
        Ok(Self {
            sample_rate,
            chunk_len,
            chunks_per_sec: sample_rate / chunk_len as u32,
            normal: PhaseState::new(),
            calibration: PhaseState::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    pub fn chunks_per_sec(&self) -> u32 {
        self.chunks_per_sec
    }

    /// Compute the next chunk for the given snapshot.
    pub fn synthesize(&mut self, params: &SignalParameters) -> WaveformChunk {
        match params.mode {
            OutputMode::Normal => self.field_chunk(params),
            OutputMode::Calibration => self.calibration_chunk(params),
        }
    }

    /// Rotating-field synthesis: each channel is a linear combination of
    /// sin/cos of the time vector, camber, and heading; z additionally scaled
    /// by the asymmetry coefficient.
    fn field_chunk(&mut self, p: &SignalParameters) -> WaveformChunk {
        let c = self.chunks_per_sec as f64;
        let a = p.multiplier;
        let theta = p.camber.to_radians();
        let zeta = p.zphase.to_radians();

        let start_frac = (p.frequency / c).fract();
        let counter = self.normal.advance(p.frequency);
        let shift = counter as f64 * 2.0 * PI * start_frac;

        // One angular chunk: 2*pi*f/c radians across chunk_len points.
        let span = 2.0 * PI * p.frequency / c;
        let step = span / (self.chunk_len - 1) as f64;

        let (sin_theta, cos_theta) = theta.sin_cos();
        let (sin_zeta, cos_zeta) = zeta.sin_cos();

        WaveformChunk::from_fn(self.chunk_len, |i| {
            let t = shift + step * i as f64;
            let (sin_t, cos_t) = t.sin_cos();
            [
                a * (sin_zeta * cos_t - sin_theta * cos_zeta * sin_t),
                -a * (cos_zeta * cos_t + sin_theta * sin_zeta * sin_t),
                p.zcoeff * a * (cos_theta * sin_t),
            ]
        })
    }

    /// Calibration synthesis: three independent cosines at the fixed
    /// calibration frequency, offset 0/90/180 degrees, each with its own
    /// amplitude. Uses its own counter so it never disturbs field continuity.
    fn calibration_chunk(&mut self, p: &SignalParameters) -> WaveformChunk {
        let c = self.chunks_per_sec as f64;

        let start_frac = (CALIBRATION_FREQ_HZ / c).fract();
        let counter = self.calibration.advance(CALIBRATION_FREQ_HZ);
        let shift = counter as f64 * 2.0 * PI * start_frac;

        let span = 2.0 * PI * CALIBRATION_FREQ_HZ / c;
        let step = span / (self.chunk_len - 1) as f64;

        WaveformChunk::from_fn(self.chunk_len, |i| {
            let t = shift + step * i as f64;
            [
                p.calib_amps[0] * (t + CALIBRATION_OFFSETS[0]).cos(),
                p.calib_amps[1] * (t + CALIBRATION_OFFSETS[1]).cos(),
                p.calib_amps[2] * (t + CALIBRATION_OFFSETS[2]).cos(),
            ]
        })
    }
}
