//! WAV rendering of synthesized drive signals.
//!
//! Writes the three coil channels as an interleaved float WAV, mainly for
//! inspecting waveforms offline without a rig attached.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::synth::{WaveformChunk, CHANNELS};

/// Multi-channel WAV recorder for chunk output.
pub struct Recorder {
    writer: WavWriter<BufWriter<File>>,
    sample_rate: u32,
    frames_written: u64,
}

impl Recorder {
    pub fn new(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = WavSpec {
            channels: CHANNELS as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("failed to create WAV file: {:?}", path))?;

        Ok(Self {
            writer,
            sample_rate,
            frames_written: 0,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames (per-channel sample triples) written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames_written as f64 / self.sample_rate as f64
    }

    /// Append one chunk, interleaving the channels frame by frame.
    pub fn write_chunk(&mut self, chunk: &WaveformChunk) -> Result<()> {
        for sample in chunk.interleaved() {
            self.writer
                .write_sample(sample)
                .context("failed to write sample")?;
        }
        self.frames_written += chunk.len() as u64;
        Ok(())
    }

    /// Close the file and write the header.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize().context("failed to finalize WAV file")
    }
}
