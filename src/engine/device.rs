//! Output device abstraction and the cpal-backed implementation.
//!
//! The device owns the hardware clock: it consumes queued frames at the
//! configured rate and asks for a refill once per chunk's worth of consumed
//! frames. Replaying stale samples on underrun is never acceptable, so a
//! shortfall raises a sticky underrun flag instead of rewinding the queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};

use crate::config::OutputConfig;
use crate::error::{ConfigError, StreamError};
use crate::synth::{WaveformChunk, CHANNELS};

/// Events the device delivers to the refill loop.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// One refill interval's worth of frames has been consumed.
    NeedChunk,
    /// The queue ran dry mid-callback; the session must end, not repeat data.
    Underrun,
    /// The driver reported a stream fault.
    Fault(String),
}

/// Hardware sink seam for the streamer.
///
/// Implementations hand their event stream to the caller at open time and
/// must make `close` idempotent; the refill loop is the only sanctioned
/// shutdown path but `Drop` acts as a backstop.
pub trait OutputDevice: Send {
    /// Queue one chunk behind previously written samples.
    fn write_chunk(&mut self, chunk: &WaveformChunk) -> Result<(), StreamError>;

    /// Start the device clock. Queued samples begin draining.
    fn start(&mut self) -> Result<(), StreamError>;

    /// True while the device refuses to replay stale samples on underrun.
    /// A session must never run against a device where this is false.
    fn regeneration_disallowed(&self) -> bool;

    /// Release the hardware handle. Safe to call more than once.
    fn close(&mut self);
}

/// Names of every available output device, used for error context and the
/// `devices` command.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.output_devices() {
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
    }
    names
}

/// State shared between the cpal pull callback and the writer side.
struct SharedQueue {
    /// Channel-interleaved frames waiting to be consumed.
    frames: Mutex<VecDeque<f32>>,
    /// Sticky: set the first time the callback comes up short.
    underrun: AtomicBool,
}

/// Real output device driving the host's audio stack through cpal.
pub struct CpalDevice {
    stream: Option<Stream>,
    shared: Arc<SharedQueue>,
    /// Queue capacity in samples; keeps a stalled writer from ballooning it.
    capacity: usize,
    closed: bool,
}

// SAFETY: cpal marks `Stream` `!Send` for cross-platform generality, but the
// handle is created in `open` and thereafter driven only from the single
// refill thread the streamer moves this device onto; it is never shared or
// used concurrently.
unsafe impl Send for CpalDevice {}

impl CpalDevice {
    /// Open the configured device and bind the coil channels.
    ///
    /// Returns the handle plus the event stream the refill loop listens on.
    /// Any open failure reports the requested device along with everything
    /// the host enumerated, so a bad name can be corrected.
    pub fn open(config: &OutputConfig) -> Result<(Self, Receiver<DeviceEvent>), ConfigError> {
        let host = cpal::default_host();

        let device = match &config.device {
            Some(name) => host
                .output_devices()
                .ok()
                .and_then(|mut devices| {
                    devices.find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                })
                .ok_or_else(|| ConfigError::DeviceNotFound {
                    requested: name.clone(),
                    available: list_output_devices(),
                })?,
            None => host
                .default_output_device()
                .ok_or_else(|| ConfigError::DeviceNotFound {
                    requested: "(default)".to_string(),
                    available: list_output_devices(),
                })?,
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let sample_format = device
            .default_output_config()
            .map_err(|e| ConfigError::ChannelOpen {
                device: device_name.clone(),
                channels: CHANNELS,
                reason: e.to_string(),
                available: list_output_devices(),
            })?
            .sample_format();

        let stream_config = StreamConfig {
            channels: CHANNELS as u16,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let shared = Arc::new(SharedQueue {
            frames: Mutex::new(VecDeque::new()),
            underrun: AtomicBool::new(false),
        });
        let (events_tx, events_rx) = mpsc::channel();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(
                &device,
                &stream_config,
                shared.clone(),
                events_tx,
                config.chunk_size,
            ),
            SampleFormat::I16 => build_stream::<i16>(
                &device,
                &stream_config,
                shared.clone(),
                events_tx,
                config.chunk_size,
            ),
            SampleFormat::U16 => build_stream::<u16>(
                &device,
                &stream_config,
                shared.clone(),
                events_tx,
                config.chunk_size,
            ),
            other => Err(format!("unsupported sample format {other:?}")),
        }
        .map_err(|reason| ConfigError::ChannelOpen {
            device: device_name,
            channels: CHANNELS,
            reason,
            available: list_output_devices(),
        })?;

        Ok((
            Self {
                stream: Some(stream),
                shared,
                capacity: config.buffer_chunks * config.chunk_size * CHANNELS,
                closed: false,
            },
            events_rx,
        ))
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    shared: Arc<SharedQueue>,
    events: Sender<DeviceEvent>,
    interval_frames: usize,
) -> Result<Stream, String>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let fault_events = events.clone();
    let mut consumed_frames = 0usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut frames = shared.frames.lock().unwrap();
                let mut starved = false;

                for frame in data.chunks_mut(CHANNELS) {
                    if frames.len() >= CHANNELS {
                        for slot in frame.iter_mut() {
                            let sample = frames.pop_front().unwrap_or(0.0);
                            *slot = T::from_sample(sample);
                        }
                    } else {
                        // Out of data. Output silence, never old samples.
                        starved = true;
                        for slot in frame.iter_mut() {
                            *slot = T::from_sample(0.0f32);
                        }
                    }
                    consumed_frames += 1;
                    if consumed_frames >= interval_frames {
                        consumed_frames -= interval_frames;
                        let _ = events.send(DeviceEvent::NeedChunk);
                    }
                }
                drop(frames);

                if starved && !shared.underrun.swap(true, Ordering::SeqCst) {
                    let _ = events.send(DeviceEvent::Underrun);
                }
            },
            move |err| {
                let _ = fault_events.send(DeviceEvent::Fault(err.to_string()));
            },
            None,
        )
        .map_err(|e| e.to_string())?;

    Ok(stream)
}

impl OutputDevice for CpalDevice {
    fn write_chunk(&mut self, chunk: &WaveformChunk) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        if self.shared.underrun.load(Ordering::SeqCst) {
            return Err(StreamError::Underrun);
        }

        let samples = chunk.interleaved();
        let mut frames = self.shared.frames.lock().unwrap();
        if frames.len() + samples.len() > self.capacity {
            return Err(StreamError::Write(format!(
                "device buffer overflow: {} queued + {} incoming exceeds {} samples",
                frames.len(),
                samples.len(),
                self.capacity
            )));
        }
        frames.extend(samples);
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        let stream = self.stream.as_ref().ok_or(StreamError::Closed)?;
        stream
            .play()
            .map_err(|e| StreamError::DeviceStart(e.to_string()))?;
        Ok(())
    }

    fn regeneration_disallowed(&self) -> bool {
        // The pull callback drains the queue strictly forward; there is no
        // replay path.
        true
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Dropping the stream stops the callback and releases the handle.
        self.stream = None;
        self.shared.frames.lock().unwrap().clear();
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.close();
    }
}
