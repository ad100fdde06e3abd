//! Streaming engine.
//!
//! Owns the hardware seam (`OutputDevice`), the buffered refill session, and
//! offline WAV rendering.

mod device;
mod recorder;
mod streamer;

pub use device::{list_output_devices, CpalDevice, DeviceEvent, OutputDevice};
pub use recorder::Recorder;
pub use streamer::{BufferedStreamer, StreamSession, PRIME_CHUNKS};
