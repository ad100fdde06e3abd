//! Error taxonomy for coildrive.
//!
//! Configuration problems are fatal at startup and keep a streaming session
//! from ever starting. Streaming faults tear the session down and surface on
//! the session's fault path instead of unwinding into the device driver.

use thiserror::Error;

/// Errors that prevent a session from being configured or started.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sample rate {rate} sps is not evenly divisible by chunk length {chunk}")]
    UnevenChunkRate { rate: u32, chunk: usize },

    #[error("chunk length {chunk} is too short to span a waveform interval")]
    ChunkTooShort { chunk: usize },

    #[error("output device '{requested}' not found; available: {available:?}")]
    DeviceNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("failed to open {channels} output channels on '{device}': {reason}; available: {available:?}")]
    ChannelOpen {
        device: String,
        channels: usize,
        reason: String,
        available: Vec<String>,
    },
}

/// Faults raised during an active streaming session.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("priming write failed before playback started: {0}")]
    Prime(String),

    #[error("device write failed: {0}")]
    Write(String),

    #[error("output buffer underrun: the device consumed past the last written sample")]
    Underrun,

    #[error("device would replay stale samples on underrun; regeneration must stay disallowed")]
    RegenerationAllowed,

    #[error("failed to start the device clock: {0}")]
    DeviceStart(String),

    #[error("chunk synthesis panicked inside the refill callback")]
    Synthesis,

    #[error("device handle is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uneven_chunk_rate_message() {
        let err = ConfigError::UnevenChunkRate {
            rate: 8000,
            chunk: 333,
        };
        let msg = err.to_string();
        assert!(msg.contains("8000"));
        assert!(msg.contains("333"));
    }

    #[test]
    fn test_device_not_found_lists_alternatives() {
        let err = ConfigError::DeviceNotFound {
            requested: "coil-rig".to_string(),
            available: vec!["default".to_string(), "usb-dac".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("coil-rig"));
        assert!(msg.contains("usb-dac"));
    }

    #[test]
    fn test_config_error_converts_to_stream_error() {
        let err: StreamError = ConfigError::ChunkTooShort { chunk: 1 }.into();
        assert!(matches!(err, StreamError::Config(_)));
    }
}
