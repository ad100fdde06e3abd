//! Double-buffered refill streaming.
//!
//! `BufferedStreamer` primes the device, starts its clock, and then services
//! refill requests on a dedicated thread. All faults inside that loop are
//! caught, logged, and delivered through the session result; nothing unwinds
//! across the device boundary.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::StreamError;
use crate::params::ParameterStore;
use crate::synth::{WaveSynthesizer, WaveformChunk};
use crate::viz::ChunkBuffer;

use super::device::{DeviceEvent, OutputDevice};

/// Chunks written before the clock starts, as headroom against scheduling
/// jitter on the refill thread.
pub const PRIME_CHUNKS: usize = 2;

/// How often the refill loop wakes to observe a stop request when the device
/// is quiet.
const STOP_POLL: Duration = Duration::from_millis(200);

/// Owns a synthesizer and a parameter source and turns them into a running
/// device session.
pub struct BufferedStreamer {
    synth: WaveSynthesizer,
    store: ParameterStore,
    chunk_buffer: Option<Arc<Mutex<ChunkBuffer>>>,
}

impl BufferedStreamer {
    pub fn new(synth: WaveSynthesizer, store: ParameterStore) -> Self {
        Self {
            synth,
            store,
            chunk_buffer: None,
        }
    }

    /// Publish every synthesized chunk into a shared buffer for display.
    pub fn with_chunk_buffer(mut self, buffer: Arc<Mutex<ChunkBuffer>>) -> Self {
        self.chunk_buffer = Some(buffer);
        self
    }

    /// Prime the device, start its clock, and hand the refill loop its own
    /// thread. On any start failure the device handle is closed before the
    /// error is returned.
    pub fn start<D>(
        self,
        mut device: D,
        events: Receiver<DeviceEvent>,
    ) -> Result<StreamSession, StreamError>
    where
        D: OutputDevice + 'static,
    {
        let Self {
            mut synth,
            store,
            chunk_buffer,
        } = self;

        if !device.regeneration_disallowed() {
            device.close();
            return Err(StreamError::RegenerationAllowed);
        }

        for _ in 0..PRIME_CHUNKS {
            let chunk = match synthesize_guarded(&mut synth, &store) {
                Ok(chunk) => chunk,
                Err(e) => {
                    device.close();
                    return Err(e);
                }
            };
            if let Err(e) = device.write_chunk(&chunk) {
                device.close();
                return Err(StreamError::Prime(e.to_string()));
            }
        }

        if let Err(e) = device.start() {
            device.close();
            return Err(e);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            let done = done.clone();
            thread::spawn(move || {
                let result =
                    refill_loop(&mut device, &events, &mut synth, &store, &stop, &chunk_buffer);
                // The loop owns the handle; every exit path releases it here.
                device.close();
                done.store(true, Ordering::SeqCst);
                if let Err(ref e) = result {
                    eprintln!("streaming session fault: {e}");
                }
                result
            })
        };

        Ok(StreamSession {
            stop,
            done,
            handle: Some(handle),
        })
    }
}

fn refill_loop<D: OutputDevice>(
    device: &mut D,
    events: &Receiver<DeviceEvent>,
    synth: &mut WaveSynthesizer,
    store: &ParameterStore,
    stop: &AtomicBool,
    chunk_buffer: &Option<Arc<Mutex<ChunkBuffer>>>,
) -> Result<(), StreamError> {
    loop {
        if stop.load(Ordering::SeqCst) {
            return Ok(());
        }
        match events.recv_timeout(STOP_POLL) {
            Ok(DeviceEvent::NeedChunk) => {
                let chunk = synthesize_guarded(synth, store)?;
                if let Some(buffer) = chunk_buffer {
                    // Display only; skip the frame rather than wait.
                    if let Ok(mut buf) = buffer.try_lock() {
                        buf.publish(chunk.clone());
                    }
                }
                device.write_chunk(&chunk)?;
            }
            Ok(DeviceEvent::Underrun) => return Err(StreamError::Underrun),
            Ok(DeviceEvent::Fault(msg)) => return Err(StreamError::Write(msg)),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Err(StreamError::Closed),
        }
    }
}

/// Snapshot the store and synthesize one chunk, converting any panic in the
/// computation into a session fault instead of unwinding into the caller.
fn synthesize_guarded(
    synth: &mut WaveSynthesizer,
    store: &ParameterStore,
) -> Result<WaveformChunk, StreamError> {
    let snapshot = store.get();
    panic::catch_unwind(AssertUnwindSafe(|| synth.synthesize(&snapshot)))
        .map_err(|_| StreamError::Synthesis)
}

/// Handle to a running streaming session.
///
/// Dropping the session requests a stop but does not wait; call `stop` to
/// observe the session's final result.
#[derive(Debug)]
pub struct StreamSession {
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), StreamError>>>,
}

impl StreamSession {
    /// True until the refill loop has released the device and exited.
    pub fn is_running(&self) -> bool {
        !self.done.load(Ordering::SeqCst)
    }

    /// Ask the refill loop to shut down at its next event boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stop the session and wait for the refill loop's result.
    pub fn stop(mut self) -> Result<(), StreamError> {
        self.request_stop();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| StreamError::Synthesis)?,
            None => Ok(()),
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SignalParameters;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::{self, Sender};

    /// Scripted stand-in for a hardware device.
    struct MockDevice {
        written: Arc<Mutex<Vec<WaveformChunk>>>,
        closes: Arc<AtomicUsize>,
        starts: Arc<AtomicUsize>,
        fail_write_at: Option<usize>,
        regeneration_disallowed: bool,
        writes: usize,
    }

    struct MockProbe {
        written: Arc<Mutex<Vec<WaveformChunk>>>,
        closes: Arc<AtomicUsize>,
        starts: Arc<AtomicUsize>,
    }

    fn mock_device(fail_write_at: Option<usize>) -> (MockDevice, MockProbe) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let closes = Arc::new(AtomicUsize::new(0));
        let starts = Arc::new(AtomicUsize::new(0));
        (
            MockDevice {
                written: written.clone(),
                closes: closes.clone(),
                starts: starts.clone(),
                fail_write_at,
                regeneration_disallowed: true,
                writes: 0,
            },
            MockProbe {
                written,
                closes,
                starts,
            },
        )
    }

    impl OutputDevice for MockDevice {
        fn write_chunk(&mut self, chunk: &WaveformChunk) -> Result<(), StreamError> {
            if self.fail_write_at == Some(self.writes) {
                return Err(StreamError::Write("scripted failure".to_string()));
            }
            self.writes += 1;
            self.written.lock().unwrap().push(chunk.clone());
            Ok(())
        }

        fn start(&mut self) -> Result<(), StreamError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn regeneration_disallowed(&self) -> bool {
            self.regeneration_disallowed
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn streamer() -> BufferedStreamer {
        let synth = WaveSynthesizer::new(8000, 100).unwrap();
        let store = ParameterStore::new(SignalParameters::default());
        BufferedStreamer::new(synth, store)
    }

    fn events() -> (Sender<DeviceEvent>, Receiver<DeviceEvent>) {
        mpsc::channel()
    }

    fn wait_until_done(session: &StreamSession) {
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while session.is_running() {
            assert!(std::time::Instant::now() < deadline, "session did not end");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_primes_two_chunks_before_start() {
        let (device, probe) = mock_device(None);
        let (tx, rx) = events();

        let session = streamer().start(device, rx).unwrap();
        assert_eq!(probe.written.lock().unwrap().len(), PRIME_CHUNKS);
        assert_eq!(probe.starts.load(Ordering::SeqCst), 1);

        drop(tx);
        // However the loop ends, the handle must be released exactly once.
        let _ = session.stop();
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_priming_failure_closes_device_once() {
        let (device, probe) = mock_device(Some(1));
        let (_tx, rx) = events();

        let err = streamer().start(device, rx).unwrap_err();
        assert!(matches!(err, StreamError::Prime(_)));
        assert_eq!(probe.starts.load(Ordering::SeqCst), 0);
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
        assert_eq!(probe.written.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_regeneration_allowed_device_rejected() {
        let (mut device, probe) = mock_device(None);
        device.regeneration_disallowed = false;
        let (_tx, rx) = events();

        let err = streamer().start(device, rx).unwrap_err();
        assert!(matches!(err, StreamError::RegenerationAllowed));
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
        assert!(probe.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_refill_on_need_chunk() {
        let (device, probe) = mock_device(None);
        let (tx, rx) = events();

        let session = streamer().start(device, rx).unwrap();
        for _ in 0..3 {
            tx.send(DeviceEvent::NeedChunk).unwrap();
        }
        // Wait for the loop to drain the events.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while probe.written.lock().unwrap().len() < PRIME_CHUNKS + 3 {
            assert!(std::time::Instant::now() < deadline, "refill loop stalled");
            thread::sleep(Duration::from_millis(5));
        }

        session.stop().unwrap();
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_underrun_event_ends_session_with_error() {
        let (device, probe) = mock_device(None);
        let (tx, rx) = events();

        let session = streamer().start(device, rx).unwrap();
        tx.send(DeviceEvent::Underrun).unwrap();

        wait_until_done(&session);
        assert!(matches!(session.stop(), Err(StreamError::Underrun)));
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_failure_mid_session_closes_once() {
        let (device, probe) = mock_device(Some(3));
        let (tx, rx) = events();

        let session = streamer().start(device, rx).unwrap();
        // Prime consumed writes 0 and 1; the second refill hits the scripted
        // failure at write 3.
        tx.send(DeviceEvent::NeedChunk).unwrap();
        tx.send(DeviceEvent::NeedChunk).unwrap();

        wait_until_done(&session);
        assert!(matches!(session.stop(), Err(StreamError::Write(_))));
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_device_fault_surfaces_as_stream_error() {
        let (device, probe) = mock_device(None);
        let (tx, rx) = events();

        let session = streamer().start(device, rx).unwrap();
        tx.send(DeviceEvent::Fault("driver died".to_string())).unwrap();

        wait_until_done(&session);
        match session.stop() {
            Err(StreamError::Write(msg)) => assert!(msg.contains("driver died")),
            other => panic!("expected write fault, got {other:?}"),
        }
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_is_clean_shutdown() {
        let (device, probe) = mock_device(None);
        let (_tx, rx) = events();

        let session = streamer().start(device, rx).unwrap();
        assert!(session.is_running());
        session.stop().unwrap();
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refill_chunks_are_phase_continuous() {
        let (device, probe) = mock_device(None);
        let (tx, rx) = events();

        let store = ParameterStore::new(SignalParameters {
            frequency: 28.0,
            zphase: 90.0,
            ..SignalParameters::default()
        });
        let synth = WaveSynthesizer::new(8000, 100).unwrap();
        let session = BufferedStreamer::new(synth, store).start(device, rx).unwrap();

        tx.send(DeviceEvent::NeedChunk).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while probe.written.lock().unwrap().len() < PRIME_CHUNKS + 1 {
            assert!(std::time::Instant::now() < deadline, "refill loop stalled");
            thread::sleep(Duration::from_millis(5));
        }
        session.stop().unwrap();

        let written = probe.written.lock().unwrap();
        for pair in written.windows(2) {
            for axis in crate::synth::Axis::ALL {
                let last = *pair[0].channel(axis).last().unwrap();
                let first = pair[1].channel(axis)[0];
                assert!((last - first).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_chunk_buffer_receives_refills() {
        let (device, _probe) = mock_device(None);
        let (tx, rx) = events();
        let buffer = Arc::new(Mutex::new(ChunkBuffer::new()));

        let session = streamer()
            .with_chunk_buffer(buffer.clone())
            .start(device, rx)
            .unwrap();
        tx.send(DeviceEvent::NeedChunk).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while buffer.lock().unwrap().latest().is_none() {
            assert!(std::time::Instant::now() < deadline, "no chunk published");
            thread::sleep(Duration::from_millis(5));
        }
        session.stop().unwrap();
    }
}
