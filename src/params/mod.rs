//! Shared signal parameter state.
//!
//! `ParameterStore` is the single point of exchange between the interaction
//! side (UI, keyboard, gamepad, choreography tasks) and the streaming side
//! (the refill callback running on the device's timing thread). Readers always
//! see a whole-struct snapshot; writers mutate the whole set under one lock
//! and never expose individual field references across threads.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

/// Whether synthesis produces the rotating field or fixed calibration tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Normal,
    Calibration,
}

/// The full set of signal-design parameters.
///
/// Heading (`zphase`) is kept normalized to [0, 360) and the amplitude
/// multiplier non-negative; both are re-established after every store write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalParameters {
    /// Amplitude multiplier applied to every channel.
    pub multiplier: f64,
    /// Field rotation frequency in Hz.
    pub frequency: f64,
    /// Field tilt angle in degrees.
    pub camber: f64,
    /// Heading of the field's lowest point, degrees in [0, 360).
    pub zphase: f64,
    /// Scale correction for the asymmetric z coil pair. Constant per session.
    pub zcoeff: f64,
    /// Selects field synthesis or calibration tones.
    pub mode: OutputMode,
    /// Per-channel amplitudes used in calibration mode (x, y, z).
    pub calib_amps: [f64; 3],
}

impl SignalParameters {
    fn normalize(&mut self) {
        self.zphase = self.zphase.rem_euclid(360.0);
        if self.multiplier < 0.0 {
            self.multiplier = 0.0;
        }
    }
}

impl Default for SignalParameters {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            frequency: 20.0,
            camber: 0.0,
            zphase: 0.0,
            zcoeff: 0.653,
            mode: OutputMode::Normal,
            calib_amps: [1.0; 3],
        }
    }
}

/// Thread-shared parameter store with change notification.
///
/// Cloning is cheap and shares the same underlying state.
#[derive(Clone)]
pub struct ParameterStore {
    inner: Arc<Mutex<SignalParameters>>,
    notify: broadcast::Sender<SignalParameters>,
}

impl ParameterStore {
    pub fn new(initial: SignalParameters) -> Self {
        let mut params = initial;
        params.normalize();
        let (notify, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Mutex::new(params)),
            notify,
        }
    }

    /// Point-in-time copy of the whole parameter set.
    ///
    /// Bounded and non-blocking apart from the lock itself; safe to call from
    /// the refill callback.
    pub fn get(&self) -> SignalParameters {
        *self.inner.lock().unwrap()
    }

    /// Apply one logical edit to the whole parameter set.
    ///
    /// The closure runs under the lock, so multi-field edits (camber plus
    /// heading in one choreography step) are observed together or not at all.
    /// Normalization runs after the edit, then observers are notified with the
    /// resulting snapshot. Returns that snapshot.
    pub fn update<F>(&self, edit: F) -> SignalParameters
    where
        F: FnOnce(&mut SignalParameters),
    {
        let snapshot = {
            let mut guard = self.inner.lock().unwrap();
            edit(&mut guard);
            guard.normalize();
            *guard
        };
        // Send after the lock is released; no subscriber work happens under it.
        let _ = self.notify.send(snapshot);
        snapshot
    }

    /// Subscribe to post-write snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<SignalParameters> {
        self.notify.subscribe()
    }

    pub fn set_multiplier(&self, value: f64) -> SignalParameters {
        self.update(|p| p.multiplier = value)
    }

    pub fn set_frequency(&self, value: f64) -> SignalParameters {
        self.update(|p| p.frequency = value)
    }

    pub fn set_camber(&self, value: f64) -> SignalParameters {
        self.update(|p| p.camber = value)
    }

    pub fn set_zphase(&self, value: f64) -> SignalParameters {
        self.update(|p| p.zphase = value)
    }

    pub fn set_mode(&self, mode: OutputMode) -> SignalParameters {
        self.update(|p| p.mode = mode)
    }

    pub fn set_calib_amp(&self, channel: usize, value: f64) -> SignalParameters {
        self.update(|p| {
            if channel < p.calib_amps.len() {
                p.calib_amps[channel] = value;
            }
        })
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(SignalParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_normalized_on_write() {
        let store = ParameterStore::default();

        store.set_zphase(450.0);
        assert_eq!(store.get().zphase, 90.0);

        store.set_zphase(-35.0);
        assert_eq!(store.get().zphase, 325.0);

        store.set_zphase(360.0);
        assert_eq!(store.get().zphase, 0.0);
    }

    #[test]
    fn test_multiplier_clamped_non_negative() {
        let store = ParameterStore::default();
        store.set_multiplier(-2.0);
        assert_eq!(store.get().multiplier, 0.0);

        store.set_multiplier(1.5);
        assert_eq!(store.get().multiplier, 1.5);
    }

    #[test]
    fn test_initial_values_normalized() {
        let store = ParameterStore::new(SignalParameters {
            zphase: 720.0,
            multiplier: -1.0,
            ..SignalParameters::default()
        });
        let p = store.get();
        assert_eq!(p.zphase, 0.0);
        assert_eq!(p.multiplier, 0.0);
    }

    #[test]
    fn test_multi_field_update_is_atomic_snapshot() {
        let store = ParameterStore::default();
        let snapshot = store.update(|p| {
            p.camber = 45.0;
            p.zphase = 400.0;
        });
        assert_eq!(snapshot.camber, 45.0);
        assert_eq!(snapshot.zphase, 40.0);
        assert_eq!(store.get(), snapshot);
    }

    #[test]
    fn test_subscribers_see_post_write_snapshot() {
        let store = ParameterStore::default();
        let mut rx = store.subscribe();

        store.set_frequency(40.0);
        let seen = rx.try_recv().unwrap();
        assert_eq!(seen.frequency, 40.0);
    }

    #[test]
    fn test_clones_share_state() {
        let store = ParameterStore::default();
        let other = store.clone();
        other.set_camber(12.0);
        assert_eq!(store.get().camber, 12.0);
    }

    #[test]
    fn test_calib_amp_out_of_range_ignored() {
        let store = ParameterStore::default();
        store.set_calib_amp(0, 0.5);
        store.set_calib_amp(7, 9.9);
        assert_eq!(store.get().calib_amps, [0.5, 1.0, 1.0]);
    }
}
