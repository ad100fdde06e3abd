//! Timed choreography routines.
//!
//! Each routine is a short, repeating schedule of parameter mutations that
//! sweeps camber and heading to produce a motion pattern. Routines run as
//! tokio tasks; every hold between steps is a scheduled sleep, and a shared
//! running flag is checked at each step boundary so toggling a routine off
//! takes effect at the next step, never mid-hold and never preemptively.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::sleep;

use crate::params::ParameterStore;

/// Heading deviation from the driving direction during switchback, degrees.
const WIGGLE_ANGLE: f64 = 35.0;

/// Hold time for explode and switchback steps.
const STEP_HOLD: Duration = Duration::from_millis(200);

/// Pause between explode repetitions.
const EXPLODE_REST: Duration = Duration::from_millis(500);

/// Camber ceiling during a corkscrew pass, degrees.
const CORKSCREW_CAMBER_MAX: f64 = 70.0;

/// Sub-steps per corkscrew pass. Must stay even: camber ramps up over the
/// first half and back down over the second.
const CORKSCREW_STEPS: usize = 10;

/// Duration of one corkscrew pass, seconds.
const CORKSCREW_TIME: f64 = 1.0;

/// Length of the initial fast-heading segment of a corkscrew pass, seconds.
const CORKSCREW_ALPHA: f64 = 0.4;

/// Sub-steps in one wiggle perturbation.
const WIGGLE_STEPS: usize = 4;

/// Duration of one wiggle perturbation, seconds.
const WIGGLE_TIME: f64 = 0.1;

/// The named motion patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routine {
    Explode,
    Switchback,
    Corkscrew,
    Wiggle,
}

impl Routine {
    pub const ALL: [Routine; 4] = [
        Routine::Explode,
        Routine::Switchback,
        Routine::Corkscrew,
        Routine::Wiggle,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Routine::Explode => "explode",
            Routine::Switchback => "switchback",
            Routine::Corkscrew => "corkscrew",
            Routine::Wiggle => "wiggle",
        }
    }
}

/// Runs at most one routine at a time against a shared parameter store.
///
/// Lives on the interaction side; streaming only ever sees the parameter
/// writes the routines make.
pub struct ChoreographySequencer {
    store: ParameterStore,
    rt: Handle,
    running: Arc<AtomicBool>,
    active: Option<Routine>,
}

impl ChoreographySequencer {
    pub fn new(store: ParameterStore, rt: Handle) -> Self {
        Self {
            store,
            rt,
            running: Arc::new(AtomicBool::new(false)),
            active: None,
        }
    }

    /// The routine currently running, if any.
    pub fn active(&self) -> Option<Routine> {
        if self.running.load(Ordering::SeqCst) {
            self.active
        } else {
            None
        }
    }

    /// Start `routine` if idle, stop it if it is the one running, or switch
    /// to it if another routine is running.
    pub fn toggle(&mut self, routine: Routine) {
        if self.active() == Some(routine) {
            self.stop();
        } else {
            self.start(routine);
        }
    }

    pub fn start(&mut self, routine: Routine) {
        self.stop();
        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();
        self.active = Some(routine);

        let store = self.store.clone();
        self.rt.spawn(async move {
            match routine {
                Routine::Explode => explode(store, running).await,
                Routine::Switchback => switchback(store, running).await,
                Routine::Corkscrew => corkscrew(store, running).await,
                Routine::Wiggle => wiggle(store, running).await,
            }
        });
    }

    /// Request a stop; the task observes it at its next step boundary.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.active = None;
    }
}

/// Orthogonal camber for an explode step, plus whether the heading must flip.
fn explode_offsets(camber: f64) -> (f64, bool) {
    let ortho = camber - 90.0;
    (ortho, ortho.abs() > 91.0)
}

/// The two headings a switchback cycle alternates between.
fn switchback_headings(driving: f64) -> (f64, f64) {
    (
        (driving - WIGGLE_ANGLE).rem_euclid(360.0),
        (driving + WIGGLE_ANGLE).rem_euclid(360.0),
    )
}

/// Heading at elapsed time `s` into a corkscrew pass starting from `z_start`.
///
/// Two-segment angular velocity: rate `a` until `alpha`, doubled afterwards,
/// with `a` chosen so one pass covers one full revolution.
fn corkscrew_heading(s: f64, z_start: f64) -> f64 {
    let beta = CORKSCREW_TIME - CORKSCREW_ALPHA;
    let a = 360.0 / (2.0 * beta + CORKSCREW_ALPHA);
    if s <= CORKSCREW_ALPHA {
        a * s + z_start
    } else {
        2.0 * a * s - a * CORKSCREW_ALPHA + z_start
    }
}

/// Camber value at wiggle sub-step `k` (1-based) for a starting camber `c`:
/// ramps +c -> -c over the first half and back over the second.
fn wiggle_camber(c: f64, k: usize) -> f64 {
    let half = (WIGGLE_STEPS / 2) as f64;
    if k <= WIGGLE_STEPS / 2 {
        c - 2.0 * c * (k as f64 / half)
    } else {
        -c + 2.0 * c * ((k - WIGGLE_STEPS / 2) as f64 / half)
    }
}

/// Briefly tilt the field orthogonal to its current camber, then restore.
async fn explode(store: ParameterStore, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        let p = store.get();
        let (camber, heading) = (p.camber, p.zphase);
        let (ortho, flip) = explode_offsets(camber);

        store.update(|p| {
            p.camber = ortho;
            if flip {
                p.zphase = heading - 180.0;
            }
        });
        sleep(STEP_HOLD).await;

        store.update(|p| {
            p.camber = camber;
            if flip {
                p.zphase = heading;
            }
        });

        if !running.load(Ordering::SeqCst) {
            break;
        }
        sleep(EXPLODE_REST).await;
    }
}

/// Alternate the heading left and right of a driving direction. External
/// heading edits mid-run re-center the driving direction; stopping restores
/// it.
async fn switchback(store: ParameterStore, running: Arc<AtomicBool>) {
    let mut driving = store.get().zphase;
    while running.load(Ordering::SeqCst) {
        let (left, right) = switchback_headings(driving);

        store.set_zphase(left);
        sleep(STEP_HOLD).await;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        store.set_zphase(right);
        sleep(STEP_HOLD).await;

        let observed = store.get().zphase;
        if observed != right {
            driving = (observed - WIGGLE_ANGLE).rem_euclid(360.0);
        }
    }
    store.set_zphase(driving);
}

/// Ramp camber up and back down while the heading completes one revolution
/// on a two-segment velocity profile. Camber and heading for each sub-step
/// land in a single atomic update.
async fn corkscrew(store: ParameterStore, running: Arc<AtomicBool>) {
    let step_time = Duration::from_secs_f64(CORKSCREW_TIME / CORKSCREW_STEPS as f64);
    while running.load(Ordering::SeqCst) {
        let p0 = store.get();
        let z_start = p0.zphase;
        let mut camber = p0.camber;
        let camber_step = (CORKSCREW_CAMBER_MAX - camber) / (CORKSCREW_STEPS / 2) as f64;

        for k in 0..CORKSCREW_STEPS {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            let s = k as f64 * CORKSCREW_TIME / (CORKSCREW_STEPS - 1) as f64;
            let heading = corkscrew_heading(s, z_start);
            if s <= CORKSCREW_TIME / 2.0 {
                camber += camber_step;
            } else {
                camber -= camber_step;
            }

            let camber_now = camber;
            store.update(|p| {
                p.zphase = heading;
                p.camber = camber_now;
            });
            sleep(step_time).await;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// One-shot perturbation: sweep camber to its negative and back, then return
/// to idle on its own.
async fn wiggle(store: ParameterStore, running: Arc<AtomicBool>) {
    let step_time = Duration::from_secs_f64(WIGGLE_TIME / WIGGLE_STEPS as f64);
    let c = store.get().camber;
    for k in 1..=WIGGLE_STEPS {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        let target = wiggle_camber(c, k);
        store.set_camber(target);
        sleep(step_time).await;
    }
    running.store(false, Ordering::SeqCst);
}
