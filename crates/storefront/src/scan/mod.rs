//! Body scan capture.
//!
//! # State machine
//!
//! ```text
//! Idle --acquire_camera--> RequestingCamera --granted--> Previewing
//!                                 |                          |
//!                                 +--denied--> Idle          +--begin_capture--> CountingDown(n)
//!                                                                                     |
//! Idle <--saved / failed-- Completing <--------- CountingDown(0) is published --------+
//! ```
//!
//! The countdown publishes every value from `n` down to `0`, one per tick.
//! `cancel` is accepted from `Previewing` and `CountingDown`, including `0`. Every path back
//! to `Idle` releases the camera lease; the lease also releases on drop, so a
//! torn-down flow never leaves the camera running.
//!
//! Each run of the machine carries an epoch. Work that finishes after the run
//! it belongs to has ended (a late camera grant, a late save) sees a stale
//! epoch and leaves the current state alone.

mod camera;
mod history;
mod report;

pub use camera::{
    Camera, CameraConstraints, CameraError, CameraLease, CameraStream, SimulatedCamera,
};
pub use history::{ScanHistory, ScanList};
pub use report::ScanReport;

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use threadline_core::{Device, ScanPhase, ScanRecord, UserId};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, instrument};

use crate::error::{Result, StorefrontError, add_breadcrumb};
use crate::notify::{Notification, SharedNotifier};
use crate::session::SessionGate;

/// Default countdown length in seconds.
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 30;

/// Scan flow settings.
#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    /// Countdown length in ticks.
    pub countdown_seconds: u32,
    /// Time between countdown ticks.
    pub tick: Duration,
    /// Device recorded on saved scans.
    pub device: Device,
    pub constraints: CameraConstraints,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
            tick: Duration::from_secs(1),
            device: Device::Desktop,
            constraints: CameraConstraints::default(),
        }
    }
}

#[derive(Debug, Default)]
struct FlowState {
    phase: ScanPhase,
    epoch: u64,
    lease: Option<CameraLease>,
    ticker: Option<JoinHandle<()>>,
    owner: Option<UserId>,
}

impl FlowState {
    fn expect(&self, expected: ScanPhase, action: &'static str) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(StorefrontError::InvalidTransition {
                action,
                state: self.phase.to_string(),
            })
        }
    }

    /// Release everything and return to idle. Returns whether a run ended.
    fn reset(&mut self, abort_ticker: bool) -> bool {
        if let Some(handle) = self.ticker.take()
            && abort_ticker
        {
            handle.abort();
        }
        if let Some(mut lease) = self.lease.take() {
            lease.release();
        }
        self.owner = None;
        if self.phase == ScanPhase::Idle {
            return false;
        }
        self.phase = ScanPhase::Idle;
        self.epoch += 1;
        true
    }
}

/// Scan capture state machine.
///
/// Cheap to clone; clones drive the same flow.
#[derive(Clone)]
pub struct ScanFlow {
    inner: Arc<ScanFlowInner>,
}

struct ScanFlowInner {
    session: Arc<SessionGate>,
    camera: Arc<dyn Camera>,
    history: ScanHistory,
    notifier: SharedNotifier,
    settings: ScanSettings,
    state: Mutex<FlowState>,
    phase_tx: watch::Sender<ScanPhase>,
}

impl std::fmt::Debug for ScanFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanFlow")
            .field("phase", &self.phase())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Drop for ScanFlowInner {
    fn drop(&mut self) {
        self.state.get_mut().reset(true);
    }
}

impl ScanFlow {
    #[must_use]
    pub fn new(
        session: Arc<SessionGate>,
        camera: Arc<dyn Camera>,
        history: ScanHistory,
        notifier: SharedNotifier,
        settings: ScanSettings,
    ) -> Self {
        let (phase_tx, _) = watch::channel(ScanPhase::Idle);
        Self {
            inner: Arc::new(ScanFlowInner {
                session,
                camera,
                history,
                notifier,
                settings,
                state: Mutex::new(FlowState::default()),
                phase_tx,
            }),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        *self.inner.phase_tx.borrow()
    }

    /// Subscribe to phase changes (including every countdown tick).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScanPhase> {
        self.inner.phase_tx.subscribe()
    }

    /// Scan history backing this flow.
    #[must_use]
    pub fn history(&self) -> &ScanHistory {
        &self.inner.history
    }

    /// Ask for the camera and start previewing.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` for guests (shows "Login Required")
    /// - `InvalidTransition` unless the flow is idle
    /// - `PermissionDenied` if the camera is refused (shows "Camera Access Denied")
    #[instrument(skip(self))]
    pub async fn acquire_camera(&self) -> Result<()> {
        let inner = &self.inner;
        inner.require_identity()?;

        let epoch = {
            let mut state = inner.state.lock().await;
            state.expect(ScanPhase::Idle, "acquire the camera")?;
            inner.set_phase(&mut state, ScanPhase::RequestingCamera);
            state.epoch
        };

        let requested = inner.camera.request_stream(inner.settings.constraints).await;

        let mut state = inner.state.lock().await;
        let current = state.epoch == epoch && state.phase == ScanPhase::RequestingCamera;
        match requested {
            Ok(stream) => {
                let mut lease = CameraLease::new(stream);
                if !current {
                    lease.release();
                    return Err(StorefrontError::InvalidTransition {
                        action: "start previewing",
                        state: state.phase.to_string(),
                    });
                }
                state.lease = Some(lease);
                inner.set_phase(&mut state, ScanPhase::Previewing);
                info!("Camera preview started");
                Ok(())
            }
            Err(e) => {
                if current {
                    state.reset(true);
                    inner.publish(&state);
                }
                Err(StorefrontError::from(e).surface(inner.notifier.as_ref()))
            }
        }
    }

    /// Start the countdown. The capture completes on its own when it ends.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` if the shopper signed out while previewing
    /// - `InvalidTransition` unless the flow is previewing
    #[instrument(skip(self))]
    pub async fn begin_capture(&self) -> Result<()> {
        let inner = &self.inner;
        let user = inner.require_identity()?;

        let mut state = inner.state.lock().await;
        state.expect(ScanPhase::Previewing, "begin capture")?;

        let countdown = inner.settings.countdown_seconds.max(1);
        state.owner = Some(user);
        inner.set_phase(&mut state, ScanPhase::CountingDown(countdown));
        state.ticker = Some(spawn_ticker(Arc::downgrade(&self.inner), state.epoch));
        add_breadcrumb("scan", "begin_capture", None);
        info!(countdown, "Scan countdown started");
        Ok(())
    }

    /// Abandon the current capture. No record is written.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the flow is previewing or counting
    /// down.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        if !state.phase.is_cancellable() {
            return Err(StorefrontError::InvalidTransition {
                action: "cancel the scan",
                state: state.phase.to_string(),
            });
        }

        state.reset(true);
        inner.publish(&state);
        add_breadcrumb("scan", "cancel", None);
        inner
            .notifier
            .notify(Notification::info("Scan Cancelled", "Body scan has been cancelled."));
        Ok(())
    }

    /// Tear the flow down from any phase: stop the ticker, release the camera,
    /// go idle. Silent and idempotent.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        if state.reset(true) {
            debug!("Scan flow shut down");
        }
        self.inner.publish(&state);
    }
}

impl ScanFlowInner {
    fn require_identity(&self) -> Result<UserId> {
        self.session
            .current_user()
            .map(|identity| identity.id)
            .ok_or_else(|| {
                StorefrontError::NotAuthenticated("use the body scan feature")
                    .surface(self.notifier.as_ref())
            })
    }

    fn set_phase(&self, state: &mut FlowState, phase: ScanPhase) {
        state.phase = phase;
        self.publish(state);
    }

    fn publish(&self, state: &FlowState) {
        self.phase_tx.send_if_modified(|phase| {
            if *phase == state.phase {
                false
            } else {
                *phase = state.phase;
                true
            }
        });
    }

    /// One countdown tick. Returns the owner once the countdown reaches 0.
    async fn tick(&self, epoch: u64) -> Tick {
        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            return Tick::Stale;
        }
        match state.phase {
            ScanPhase::CountingDown(remaining) if remaining > 0 => {
                let remaining = remaining - 1;
                self.set_phase(&mut state, ScanPhase::CountingDown(remaining));
                if remaining > 0 {
                    Tick::Continue
                } else {
                    state.owner.clone().map_or(Tick::Stale, Tick::Complete)
                }
            }
            _ => Tick::Stale,
        }
    }

    async fn complete(&self, epoch: u64, user: UserId) {
        {
            let mut state = self.state.lock().await;
            if state.epoch != epoch {
                debug!("Scan torn down at zero");
                return;
            }
            self.set_phase(&mut state, ScanPhase::Completing);
        }

        let record = ScanRecord::captured(self.settings.device, Utc::now());
        let saved = self.history.save(&user, &record).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!("Scan finished after teardown");
            return;
        }
        // The ticker is the task running this; detach it instead of aborting.
        state.reset(false);
        self.publish(&state);
        drop(state);

        match saved {
            Ok(stored) => {
                info!(scan_id = %stored.scan_id, "Scan saved");
                self.notifier.notify(Notification::success(
                    "Scan Complete!",
                    "Your body scan has been completed successfully.",
                ));
            }
            Err(e) => {
                let e = e.report();
                tracing::warn!(error = %e, "Scan not saved");
                self.notifier
                    .notify(Notification::error("Error", "Failed to save scan. Please try again."));
            }
        }
    }
}

enum Tick {
    Continue,
    Complete(UserId),
    Stale,
}

fn spawn_ticker(flow: Weak<ScanFlowInner>, epoch: u64) -> JoinHandle<()> {
    let Some(period) = flow.upgrade().map(|inner| inner.settings.tick) else {
        return tokio::spawn(async {});
    };

    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;
            let Some(inner) = flow.upgrade() else {
                break;
            };
            match inner.tick(epoch).await {
                Tick::Continue => {}
                Tick::Complete(user) => {
                    // Subscribers get a turn to observe CountingDown(0).
                    tokio::task::yield_now().await;
                    inner.complete(epoch, user).await;
                    break;
                }
                Tick::Stale => break,
            }
        }
    })
}
