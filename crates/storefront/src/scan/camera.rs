//! Camera access.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the camera device.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The shopper (or the platform) refused camera access.
    #[error("camera permission denied")]
    PermissionDenied,

    /// No usable camera.
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// Requested video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// A live camera stream.
pub trait CameraStream: Send + Sync {
    /// Stop every track. Stopping an already stopped stream does nothing.
    fn stop_all_tracks(&mut self);

    /// Tracks still running.
    fn active_tracks(&self) -> usize;
}

/// Camera device.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Ask for a stream; may prompt the shopper for permission.
    async fn request_stream(
        &self,
        constraints: CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// Owns a stream and stops it exactly once, on [`CameraLease::release`] or
/// on drop, whichever comes first.
pub struct CameraLease {
    stream: Option<Box<dyn CameraStream>>,
}

impl std::fmt::Debug for CameraLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraLease")
            .field("active", &self.is_active())
            .finish()
    }
}

impl CameraLease {
    #[must_use]
    pub fn new(stream: Box<dyn CameraStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Whether the stream has not been released yet.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Stop the stream. Returns `false` if it was already released.
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop_all_tracks();
                tracing::debug!("Camera released");
                true
            }
            None => false,
        }
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// SimulatedCamera
// =============================================================================

/// Camera without hardware. Counts what it hands out so tests can check that
/// every stream was stopped exactly once.
#[derive(Debug, Default)]
pub struct SimulatedCamera {
    deny: AtomicBool,
    delay_ms: AtomicU64,
    opened: AtomicU32,
    counters: Arc<StreamCounters>,
}

#[derive(Debug, Default)]
struct StreamCounters {
    live_tracks: AtomicUsize,
    stops: AtomicU32,
}

struct SimulatedStream {
    tracks: usize,
    counters: Arc<StreamCounters>,
}

impl CameraStream for SimulatedStream {
    fn stop_all_tracks(&mut self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        if self.tracks > 0 {
            self.counters
                .live_tracks
                .fetch_sub(self.tracks, Ordering::SeqCst);
            self.tracks = 0;
        }
    }

    fn active_tracks(&self) -> usize {
        self.tracks
    }
}

impl SimulatedCamera {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every request with `PermissionDenied`.
    pub fn set_deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    /// Take `delay` to answer a request, like a permission prompt.
    pub fn set_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Streams handed out so far.
    #[must_use]
    pub fn streams_opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Calls to `stop_all_tracks` so far.
    #[must_use]
    pub fn stop_calls(&self) -> u32 {
        self.counters.stops.load(Ordering::SeqCst)
    }

    /// Tracks currently running across all streams.
    #[must_use]
    pub fn live_tracks(&self) -> usize {
        self.counters.live_tracks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for SimulatedCamera {
    async fn request_stream(
        &self,
        constraints: CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.deny.load(Ordering::SeqCst) {
            return Err(CameraError::PermissionDenied);
        }

        tracing::debug!(
            width = constraints.width,
            height = constraints.height,
            "Simulated camera stream opened"
        );
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.counters.live_tracks.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimulatedStream {
            tracks: 1,
            counters: Arc::clone(&self.counters),
        }))
    }
}
