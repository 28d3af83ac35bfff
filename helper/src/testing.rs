//! In-memory stand-ins for the OS seams, shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::capture::{
    CaptureError, CaptureStream, ContentFilter, Display, Frame, FrameSink, ScreenSource,
    ShareableContent, StreamConfig, Window,
};
use crate::notifier::{Notification, Notifier, NotifyError};
use crate::permissions::{AuthorizationBackend, PermissionStatus};

struct AuthState {
    notifications: PermissionStatus,
    accessibility: bool,
    screen_capture: bool,
}

/// Authorization backend that records every call. `accept` decides what the
/// simulated user answers to a prompt.
pub struct SpyAuthorization {
    state: Mutex<AuthState>,
    accept: bool,
    prompts: AtomicUsize,
    calls: AtomicUsize,
}

impl Default for SpyAuthorization {
    /// Nothing granted; every prompt is declined.
    fn default() -> Self {
        Self::build(PermissionStatus::NotDetermined, false, false, false)
    }
}

impl SpyAuthorization {
    fn build(
        notifications: PermissionStatus,
        accessibility: bool,
        screen_capture: bool,
        accept: bool,
    ) -> Self {
        Self {
            state: Mutex::new(AuthState {
                notifications,
                accessibility,
                screen_capture,
            }),
            accept,
            prompts: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Nothing granted yet; every prompt is accepted.
    pub fn accepting() -> Self {
        Self::build(PermissionStatus::NotDetermined, false, false, true)
    }

    pub fn granted() -> Self {
        Self::build(PermissionStatus::Granted, true, true, false)
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Every backend call, queries included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_notification_status(&self, status: PermissionStatus) {
        self.state().notifications = status;
    }

    fn state(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, prompt: bool) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt {
            self.prompts.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl AuthorizationBackend for SpyAuthorization {
    async fn notification_status(&self) -> PermissionStatus {
        self.record(false);
        self.state().notifications
    }

    async fn request_notifications(&self) {
        self.record(true);
        self.state().notifications = if self.accept {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
    }

    async fn accessibility_trusted(&self) -> bool {
        self.record(false);
        self.state().accessibility
    }

    async fn prompt_accessibility(&self) {
        self.record(true);
        if self.accept {
            self.state().accessibility = true;
        }
    }

    async fn screen_capture_preflight(&self) -> bool {
        self.record(false);
        self.state().screen_capture
    }

    async fn request_screen_capture(&self) {
        self.record(true);
        if self.accept {
            self.state().screen_capture = true;
        }
    }
}

/// Notifier that keeps what it was asked to post.
#[derive(Default)]
pub struct SpyNotifier {
    sent: Mutex<Vec<Notification>>,
    fail_with: Option<String>,
}

impl SpyNotifier {
    pub fn failing(reason: &str) -> Self {
        Self {
            sent: Mutex::default(),
            fail_with: Some(reason.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for SpyNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        match &self.fail_with {
            Some(reason) => Err(NotifyError::Failed(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Two displays (ids 1 and 2) and one window (id 42).
pub fn sample_content() -> ShareableContent {
    ShareableContent {
        displays: vec![
            Display {
                id: 1,
                width: 4,
                height: 2,
            },
            Display {
                id: 2,
                width: 8,
                height: 8,
            },
        ],
        windows: vec![Window {
            id: 42,
            title: Some("Terminal".to_string()),
            owner: Some("Terminal".to_string()),
            width: 6,
            height: 3,
        }],
    }
}

enum FakeBehavior {
    Frames(Vec<Frame>),
    StreamError,
    EnumerationError,
    StartError,
}

#[derive(Default)]
struct ScreenCounters {
    enumerations: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    late_accepted: AtomicUsize,
}

/// Screen source over [`sample_content`] that pushes canned frames into the
/// sink as soon as a stream starts, the way a real stream may fire repeatedly.
pub struct FakeScreen {
    behavior: FakeBehavior,
    counters: Arc<ScreenCounters>,
    // Sinks stay alive so a frameless stream never closes the channel.
    sinks: Mutex<Vec<FrameSink>>,
}

impl FakeScreen {
    fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            counters: Arc::default(),
            sinks: Mutex::default(),
        }
    }

    pub fn with_frames(frames: Vec<Frame>) -> Self {
        Self::new(FakeBehavior::Frames(frames))
    }

    pub fn failing_stream() -> Self {
        Self::new(FakeBehavior::StreamError)
    }

    pub fn failing_enumeration() -> Self {
        Self::new(FakeBehavior::EnumerationError)
    }

    pub fn failing_start() -> Self {
        Self::new(FakeBehavior::StartError)
    }

    pub fn enumeration_count(&self) -> usize {
        self.counters.enumerations.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.counters.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    /// Deliveries after the first that the sink did not discard.
    pub fn late_frames_accepted(&self) -> usize {
        self.counters.late_accepted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenSource for FakeScreen {
    async fn shareable_content(&self) -> Result<ShareableContent, CaptureError> {
        self.counters.enumerations.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            FakeBehavior::EnumerationError => {
                Err(CaptureError::Enumeration("not authorized".to_string()))
            }
            _ => Ok(sample_content()),
        }
    }

    async fn start_stream(
        &self,
        _filter: &ContentFilter,
        _config: &StreamConfig,
        sink: FrameSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            FakeBehavior::StartError => {
                return Err(CaptureError::Start("stream refused".to_string()))
            }
            FakeBehavior::StreamError => {
                sink.fail(CaptureError::Stream("stream died".to_string()));
            }
            FakeBehavior::Frames(frames) => {
                for (i, frame) in frames.iter().enumerate() {
                    let accepted = sink.deliver(frame.clone());
                    if i > 0 && accepted {
                        self.counters.late_accepted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            FakeBehavior::EnumerationError => {}
        }
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
        Ok(Box::new(FakeStream {
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeStream {
    counters: Arc<ScreenCounters>,
}

#[async_trait]
impl CaptureStream for FakeStream {
    async fn stop(self: Box<Self>) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}
