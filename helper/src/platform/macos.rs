//! macOS backends
//!
//! Authorization queries run in-process so the grant is attributed to the
//! helper itself: ApplicationServices/CoreGraphics through FFI and
//! UNUserNotificationCenter through objc2. Notifications are posted with
//! osascript; frames come from `screencapture`.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use block2::RcBlock;
use objc2::rc::Retained;
use objc2::runtime::Bool;
use objc2_foundation::{NSBundle, NSDictionary, NSError, NSNumber, NSString};
use objc2_user_notifications::{
    UNAuthorizationOptions, UNAuthorizationStatus, UNNotificationSettings,
    UNUserNotificationCenter,
};
use serde::Deserialize;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capture::{
    CaptureError, CaptureStream, ContentFilter, Display, Frame, FrameSink, ScreenSource,
    ShareableContent, StreamConfig, Window,
};
use crate::common::{delivery, DeliveryReceiver};
use crate::notifier::{Notification, Notifier, NotifyError};
use crate::permissions::{AuthorizationBackend, PermissionStatus};

/// Upper bound on waiting for an authorization callback.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    static kAXTrustedCheckOptionPrompt: *const c_void;
    fn AXIsProcessTrusted() -> u8;
    fn AXIsProcessTrustedWithOptions(options: *const c_void) -> u8;
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGPreflightScreenCaptureAccess() -> bool;
    fn CGRequestScreenCaptureAccess() -> bool;
}

// ============================================================================
// Authorization
// ============================================================================

pub struct MacAuthorization;

/// UNUserNotificationCenter raises an exception outside an app bundle.
#[allow(unused_unsafe)]
fn has_bundle_identifier() -> bool {
    unsafe { NSBundle::mainBundle().bundleIdentifier().is_some() }
}

fn status_from_un(status: UNAuthorizationStatus) -> PermissionStatus {
    if status == UNAuthorizationStatus::NotDetermined {
        PermissionStatus::NotDetermined
    } else if status == UNAuthorizationStatus::Denied {
        PermissionStatus::Denied
    } else {
        // Authorized, provisional and ephemeral all allow posting.
        PermissionStatus::Granted
    }
}

#[allow(unused_unsafe)]
fn begin_notification_settings() -> DeliveryReceiver<PermissionStatus> {
    let (tx, rx) = delivery();
    let block = RcBlock::new(move |settings: NonNull<UNNotificationSettings>| {
        let status = unsafe { settings.as_ref().authorizationStatus() };
        tx.deliver(status_from_un(status));
    });
    unsafe {
        let center = UNUserNotificationCenter::currentNotificationCenter();
        center.getNotificationSettingsWithCompletionHandler(&block);
    }
    rx
}

#[allow(unused_unsafe)]
fn begin_notification_request() -> DeliveryReceiver<bool> {
    let (tx, rx) = delivery();
    let block = RcBlock::new(move |granted: Bool, _error: *mut NSError| {
        tracing::info!("Notification authorization callback: granted={}", granted.as_bool());
        tx.deliver(granted.as_bool());
    });
    unsafe {
        let center = UNUserNotificationCenter::currentNotificationCenter();
        center.requestAuthorizationWithOptions_completionHandler(
            UNAuthorizationOptions::Alert | UNAuthorizationOptions::Sound,
            &block,
        );
    }
    rx
}

#[async_trait]
impl AuthorizationBackend for MacAuthorization {
    async fn notification_status(&self) -> PermissionStatus {
        if !has_bundle_identifier() {
            warn!("No bundle identifier; notification authorization unavailable");
            return PermissionStatus::Denied;
        }
        let rx = begin_notification_settings();
        match rx.recv_timeout(CALLBACK_TIMEOUT).await {
            Some(status) => status,
            None => {
                warn!("Notification settings callback never fired");
                PermissionStatus::NotDetermined
            }
        }
    }

    async fn request_notifications(&self) {
        if !has_bundle_identifier() {
            return;
        }
        let rx = begin_notification_request();
        if rx.recv_timeout(CALLBACK_TIMEOUT).await.is_none() {
            warn!("Notification authorization prompt timed out");
        }
    }

    async fn accessibility_trusted(&self) -> bool {
        unsafe { AXIsProcessTrusted() != 0 }
    }

    async fn prompt_accessibility(&self) {
        let options = unsafe {
            let key: &NSString = &*(kAXTrustedCheckOptionPrompt as *const NSString);
            let value = NSNumber::new_bool(true);
            NSDictionary::<NSString, NSNumber>::from_slices(&[key], &[&*value])
        };
        let trusted = unsafe { AXIsProcessTrustedWithOptions(Retained::as_ptr(&options).cast()) };
        debug!("Accessibility trust request raised (trusted={})", trusted != 0);
    }

    async fn screen_capture_preflight(&self) -> bool {
        unsafe { CGPreflightScreenCaptureAccess() }
    }

    async fn request_screen_capture(&self) {
        let granted = unsafe { CGRequestScreenCaptureAccess() };
        info!("Screen capture access request returned {}", granted);
    }
}

// ============================================================================
// Notifications
// ============================================================================

pub struct MacNotifier;

fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn notification_script(notification: &Notification) -> String {
    let mut script = format!(
        "display notification {} with title {}",
        applescript_string(&notification.body),
        applescript_string(&notification.title)
    );
    if let Some(sound) = &notification.sound {
        script.push_str(" sound name ");
        script.push_str(&applescript_string(sound));
    }
    script
}

#[async_trait]
impl Notifier for MacNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let output = Command::new("osascript")
            .args(["-e", &notification_script(notification)])
            .output()
            .await
            .map_err(|e| NotifyError::Failed(format!("failed to run osascript: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("osascript notification failed: {}", stderr);
            Err(NotifyError::Failed(stderr))
        }
    }
}

// ============================================================================
// Screen capture
// ============================================================================

const ENUMERATE_SWIFT: &str = r#"
import CoreGraphics
import Foundation

var ids = [CGDirectDisplayID](repeating: 0, count: 16)
var count: UInt32 = 0
CGGetActiveDisplayList(16, &ids, &count)
let displays: [[String: Any]] = ids.prefix(Int(count)).map { id in
    ["id": Int(id), "width": CGDisplayPixelsWide(id), "height": CGDisplayPixelsHigh(id)]
}

let info = CGWindowListCopyWindowInfo([.optionOnScreenOnly, .excludeDesktopElements], kCGNullWindowID) as? [[String: Any]] ?? []
let windows: [[String: Any]] = info.compactMap { w in
    guard let id = w[kCGWindowNumber as String] as? Int,
          (w[kCGWindowLayer as String] as? Int) == 0,
          let bounds = w[kCGWindowBounds as String] as? [String: Any] else { return nil }
    var out: [String: Any] = [
        "id": id,
        "width": (bounds["Width"] as? NSNumber)?.intValue ?? 0,
        "height": (bounds["Height"] as? NSNumber)?.intValue ?? 0,
    ]
    if let title = w[kCGWindowName as String] as? String { out["title"] = title }
    if let owner = w[kCGWindowOwnerName as String] as? String { out["owner"] = owner }
    return out
}

let data = try JSONSerialization.data(withJSONObject: ["displays": displays, "windows": windows])
print(String(decoding: data, as: UTF8.self))
"#;

#[derive(Deserialize)]
struct EnumeratedContent {
    displays: Vec<EnumeratedDisplay>,
    windows: Vec<EnumeratedWindow>,
}

#[derive(Deserialize)]
struct EnumeratedDisplay {
    id: u32,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
struct EnumeratedWindow {
    id: u32,
    title: Option<String>,
    owner: Option<String>,
    width: u32,
    height: u32,
}

impl From<EnumeratedContent> for ShareableContent {
    fn from(raw: EnumeratedContent) -> Self {
        ShareableContent {
            displays: raw
                .displays
                .into_iter()
                .map(|d| Display {
                    id: d.id,
                    width: d.width,
                    height: d.height,
                })
                .collect(),
            windows: raw
                .windows
                .into_iter()
                .map(|w| Window {
                    id: w.id,
                    title: w.title,
                    owner: w.owner,
                    width: w.width,
                    height: w.height,
                })
                .collect(),
        }
    }
}

#[derive(Default)]
pub struct MacScreen {
    /// Display ids in active-list order; `screencapture -D` is 1-based over it.
    display_order: Mutex<Vec<u32>>,
}

impl MacScreen {
    fn display_index(&self, display_id: u32) -> usize {
        let order = self
            .display_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        order
            .iter()
            .position(|id| *id == display_id)
            .map(|i| i + 1)
            .unwrap_or(1)
    }
}

static CAPTURE_SEQ: AtomicU64 = AtomicU64::new(0);

fn capture_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "postern_capture_{}_{}.png",
        std::process::id(),
        CAPTURE_SEQ.fetch_add(1, Ordering::Relaxed)
    ))
}

fn screencapture(target: &[String], path: &Path) -> Command {
    let mut command = Command::new("screencapture");
    command.args(["-x", "-t", "png"]).args(target).arg(path);
    command
}

/// Run `command`, which writes a PNG to `path`, and decode the result. The
/// child dies with the future, so an aborted capture never writes late.
async fn grab_frame(mut command: Command, path: &Path) -> Result<Frame, CaptureError> {
    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CaptureError::Stream(format!("failed to run screencapture: {}", e)))?;
    if !output.status.success() {
        return Err(CaptureError::Stream(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CaptureError::Stream(format!("no capture written: {}", e)))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| CaptureError::Stream(e.to_string()))?
        .to_rgba8();
    Ok(Frame {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

#[async_trait]
impl ScreenSource for MacScreen {
    async fn shareable_content(&self) -> Result<ShareableContent, CaptureError> {
        let output = Command::new("swift")
            .args(["-e", ENUMERATE_SWIFT])
            .output()
            .await
            .map_err(|e| CaptureError::Enumeration(format!("failed to run swift: {}", e)))?;
        if !output.status.success() {
            return Err(CaptureError::Enumeration(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let raw: EnumeratedContent = serde_json::from_slice(&output.stdout)
            .map_err(|e| CaptureError::Enumeration(e.to_string()))?;
        let content = ShareableContent::from(raw);
        *self
            .display_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = content.displays.iter().map(|d| d.id).collect();
        debug!(
            displays = content.displays.len(),
            windows = content.windows.len(),
            "Enumerated shareable content"
        );
        Ok(content)
    }

    async fn start_stream(
        &self,
        filter: &ContentFilter,
        _config: &StreamConfig,
        sink: FrameSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let target = match filter {
            ContentFilter::Window(window) => vec!["-l".to_string(), window.id.to_string()],
            ContentFilter::Display(display) => {
                vec!["-D".to_string(), self.display_index(display.id).to_string()]
            }
        };
        let path = capture_path();
        let command = screencapture(&target, &path);
        Ok(Box::new(MacStream::spawn(command, path, sink)))
    }
}

struct MacStream {
    task: JoinHandle<()>,
    path: PathBuf,
}

impl MacStream {
    fn spawn(command: Command, path: PathBuf, sink: FrameSink) -> Self {
        let task_path = path.clone();
        let task = tokio::spawn(async move {
            match grab_frame(command, &task_path).await {
                Ok(frame) => sink.deliver(frame),
                Err(e) => sink.fail(e),
            };
        });
        Self { task, path }
    }
}

#[async_trait]
impl CaptureStream for MacStream {
    async fn stop(self: Box<Self>) {
        self.task.abort();
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stopped_capture_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.png");
        let mut command = Command::new("/bin/sh");
        command
            .arg("-c")
            .arg(format!("sleep 1; printf x > '{}'", path.display()));
        let (sink, _frames) = FrameSink::channel();

        let stream = MacStream::spawn(command, path.clone(), sink);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Box::new(stream).stop().await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!path.exists());
    }

    #[test]
    fn test_screencapture_arguments() {
        let path = PathBuf::from("/tmp/shot.png");
        let command = screencapture(&["-D".to_string(), "2".to_string()], &path);
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-x", "-t", "png", "-D", "2", "/tmp/shot.png"]);
    }

    #[test]
    fn test_notification_script_escapes_quotes() {
        let script = notification_script(&Notification {
            title: "Say \"hi\"".to_string(),
            body: "a\\b".to_string(),
            sound: Some("Glass".to_string()),
        });
        assert_eq!(
            script,
            r#"display notification "a\\b" with title "Say \"hi\"" sound name "Glass""#
        );
    }

    #[test]
    fn test_enumeration_json_maps_to_content() {
        let raw: EnumeratedContent = serde_json::from_str(
            r#"{"displays":[{"id":69733378,"width":3024,"height":1964}],
                "windows":[{"id":88,"owner":"Finder","width":800,"height":600}]}"#,
        )
        .unwrap();
        let content = ShareableContent::from(raw);
        assert_eq!(content.displays[0].id, 69733378);
        assert_eq!(content.windows[0].title, None);
        assert_eq!(content.windows[0].owner.as_deref(), Some("Finder"));
    }
}
