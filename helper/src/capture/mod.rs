//! Screen Capture
//!
//! One-shot frame acquisition. A [`ScreenSource`] pushes frames into a
//! [`FrameSink`]; the pipeline takes the first one, encodes it to PNG and
//! stops the stream.

mod encode;
mod pipeline;

use async_trait::async_trait;

use crate::common::{delivery, DeliveryReceiver, DeliverySender};

pub use encode::encode_png;
pub use pipeline::{build_filter, CapturePipeline};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Display {
    pub id: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: u32,
    pub title: Option<String>,
    pub owner: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// Everything the OS allows us to capture right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShareableContent {
    pub displays: Vec<Display>,
    pub windows: Vec<Window>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentFilter {
    Window(Window),
    Display(Display),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DisplayP3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Output size; only set when capturing a whole display
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scales_to_fit: bool,
    pub color_space: ColorSpace,
}

impl StreamConfig {
    pub fn for_filter(filter: &ContentFilter) -> Self {
        let (width, height) = match filter {
            ContentFilter::Display(d) => (Some(d.width), Some(d.height)),
            ContentFilter::Window(_) => (None, None),
        };
        Self {
            width,
            height,
            scales_to_fit: true,
            color_space: ColorSpace::DisplayP3,
        }
    }
}

/// A captured frame as tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to enumerate shareable content: {0}")]
    Enumeration(String),

    #[error("no display or window to capture")]
    NoTarget,

    #[error("failed to start capture stream: {0}")]
    Start(String),

    #[error("capture stream failed: {0}")]
    Stream(String),

    #[error("no frame delivered")]
    NoFrame,

    #[error("failed to encode frame: {0}")]
    Encode(String),

    #[error("screen capture is not supported on this platform")]
    Unsupported,
}

type FrameResult = Result<Frame, CaptureError>;

/// Push target handed to a capture stream. Only the first delivery (frame or
/// failure) reaches the pipeline; later ones are dropped.
#[derive(Clone)]
pub struct FrameSink {
    tx: DeliverySender<FrameResult>,
}

impl FrameSink {
    pub fn channel() -> (Self, DeliveryReceiver<FrameResult>) {
        let (tx, rx) = delivery();
        (Self { tx }, rx)
    }

    pub fn deliver(&self, frame: Frame) -> bool {
        self.tx.deliver(Ok(frame))
    }

    pub fn fail(&self, error: CaptureError) -> bool {
        self.tx.deliver(Err(error))
    }
}

/// OS screen enumeration and capture subsystem.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    async fn shareable_content(&self) -> Result<ShareableContent, CaptureError>;

    async fn start_stream(
        &self,
        filter: &ContentFilter,
        config: &StreamConfig,
        sink: FrameSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// A running stream. Stopping is infallible from the caller's view.
#[async_trait]
pub trait CaptureStream: Send {
    async fn stop(self: Box<Self>);
}
