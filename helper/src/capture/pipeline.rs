//! Capture pipeline
//!
//! enumerate → filter → configure → start → first frame → encode → stop.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    encode_png, CaptureError, ContentFilter, FrameSink, ScreenSource, ShareableContent,
    StreamConfig,
};

pub struct CapturePipeline {
    source: Arc<dyn ScreenSource>,
    frame_timeout: Duration,
}

impl CapturePipeline {
    pub fn new(source: Arc<dyn ScreenSource>, frame_timeout: Duration) -> Self {
        Self {
            source,
            frame_timeout,
        }
    }

    /// Capture one still image as PNG bytes, or `None` on any failure.
    pub async fn capture(&self, display_id: Option<u32>, window_id: Option<u32>) -> Option<Vec<u8>> {
        match self.try_capture(display_id, window_id).await {
            Ok(png) => {
                info!(bytes = png.len(), "Screenshot captured");
                Some(png)
            }
            Err(e) => {
                warn!(?display_id, ?window_id, "Screenshot failed: {}", e);
                None
            }
        }
    }

    pub async fn try_capture(
        &self,
        display_id: Option<u32>,
        window_id: Option<u32>,
    ) -> Result<Vec<u8>, CaptureError> {
        let content = self.source.shareable_content().await?;
        let filter = build_filter(&content, display_id, window_id)?;
        let config = StreamConfig::for_filter(&filter);
        debug!(?filter, "Starting capture stream");

        let (sink, frames) = FrameSink::channel();
        let stream = self.source.start_stream(&filter, &config, sink).await?;

        let delivered = frames.recv_timeout(self.frame_timeout).await;
        let encoded = match delivered {
            Some(Ok(frame)) => encode_png(frame, &config),
            Some(Err(e)) => Err(e),
            None => Err(CaptureError::NoFrame),
        };

        stream.stop().await;
        encoded
    }
}

/// Pick the capture target: the window with `window_id` if it exists, else
/// the display with `display_id`, else the first display.
pub fn build_filter(
    content: &ShareableContent,
    display_id: Option<u32>,
    window_id: Option<u32>,
) -> Result<ContentFilter, CaptureError> {
    if let Some(window) = window_id.and_then(|id| content.windows.iter().find(|w| w.id == id)) {
        return Ok(ContentFilter::Window(window.clone()));
    }

    display_id
        .and_then(|id| content.displays.iter().find(|d| d.id == id))
        .or_else(|| content.displays.first())
        .map(|display| ContentFilter::Display(display.clone()))
        .ok_or(CaptureError::NoTarget)
}
