use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use crate::errors::{ClickSightError, ClickSightResult};
use crate::perception::types::{ImageDescriptor, ImageOrigin};

/// A full-screen grab plus the descriptor used for density correction.
pub struct CapturedFrame {
    pub image: RgbImage,
    pub descriptor: ImageDescriptor,
}

/// Screen capture seam. Callers that only analyse uploaded images never touch it.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self) -> ClickSightResult<CapturedFrame>;
}

/// Captures the first monitor reported by `xcap`.
pub struct XcapCapture;

#[async_trait]
impl ScreenCapture for XcapCapture {
    async fn capture(&self) -> ClickSightResult<CapturedFrame> {
        tokio::task::spawn_blocking(capture_primary_blocking)
            .await
            .map_err(|e| ClickSightError::CaptureUnavailable(format!("join: {e}")))?
    }
}

fn capture_primary_blocking() -> ClickSightResult<CapturedFrame> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| ClickSightError::CaptureUnavailable(format!("enumerate monitors: {e}")))?;
    let monitor = monitors
        .first()
        .ok_or_else(|| ClickSightError::CaptureUnavailable("no monitors found".into()))?;

    let raw = monitor
        .capture_image()
        .map_err(|e| ClickSightError::CaptureUnavailable(format!("capture: {e}")))?;
    let image = image::DynamicImage::ImageRgba8(raw).to_rgb8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ClickSightError::CaptureUnavailable(
            "captured an empty frame (missing screen recording permission?)".into(),
        ));
    }

    tracing::info!(width, height, "screen captured");
    Ok(CapturedFrame {
        image,
        descriptor: ImageDescriptor::new(width, height, ImageOrigin::Captured),
    })
}

/// Stand-in used when the startup detection found no capture capability.
pub struct UnavailableCapture {
    reason: String,
}

impl UnavailableCapture {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ScreenCapture for UnavailableCapture {
    async fn capture(&self) -> ClickSightResult<CapturedFrame> {
        Err(ClickSightError::CaptureUnavailable(self.reason.clone()))
    }
}

/// Pick the capture provider according to the detection result.
pub fn provider_for(available: bool, detail: Option<&str>) -> Arc<dyn ScreenCapture> {
    if available {
        Arc::new(XcapCapture)
    } else {
        Arc::new(UnavailableCapture::new(
            detail.unwrap_or("screen capture is not available on this host"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_capture_reports_its_reason() {
        let capture = provider_for(false, Some("headless host"));
        match capture.capture().await {
            Err(ClickSightError::CaptureUnavailable(reason)) => assert_eq!(reason, "headless host"),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("capture should fail"),
        }
    }

    #[tokio::test]
    #[ignore = "requires a graphical display and screen recording permission"]
    async fn xcap_capture_has_positive_dimensions() {
        let frame = XcapCapture.capture().await.expect("capture failed");
        assert!(frame.descriptor.width > 0 && frame.descriptor.height > 0);
        assert_eq!(frame.descriptor.origin, ImageOrigin::Captured);
    }
}
