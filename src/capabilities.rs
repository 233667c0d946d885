/// Host capability detection, run once at startup and injected everywhere that
/// needs to know whether capture or input synthesis exist.
use serde::Serialize;

use crate::executor::input::PointerDevice;
use crate::perception::types::DisplayDescriptor;

#[derive(Debug, Clone, Serialize)]
pub struct CapabilityStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CapabilityStatus {
    pub fn available() -> Self {
        Self {
            available: true,
            detail: None,
        }
    }

    pub fn missing(detail: impl Into<String>) -> Self {
        Self {
            available: false,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub capture: CapabilityStatus,
    pub input: CapabilityStatus,
    /// OS display size as seen by the input layer at startup.
    pub display: Option<DisplayDescriptor>,
}

impl Capabilities {
    /// Nothing available; used by tests and headless deployments.
    pub fn none(reason: &str) -> Self {
        Self {
            capture: CapabilityStatus::missing(reason),
            input: CapabilityStatus::missing(reason),
            display: None,
        }
    }
}

/// Blocking. Call from `spawn_blocking` or before the runtime is busy.
pub fn detect(pointer: &dyn PointerDevice) -> Capabilities {
    let capture = detect_capture();
    let (input, display_info) = detect_input(pointer);
    tracing::info!(
        capture = capture.available,
        input = input.available,
        display = ?display_info,
        "capability detection complete"
    );
    Capabilities {
        capture,
        input,
        display: display_info,
    }
}

fn detect_capture() -> CapabilityStatus {
    match xcap::Monitor::all() {
        Ok(monitors) if !monitors.is_empty() => CapabilityStatus::available(),
        Ok(_) => CapabilityStatus::missing("no monitors found"),
        Err(e) => {
            tracing::warn!(error = %e, "screen capture unavailable");
            CapabilityStatus::missing(format!("enumerate monitors: {e}"))
        }
    }
}

fn detect_input(pointer: &dyn PointerDevice) -> (CapabilityStatus, Option<DisplayDescriptor>) {
    match pointer.display() {
        Ok(display) => (CapabilityStatus::available(), Some(display)),
        Err(e) => {
            tracing::warn!(error = %e, "input synthesis unavailable");
            (CapabilityStatus::missing(e.to_string()), None)
        }
    }
}
