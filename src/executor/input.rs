// Physical pointer input: a blocking device seam plus the serialized executor.
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::errors::{ClickSightError, ClickSightResult};
use crate::perception::types::{CoordinateSpace, DisplayDescriptor, PixelPoint};

/// Blocking access to the host's pointer. Implementations are called from
/// `spawn_blocking`, never from the async runtime directly.
pub trait PointerDevice: Send + Sync {
    /// Size of the main display in the coordinates `click_at` expects.
    fn display(&self) -> ClickSightResult<DisplayDescriptor>;
    fn cursor(&self) -> ClickSightResult<(i32, i32)>;
    /// Move to `(x, y)` and press/release the primary button.
    fn click_at(&self, x: i32, y: i32) -> ClickSightResult<()>;
}

/// `enigo`-backed pointer. A fresh connection is opened per call so the
/// device itself holds no platform handles across threads.
pub struct EnigoPointer;

impl EnigoPointer {
    fn connect() -> ClickSightResult<Enigo> {
        Enigo::new(&Settings::default())
            .map_err(|e| ClickSightError::ActionUnavailable(format!("input connection: {e}")))
    }
}

impl PointerDevice for EnigoPointer {
    fn display(&self) -> ClickSightResult<DisplayDescriptor> {
        let enigo = Self::connect()?;
        let (w, h) = enigo
            .main_display()
            .map_err(|e| ClickSightError::ActionUnavailable(format!("main display: {e}")))?;
        if w <= 0 || h <= 0 {
            return Err(ClickSightError::ActionUnavailable(format!(
                "main display reported as {w}x{h}"
            )));
        }
        Ok(DisplayDescriptor::new(w as u32, h as u32))
    }

    fn cursor(&self) -> ClickSightResult<(i32, i32)> {
        let enigo = Self::connect()?;
        enigo
            .location()
            .map_err(|e| ClickSightError::ActionUnavailable(format!("cursor location: {e}")))
    }

    fn click_at(&self, x: i32, y: i32) -> ClickSightResult<()> {
        let mut enigo = Self::connect()?;
        enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| ClickSightError::ActionUnavailable(format!("move pointer: {e}")))?;
        enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| ClickSightError::ActionUnavailable(format!("click: {e}")))?;
        Ok(())
    }
}

/// Outcome of one synthetic click, with the cursor observed on both sides
/// so a silently clamped or ignored click can be detected afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ClickResult {
    pub point: PixelPoint,
    pub target: [i32; 2],
    pub success: bool,
    pub cursor_before: Option<[i32; 2]>,
    pub cursor_after: Option<[i32; 2]>,
    /// Cursor ended within one pixel of `target`.
    pub landed: bool,
    /// Milliseconds since process start; monotonic.
    pub monotonic_ms: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Dispatches clicks one at a time; two in-flight clicks would race for the
/// same physical pointer.
pub struct ActionExecutor {
    device: Option<Arc<dyn PointerDevice>>,
    unavailable_reason: String,
    lock: Mutex<()>,
    settle: Duration,
}

impl ActionExecutor {
    pub fn new(device: Arc<dyn PointerDevice>, settle: Duration) -> Self {
        Self {
            device: Some(device),
            unavailable_reason: String::new(),
            lock: Mutex::new(()),
            settle,
        }
    }

    /// Executor for hosts without input synthesis; every call reports
    /// `ActionUnavailable`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            device: None,
            unavailable_reason: reason.into(),
            lock: Mutex::new(()),
            settle: Duration::ZERO,
        }
    }

    pub fn is_available(&self) -> bool {
        self.device.is_some()
    }

    fn device(&self) -> ClickSightResult<Arc<dyn PointerDevice>> {
        self.device
            .clone()
            .ok_or_else(|| ClickSightError::ActionUnavailable(self.unavailable_reason.clone()))
    }

    /// Current OS display size, read live from the device.
    pub async fn display(&self) -> ClickSightResult<DisplayDescriptor> {
        let device = self.device()?;
        tokio::task::spawn_blocking(move || device.display())
            .await
            .map_err(|e| ClickSightError::ActionUnavailable(format!("join: {e}")))?
    }

    /// Click at an already bounds-validated OS-screen point.
    ///
    /// Nothing is dispatched once `deadline` has passed, including while
    /// queued behind another click; that case returns `Timeout`.
    pub async fn click(
        &self,
        point: PixelPoint,
        deadline: tokio::time::Instant,
    ) -> ClickSightResult<ClickResult> {
        point.require_space(CoordinateSpace::OsScreen)?;
        let device = self.device()?;
        let settle = self.settle;
        let (x, y) = point.rounded();

        let queued = Instant::now();
        let expired = || ClickSightError::Timeout(queued.elapsed().as_millis() as u64);
        let _guard = tokio::time::timeout_at(deadline, self.lock.lock())
            .await
            .map_err(|_| expired())?;
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!(x, y, "deadline passed while queued, click not dispatched");
            return Err(expired());
        }
        tracing::info!(x, y, px = point.x, py = point.y, "dispatching click");

        let (before, after) = tokio::task::spawn_blocking(move || {
            let before = device.cursor().ok();
            device.click_at(x, y)?;
            if !settle.is_zero() {
                std::thread::sleep(settle);
            }
            let after = device.cursor().ok();
            Ok::<_, ClickSightError>((before, after))
        })
        .await
        .map_err(|e| ClickSightError::ActionUnavailable(format!("join: {e}")))??;

        let landed = after
            .map(|(ax, ay)| (ax - x).abs() <= 1 && (ay - y).abs() <= 1)
            .unwrap_or(false);
        if !landed {
            tracing::warn!(
                target_x = x,
                target_y = y,
                after = ?after,
                "cursor did not end on the click target"
            );
        }
        tracing::info!(before = ?before, after = ?after, "click dispatched");

        Ok(ClickResult {
            point,
            target: [x, y],
            success: true,
            cursor_before: before.map(|(bx, by)| [bx, by]),
            cursor_after: after.map(|(ax, ay)| [ax, ay]),
            landed,
            monotonic_ms: monotonic_ms(),
            timestamp: chrono::Utc::now(),
        })
    }
}
