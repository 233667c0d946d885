//! Per-request stage machine:
//! `Received → ImageDecoded → (CaptureAcquired) → CoordinateResolved →
//! (ActionExecuted) → ArtifactStored → Responded`.
//!
//! A failure short-circuits with the stage it failed to reach. Capture and
//! model inference run under the request deadline; once a click has been
//! dispatched nothing after it is cancelled.
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use image::RgbImage;
use serde::Serialize;
use uuid::Uuid;

use crate::audit::JournalEntry;
use crate::errors::{ClickSightError, ClickSightResult};
use crate::executor::input::ClickResult;
use crate::perception::annotator::{annotate, encode_png};
use crate::perception::decode::{decode_base64_image, decode_image_bytes};
use crate::perception::resolver::Resolution;
use crate::perception::types::{
    CoordinateSpace, DisplayDescriptor, ImageDescriptor, ImageOrigin, NormalizedPoint,
    PixelPoint, ReportedDisplay,
};
use crate::server::contract::{
    ApiError, ClickRequest, ClickResponse, ServerClickRequest, ServerClickResponse,
    ServerScreenshotRequest, ServerScreenshotResponse,
};
use crate::server::AppState;
use crate::store::ArtifactMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    ImageDecoded,
    CaptureAcquired,
    CoordinateResolved,
    ActionExecuted,
    ArtifactStored,
    Responded,
    /// Download and listing of stored artifacts.
    ArtifactRetrieved,
}

struct RequestRun<'a> {
    state: &'a AppState,
    request_id: Uuid,
    route: &'static str,
    started: std::time::Instant,
    deadline: tokio::time::Instant,
    reached: Stage,
}

impl<'a> RequestRun<'a> {
    fn new(state: &'a AppState, request_id: Uuid, route: &'static str) -> Self {
        Self {
            state,
            request_id,
            route,
            started: std::time::Instant::now(),
            deadline: tokio::time::Instant::now() + state.request_timeout,
            reached: Stage::Received,
        }
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(from = ?self.reached, to = ?stage, "stage reached");
        self.reached = stage;
    }

    fn fail(&self, stage: Stage, error: ClickSightError) -> ApiError {
        tracing::warn!(
            stage = ?stage,
            reached = ?self.reached,
            kind = error.kind(),
            error = %error,
            "request failed"
        );
        ApiError::at(stage, error)
    }

    fn timeout_ms(&self) -> u64 {
        self.state.request_timeout.as_millis() as u64
    }

    /// Deserialize the request body into its typed record.
    fn parse<T: serde::de::DeserializeOwned>(&self, body: &[u8]) -> Result<T, ApiError> {
        serde_json::from_slice(body).map_err(|e| {
            self.fail(
                Stage::Received,
                ClickSightError::InvalidRequest(e.to_string()),
            )
        })
    }

    /// Run `fut` under the request deadline.
    async fn bounded<T, F>(&self, stage: Stage, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = ClickSightResult<T>>,
    {
        match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(result) => result.map_err(|e| self.fail(stage, e)),
            Err(_) => Err(self.fail(stage, ClickSightError::Timeout(self.timeout_ms()))),
        }
    }

    /// Run CPU-heavy image work off the async workers.
    async fn blocking<T, F>(&self, stage: Stage, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce() -> ClickSightResult<T> + Send + 'static,
    {
        let joined = tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| ClickSightError::Io(std::io::Error::other(e)));
        joined.and_then(|r| r).map_err(|e| self.fail(stage, e))
    }

    /// Physical actions are never dispatched once the deadline has passed,
    /// neither before the call nor while queued behind another click.
    /// Expiry fails the request; other executor errors go back to the caller.
    async fn click(&self, point: PixelPoint) -> Result<ClickSightResult<ClickResult>, ApiError> {
        let stage = Stage::ActionExecuted;
        let expired = || self.fail(stage, ClickSightError::Timeout(self.timeout_ms()));
        if tokio::time::Instant::now() >= self.deadline {
            return Err(expired());
        }
        match self.state.executor.click(point, self.deadline).await {
            Err(ClickSightError::Timeout(_)) => Err(expired()),
            other => Ok(other),
        }
    }

    /// Ask the grounding model for a point on `image`, then resolve it
    /// against `display`.
    async fn locate(
        &mut self,
        image: Arc<RgbImage>,
        descriptor: &ImageDescriptor,
        query: &str,
        display: &DisplayDescriptor,
    ) -> Result<Resolution, ApiError> {
        let stage = Stage::CoordinateResolved;
        let grounder = self.state.grounder.clone().ok_or_else(|| {
            self.fail(
                stage,
                ClickSightError::Model("no grounding model configured".into()),
            )
        })?;

        let png = self.blocking(stage, move || encode_png(&image)).await?;
        let normalized = self.bounded(stage, grounder.locate(&png, query)).await?;
        tracing::info!(
            provider = grounder.name(),
            nx = normalized.x,
            ny = normalized.y,
            "normalized point received"
        );

        let resolution = self
            .state
            .resolver
            .resolve(normalized, descriptor, display, None)
            .map_err(|e| self.fail(stage, e))?;
        self.advance(stage);
        Ok(resolution)
    }

    async fn store_annotated(
        &mut self,
        image: Arc<RgbImage>,
        point: NormalizedPoint,
    ) -> Result<ArtifactMeta, ApiError> {
        let stage = Stage::ArtifactStored;
        let radius = self.state.annotation_radius;
        let png = self
            .blocking(stage, move || encode_png(&annotate(&image, point, radius)))
            .await?;
        let meta = self
            .state
            .store
            .store(&png)
            .await
            .map_err(|e| self.fail(stage, e))?;
        self.advance(stage);
        Ok(meta)
    }

    async fn journal(&self, mut entry: JournalEntry) {
        entry.request_id = self.request_id.to_string();
        entry.route = self.route.to_string();
        self.state.journal.record(&entry).await;
    }

    fn respond(&mut self) -> f64 {
        self.advance(Stage::Responded);
        let elapsed = self.started.elapsed().as_secs_f64();
        tracing::info!(elapsed_secs = elapsed, "request complete");
        elapsed
    }
}

fn journal_entry(query: Option<&str>, resolution: &Resolution) -> JournalEntry {
    JournalEntry {
        ts: Utc::now().timestamp_millis(),
        request_id: String::new(),
        route: String::new(),
        query: query.map(str::to_string),
        normalized: Some(resolution.normalized.as_pair()),
        steps: resolution.steps.clone(),
        screen_point: resolution.screen_point.as_pair(),
        click: None,
        click_error: None,
        artifact_id: None,
    }
}

/// `POST /find_click_position` and `POST /upload_and_find`: locate `query`
/// on a client-supplied image. No physical action is taken.
async fn locate_on_upload(
    mut run: RequestRun<'_>,
    image: Arc<RgbImage>,
    query: String,
) -> Result<ClickResponse, ApiError> {
    let (width, height) = image.dimensions();
    let descriptor = ImageDescriptor::new(width, height, ImageOrigin::Uploaded);
    let display = run.state.resolver.logical_display(&descriptor);

    let resolution = run
        .locate(image.clone(), &descriptor, &query, &display)
        .await?;
    let artifact = run.store_annotated(image, resolution.normalized).await?;

    let mut entry = journal_entry(Some(&query), &resolution);
    entry.artifact_id = Some(artifact.id.clone());
    run.journal(entry).await;

    let processing_time = run.respond();
    Ok(ClickResponse {
        success: true,
        query,
        coordinates: resolution.normalized.as_pair(),
        absolute_coordinates: resolution.screen_point.as_pair(),
        image_size: descriptor.size(),
        result_image_id: artifact.id,
        processing_time,
        steps: resolution.steps,
    })
}

pub async fn find_click_position(
    state: &AppState,
    request_id: Uuid,
    body: &[u8],
) -> Result<ClickResponse, ApiError> {
    let mut run = RequestRun::new(state, request_id, "/find_click_position");
    let req: ClickRequest = run.parse(body)?;
    let ClickRequest {
        image_base64,
        query,
    } = req;

    let image = run
        .blocking(Stage::ImageDecoded, move || decode_base64_image(&image_base64))
        .await?;
    run.advance(Stage::ImageDecoded);
    locate_on_upload(run, Arc::new(image), query).await
}

pub async fn upload_and_find(
    state: &AppState,
    request_id: Uuid,
    query: String,
    body: Vec<u8>,
) -> Result<ClickResponse, ApiError> {
    let mut run = RequestRun::new(state, request_id, "/upload_and_find");
    let image = run
        .blocking(Stage::ImageDecoded, move || decode_image_bytes(&body))
        .await?;
    run.advance(Stage::ImageDecoded);
    locate_on_upload(run, Arc::new(image), query).await
}

/// `POST /api/click-coordinate`: click a point measured by a browser, after
/// reconciling the browser's screen size with the OS display.
pub async fn click_coordinate(
    state: &AppState,
    request_id: Uuid,
    body: &[u8],
) -> Result<ServerClickResponse, ApiError> {
    let mut run = RequestRun::new(state, request_id, "/api/click-coordinate");
    let req: ServerClickRequest = run.parse(body)?;
    let screen = &req.browser_info.screen;
    let reported = ReportedDisplay::new(screen.width, screen.height)
        .map_err(|e| run.fail(Stage::Received, e))?;
    tracing::debug!(
        x = req.x,
        y = req.y,
        action = req.action.as_deref().unwrap_or("click"),
        inner_width = req.browser_info.window.inner_width,
        inner_height = req.browser_info.window.inner_height,
        screen_x = req.browser_info.window.screen_x,
        screen_y = req.browser_info.window.screen_y,
        user_agent = req.browser_info.user_agent.as_deref().unwrap_or(""),
        "browser click request"
    );

    let stage = Stage::CoordinateResolved;
    let os = run
        .bounded(stage, state.executor.display())
        .await?;
    let raw = PixelPoint::new(req.x, req.y, CoordinateSpace::ReportedScreen);
    let (point, scale) = state
        .resolver
        .reconcile(raw, &os, &reported)
        .map_err(|e| run.fail(stage, e))?;
    state
        .resolver
        .validate(&point, &os)
        .map_err(|e| run.fail(stage, e))?;
    run.advance(stage);

    let click = run
        .click(point)
        .await?
        .map_err(|e| run.fail(Stage::ActionExecuted, e))?;
    run.advance(Stage::ActionExecuted);

    run.journal(JournalEntry {
        ts: Utc::now().timestamp_millis(),
        request_id: String::new(),
        route: String::new(),
        query: None,
        normalized: None,
        steps: Vec::new(),
        screen_point: point.as_pair(),
        click: Some(click.clone()),
        click_error: None,
        artifact_id: None,
    })
    .await;
    run.respond();

    let message = if scale.is_identity() {
        format!("Clicked at ({}, {})", click.target[0], click.target[1])
    } else {
        format!(
            "Clicked at ({}, {}), browser point ({}, {}) scaled by ({:.3}, {:.3})",
            click.target[0], click.target[1], req.x, req.y, scale.x, scale.y
        )
    };
    Ok(ServerClickResponse {
        success: true,
        message,
        clicked_coordinates: point.as_pair(),
        requested_coordinates: [req.x, req.y],
        scale,
        timestamp: click.timestamp.to_rfc3339(),
        click,
    })
}

/// `POST /api/server-screenshot-and-find`: capture the server's own screen,
/// locate `query` on it and optionally click the result.
pub async fn server_screenshot_and_find(
    state: &AppState,
    request_id: Uuid,
    body: &[u8],
) -> Result<ServerScreenshotResponse, ApiError> {
    let mut run = RequestRun::new(state, request_id, "/api/server-screenshot-and-find");
    let req: ServerScreenshotRequest = run.parse(body)?;

    let frame = run
        .bounded(Stage::CaptureAcquired, state.capture.capture())
        .await?;
    run.advance(Stage::CaptureAcquired);
    let descriptor = frame.descriptor;
    let image = Arc::new(frame.image);

    let live = if state.executor.is_available() {
        state
            .executor
            .display()
            .await
            .map_err(|e| tracing::warn!(error = %e, "OS display read failed"))
            .ok()
    } else {
        None
    };
    let display = match live {
        Some(display) => display,
        None => {
            let fallback = state.resolver.logical_display(&descriptor);
            tracing::debug!(
                width = fallback.width,
                height = fallback.height,
                "OS display unknown, validating against the capture's logical size"
            );
            fallback
        }
    };

    let resolution = run
        .locate(image.clone(), &descriptor, &req.query, &display)
        .await?;

    let mut click: Option<ClickResult> = None;
    let mut click_error: Option<String> = None;
    if req.auto_click {
        match run.click(resolution.screen_point).await? {
            Ok(result) => {
                run.advance(Stage::ActionExecuted);
                click = Some(result);
            }
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "click skipped");
                click_error = Some(e.to_string());
            }
        }
    } else {
        click_error = Some("auto_click disabled".into());
    }

    let artifact = run.store_annotated(image, resolution.normalized).await?;

    let mut entry = journal_entry(Some(&req.query), &resolution);
    entry.click = click.clone();
    entry.click_error = click_error.clone();
    entry.artifact_id = Some(artifact.id.clone());
    run.journal(entry).await;

    let processing_time = run.respond();
    Ok(ServerScreenshotResponse {
        success: true,
        query: req.query,
        coordinates: resolution.normalized.as_pair(),
        absolute_coordinates: resolution.screen_point.as_pair(),
        image_size: descriptor.size(),
        result_image_id: artifact.id,
        processing_time,
        steps: resolution.steps,
        click_executed: click.is_some(),
        click,
        click_error,
    })
}
