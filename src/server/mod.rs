pub mod contract;
pub mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::ResolutionJournal;
use crate::capabilities::Capabilities;
use crate::errors::ClickSightError;
use crate::executor::input::ActionExecutor;
use crate::grounding::provider::GroundingModel;
use crate::perception::resolver::CoordinateResolver;
use crate::perception::screenshot::ScreenCapture;
use crate::store::ResultStore;

use pipeline::Stage;

use contract::{
    ApiError, ClickResponse, HealthResponse, ResultsResponse, ServerClickResponse,
    ServerScreenshotResponse, UploadQuery,
};

/// Full-resolution screenshots arrive base64-encoded; the framework default
/// of 2 MiB is far too small for them.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Everything a request needs, built once at startup and shared read-only.
pub struct AppState {
    pub resolver: CoordinateResolver,
    pub annotation_radius: u32,
    /// Upper bound on the stages that precede a click.
    pub request_timeout: Duration,
    pub store: ResultStore,
    pub journal: ResolutionJournal,
    pub capture: Arc<dyn ScreenCapture>,
    pub executor: Arc<ActionExecutor>,
    /// `None` when no grounding provider is configured; locate routes then
    /// fail with a model error while the rest of the API keeps working.
    pub grounder: Option<Arc<dyn GroundingModel>>,
    pub capabilities: Capabilities,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/find_click_position", post(find_click_position))
        .route("/upload_and_find", post(upload_and_find))
        .route("/download_result/:id", get(download_result))
        .route("/results", get(list_results))
        .route("/api/click-coordinate", post(click_coordinate))
        .route(
            "/api/server-screenshot-and-find",
            post(server_screenshot_and_find),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.error), Json(self.body())).into_response()
    }
}

fn status_for(error: &ClickSightError) -> StatusCode {
    match error {
        ClickSightError::InvalidImage(_)
        | ClickSightError::InvalidRequest(_)
        | ClickSightError::OutOfBoundsCoordinate { .. }
        | ClickSightError::CoordinateSpaceMismatch { .. } => StatusCode::BAD_REQUEST,
        ClickSightError::ModelContractViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ClickSightError::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
        ClickSightError::CaptureUnavailable(_) | ClickSightError::ActionUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ClickSightError::Model(_) | ClickSightError::Http(_) | ClickSightError::SseParsing(_) => {
            StatusCode::BAD_GATEWAY
        }
        ClickSightError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn request_span(id: Uuid, route: &'static str) -> tracing::Span {
    tracing::info_span!("request", id = %id, route)
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "clicksight",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "results": "/results",
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.grounder.is_some(),
        model_provider: state.grounder.as_ref().map(|g| g.name().to_string()),
        capabilities: state.capabilities.clone(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn find_click_position(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ClickResponse>, ApiError> {
    let id = Uuid::new_v4();
    pipeline::find_click_position(&state, id, &body)
        .instrument(request_span(id, "/find_click_position"))
        .await
        .map(Json)
}

async fn upload_and_find(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<ClickResponse>, ApiError> {
    let id = Uuid::new_v4();
    pipeline::upload_and_find(&state, id, params.query, body.to_vec())
        .instrument(request_span(id, "/upload_and_find"))
        .await
        .map(Json)
}

async fn click_coordinate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ServerClickResponse>, ApiError> {
    let id = Uuid::new_v4();
    pipeline::click_coordinate(&state, id, &body)
        .instrument(request_span(id, "/api/click-coordinate"))
        .await
        .map(Json)
}

async fn server_screenshot_and_find(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ServerScreenshotResponse>, ApiError> {
    let id = Uuid::new_v4();
    pipeline::server_screenshot_and_find(&state, id, &body)
        .instrument(request_span(id, "/api/server-screenshot-and-find"))
        .await
        .map(Json)
}

async fn download_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state
        .store
        .get(&id)
        .await
        .map_err(|e| ApiError::at(Stage::ArtifactRetrieved, e))?;
    let disposition = format!("inline; filename=\"{id}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn list_results(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let results = state
        .store
        .list()
        .await
        .map_err(|e| ApiError::at(Stage::ArtifactRetrieved, e))?;
    Ok(Json(ResultsResponse { results }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine;
    use http_body_util::BodyExt;
    use image::{Rgb, RgbImage};
    use tower::ServiceExt;

    use crate::errors::ClickSightResult;
    use crate::executor::input::tests::FakePointer;
    use crate::grounding::parse::parse_normalized_pair;
    use crate::perception::annotator::encode_png;
    use crate::perception::screenshot::{CapturedFrame, UnavailableCapture};
    use crate::perception::types::{
        DisplayDescriptor, ImageDescriptor, ImageOrigin, NormalizedPoint,
    };

    enum Answer {
        Point(f64, f64),
        Raw(&'static str),
        Hang,
    }

    struct FakeGrounder {
        answer: Answer,
        seen: StdMutex<Vec<(u32, u32)>>,
    }

    impl FakeGrounder {
        fn new(answer: Answer) -> Arc<Self> {
            Arc::new(Self {
                answer,
                seen: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GroundingModel for FakeGrounder {
        fn name(&self) -> &str {
            "fake"
        }

        async fn locate(&self, image_png: &[u8], _query: &str) -> ClickSightResult<NormalizedPoint> {
            let img = image::load_from_memory(image_png).unwrap();
            self.seen.lock().unwrap().push((img.width(), img.height()));
            match self.answer {
                Answer::Point(x, y) => NormalizedPoint::new(x, y),
                Answer::Raw(raw) => parse_normalized_pair(raw),
                Answer::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(ClickSightError::Model("unreachable".into()))
                }
            }
        }
    }

    struct FakeCapture {
        width: u32,
        height: u32,
    }

    #[async_trait]
    impl ScreenCapture for FakeCapture {
        async fn capture(&self) -> ClickSightResult<CapturedFrame> {
            Ok(CapturedFrame {
                image: RgbImage::from_pixel(self.width, self.height, Rgb([240, 240, 240])),
                descriptor: ImageDescriptor::new(self.width, self.height, ImageOrigin::Captured),
            })
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        state: Arc<AppState>,
    }

    struct Setup {
        grounder: Option<Arc<dyn GroundingModel>>,
        capture: Arc<dyn ScreenCapture>,
        executor: ActionExecutor,
        timeout: Duration,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                grounder: Some(FakeGrounder::new(Answer::Point(0.5, 0.5))),
                capture: Arc::new(UnavailableCapture::new("headless test host")),
                executor: ActionExecutor::unavailable("headless test host"),
                timeout: Duration::from_secs(10),
            }
        }
    }

    async fn harness(setup: Setup) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("results")).await.unwrap();
        let journal = ResolutionJournal::new(store.dir());
        let state = Arc::new(AppState {
            resolver: CoordinateResolver::default(),
            annotation_radius: 15,
            request_timeout: setup.timeout,
            store,
            journal,
            capture: setup.capture,
            executor: Arc::new(setup.executor),
            grounder: setup.grounder,
            capabilities: Capabilities::none("headless test host"),
        });
        Harness { _dir: dir, state }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))).unwrap()
    }

    fn b64_png(width: u32, height: u32) -> String {
        base64::engine::general_purpose::STANDARD.encode(png(width, height))
    }

    async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn post_json(
        state: &Arc<AppState>,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes) = send(state, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(state: &Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, bytes) = send(state, Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn upload_resolves_against_its_own_dimensions() {
        let grounder = FakeGrounder::new(Answer::Point(0.5, 0.5));
        let h = harness(Setup {
            grounder: Some(grounder.clone()),
            ..Setup::default()
        })
        .await;

        let (status, body) = post_json(
            &h.state,
            "/find_click_position",
            serde_json::json!({
                "image_base64": format!("data:image/png;base64,{}", b64_png(1200, 800)),
                "query": "OK button",
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["coordinates"], serde_json::json!([0.5, 0.5]));
        assert_eq!(body["absolute_coordinates"], serde_json::json!([600.0, 400.0]));
        assert_eq!(body["image_size"], serde_json::json!([1200, 800]));
        assert_eq!(*grounder.seen.lock().unwrap(), vec![(1200, 800)]);

        let id = body["result_image_id"].as_str().unwrap().to_string();
        let (status, bytes) = send(
            &h.state,
            Request::get(format!("/download_result/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let annotated = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(annotated.dimensions(), (1200, 800));
        assert_eq!(*annotated.get_pixel(600, 400), Rgb([255, 255, 255]));
        assert_eq!(*annotated.get_pixel(600, 392), Rgb([255, 0, 0]));

        let (status, listed) = get_json(&h.state, "/results").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["results"][0]["id"], id.as_str());

        let journal = std::fs::read_to_string(h.state.journal.path()).unwrap();
        let line: serde_json::Value = serde_json::from_str(journal.trim()).unwrap();
        assert_eq!(line["route"], "/find_click_position");
        assert_eq!(line["artifact_id"], id.as_str());
    }

    #[tokio::test]
    async fn raw_upload_applies_density_correction() {
        let h = harness(Setup {
            grounder: Some(FakeGrounder::new(Answer::Point(0.25, 0.25))),
            ..Setup::default()
        })
        .await;
        let req = Request::post("/upload_and_find?query=Submit")
            .body(Body::from(png(3840, 2160)))
            .unwrap();
        let (status, bytes) = send(&h.state, req).await;
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["query"], "Submit");
        assert_eq!(body["absolute_coordinates"], serde_json::json!([480.0, 270.0]));
        assert_eq!(body["steps"][1]["step"], "density_corrected");
    }

    #[tokio::test]
    async fn unknown_fields_are_rejected_at_the_boundary() {
        let h = harness(Setup::default()).await;
        let (status, body) = post_json(
            &h.state,
            "/find_click_position",
            serde_json::json!({"image_base64": b64_png(10, 10), "query": "x", "dpi": 2}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["stage"], "received");
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn undecodable_image_fails_at_decode_stage() {
        let h = harness(Setup::default()).await;
        let (status, body) = post_json(
            &h.state,
            "/find_click_position",
            serde_json::json!({"image_base64": "data:image/png;base64,!!!not-base64", "query": "x"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["stage"], "image_decoded");
        assert_eq!(body["kind"], "invalid_image");
    }

    #[tokio::test]
    async fn malformed_model_output_is_a_contract_violation() {
        let h = harness(Setup {
            grounder: Some(FakeGrounder::new(Answer::Raw("[0.5, 0.5, 0.1]"))),
            ..Setup::default()
        })
        .await;
        let (status, body) = post_json(
            &h.state,
            "/find_click_position",
            serde_json::json!({"image_base64": b64_png(100, 100), "query": "x"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["stage"], "coordinate_resolved");
        assert_eq!(body["kind"], "model_contract_violation");
        assert!(h.state.store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_grounder_is_a_model_error() {
        let h = harness(Setup {
            grounder: None,
            ..Setup::default()
        })
        .await;
        let (status, body) = post_json(
            &h.state,
            "/find_click_position",
            serde_json::json!({"image_base64": b64_png(100, 100), "query": "x"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "model");
    }

    #[tokio::test]
    async fn slow_model_hits_the_request_deadline() {
        let h = harness(Setup {
            grounder: Some(FakeGrounder::new(Answer::Hang)),
            timeout: Duration::from_millis(50),
            ..Setup::default()
        })
        .await;
        let (status, body) = post_json(
            &h.state,
            "/find_click_position",
            serde_json::json!({"image_base64": b64_png(100, 100), "query": "x"}),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["kind"], "timeout");
        assert_eq!(body["stage"], "coordinate_resolved");
    }

    #[tokio::test]
    async fn screenshot_without_input_still_resolves() {
        let h = harness(Setup {
            grounder: Some(FakeGrounder::new(Answer::Point(0.5, 0.5))),
            capture: Arc::new(FakeCapture {
                width: 1920,
                height: 1080,
            }),
            ..Setup::default()
        })
        .await;
        let (status, body) = post_json(
            &h.state,
            "/api/server-screenshot-and-find",
            serde_json::json!({"query": "Send", "auto_click": true}),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["coordinates"], serde_json::json!([0.5, 0.5]));
        assert_eq!(body["absolute_coordinates"], serde_json::json!([960.0, 540.0]));
        assert!(body["result_image_id"].as_str().is_some());
        assert_eq!(body["click_executed"], false);
        assert!(body["click_error"]
            .as_str()
            .unwrap()
            .contains("headless test host"));
    }

    #[tokio::test]
    async fn screenshot_clicks_density_corrected_point() {
        let pointer = Arc::new(FakePointer::new(1920, 1080));
        let h = harness(Setup {
            grounder: Some(FakeGrounder::new(Answer::Point(0.25, 0.25))),
            capture: Arc::new(FakeCapture {
                width: 3840,
                height: 2160,
            }),
            executor: ActionExecutor::new(pointer.clone(), Duration::ZERO),
            ..Setup::default()
        })
        .await;
        let (status, body) = post_json(
            &h.state,
            "/api/server-screenshot-and-find",
            serde_json::json!({"query": "Send"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["absolute_coordinates"], serde_json::json!([480.0, 270.0]));
        assert_eq!(body["click_executed"], true);
        assert_eq!(body["click"]["landed"], true);
        assert!(body.get("click_error").is_none());
        assert_eq!(*pointer.clicks.lock().unwrap(), vec![(480, 270)]);
    }

    #[tokio::test]
    async fn screenshot_out_of_bounds_is_not_clicked() {
        let pointer = Arc::new(FakePointer::new(1280, 720));
        let h = harness(Setup {
            grounder: Some(FakeGrounder::new(Answer::Point(0.9, 0.9))),
            capture: Arc::new(FakeCapture {
                width: 1920,
                height: 1080,
            }),
            executor: ActionExecutor::new(pointer.clone(), Duration::ZERO),
            ..Setup::default()
        })
        .await;
        let (status, body) = post_json(
            &h.state,
            "/api/server-screenshot-and-find",
            serde_json::json!({"query": "Send"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "out_of_bounds_coordinate");
        assert!(pointer.clicks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn screenshot_without_capture_is_unavailable() {
        let h = harness(Setup::default()).await;
        let (status, body) = post_json(
            &h.state,
            "/api/server-screenshot-and-find",
            serde_json::json!({"query": "Send"}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["stage"], "capture_acquired");
        assert_eq!(body["kind"], "capture_unavailable");
    }

    fn browser_click(x: f64, y: f64, screen_w: f64, screen_h: f64) -> serde_json::Value {
        serde_json::json!({
            "x": x,
            "y": y,
            "browserInfo": {
                "window": {"innerWidth": 1280, "innerHeight": 720,
                           "outerWidth": 1280, "outerHeight": 800,
                           "screenX": 0, "screenY": 0},
                "screen": {"width": screen_w, "height": screen_h}
            }
        })
    }

    #[tokio::test]
    async fn browser_click_is_reconciled_to_os_display() {
        let pointer = Arc::new(FakePointer::new(1920, 1080));
        let h = harness(Setup {
            executor: ActionExecutor::new(pointer.clone(), Duration::ZERO),
            ..Setup::default()
        })
        .await;
        let (status, body) = post_json(
            &h.state,
            "/api/click-coordinate",
            browser_click(768.0, 432.0, 1536.0, 864.0),
        )
        .await;

        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["clicked_coordinates"], serde_json::json!([960.0, 540.0]));
        assert_eq!(body["scale"], serde_json::json!({"x": 1.25, "y": 1.25}));
        assert_eq!(body["click"]["cursor_after"], serde_json::json!([960, 540]));
        assert_eq!(*pointer.clicks.lock().unwrap(), vec![(960, 540)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn queued_browser_click_past_deadline_is_not_dispatched() {
        let pointer = Arc::new(FakePointer::new(1920, 1080));
        let h = harness(Setup {
            executor: ActionExecutor::new(pointer.clone(), Duration::from_millis(400)),
            timeout: Duration::from_millis(100),
            ..Setup::default()
        })
        .await;

        let (a, b) = tokio::join!(
            post_json(
                &h.state,
                "/api/click-coordinate",
                browser_click(100.0, 100.0, 1920.0, 1080.0),
            ),
            post_json(
                &h.state,
                "/api/click-coordinate",
                browser_click(200.0, 200.0, 1920.0, 1080.0),
            ),
        );

        let (ok, timed_out) = if a.0 == StatusCode::OK { (a, b) } else { (b, a) };
        assert_eq!(ok.0, StatusCode::OK, "{}", ok.1);
        assert_eq!(timed_out.0, StatusCode::GATEWAY_TIMEOUT, "{}", timed_out.1);
        let timed_out = timed_out.1;
        assert_eq!(timed_out["kind"], "timeout");
        assert_eq!(timed_out["stage"], "action_executed");
        assert_eq!(pointer.clicks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn browser_click_without_input_is_unavailable() {
        let h = harness(Setup::default()).await;
        let (status, body) = post_json(
            &h.state,
            "/api/click-coordinate",
            browser_click(10.0, 10.0, 1920.0, 1080.0),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "action_unavailable");
    }

    #[tokio::test]
    async fn browser_click_with_zero_screen_is_rejected() {
        let pointer = Arc::new(FakePointer::new(1920, 1080));
        let h = harness(Setup {
            executor: ActionExecutor::new(pointer.clone(), Duration::ZERO),
            ..Setup::default()
        })
        .await;
        let (status, body) = post_json(
            &h.state,
            "/api/click-coordinate",
            browser_click(10.0, 10.0, 0.0, 864.0),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
        assert!(pointer.clicks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_reports_capabilities() {
        let h = harness(Setup::default()).await;
        let (status, body) = get_json(&h.state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["model_provider"], "fake");
        assert_eq!(body["capabilities"]["capture"]["available"], false);
        assert_eq!(body["capabilities"]["input"]["available"], false);
        assert!(body["capabilities"]["display"].is_null());
    }

    #[tokio::test]
    async fn unknown_artifact_is_not_found() {
        let h = harness(Setup::default()).await;
        let (status, body) = get_json(&h.state, "/download_result/click_result_1.png").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "artifact_not_found");
        assert_eq!(body["stage"], "artifact_retrieved");
    }

    #[test]
    fn display_descriptor_round_trips_through_health_json() {
        let mut caps = Capabilities::none("x");
        caps.display = Some(DisplayDescriptor::new(1440, 900));
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["display"], serde_json::json!({"width": 1440, "height": 900}));
    }
}
