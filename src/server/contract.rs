//! Typed request/response records for every route. Unknown or missing
//! fields are rejected at the boundary.
use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;
use crate::errors::ClickSightError;
use crate::executor::input::ClickResult;
use crate::perception::resolver::ResolutionStep;
use crate::perception::types::ScaleCorrection;
use crate::server::pipeline::Stage;
use crate::store::ArtifactMeta;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClickRequest {
    pub image_base64: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    pub success: bool,
    pub query: String,
    /// Normalized `[x, y]` as returned by the grounding model.
    pub coordinates: [f64; 2],
    /// Resolved screen `[x, y]` after every correction.
    pub absolute_coordinates: [f64; 2],
    pub image_size: [u32; 2],
    pub result_image_id: String,
    pub processing_time: f64,
    pub steps: Vec<ResolutionStep>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(default = "default_upload_query")]
    pub query: String,
}

fn default_upload_query() -> String {
    "button".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrowserWindow {
    pub inner_width: f64,
    pub inner_height: f64,
    pub outer_width: f64,
    pub outer_height: f64,
    #[serde(default)]
    pub screen_x: f64,
    #[serde(default)]
    pub screen_y: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrowserScreen {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub avail_width: Option<f64>,
    #[serde(default)]
    pub avail_height: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrowserInfo {
    pub window: BrowserWindow,
    pub screen: BrowserScreen,
    /// Page layout details; informational only.
    #[serde(default)]
    pub chatbot: Option<serde_json::Value>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerClickRequest {
    /// Screen coordinate in the browser-reported screen space.
    pub x: f64,
    pub y: f64,
    pub browser_info: BrowserInfo,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServerClickResponse {
    pub success: bool,
    pub message: String,
    pub clicked_coordinates: [f64; 2],
    pub requested_coordinates: [f64; 2],
    pub scale: ScaleCorrection,
    pub click: ClickResult,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerScreenshotRequest {
    pub query: String,
    #[serde(default = "default_true")]
    pub auto_click: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ServerScreenshotResponse {
    pub success: bool,
    pub query: String,
    pub coordinates: [f64; 2],
    pub absolute_coordinates: [f64; 2],
    pub image_size: [u32; 2],
    pub result_image_id: String,
    pub processing_time: f64,
    pub steps: Vec<ResolutionStep>,
    pub click_executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click: Option<ClickResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    pub capabilities: Capabilities,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub results: Vec<ArtifactMeta>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub kind: &'static str,
    pub error: String,
}

/// A failed request: the error plus the stage it failed to reach.
#[derive(Debug)]
pub struct ApiError {
    pub stage: Option<Stage>,
    pub error: ClickSightError,
}

impl ApiError {
    pub fn at(stage: Stage, error: ClickSightError) -> Self {
        Self {
            stage: Some(stage),
            error,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            success: false,
            stage: self.stage,
            kind: self.error.kind(),
            error: self.error.to_string(),
        }
    }
}

impl From<ClickSightError> for ApiError {
    fn from(error: ClickSightError) -> Self {
        Self { stage: None, error }
    }
}
