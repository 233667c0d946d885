use thiserror::Error;

use crate::perception::types::CoordinateSpace;

#[derive(Debug, Error)]
pub enum ClickSightError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(
        "Resolved coordinate [{x:.1}, {y:.1}] is outside the display bounds {width}x{height}"
    )]
    OutOfBoundsCoordinate {
        x: f64,
        y: f64,
        width: u32,
        height: u32,
    },

    #[error("Coordinate space mismatch: expected {expected}, got {found}")]
    CoordinateSpaceMismatch {
        expected: CoordinateSpace,
        found: CoordinateSpace,
    },

    #[error("Screen capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Input synthesis unavailable: {0}")]
    ActionUnavailable(String),

    #[error("Model contract violation: {0}")]
    ModelContractViolation(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Grounding model error: {0}")]
    Model(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl ClickSightError {
    /// Stable machine-readable name, used in API error bodies and the journal.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidImage(_) => "invalid_image",
            Self::InvalidRequest(_) => "invalid_request",
            Self::OutOfBoundsCoordinate { .. } => "out_of_bounds_coordinate",
            Self::CoordinateSpaceMismatch { .. } => "coordinate_space_mismatch",
            Self::CaptureUnavailable(_) => "capture_unavailable",
            Self::ActionUnavailable(_) => "action_unavailable",
            Self::ModelContractViolation(_) => "model_contract_violation",
            Self::ArtifactNotFound(_) => "artifact_not_found",
            Self::Model(_) => "model",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::SseParsing(_) => "sse_parsing",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Http(_) => "http",
            Self::TomlDe(_) => "toml",
        }
    }
}

impl serde::Serialize for ClickSightError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type ClickSightResult<T> = Result<T, ClickSightError>;
