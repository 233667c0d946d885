use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ClickSightError, ClickSightResult};

/// A location expressed as a fraction of an image's width and height.
/// Origin is top-left; both components lie in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    /// Validates the pair. Values outside `[0, 1]` (or non-finite) are a
    /// contract violation by whoever produced them, never clamped.
    pub fn new(x: f64, y: f64) -> ClickSightResult<Self> {
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_range(x) || !in_range(y) {
            return Err(ClickSightError::ModelContractViolation(format!(
                "normalized coordinate [{x}, {y}] is outside [0, 1]"
            )));
        }
        Ok(Self { x, y })
    }

    pub fn as_pair(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Pixel grid of the image the model observed.
    Image,
    /// Logical coordinates accepted by the OS input subsystem.
    OsScreen,
    /// Screen coordinates as measured by an embedding context (e.g. a browser).
    ReportedScreen,
}

impl fmt::Display for CoordinateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Image => "image",
            Self::OsScreen => "os-screen",
            Self::ReportedScreen => "reported-screen",
        };
        f.write_str(s)
    }
}

/// An absolute pixel location tagged with the space it is expressed in.
/// Points from different spaces are never combined without an explicit transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
    pub space: CoordinateSpace,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64, space: CoordinateSpace) -> Self {
        Self { x, y, space }
    }

    pub fn as_pair(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Fails unless the point already lives in `expected`.
    pub fn require_space(&self, expected: CoordinateSpace) -> ClickSightResult<()> {
        if self.space == expected {
            Ok(())
        } else {
            Err(ClickSightError::CoordinateSpaceMismatch {
                expected,
                found: self.space,
            })
        }
    }

    /// Nearest integer pixel, as consumed by input synthesis.
    pub fn rounded(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    /// Full-screen grab taken on this host.
    Captured,
    /// Supplied by a client, possibly pre-scaled by its device pixel ratio.
    Uploaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    pub origin: ImageOrigin,
}

impl ImageDescriptor {
    pub fn new(width: u32, height: u32, origin: ImageOrigin) -> Self {
        Self { width, height, origin }
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}

/// Addressable screen area as reported by the OS input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDescriptor {
    pub width: u32,
    pub height: u32,
}

impl DisplayDescriptor {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Screen size measured by a second, independent source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedDisplay {
    pub width: f64,
    pub height: f64,
}

impl ReportedDisplay {
    pub fn new(width: f64, height: f64) -> ClickSightResult<Self> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(ClickSightError::InvalidRequest(format!(
                "reported screen size {width}x{height} must be positive"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn matches(&self, os: &DisplayDescriptor) -> bool {
        self.width == os.width as f64 && self.height == os.height as f64
    }
}

/// Per-axis multiplicative factors between two descriptors of the same screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleCorrection {
    pub x: f64,
    pub y: f64,
}

impl ScaleCorrection {
    pub const IDENTITY: Self = Self { x: 1.0, y: 1.0 };

    pub fn is_identity(&self) -> bool {
        self.x == 1.0 && self.y == 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_point_accepts_closed_unit_interval() {
        assert!(NormalizedPoint::new(0.0, 0.0).is_ok());
        assert!(NormalizedPoint::new(1.0, 1.0).is_ok());
        assert!(NormalizedPoint::new(0.25, 0.75).is_ok());
    }

    #[test]
    fn normalized_point_rejects_out_of_range_and_nan() {
        for (x, y) in [(1.01, 0.5), (-0.1, 0.5), (0.5, f64::NAN), (f64::INFINITY, 0.0)] {
            let err = NormalizedPoint::new(x, y).unwrap_err();
            assert_eq!(err.kind(), "model_contract_violation");
        }
    }

    #[test]
    fn require_space_reports_both_spaces() {
        let p = PixelPoint::new(1.0, 2.0, CoordinateSpace::Image);
        assert!(p.require_space(CoordinateSpace::Image).is_ok());
        match p.require_space(CoordinateSpace::OsScreen) {
            Err(ClickSightError::CoordinateSpaceMismatch { expected, found }) => {
                assert_eq!(expected, CoordinateSpace::OsScreen);
                assert_eq!(found, CoordinateSpace::Image);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn reported_display_must_be_positive() {
        assert!(ReportedDisplay::new(0.0, 864.0).is_err());
        assert!(ReportedDisplay::new(1536.0, -1.0).is_err());
        let r = ReportedDisplay::new(1920.0, 1080.0).unwrap();
        assert!(r.matches(&DisplayDescriptor::new(1920, 1080)));
        assert!(!r.matches(&DisplayDescriptor::new(1536, 864)));
    }
}
