/// Normalized → image pixel → OS screen coordinate resolution.
///
/// Each correction is a separate, named step so a misclick can be traced back
/// to the exact transform that produced it. Steps are recorded in the returned
/// [`Resolution`] and logged at debug level.
use serde::{Deserialize, Serialize};

use crate::errors::{ClickSightError, ClickSightResult};
use crate::perception::types::{
    CoordinateSpace, DisplayDescriptor, ImageDescriptor, ImageOrigin, NormalizedPoint,
    PixelPoint, ReportedDisplay, ScaleCorrection,
};

/// High-density capture heuristic.
///
/// A capture wider than `max_width` or taller than `max_height` is assumed to
/// be in backing-store pixels and is multiplied by `scale` to reach logical
/// screen units. This is an empirical approximation tuned for 2:1 Retina
/// captures; other device pixel ratios need a different `scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityHeuristic {
    pub max_width: u32,
    pub max_height: u32,
    pub scale: f64,
    /// Client uploads are usually browser screen grabs and carry the same
    /// backing-store dimensions as a local capture.
    pub applies_to_uploads: bool,
}

impl Default for DensityHeuristic {
    fn default() -> Self {
        Self {
            max_width: 3000,
            max_height: 2000,
            scale: 0.5,
            applies_to_uploads: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ResolutionStep {
    Projected {
        image_width: u32,
        image_height: u32,
        point: [f64; 2],
    },
    DensityCorrected {
        factor: f64,
        point: [f64; 2],
    },
    Reconciled {
        scale_x: f64,
        scale_y: f64,
        point: [f64; 2],
    },
    Validated {
        display_width: u32,
        display_height: u32,
    },
}

/// Outcome of a full resolution, including every applied step.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub normalized: NormalizedPoint,
    pub image_point: PixelPoint,
    pub screen_point: PixelPoint,
    pub steps: Vec<ResolutionStep>,
}

#[derive(Debug, Clone, Default)]
pub struct CoordinateResolver {
    density: DensityHeuristic,
}

impl CoordinateResolver {
    pub fn new(density: DensityHeuristic) -> Self {
        Self { density }
    }

    /// Step 1: normalized point → pixel point in the observed image's space.
    pub fn project(
        &self,
        normalized: NormalizedPoint,
        image: &ImageDescriptor,
    ) -> ClickSightResult<PixelPoint> {
        if image.width == 0 || image.height == 0 {
            return Err(ClickSightError::InvalidImage(format!(
                "zero-sized image {}x{}",
                image.width, image.height
            )));
        }
        let point = PixelPoint::new(
            normalized.x * image.width as f64,
            normalized.y * image.height as f64,
            CoordinateSpace::Image,
        );
        tracing::debug!(
            nx = normalized.x,
            ny = normalized.y,
            width = image.width,
            height = image.height,
            px = point.x,
            py = point.y,
            "projected normalized point into image space"
        );
        Ok(point)
    }

    /// The density factor that applies to `image`, if any.
    pub fn density_factor(&self, image: &ImageDescriptor) -> Option<f64> {
        if image.origin == ImageOrigin::Uploaded && !self.density.applies_to_uploads {
            return None;
        }
        let oversized =
            image.width > self.density.max_width || image.height > self.density.max_height;
        oversized.then_some(self.density.scale)
    }

    /// Step 2: image pixels → logical screen units, tagged as `into`.
    ///
    /// Gated only by the size heuristic; calling it again on the same input
    /// yields the same output, it never compounds.
    pub fn correct_density(
        &self,
        point: PixelPoint,
        image: &ImageDescriptor,
        into: CoordinateSpace,
    ) -> ClickSightResult<(PixelPoint, Option<f64>)> {
        point.require_space(CoordinateSpace::Image)?;
        match self.density_factor(image) {
            Some(factor) => {
                let corrected = PixelPoint::new(point.x * factor, point.y * factor, into);
                tracing::debug!(
                    width = image.width,
                    height = image.height,
                    factor,
                    px = corrected.x,
                    py = corrected.y,
                    "high-density capture detected, coordinates scaled"
                );
                Ok((corrected, Some(factor)))
            }
            None => Ok((PixelPoint::new(point.x, point.y, into), None)),
        }
    }

    /// Step 3: reported-screen point → OS-screen point.
    pub fn reconcile(
        &self,
        point: PixelPoint,
        os: &DisplayDescriptor,
        reported: &ReportedDisplay,
    ) -> ClickSightResult<(PixelPoint, ScaleCorrection)> {
        point.require_space(CoordinateSpace::ReportedScreen)?;
        if reported.matches(os) {
            tracing::debug!(
                width = os.width,
                height = os.height,
                "reported display matches OS display, no reconciliation"
            );
            return Ok((
                PixelPoint::new(point.x, point.y, CoordinateSpace::OsScreen),
                ScaleCorrection::IDENTITY,
            ));
        }

        let scale = ScaleCorrection {
            x: os.width as f64 / reported.width,
            y: os.height as f64 / reported.height,
        };
        let reconciled = PixelPoint::new(
            point.x * scale.x,
            point.y * scale.y,
            CoordinateSpace::OsScreen,
        );
        tracing::debug!(
            reported_width = reported.width,
            reported_height = reported.height,
            os_width = os.width,
            os_height = os.height,
            scale_x = scale.x,
            scale_y = scale.y,
            px = reconciled.x,
            py = reconciled.y,
            "reconciled reported-display coordinate"
        );
        Ok((reconciled, scale))
    }

    /// Step 4: bounds are inclusive on both ends; nothing is clamped.
    pub fn validate(&self, point: &PixelPoint, os: &DisplayDescriptor) -> ClickSightResult<()> {
        point.require_space(CoordinateSpace::OsScreen)?;
        let inside = (0.0..=os.width as f64).contains(&point.x)
            && (0.0..=os.height as f64).contains(&point.y);
        if !inside {
            tracing::warn!(
                px = point.x,
                py = point.y,
                width = os.width,
                height = os.height,
                "resolved coordinate out of bounds"
            );
            return Err(ClickSightError::OutOfBoundsCoordinate {
                x: point.x,
                y: point.y,
                width: os.width,
                height: os.height,
            });
        }
        Ok(())
    }

    /// Runs all four steps. When `reported` is given, the density-corrected
    /// point is taken to be in the reported space and reconciled into OS space.
    pub fn resolve(
        &self,
        normalized: NormalizedPoint,
        image: &ImageDescriptor,
        os: &DisplayDescriptor,
        reported: Option<&ReportedDisplay>,
    ) -> ClickSightResult<Resolution> {
        let mut steps = Vec::with_capacity(4);

        let image_point = self.project(normalized, image)?;
        steps.push(ResolutionStep::Projected {
            image_width: image.width,
            image_height: image.height,
            point: image_point.as_pair(),
        });

        let logical_space = if reported.is_some() {
            CoordinateSpace::ReportedScreen
        } else {
            CoordinateSpace::OsScreen
        };
        let (logical, factor) = self.correct_density(image_point, image, logical_space)?;
        if let Some(factor) = factor {
            steps.push(ResolutionStep::DensityCorrected {
                factor,
                point: logical.as_pair(),
            });
        }

        let screen_point = match reported {
            Some(reported) => {
                let (p, scale) = self.reconcile(logical, os, reported)?;
                if !scale.is_identity() {
                    steps.push(ResolutionStep::Reconciled {
                        scale_x: scale.x,
                        scale_y: scale.y,
                        point: p.as_pair(),
                    });
                }
                p
            }
            None => logical,
        };

        self.validate(&screen_point, os)?;
        steps.push(ResolutionStep::Validated {
            display_width: os.width,
            display_height: os.height,
        });

        Ok(Resolution {
            normalized,
            image_point,
            screen_point,
            steps,
        })
    }

    /// The logical screen an image depicts: its size after density correction,
    /// rounded up so the projected far edge stays inside the bounds.
    /// Used when no OS display is known, e.g. for client uploads.
    pub fn logical_display(&self, image: &ImageDescriptor) -> DisplayDescriptor {
        let factor = self.density_factor(image).unwrap_or(1.0);
        DisplayDescriptor::new(
            (image.width as f64 * factor).ceil() as u32,
            (image.height as f64 * factor).ceil() as u32,
        )
    }
}
