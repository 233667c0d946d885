use async_trait::async_trait;

use crate::errors::ClickSightResult;
use crate::perception::types::NormalizedPoint;

/// A UI grounding model: given a screenshot and a text description of a UI
/// element, returns where to click as a normalized point on that screenshot.
#[async_trait]
pub trait GroundingModel: Send + Sync {
    /// Returns the provider's identifier (matches the config.toml key).
    fn name(&self) -> &str;

    /// `image_png` is the exact image whose dimensions the answer refers to.
    async fn locate(&self, image_png: &[u8], query: &str) -> ClickSightResult<NormalizedPoint>;
}
