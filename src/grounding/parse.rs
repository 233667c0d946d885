/// Strict parsing of a grounding model's textual answer.
///
/// The only accepted shape is a two-element array of numbers in `[0, 1]`,
/// optionally wrapped in a markdown code fence. Anything else is reported as
/// a contract violation carrying the raw text; nothing is guessed.
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{ClickSightError, ClickSightResult};
use crate::perception::types::NormalizedPoint;

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").expect("static regex is valid")
    })
}

pub fn parse_normalized_pair(raw: &str) -> ClickSightResult<NormalizedPoint> {
    let trimmed = raw.trim();
    let body = code_fence()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let violation = |why: &str| {
        ClickSightError::ModelContractViolation(format!("{why}; model output was {raw:?}"))
    };

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| violation("not a JSON array"))?;
    let items = value
        .as_array()
        .ok_or_else(|| violation("not a JSON array"))?;
    if items.len() != 2 {
        return Err(violation("expected exactly two coordinates"));
    }
    let x = items[0]
        .as_f64()
        .ok_or_else(|| violation("x is not a number"))?;
    let y = items[1]
        .as_f64()
        .ok_or_else(|| violation("y is not a number"))?;

    NormalizedPoint::new(x, y).map_err(|_| violation("coordinates outside [0, 1]"))
}
