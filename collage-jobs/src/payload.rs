//! Payload understood by the built-in composite strategies.

use collage_job_queue::ProcessingRequest;
use serde::{Deserialize, Serialize};

use crate::error::StrategyError;

/// Upper bound on source assets per composite.
pub const MAX_ASSETS: usize = 64;

pub const MIN_TILE_SIZE: u32 = 16;
pub const MAX_TILE_SIZE: u32 = 2048;

/// A request to lay `assets` out on one composite image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositePayload {
    /// Owner context the output is stored under.
    pub owner: String,
    /// Identity of the thing the composite represents.
    pub item: String,
    /// Asset references relative to the assets root.
    pub assets: Vec<String>,
    #[serde(default)]
    pub variant: OutputVariant,
}

/// Requested output shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OutputVariant {
    /// Edge length of the square cell each asset is fitted into.
    pub tile_size: u32,
    /// Fixed column count; a near-square grid is used when absent.
    pub columns: Option<u32>,
    /// RGBA fill behind and between tiles.
    pub background: [u8; 4],
}

impl Default for OutputVariant {
    fn default() -> Self {
        Self {
            tile_size: 256,
            columns: None,
            background: [255, 255, 255, 255],
        }
    }
}

impl CompositePayload {
    /// Parse and validate the payload of a request.
    pub fn from_request(request: &ProcessingRequest) -> Result<Self, StrategyError> {
        let payload: Self = serde_json::from_value(request.payload.clone())
            .map_err(|e| StrategyError::InvalidPayload(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<(), StrategyError> {
        if self.owner.trim().is_empty() {
            return Err(StrategyError::InvalidPayload("owner must not be empty".into()));
        }
        if self.item.trim().is_empty() {
            return Err(StrategyError::InvalidPayload("item must not be empty".into()));
        }
        if self.assets.is_empty() {
            return Err(StrategyError::InvalidPayload("at least one asset is required".into()));
        }
        if self.assets.len() > MAX_ASSETS {
            return Err(StrategyError::InvalidPayload(format!(
                "too many assets: {} (max {MAX_ASSETS})",
                self.assets.len()
            )));
        }
        if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.variant.tile_size) {
            return Err(StrategyError::InvalidPayload(format!(
                "tile_size must be within {MIN_TILE_SIZE}..={MAX_TILE_SIZE}, got {}",
                self.variant.tile_size
            )));
        }
        if self.variant.columns == Some(0) {
            return Err(StrategyError::InvalidPayload("columns must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(payload: serde_json::Value) -> Result<CompositePayload, StrategyError> {
        CompositePayload::from_request(&ProcessingRequest::new("fast", payload))
    }

    #[test]
    fn parses_with_default_variant() {
        let payload = parse(json!({"owner": "acme", "item": "p1", "assets": ["a.png"]})).unwrap();
        assert_eq!(payload.variant, OutputVariant::default());
    }

    #[test]
    fn parses_partial_variant() {
        let payload = parse(json!({
            "owner": "acme",
            "item": "p1",
            "assets": ["a.png", "b.png"],
            "variant": {"tile_size": 64, "columns": 2}
        }))
        .unwrap();
        assert_eq!(payload.variant.tile_size, 64);
        assert_eq!(payload.variant.columns, Some(2));
        assert_eq!(payload.variant.background, [255, 255, 255, 255]);
    }

    #[test]
    fn rejects_bad_payloads() {
        for bad in [
            json!({"owner": "acme", "item": "p1", "assets": []}),
            json!({"owner": "", "item": "p1", "assets": ["a.png"]}),
            json!({"owner": "acme", "assets": ["a.png"]}),
            json!({"owner": "acme", "item": "p1", "assets": ["a.png"], "colour": "red"}),
            json!({"owner": "acme", "item": "p1", "assets": ["a.png"], "variant": {"tile_size": 4}}),
            json!({"owner": "acme", "item": "p1", "assets": ["a.png"], "variant": {"columns": 0}}),
        ] {
            assert!(
                matches!(parse(bad.clone()), Err(StrategyError::InvalidPayload(_))),
                "expected rejection for {bad}"
            );
        }
    }
}
