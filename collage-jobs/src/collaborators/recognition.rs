//! Recognition collaborator: inspects a source asset before it is used.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::storage::resolve_relative;
use crate::error::CollaboratorError;

/// Shortest side, in pixels, at which an asset is considered fully usable.
const FULL_CONFIDENCE_SIDE: u32 = 128;

/// What the recognition service extracted from an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub fields: BTreeMap<String, Value>,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub success: bool,
}

#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Analyze one asset. Malformed or unreadable input is a recoverable error.
    async fn analyze(&self, asset: &str) -> Result<AnalysisReport, CollaboratorError>;
}

/// Decodes assets with the `image` crate and reports their basic properties.
///
/// Confidence grows linearly with the asset's shortest side and saturates at
/// [`FULL_CONFIDENCE_SIDE`] pixels; tiny images make poor tiles.
#[derive(Debug, Clone)]
pub struct ImageAnalyzer {
    assets_root: PathBuf,
}

impl ImageAnalyzer {
    pub fn new(assets_root: impl Into<PathBuf>) -> Self {
        Self {
            assets_root: assets_root.into(),
        }
    }
}

#[async_trait]
impl RecognitionService for ImageAnalyzer {
    async fn analyze(&self, asset: &str) -> Result<AnalysisReport, CollaboratorError> {
        let path = resolve_relative(&self.assets_root, asset)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| CollaboratorError::Recognition {
                asset: asset.to_string(),
                reason: e.to_string(),
            })?;

        let asset_name = asset.to_string();
        tokio::task::spawn_blocking(move || inspect(&asset_name, &bytes))
            .await
            .map_err(|e| CollaboratorError::Recognition {
                asset: asset.to_string(),
                reason: format!("analysis worker failed: {e}"),
            })?
    }
}

fn inspect(asset: &str, bytes: &[u8]) -> Result<AnalysisReport, CollaboratorError> {
    let recognition_error = |reason: String| CollaboratorError::Recognition {
        asset: asset.to_string(),
        reason,
    };

    let format = image::guess_format(bytes).map_err(|e| recognition_error(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| recognition_error(e.to_string()))?;
    let (width, height) = img.dimensions();

    let luma = img.to_luma8();
    let pixels = u64::from(width) * u64::from(height);
    let mean_luminance = if pixels == 0 {
        0.0
    } else {
        luma.pixels().map(|p| u64::from(p.0[0])).sum::<u64>() as f64 / pixels as f64
    };

    let shortest = width.min(height);
    let confidence = (shortest as f32 / FULL_CONFIDENCE_SIDE as f32).clamp(0.0, 1.0);

    let mut fields = BTreeMap::new();
    fields.insert("width".to_string(), json!(width));
    fields.insert("height".to_string(), json!(height));
    fields.insert("format".to_string(), json!(format!("{format:?}").to_lowercase()));
    fields.insert("color".to_string(), json!(format!("{:?}", img.color())));
    fields.insert("mean_luminance".to_string(), json!(mean_luminance.round()));

    Ok(AnalysisReport {
        fields,
        confidence,
        success: pixels > 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).expect("encode");
        out.into_inner()
    }

    #[tokio::test]
    async fn analyzes_png_dimensions_and_confidence() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("big.png"), png_bytes(256, 200)).unwrap();
        std::fs::write(dir.path().join("small.png"), png_bytes(32, 64)).unwrap();

        let analyzer = ImageAnalyzer::new(dir.path());

        let big = analyzer.analyze("big.png").await.expect("analyze big");
        assert!(big.success);
        assert_eq!(big.confidence, 1.0);
        assert_eq!(big.fields["width"], json!(256));
        assert_eq!(big.fields["format"], json!("png"));
        assert_eq!(big.fields["mean_luminance"], json!(255.0));

        let small = analyzer.analyze("small.png").await.expect("analyze small");
        assert_eq!(small.confidence, 0.25);
    }

    #[tokio::test]
    async fn malformed_input_is_a_recognition_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.png"), b"definitely not an image").unwrap();

        let analyzer = ImageAnalyzer::new(dir.path());
        let err = analyzer.analyze("broken.png").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Recognition { .. }));

        let err = analyzer.analyze("missing.png").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Recognition { .. }));
    }
}
