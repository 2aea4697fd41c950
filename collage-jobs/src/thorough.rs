//! The "thorough" composite strategy.

use async_trait::async_trait;
use collage_job_queue::ArtifactRef;
use image::imageops::FilterType;
use image::RgbaImage;
use tracing::{info, warn};

use crate::collaborators::Collaborators;
use crate::composite::{compose, decode, encode_png, GridLayout};
use crate::error::StrategyError;
use crate::payload::CompositePayload;
use crate::strategy::{report_progress, ProcessingStrategy, StrategyInput};
use crate::strategy_names;

/// Runs every asset through recognition first and only keeps the ones the
/// analyzer is confident about, resampling them with a Lanczos filter.
///
/// Low-confidence or unreadable assets are skipped; the job fails only when
/// nothing usable is left.
#[derive(Debug, Clone)]
pub struct ThoroughStrategy {
    collaborators: Collaborators,
    min_confidence: f32,
}

impl ThoroughStrategy {
    pub fn new(collaborators: Collaborators, min_confidence: f32) -> Self {
        Self {
            collaborators,
            min_confidence,
        }
    }

    /// Analyze, load and resize one asset. `Ok(None)` means "skip it".
    async fn prepare_tile(
        &self,
        input: &StrategyInput,
        asset: &str,
        tile_size: u32,
    ) -> Result<Option<RgbaImage>, StrategyError> {
        let report = match self.collaborators.recognition.analyze(asset).await {
            Ok(report) => report,
            Err(e) => {
                warn!(job_id = %input.job_id, asset, error = %e, "skipping unrecognized asset");
                return Ok(None);
            }
        };
        if !report.success || report.confidence < self.min_confidence {
            warn!(
                job_id = %input.job_id,
                asset,
                confidence = report.confidence,
                min_confidence = self.min_confidence,
                "skipping low-confidence asset"
            );
            return Ok(None);
        }

        // Storage failures are not the asset's fault; let them fail the job.
        let bytes = self.collaborators.storage.load(asset).await?;
        let asset_name = asset.to_string();
        let resized = tokio::task::spawn_blocking(move || {
            decode(&asset_name, &bytes)
                .map(|img| img.resize(tile_size, tile_size, FilterType::Lanczos3).to_rgba8())
        })
        .await
        .map_err(|e| StrategyError::Worker(e.to_string()))?;

        match resized {
            Ok(tile) => Ok(Some(tile)),
            Err(e) => {
                warn!(job_id = %input.job_id, asset, error = %e, "skipping undecodable asset");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ProcessingStrategy for ThoroughStrategy {
    fn name(&self) -> &str {
        strategy_names::THOROUGH
    }

    async fn execute(&self, input: &StrategyInput) -> Result<ArtifactRef, StrategyError> {
        let payload = CompositePayload::from_request(&input.request)?;
        let progress = self.collaborators.progress.as_ref();
        let storage = &self.collaborators.storage;
        let total = payload.assets.len();

        report_progress(progress, input.job_id, 0, "analyzing assets").await;
        let mut tiles = Vec::with_capacity(total);
        for (index, asset) in payload.assets.iter().enumerate() {
            if let Some(tile) = self
                .prepare_tile(input, asset, payload.variant.tile_size)
                .await?
            {
                tiles.push(tile);
            }
            let percent = ((index + 1) * 80 / total) as u8;
            report_progress(progress, input.job_id, percent, asset).await;
        }

        if tiles.is_empty() {
            return Err(StrategyError::NoUsableAssets(format!(
                "all {total} assets were skipped"
            )));
        }
        let used = tiles.len();

        report_progress(progress, input.job_id, 85, "compositing").await;
        let variant = payload.variant.clone();
        let png = tokio::task::spawn_blocking(move || {
            let layout = GridLayout::for_tiles(tiles.len(), variant.tile_size, variant.columns);
            encode_png(&compose(&tiles, layout, variant.background))
        })
        .await
        .map_err(|e| StrategyError::Worker(e.to_string()))??;

        report_progress(progress, input.job_id, 95, "storing").await;
        let destination = storage.resolve_destination_path(&payload.owner, &payload.item);
        let name = format!("{}-{}.png", input.fingerprint.short(), self.name());
        let stored = storage.store(png, &name, &destination).await?;

        report_progress(progress, input.job_id, 100, "done").await;
        info!(
            job_id = %input.job_id,
            used,
            skipped = total - used,
            location = %stored.location,
            size = stored.size,
            "thorough composite stored"
        );
        Ok(ArtifactRef::new(stored.location, stored.size))
    }
}
