//! The "fast" composite strategy.

use async_trait::async_trait;
use collage_job_queue::ArtifactRef;
use tracing::info;

use crate::collaborators::Collaborators;
use crate::composite::{compose, decode, encode_png, GridLayout};
use crate::error::StrategyError;
use crate::payload::CompositePayload;
use crate::strategy::{report_progress, ProcessingStrategy, StrategyInput};
use crate::strategy_names;

/// Thumbnails every asset with the integer thumbnail filter and skips recognition.
///
/// Any unreadable asset fails the whole job.
#[derive(Debug, Clone)]
pub struct FastStrategy {
    collaborators: Collaborators,
}

impl FastStrategy {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }
}

#[async_trait]
impl ProcessingStrategy for FastStrategy {
    fn name(&self) -> &str {
        strategy_names::FAST
    }

    async fn execute(&self, input: &StrategyInput) -> Result<ArtifactRef, StrategyError> {
        let payload = CompositePayload::from_request(&input.request)?;
        let progress = self.collaborators.progress.as_ref();
        let storage = &self.collaborators.storage;

        report_progress(progress, input.job_id, 5, "loading assets").await;
        let mut sources = Vec::with_capacity(payload.assets.len());
        for asset in &payload.assets {
            sources.push((asset.clone(), storage.load(asset).await?));
        }

        report_progress(progress, input.job_id, 50, "compositing").await;
        let variant = payload.variant.clone();
        let png = tokio::task::spawn_blocking(move || {
            let tiles = sources
                .iter()
                .map(|(asset, bytes)| {
                    decode(asset, bytes).map(|img| img.thumbnail(variant.tile_size, variant.tile_size).to_rgba8())
                })
                .collect::<Result<Vec<_>, _>>()?;
            let layout = GridLayout::for_tiles(tiles.len(), variant.tile_size, variant.columns);
            encode_png(&compose(&tiles, layout, variant.background))
        })
        .await
        .map_err(|e| StrategyError::Worker(e.to_string()))??;

        report_progress(progress, input.job_id, 90, "storing").await;
        let destination = storage.resolve_destination_path(&payload.owner, &payload.item);
        let name = format!("{}-{}.png", input.fingerprint.short(), self.name());
        let stored = storage.store(png, &name, &destination).await?;

        report_progress(progress, input.job_id, 100, "done").await;
        info!(
            job_id = %input.job_id,
            assets = payload.assets.len(),
            location = %stored.location,
            size = stored.size,
            "fast composite stored"
        );
        Ok(ArtifactRef::new(stored.location, stored.size))
    }
}
