//! Grid layout and PNG encoding shared by the composite strategies.

use std::io::Cursor;

use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::StrategyError;

/// Cell arrangement of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub tile: u32,
}

impl GridLayout {
    /// Near-square grid for `count` tiles unless `columns` pins the width.
    pub fn for_tiles(count: usize, tile: u32, columns: Option<u32>) -> Self {
        let count = count.max(1) as u32;
        let columns = columns
            .unwrap_or_else(|| (count as f64).sqrt().ceil() as u32)
            .clamp(1, count);
        let rows = count.div_ceil(columns);
        Self {
            columns,
            rows,
            tile,
        }
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.columns * self.tile, self.rows * self.tile)
    }

    /// Top-left corner of cell `index`, row-major.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        ((index % self.columns) * self.tile, (index / self.columns) * self.tile)
    }
}

/// Paint each tile centered in its cell over a `background` canvas.
pub(crate) fn compose(tiles: &[RgbaImage], layout: GridLayout, background: [u8; 4]) -> RgbaImage {
    let (width, height) = layout.canvas_size();
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(background));

    for (index, tile) in tiles.iter().enumerate() {
        let (x, y) = layout.cell_origin(index);
        let dx = layout.tile.saturating_sub(tile.width()) / 2;
        let dy = layout.tile.saturating_sub(tile.height()) / 2;
        imageops::overlay(&mut canvas, tile, i64::from(x + dx), i64::from(y + dy));
    }
    canvas
}

pub(crate) fn decode(asset: &str, bytes: &[u8]) -> Result<DynamicImage, StrategyError> {
    image::load_from_memory(bytes).map_err(|e| StrategyError::Decode {
        asset: asset.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, StrategyError> {
    let mut out = Cursor::new(Vec::new());
    canvas
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| StrategyError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
