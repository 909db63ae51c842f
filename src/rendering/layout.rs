//! Vertical tiling of a scrollable page into fold-height segments

use crate::{Error, Result};

/// Scroll offsets at which a page of `page_height` pixels is captured.
///
/// The first tile is always at offset 0; further tiles are added while the
/// cumulative captured height is below the page height. The resulting canvas
/// height is `ceil(page_height / fold) * fold`, never less than one fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlan {
    pub fold: u32,
    pub page_height: u32,
    pub tiles: u32,
    canvas_height: u32,
}

impl TilePlan {
    /// Fails on a zero fold or when the canvas height does not fit in `u32`.
    pub fn new(page_height: u32, fold: u32) -> Result<Self> {
        if fold == 0 {
            return Err(Error::RenderError("fold height must be non-zero".into()));
        }
        let tiles = page_height.div_ceil(fold).max(1);
        let canvas_height = tiles.checked_mul(fold).ok_or_else(|| {
            Error::RenderError(format!(
                "page height {}px in {}px folds overflows the canvas",
                page_height, fold
            ))
        })?;
        Ok(Self {
            fold,
            page_height,
            tiles,
            canvas_height,
        })
    }

    pub fn canvas_height(&self) -> u32 {
        self.canvas_height
    }

    /// Vertical offsets, top to bottom. Also the scroll targets.
    pub fn offsets(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.tiles).map(move |i| i * self.fold)
    }
}
