//! Tall RGBA canvas that viewport captures are stitched into.

use super::{Screenshot, TilePlan};
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

pub struct Composite {
    width: u32,
    fold: u32,
    canvas: RgbaImage,
}

impl Composite {
    /// Allocate a transparent canvas of `width` x `plan.canvas_height()`.
    pub fn new(width: u32, plan: &TilePlan) -> Self {
        Self {
            width,
            fold: plan.fold,
            canvas: RgbaImage::new(width, plan.canvas_height()),
        }
    }

    /// Decode an encoded viewport capture and draw it at vertical offset `y`.
    pub fn draw_tile(&mut self, encoded: &[u8], y: u32) -> Result<()> {
        let tile = image::load_from_memory(encoded)?.to_rgba8();
        self.draw_image(&tile, y)
    }

    /// Draw a decoded tile into the `width` x `fold` slot at offset `y`.
    ///
    /// A tile whose pixel size differs from the slot (high-DPI captures,
    /// scrollbars trimmed by the driver) is scaled to fit the slot exactly.
    pub fn draw_image(&mut self, tile: &RgbaImage, y: u32) -> Result<()> {
        if y >= self.canvas.height() {
            return Err(Error::RenderError(format!(
                "tile offset {} is outside the {}px canvas",
                y,
                self.canvas.height()
            )));
        }

        if tile.dimensions() == (self.width, self.fold) {
            imageops::replace(&mut self.canvas, tile, 0, i64::from(y));
        } else {
            let scaled = imageops::resize(tile, self.width, self.fold, FilterType::Triangle);
            imageops::replace(&mut self.canvas, &scaled, 0, i64::from(y));
        }
        Ok(())
    }

    /// Borrow the raw canvas (used by tests and benches).
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn encode(self) -> Result<Screenshot> {
        let (width, height) = self.canvas.dimensions();
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(self.canvas).write_to(&mut buf, ImageFormat::Png)?;
        Ok(Screenshot {
            width,
            height,
            png_data: buf.into_inner(),
        })
    }
}
