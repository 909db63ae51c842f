//! Tiling and compositing of viewport captures into one full-page image.

pub mod composite;
pub mod layout;

pub use composite::Composite;
pub use layout::TilePlan;

/// A finished composite, PNG-encoded and ready to be archived.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

impl Screenshot {
    /// Number of fold-sized tiles stacked in this image.
    pub fn tiles(&self, fold: u32) -> u32 {
        if fold == 0 {
            return 0;
        }
        self.height / fold
    }
}
