//! Viewport catalog: banner sizes and the fold height each one is tiled by.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Pixel dimensions of a banner creative, e.g. `300x250`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BannerSize {
    pub width: u32,
    pub height: u32,
}

impl BannerSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for BannerSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for BannerSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::ConfigError(format!("expected <width>x<height>, got '{}'", s)))?;
        let width = w
            .parse::<u32>()
            .map_err(|e| Error::ConfigError(format!("invalid width in '{}': {}", s, e)))?;
        let height = h
            .parse::<u32>()
            .map_err(|e| Error::ConfigError(format!("invalid height in '{}': {}", s, e)))?;
        if width == 0 || height == 0 {
            return Err(Error::ConfigError(format!("banner size '{}' has a zero dimension", s)));
        }
        Ok(Self { width, height })
    }
}

/// One catalog row: a banner size and the vertical span captured per scroll step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportEntry {
    pub width: u32,
    pub height: u32,
    /// Fold height in pixels; also the browser window height.
    pub fold: u32,
}

impl ViewportEntry {
    pub fn new(width: u32, height: u32, fold: u32) -> Self {
        Self { width, height, fold }
    }

    pub fn size(&self) -> BannerSize {
        BannerSize::new(self.width, self.height)
    }
}

/// Immutable set of viewport entries handed to the orchestrator.
///
/// Sizes are unique and every dimension is non-zero. Iteration follows
/// insertion order, which is the order capture tasks are launched in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportCatalog {
    entries: Vec<ViewportEntry>,
}

impl ViewportCatalog {
    pub fn new(entries: Vec<ViewportEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::ConfigError("viewport catalog is empty".into()));
        }

        let mut seen = HashSet::new();
        for e in &entries {
            if e.width == 0 || e.height == 0 || e.fold == 0 {
                return Err(Error::ConfigError(format!(
                    "viewport {} has a zero dimension (fold {})",
                    e.size(),
                    e.fold
                )));
            }
            if !seen.insert(e.size()) {
                return Err(Error::ConfigError(format!("duplicate viewport {}", e.size())));
            }
        }

        Ok(Self { entries })
    }

    /// The four standard IAB sizes with their ISI fold heights.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                ViewportEntry::new(300, 250, 1500),
                ViewportEntry::new(300, 600, 2000),
                ViewportEntry::new(160, 600, 3000),
                ViewportEntry::new(728, 90, 1500),
            ],
        }
    }

    pub fn entries(&self) -> &[ViewportEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewportEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold height for a size, if cataloged.
    pub fn fold_for(&self, size: BannerSize) -> Option<u32> {
        self.entries.iter().find(|e| e.size() == size).map(|e| e.fold)
    }

    /// Restrict the catalog to the given sizes. Unknown sizes are an error.
    pub fn only(&self, sizes: &[BannerSize]) -> Result<Self> {
        if let Some(missing) = sizes.iter().find(|s| self.fold_for(**s).is_none()) {
            return Err(Error::ConfigError(format!("size {} is not in the catalog", missing)));
        }
        let entries = self
            .entries
            .iter()
            .filter(|e| sizes.contains(&e.size()))
            .copied()
            .collect();
        Self::new(entries)
    }
}

impl Default for ViewportCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a> IntoIterator for &'a ViewportCatalog {
    type Item = &'a ViewportEntry;
    type IntoIter = std::slice::Iter<'a, ViewportEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
