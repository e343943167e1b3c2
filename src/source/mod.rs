//! Item sources
//!
//! A source enumerates the items of one locator (an account page, a search,
//! a drop folder) and hands the pipeline lazy access to each item's bytes.
//! Enumeration is cheap; the actual byte retrieval happens per item through
//! [`SourceItem::fetch`] so the pipeline can skip archived items without
//! paying for them.

pub mod folder;

pub use folder::FolderSource;

use crate::catalog::ArtworkMeta;
use crate::core::error::Result;
use std::path::PathBuf;

/// One retrievable item from a source
pub struct SourceItem {
    /// Source-scoped stable identifier, used as the archive key
    pub remote_id: String,
    /// Metadata extracted during enumeration
    pub meta: ArtworkMeta,
    /// Local image file, when the source already has the bytes on disk
    pub local_path: Option<PathBuf>,
    fetcher: Box<dyn FnMut() -> Result<Vec<u8>>>,
}

impl SourceItem {
    pub fn new(
        remote_id: String,
        meta: ArtworkMeta,
        local_path: Option<PathBuf>,
        fetcher: Box<dyn FnMut() -> Result<Vec<u8>>>,
    ) -> Self {
        Self {
            remote_id,
            meta,
            local_path,
            fetcher,
        }
    }

    /// Retrieve the item's image bytes; may be called more than once
    pub fn fetch(&mut self) -> Result<Vec<u8>> {
        (self.fetcher)()
    }
}

impl std::fmt::Debug for SourceItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceItem")
            .field("remote_id", &self.remote_id)
            .field("local_path", &self.local_path)
            .finish_non_exhaustive()
    }
}

/// Something the pipeline can import from
pub trait ItemSource {
    /// The locator this source enumerates, used for batch selection
    fn locator(&self) -> &str;

    /// Enumerate all items in source order
    fn items(&mut self) -> Result<Vec<SourceItem>>;
}
