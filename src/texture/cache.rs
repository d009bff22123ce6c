//! De-duplicating texture cache keyed by asset path.
//!
//! Owned by [`super::TextureContext`] and only touched from the thread that
//! owns the graphics context. Every resource that obtained a key's GPU
//! object holds one reference; the object is deleted on the last release.

use rustc_hash::FxHashMap;

use super::handle::TextureInfo;
use super::resource::upload_bitmap;
use crate::decode::Decoder;
use crate::error::TextureError;
use crate::gpu::context::GraphicsContext;
use crate::gpu::device::GraphicsDevice;

/// Where a cached texture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Decoded from the asset named by the key; can be replayed.
    DecodedImage,
    /// Published from generated pixels; cannot be replayed.
    Procedural,
}

/// Upload settings for loaded assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    /// Build and upload a full mip pyramid.
    pub mipmaps: bool,
    /// Reverse row order before upload.
    pub flip_vertically: bool,
}

/// One cached texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// Texture metadata; `info.object` is `None` after
    /// [`TextureCache::unload_all`].
    pub info: TextureInfo,
    /// Origin of the pixels.
    pub source: SourceKind,
    /// Settings used for the upload, reused on replay.
    pub options: LoadOptions,
    /// Number of resources holding this texture.
    pub refs: u32,
    /// Context generation `info.object` was created in.
    pub generation: u64,
}

/// Asset key to texture mapping.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: FxHashMap<String, CacheEntry>,
}

impl TextureCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata for `key`, if it has a live GPU object.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<TextureInfo> {
        self.entries
            .get(key)
            .filter(|e| e.info.object.is_some())
            .map(|e| e.info)
    }

    /// The full row for `key`, live or not.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Whether `key` has a row.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record a freshly uploaded texture for `key`. The inserting resource
    /// holds the first reference; references held on an existing row are
    /// carried over.
    pub fn insert(
        &mut self,
        key: &str,
        info: TextureInfo,
        source: SourceKind,
        options: LoadOptions,
        generation: u64,
    ) {
        let refs = self.entries.get(key).map_or(0, |e| e.refs) + 1;
        drop(self.entries.insert(key.to_owned(), CacheEntry {
            info,
            source,
            options,
            refs,
            generation,
        }));
        log::debug!("cached {key} (refs {refs})");
    }

    /// Take a reference to `key`'s texture, if it has a live one.
    pub fn acquire(&mut self, key: &str) -> Option<TextureInfo> {
        let entry = self
            .entries
            .get_mut(key)
            .filter(|e| e.info.object.is_some())?;
        entry.refs += 1;
        log::debug!("cache hit {key} (refs {})", entry.refs);
        Some(entry.info)
    }

    /// Drop one reference to `key`. Returns `true` when this was the last
    /// one and the row and its GPU object were released.
    pub fn release<D: GraphicsDevice>(
        &mut self,
        key: &str,
        gfx: &mut GraphicsContext<D>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs > 0 {
            return false;
        }
        if let Some(entry) = self.entries.remove(key) {
            delete_object(key, &entry, gfx);
        }
        log::debug!("released last reference to {key}");
        true
    }

    /// Remove `key`'s row without touching its GPU object.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// References held on `key`.
    #[must_use]
    pub fn refs(&self, key: &str) -> u32 {
        self.entries.get(key).map_or(0, |e| e.refs)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Release every GPU object. Rows stay, with their objects cleared, so
    /// [`Self::reinit_all`] can replay them.
    pub fn unload_all<D: GraphicsDevice>(&mut self, gfx: &mut GraphicsContext<D>) {
        for (key, entry) in &mut self.entries {
            delete_object(key, entry, gfx);
            entry.info.object = None;
        }
        log::info!("unloaded {} cached textures", self.entries.len());
    }

    /// Rebuild the table: every [`SourceKind::DecodedImage`] row is decoded
    /// and uploaded again with its original options and references.
    /// Procedural rows and rows whose decode fails are dropped.
    ///
    /// Returns the number of reloaded rows.
    pub fn reinit_all<D: GraphicsDevice>(
        &mut self,
        gfx: &mut GraphicsContext<D>,
        decoder: &dyn Decoder,
    ) -> usize {
        let snapshot = std::mem::take(&mut self.entries);
        let mut reloaded = 0;
        for (key, mut entry) in snapshot {
            delete_object(&key, &entry, gfx);
            if entry.source != SourceKind::DecodedImage {
                log::debug!("dropping procedural cache row {key}");
                continue;
            }
            let result = decoder
                .decode(&key)
                .map_err(TextureError::from)
                .and_then(|bitmap| {
                    upload_bitmap(
                        gfx,
                        None,
                        entry.info.dimensionality,
                        bitmap,
                        &entry.options,
                    )
                });
            match result {
                Ok(info) => {
                    entry.info = info;
                    entry.generation = gfx.generation();
                    drop(self.entries.insert(key, entry));
                    reloaded += 1;
                }
                Err(e) => log::warn!("could not reload {key}: {e}"),
            }
        }
        log::info!("reloaded {reloaded} cached textures");
        reloaded
    }
}

fn delete_object<D: GraphicsDevice>(
    key: &str,
    entry: &CacheEntry,
    gfx: &mut GraphicsContext<D>,
) {
    let Some(id) = entry.info.object else { return };
    if entry.generation == gfx.generation() {
        gfx.device_mut().delete_texture(id);
    } else {
        log::warn!(
            "texture for {key} belongs to lost context generation {}, \
             dropping its name",
            entry.generation
        );
    }
}
