use crate::render::{ExternalTextureDesc, TextureFormat, TextureId, TextureKind, TextureStorage};
use std::collections::BTreeMap;

/// Maps host texture handles to engine textures.
///
/// The host may hand back the same handle for a different swapchain image on
/// every frame. Entries are never revalidated; one handle value maps to one
/// engine texture until [`ExternalTextureCache::invalidate_all`].
#[derive(Debug, Default)]
pub struct ExternalTextureCache {
    entries: BTreeMap<u32, TextureId>,
}

impl ExternalTextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle `0` means the host has no texture this frame and never creates
    /// an entry.
    pub fn resolve(
        &mut self,
        handle: u32,
        storage: &mut dyn TextureStorage,
        view_count: u32,
        size: [u32; 2],
    ) -> Option<TextureId> {
        if handle == 0 {
            return None;
        }
        if let Some(texture) = self.entries.get(&handle) {
            return Some(*texture);
        }

        let desc = ExternalTextureDesc {
            kind: if view_count == 1 {
                TextureKind::Texture2D
            } else {
                TextureKind::Layered
            },
            format: TextureFormat::Rgba8,
            external_handle: handle,
            width: size[0],
            height: size[1],
            depth: 1,
            layers: view_count,
        };

        match storage.texture_create_external(&desc) {
            Ok(texture) => {
                log::debug!(
                    "[webxr] cached external texture {handle} as {} ({}x{}, {view_count} views)",
                    texture.0,
                    size[0],
                    size[1]
                );
                self.entries.insert(handle, texture);
                Some(texture)
            }
            Err(err) => {
                log::warn!("[webxr] failed to wrap external texture {handle}: {err}");
                None
            }
        }
    }

    /// Frees every cached texture. The render-target ownership flag is
    /// cleared first since these textures belong to the bridge.
    pub fn invalidate_all(&mut self, storage: &mut dyn TextureStorage) {
        for (handle, texture) in std::mem::take(&mut self.entries) {
            let released = storage
                .release_render_target_ownership(texture)
                .and_then(|()| storage.texture_free(texture));
            if let Err(err) = released {
                log::warn!("[webxr] failed to free external texture {handle}: {err}");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
