use super::{
    AttachmentMode, AttachmentOverride, ExternalTextureDesc, RenderError, RenderResult,
    RenderTargetId, RenderTargetState, TextureId, TextureStorage,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct TextureRecord {
    desc: ExternalTextureDesc,
    is_render_target: bool,
}

/// In-memory texture storage. Keeps the bookkeeping a real GPU layer would
/// (ownership flags, overrides, framebuffer binds) without touching a device.
#[derive(Debug)]
pub struct HeadlessTextureStorage {
    textures: HashMap<TextureId, TextureRecord>,
    render_targets: HashMap<RenderTargetId, RenderTargetState>,
    next_id: u64,
    multiview_supported: bool,
    // Observation logs for tests and replays. They grow with every call until
    // `clear_history` runs.
    reattachments: Vec<(RenderTargetId, AttachmentMode)>,
    freed: Vec<TextureId>,
}

impl HeadlessTextureStorage {
    pub fn new(multiview_supported: bool) -> Self {
        Self {
            textures: HashMap::new(),
            render_targets: HashMap::new(),
            next_id: 1,
            multiview_supported,
            reattachments: Vec::new(),
            freed: Vec::new(),
        }
    }

    pub fn create_render_target(&mut self, view_count: u32) -> RenderTargetId {
        let id = RenderTargetId(self.allocate_id());
        self.render_targets.insert(
            id,
            RenderTargetState {
                view_count,
                overridden: AttachmentOverride::default(),
            },
        );
        id
    }

    pub fn texture_desc(&self, texture: TextureId) -> Option<ExternalTextureDesc> {
        self.textures.get(&texture).map(|record| record.desc)
    }

    pub fn is_render_target_texture(&self, texture: TextureId) -> bool {
        self.textures
            .get(&texture)
            .is_some_and(|record| record.is_render_target)
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn reattachments(&self) -> &[(RenderTargetId, AttachmentMode)] {
        &self.reattachments
    }

    pub fn freed_textures(&self) -> &[TextureId] {
        &self.freed
    }

    /// Forgets the recorded reattachments and frees. Long replays call this
    /// between frames.
    pub fn clear_history(&mut self) {
        self.reattachments.clear();
        self.freed.clear();
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for HeadlessTextureStorage {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TextureStorage for HeadlessTextureStorage {
    fn texture_create_external(&mut self, desc: &ExternalTextureDesc) -> RenderResult<TextureId> {
        if desc.external_handle == 0 {
            return Err(RenderError::Backend("external texture handle is null"));
        }
        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            TextureRecord {
                desc: *desc,
                is_render_target: false,
            },
        );
        Ok(id)
    }

    fn texture_free(&mut self, texture: TextureId) -> RenderResult<()> {
        let record = self
            .textures
            .get(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        if record.is_render_target {
            return Err(RenderError::TextureOwnedByRenderTarget(texture));
        }
        self.textures.remove(&texture);
        self.freed.push(texture);
        Ok(())
    }

    fn release_render_target_ownership(&mut self, texture: TextureId) -> RenderResult<()> {
        let record = self
            .textures
            .get_mut(&texture)
            .ok_or(RenderError::UnknownTexture(texture))?;
        record.is_render_target = false;
        Ok(())
    }

    fn render_target(&self, target: RenderTargetId) -> Option<RenderTargetState> {
        self.render_targets.get(&target).copied()
    }

    fn render_target_set_override(
        &mut self,
        target: RenderTargetId,
        color: Option<TextureId>,
        depth: Option<TextureId>,
        velocity: Option<TextureId>,
    ) -> RenderResult<()> {
        let state = self
            .render_targets
            .get_mut(&target)
            .ok_or(RenderError::UnknownRenderTarget(target))?;
        state.overridden = AttachmentOverride {
            is_overridden: color.is_some() || depth.is_some() || velocity.is_some(),
            color,
            depth,
            velocity,
        };
        for texture in [color, depth, velocity].into_iter().flatten() {
            if let Some(record) = self.textures.get_mut(&texture) {
                record.is_render_target = true;
            }
        }
        Ok(())
    }

    fn reattach_render_target(
        &mut self,
        target: RenderTargetId,
        mode: AttachmentMode,
    ) -> RenderResult<()> {
        if !self.render_targets.contains_key(&target) {
            return Err(RenderError::UnknownRenderTarget(target));
        }
        self.reattachments.push((target, mode));
        Ok(())
    }

    fn multiview_supported(&self) -> bool {
        self.multiview_supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{TextureFormat, TextureKind};

    fn desc(handle: u32) -> ExternalTextureDesc {
        ExternalTextureDesc {
            kind: TextureKind::Texture2D,
            format: TextureFormat::Rgba8,
            external_handle: handle,
            width: 64,
            height: 64,
            depth: 1,
            layers: 1,
        }
    }

    #[test]
    fn attached_textures_cannot_be_freed_until_released() {
        let mut storage = HeadlessTextureStorage::default();
        let target = storage.create_render_target(1);
        let texture = storage.texture_create_external(&desc(7)).expect("create");
        storage
            .render_target_set_override(target, Some(texture), None, None)
            .expect("override");

        assert_eq!(
            storage.texture_free(texture),
            Err(RenderError::TextureOwnedByRenderTarget(texture))
        );
        storage
            .release_render_target_ownership(texture)
            .expect("release");
        storage.texture_free(texture).expect("free");
        assert_eq!(storage.live_texture_count(), 0);
        assert_eq!(storage.freed_textures(), &[texture]);

        storage.clear_history();
        assert!(storage.freed_textures().is_empty());
        assert!(storage.reattachments().is_empty());
    }

    #[test]
    fn empty_override_clears_flag() {
        let mut storage = HeadlessTextureStorage::default();
        let target = storage.create_render_target(2);
        storage
            .render_target_set_override(target, None, None, None)
            .expect("override");
        let state = storage.render_target(target).expect("target");
        assert!(!state.overridden.is_overridden);
        assert_eq!(state.view_count, 2);
    }

    #[test]
    fn reattach_requires_known_target() {
        let mut storage = HeadlessTextureStorage::default();
        let err = storage
            .reattach_render_target(RenderTargetId(99), AttachmentMode::Texture2D)
            .unwrap_err();
        assert_eq!(err, RenderError::UnknownRenderTarget(RenderTargetId(99)));
    }
}
