pub mod headless;

pub use headless::HeadlessTextureStorage;

use crate::vr::{BlitToScreen, Rect2, XrInterface};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderTargetId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Texture2D,
    /// One layer per view.
    Layered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
}

/// Describes a texture whose storage belongs to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalTextureDesc {
    pub kind: TextureKind,
    pub format: TextureFormat,
    pub external_handle: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub layers: u32,
}

/// Attachments a render target draws into instead of its own textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachmentOverride {
    pub is_overridden: bool,
    pub color: Option<TextureId>,
    pub depth: Option<TextureId>,
    pub velocity: Option<TextureId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetState {
    pub view_count: u32,
    pub overridden: AttachmentOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentMode {
    Multiview { view_count: u32 },
    Texture2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Idle,
    Processed,
    Drawing(RenderTargetId),
}

#[derive(Debug, PartialEq, Eq)]
pub enum RenderError {
    UnknownRenderTarget(RenderTargetId),
    UnknownTexture(TextureId),
    TextureOwnedByRenderTarget(TextureId),
    FrameOutOfOrder { expected: FrameStage, got: FrameStage },
    Backend(&'static str),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnknownRenderTarget(target) => {
                write!(f, "render target {} does not exist", target.0)
            }
            RenderError::UnknownTexture(texture) => write!(f, "texture {} does not exist", texture.0),
            RenderError::TextureOwnedByRenderTarget(texture) => write!(
                f,
                "texture {} is still attached to a render target",
                texture.0
            ),
            RenderError::FrameOutOfOrder { expected, got } => {
                write!(f, "frame stage out of order: expected {expected:?}, got {got:?}")
            }
            RenderError::Backend(reason) => write!(f, "gpu backend failure: {reason}"),
        }
    }
}

impl std::error::Error for RenderError {}

pub type RenderResult<T> = Result<T, RenderError>;

/// Texture and framebuffer operations of the GPU layer.
pub trait TextureStorage {
    fn texture_create_external(&mut self, desc: &ExternalTextureDesc) -> RenderResult<TextureId>;

    /// Fails while the texture is flagged as owned by a render target.
    fn texture_free(&mut self, texture: TextureId) -> RenderResult<()>;

    /// Clears the render-target ownership flag so the texture can be freed.
    fn release_render_target_ownership(&mut self, texture: TextureId) -> RenderResult<()>;

    fn render_target(&self, target: RenderTargetId) -> Option<RenderTargetState>;

    /// Points the render target at external attachments and flags the
    /// attached textures as owned by it.
    fn render_target_set_override(
        &mut self,
        target: RenderTargetId,
        color: Option<TextureId>,
        depth: Option<TextureId>,
        velocity: Option<TextureId>,
    ) -> RenderResult<()>;

    /// Binds the render target's current attachments to its framebuffer again.
    fn reattach_render_target(
        &mut self,
        target: RenderTargetId,
        mode: AttachmentMode,
    ) -> RenderResult<()>;

    fn multiview_supported(&self) -> bool;
}

pub type SharedTextureStorage = Rc<RefCell<dyn TextureStorage>>;

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame_index: u64,
    pub drawn_targets: Vec<RenderTargetId>,
    pub blits: Vec<BlitToScreen>,
}

/// Drives one interface through `process`, `pre_draw` and `post_draw` in
/// that order for every frame.
pub struct FrameDriver<I: XrInterface> {
    interface: I,
    storage: SharedTextureStorage,
    render_targets: Vec<RenderTargetId>,
    frame_index: u64,
    stage: FrameStage,
}

impl<I: XrInterface> FrameDriver<I> {
    pub fn new(interface: I, storage: SharedTextureStorage) -> Self {
        Self {
            interface,
            storage,
            render_targets: Vec::new(),
            frame_index: 0,
            stage: FrameStage::Idle,
        }
    }

    pub fn add_render_target(&mut self, target: RenderTargetId) {
        if !self.render_targets.contains(&target) {
            self.render_targets.push(target);
        }
    }

    pub fn interface(&self) -> &I {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn begin_frame(&mut self) -> RenderResult<()> {
        self.expect_stage(FrameStage::Idle)?;
        self.interface.process();
        self.stage = FrameStage::Processed;
        Ok(())
    }

    /// Returns `false` when the interface declined to draw this target.
    pub fn pre_draw(&mut self, target: RenderTargetId) -> RenderResult<bool> {
        self.expect_stage(FrameStage::Processed)?;
        if !self.interface.pre_draw_viewport(target) {
            return Ok(false);
        }

        let color = self.interface.color_texture();
        let depth = self.interface.depth_texture();
        let velocity = self.interface.velocity_texture();
        self.storage
            .borrow_mut()
            .render_target_set_override(target, color, depth, velocity)?;
        self.stage = FrameStage::Drawing(target);
        Ok(true)
    }

    pub fn post_draw(&mut self, target: RenderTargetId) -> RenderResult<Vec<BlitToScreen>> {
        self.expect_stage(FrameStage::Drawing(target))?;
        let [width, height] = self.interface.render_target_size();
        let screen_rect = Rect2 {
            position: [0.0, 0.0],
            size: [width as f32, height as f32],
        };
        let blits = self.interface.post_draw_viewport(target, screen_rect);
        self.stage = FrameStage::Processed;
        Ok(blits)
    }

    pub fn end_frame(&mut self) -> RenderResult<u64> {
        self.expect_stage(FrameStage::Processed)?;
        self.frame_index += 1;
        self.stage = FrameStage::Idle;
        Ok(self.frame_index)
    }

    pub fn run_frame(&mut self) -> RenderResult<FrameReport> {
        self.begin_frame()?;
        let mut report = FrameReport::default();
        let targets = self.render_targets.clone();
        for target in targets {
            if self.pre_draw(target)? {
                report.blits.extend(self.post_draw(target)?);
                report.drawn_targets.push(target);
            } else {
                log::debug!("[render] skipped render target {}", target.0);
            }
        }
        report.frame_index = self.end_frame()?;
        Ok(report)
    }

    fn expect_stage(&self, expected: FrameStage) -> RenderResult<()> {
        if self.stage != expected {
            return Err(RenderError::FrameOutOfOrder {
                expected,
                got: self.stage,
            });
        }
        Ok(())
    }
}
