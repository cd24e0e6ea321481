pub mod config;
pub mod events;
pub mod host;
pub mod input;
pub mod scripted;
pub mod texture_cache;
pub mod transform;
pub mod webxr;

pub use config::{ConfigError, SessionConfig, SessionMode};
pub use events::{InputEventKind, PointerEvent, XrEvent};
pub use host::{
    HostCallback, HostEvent, InputSourceSample, InputValues, SessionId, SessionRequest,
    TargetRayMode, ViewIndex, XrHost,
};
pub use input::{INPUT_SOURCE_COUNT, InputSources, MAX_TOUCHES};
pub use scripted::{HostFrame, HostScript, ScriptedHost, ScriptedHostHandle};
pub use texture_cache::ExternalTextureCache;
pub use transform::{Projection, Transform, Vector2, Vector3};
pub use webxr::{SessionPhase, WebXrInterface};

use crate::render::{RenderTargetId, TextureId};
use std::ops::BitOr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XrError {
    #[error("host does not support session mode '{0}'")]
    UnsupportedSessionMode(SessionMode),
    #[error("no reference space types were requested")]
    NoReferenceSpaces,
    #[error("session config cannot change while the session is initialized")]
    ConfigLocked,
    #[error("host rejected the session request: {0}")]
    Host(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type XrResult<T> = Result<T, XrError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const MONO: Capabilities = Capabilities(1);
    pub const STEREO: Capabilities = Capabilities(1 << 1);
    pub const AR: Capabilities = Capabilities(1 << 3);
    pub const VR: Capabilities = Capabilities(1 << 4);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect2 {
    pub position: Vector2,
    pub size: Vector2,
}

/// A request to copy a render target to the screen after drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlitToScreen {
    pub render_target: RenderTargetId,
    pub dst_rect: Rect2,
}

/// What the renderer needs from an XR runtime each frame.
pub trait XrInterface {
    fn name(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;

    fn is_initialized(&self) -> bool;
    /// Returns `false` when the session cannot be started; state is left
    /// untouched in that case.
    fn initialize(&mut self) -> bool;
    fn uninitialize(&mut self);

    /// Called once per frame before any drawing.
    fn process(&mut self);

    fn view_count(&self) -> u32;
    fn render_target_size(&mut self) -> [u32; 2];
    fn camera_transform(&self) -> Transform;
    fn transform_for_view(&self, view: u32, camera: &Transform) -> Transform;
    fn projection_for_view(&self, view: u32, aspect: f32, z_near: f32, z_far: f32) -> Projection;

    fn pre_draw_viewport(&mut self, target: RenderTargetId) -> bool;
    fn post_draw_viewport(&mut self, target: RenderTargetId, screen_rect: Rect2)
    -> Vec<BlitToScreen>;

    fn color_texture(&self) -> Option<TextureId> {
        None
    }

    fn depth_texture(&self) -> Option<TextureId> {
        None
    }

    fn velocity_texture(&self) -> Option<TextureId> {
        None
    }
}
