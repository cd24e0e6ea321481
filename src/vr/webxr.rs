//! Session state machine bridging an externally hosted WebXR session into
//! the engine.

use crate::engine::{PositionalTracker, SharedXrServer, TrackerId, TrackerKind, TrackerPose};
use crate::render::{AttachmentMode, RenderTargetId, SharedTextureStorage, TextureId};
use crate::vr::config::{SessionConfig, SessionMode};
use crate::vr::events::{EventQueue, InputEventKind, PointerEvent, XrEvent};
use crate::vr::host::{HostCallback, HostEvent, SessionId, SessionRequest, ViewIndex, XrHost};
use crate::vr::input::{INPUT_SOURCE_COUNT, InputSources};
use crate::vr::texture_cache::ExternalTextureCache;
use crate::vr::transform::{
    Projection, Transform, Vector3, matrix_to_transform, projection_from_host_matrix,
};
use crate::vr::{
    BlitToScreen, Capabilities, Rect2, TargetRayMode, XrError, XrInterface, XrResult,
};

pub const INTERFACE_NAME: &str = "WebXR";

const VISIBILITY_STATE_CHANGED: &str = "visibility_state_changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    /// Trackers are being set up and the session request has not been
    /// handed to the host yet.
    Initializing,
    Active,
}

/// Engine textures resolved for the frame being drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FrameTextures {
    color: Option<TextureId>,
    depth: Option<TextureId>,
    velocity: Option<TextureId>,
}

pub struct WebXrInterface {
    host: Box<dyn XrHost>,
    server: SharedXrServer,
    storage: SharedTextureStorage,
    config: SessionConfig,
    phase: SessionPhase,
    session: SessionId,
    reference_space_type: String,
    render_target_size: [u32; 2],
    head_transform: Transform,
    head_tracker: Option<TrackerId>,
    input_sources: InputSources,
    texture_cache: ExternalTextureCache,
    frame_textures: FrameTextures,
    visibility_state: Option<String>,
    events: EventQueue,
}

impl WebXrInterface {
    pub fn new(host: Box<dyn XrHost>, server: SharedXrServer, storage: SharedTextureStorage) -> Self {
        Self {
            host,
            server,
            storage,
            config: SessionConfig::default(),
            phase: SessionPhase::Uninitialized,
            session: SessionId::default(),
            reference_space_type: String::new(),
            render_target_size: [0, 0],
            head_transform: Transform::IDENTITY,
            head_tracker: None,
            input_sources: InputSources::new(),
            texture_cache: ExternalTextureCache::new(),
            frame_textures: FrameTextures::default(),
            visibility_state: None,
            events: EventQueue::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SessionConfig) -> XrResult<()> {
        self.ensure_config_unlocked()?;
        self.config = config;
        Ok(())
    }

    pub fn set_session_mode(&mut self, mode: &str) -> XrResult<()> {
        self.ensure_config_unlocked()?;
        self.config.session_mode = mode.parse()?;
        Ok(())
    }

    pub fn set_required_features(&mut self, features: &str) -> XrResult<()> {
        self.ensure_config_unlocked()?;
        self.config.required_features = SessionConfig::parse_list(features);
        Ok(())
    }

    pub fn set_optional_features(&mut self, features: &str) -> XrResult<()> {
        self.ensure_config_unlocked()?;
        self.config.optional_features = SessionConfig::parse_list(features);
        Ok(())
    }

    pub fn set_requested_reference_space_types(&mut self, types: &str) -> XrResult<()> {
        self.ensure_config_unlocked()?;
        self.config.requested_reference_space_types = SessionConfig::parse_list(types);
        Ok(())
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// The reference space the host settled on; empty until the session starts.
    pub fn reference_space_type(&self) -> &str {
        &self.reference_space_type
    }

    pub fn head_tracker(&self) -> Option<TrackerId> {
        self.head_tracker
    }

    pub fn texture_cache(&self) -> &ExternalTextureCache {
        &self.texture_cache
    }

    /// Reports through a `session_supported` event.
    pub fn is_session_supported(&mut self, mode: SessionMode) {
        let supported = self.host.is_supported() && self.host.is_session_mode_supported(mode);
        self.events.emit(XrEvent::SessionSupported {
            session_mode: mode.as_str().to_string(),
            supported,
        });
    }

    pub fn try_initialize(&mut self) -> XrResult<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let mode = self.config.session_mode;
        if !self.host.is_supported() || !self.host.is_session_mode_supported(mode) {
            return Err(XrError::UnsupportedSessionMode(mode));
        }
        if self.config.requested_reference_space_types.is_empty() {
            return Err(XrError::NoReferenceSpaces);
        }

        self.phase = SessionPhase::Initializing;
        self.head_transform = Transform::IDENTITY;
        {
            let mut server = self.server.borrow_mut();
            let head = PositionalTracker::new(TrackerKind::Head, "head")
                .with_description("Players head");
            self.head_tracker = Some(server.add_tracker(head));
            server.set_primary_interface(Some(INTERFACE_NAME));
        }
        // A frame may still render between uninitialize and here, so the
        // size is reset on both ends.
        self.render_target_size = [0, 0];
        self.session = SessionId(self.session.0 + 1);

        let request = SessionRequest {
            session: self.session,
            mode,
            required_features: SessionConfig::join_list(&self.config.required_features),
            optional_features: SessionConfig::join_list(&self.config.optional_features),
            requested_reference_space_types: SessionConfig::join_list(
                &self.config.requested_reference_space_types,
            ),
        };
        if let Err(reason) = self.host.request_session(&request) {
            self.uninitialize();
            return Err(XrError::Host(reason));
        }

        self.phase = SessionPhase::Active;
        log::info!("[webxr] requested {mode} session {}", self.session.0);
        Ok(())
    }

    /// Entry point for everything the host calls back with.
    pub fn handle_host_callback(&mut self, callback: HostCallback) {
        if callback.session != self.session {
            log::debug!(
                "[webxr] dropping callback for stale session {} (current {})",
                callback.session.0,
                self.session.0
            );
            return;
        }

        match callback.event {
            HostEvent::SessionStarted {
                reference_space_type,
            } => {
                if !self.is_initialized() {
                    log::debug!("[webxr] session start arrived after uninitialize");
                    return;
                }
                log::info!("[webxr] session started in '{reference_space_type}' space");
                self.reference_space_type = reference_space_type;
                self.events.emit(XrEvent::SessionStarted);
            }
            HostEvent::SessionEnded => {
                log::info!("[webxr] session ended");
                self.uninitialize();
                self.events.emit(XrEvent::SessionEnded);
            }
            HostEvent::SessionFailed { message } => {
                log::warn!("[webxr] session failed: {message}");
                self.uninitialize();
                self.events.emit(XrEvent::SessionFailed { message });
            }
            HostEvent::InputEvent {
                event_code,
                input_source,
            } => self.on_input_event(event_code, input_source),
            HostEvent::SimpleEvent { name } => self.on_simple_event(name),
        }
    }

    pub fn drain_events(&mut self) -> Vec<XrEvent> {
        self.events.drain_events()
    }

    pub fn drain_pointer_events(&mut self) -> Vec<PointerEvent> {
        self.events.drain_pointer_events()
    }

    /// Empty when the host does not report one.
    pub fn visibility_state(&self) -> String {
        self.host.visibility_state().unwrap_or_default()
    }

    pub fn play_area(&self) -> Vec<Vector3> {
        self.host
            .bounds_geometry()
            .chunks_exact(3)
            .map(|point| [point[0], point[1], point[2]])
            .collect()
    }

    pub fn is_input_source_active(&self, slot: usize) -> bool {
        self.input_sources.is_active(slot)
    }

    pub fn input_source_tracker(&self, slot: usize) -> Option<TrackerId> {
        self.input_sources.tracker(slot)
    }

    pub fn input_source_target_ray_mode(&self, slot: usize) -> TargetRayMode {
        self.input_sources.target_ray_mode(slot)
    }

    pub fn input_sources(&self) -> &InputSources {
        &self.input_sources
    }

    fn ensure_config_unlocked(&self) -> XrResult<()> {
        if self.is_initialized() {
            return Err(XrError::ConfigLocked);
        }
        Ok(())
    }

    fn on_input_event(&mut self, event_code: i32, input_source: i32) {
        if !self.is_initialized() {
            return;
        }
        let Some(slot) = usize::try_from(input_source)
            .ok()
            .filter(|slot| *slot < INPUT_SOURCE_COUNT)
        else {
            log::warn!("[webxr] input event for out of range source {input_source}");
            return;
        };
        let Some(kind) = InputEventKind::from_code(event_code) else {
            log::warn!("[webxr] unknown input event code {event_code}");
            return;
        };

        // Transient sources may not have been sampled yet this frame.
        self.update_input_source(slot);
        self.input_sources
            .apply_input_event(kind, slot, &mut self.events);
        for event in XrEvent::for_input(kind, slot) {
            self.events.emit(event);
        }
    }

    fn on_simple_event(&mut self, name: String) {
        if !self.is_initialized() {
            return;
        }
        if name == VISIBILITY_STATE_CHANGED {
            let state = self.host.visibility_state();
            if state.is_some() && state == self.visibility_state {
                log::debug!("[webxr] visibility unchanged, not forwarding");
                return;
            }
            self.visibility_state = state;
        }
        self.events.emit(XrEvent::Simple { name });
    }

    fn update_input_source(&mut self, slot: usize) {
        let sample = self.host.sample_input_source(slot);
        let mut server = self.server.borrow_mut();
        self.input_sources
            .update(slot, sample.as_ref(), &mut server, &mut self.events);
    }

    fn resolve_texture(&mut self, handle: u32) -> Option<TextureId> {
        if handle == 0 {
            return None;
        }
        let size = self.render_target_size();
        let view_count = self.host.view_count();
        let mut storage = self.storage.borrow_mut();
        self.texture_cache
            .resolve(handle, &mut *storage, view_count, size)
    }
}

impl XrInterface for WebXrInterface {
    fn name(&self) -> &'static str {
        INTERFACE_NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::MONO | Capabilities::STEREO | Capabilities::VR | Capabilities::AR
    }

    fn is_initialized(&self) -> bool {
        self.phase != SessionPhase::Uninitialized
    }

    fn initialize(&mut self) -> bool {
        match self.try_initialize() {
            Ok(()) => true,
            Err(err) => {
                log::warn!("[webxr] initialize failed: {err}");
                false
            }
        }
    }

    fn uninitialize(&mut self) {
        if !self.is_initialized() {
            return;
        }

        // The tracker ids and cached textures are the only handles to what
        // must be released, so nothing is torn down until both can be reached.
        let (Ok(mut server), Ok(mut storage)) =
            (self.server.try_borrow_mut(), self.storage.try_borrow_mut())
        else {
            log::warn!(
                "[webxr] xr server or texture storage busy; session {} stays initialized",
                self.session.0
            );
            return;
        };

        if let Some(head) = self.head_tracker.take() {
            server.remove_tracker(head);
        }
        self.input_sources.release_all(&mut server);
        if server.is_primary_interface(INTERFACE_NAME) {
            server.set_primary_interface(None);
        }
        drop(server);

        self.host.end_session();

        self.texture_cache.invalidate_all(&mut *storage);
        drop(storage);
        self.frame_textures = FrameTextures::default();

        self.reference_space_type.clear();
        self.render_target_size = [0, 0];
        self.visibility_state = None;
        self.phase = SessionPhase::Uninitialized;
        log::info!("[webxr] session {} uninitialized", self.session.0);
    }

    fn process(&mut self) {
        if !self.is_initialized() {
            return;
        }

        if let Some(matrix) = self.host.transform_for_view(ViewIndex::Head) {
            self.head_transform = matrix_to_transform(&matrix);
        }
        if let Some(head) = self.head_tracker {
            if let Some(tracker) = self.server.borrow_mut().tracker_mut(head) {
                tracker.set_pose("default", TrackerPose::at_rest(self.head_transform));
            }
        }

        for slot in 0..INPUT_SOURCE_COUNT {
            self.update_input_source(slot);
        }
    }

    fn view_count(&self) -> u32 {
        self.host.view_count()
    }

    /// Queried from the host once per session; the window size stands in
    /// until the host can report one.
    fn render_target_size(&mut self) -> [u32; 2] {
        if self.render_target_size[0] != 0 && self.render_target_size[1] != 0 {
            return self.render_target_size;
        }

        match self.host.render_target_size() {
            Some(size) if self.is_initialized() && size[0] != 0 && size[1] != 0 => {
                self.render_target_size = size;
                size
            }
            _ => self.server.borrow().window_size(),
        }
    }

    fn camera_transform(&self) -> Transform {
        if !self.is_initialized() {
            return Transform::IDENTITY;
        }
        let server = self.server.borrow();
        server.reference_frame() * self.head_transform.scaled_origin(server.world_scale())
    }

    fn transform_for_view(&self, view: u32, camera: &Transform) -> Transform {
        if !self.is_initialized() {
            return *camera;
        }
        let Some(matrix) = self.host.transform_for_view(ViewIndex::View(view)) else {
            return *camera;
        };

        let server = self.server.borrow();
        let view_transform = matrix_to_transform(&matrix).scaled_origin(server.world_scale());
        *camera * server.reference_frame() * view_transform
    }

    fn projection_for_view(&self, view: u32, _aspect: f32, z_near: f32, z_far: f32) -> Projection {
        if !self.is_initialized() {
            return Projection::IDENTITY;
        }
        match self.host.projection_for_view(view) {
            Some(matrix) => projection_from_host_matrix(&matrix, z_near, z_far),
            None => Projection::IDENTITY,
        }
    }

    fn pre_draw_viewport(&mut self, target: RenderTargetId) -> bool {
        if !self.is_initialized() {
            self.frame_textures = FrameTextures::default();
            return false;
        }
        let Some(state) = self.storage.borrow().render_target(target) else {
            return false;
        };

        let color = self.resolve_texture(self.host.color_texture());
        let depth = self.resolve_texture(self.host.depth_texture());
        let velocity = self.resolve_texture(self.host.velocity_texture());
        self.frame_textures = FrameTextures {
            color,
            depth,
            velocity,
        };

        // The host returns opaque textures: an unchanged handle can stand for
        // the next swapchain image, which only takes effect once the
        // framebuffer attachments are bound again.
        let overridden = state.overridden;
        if overridden.is_overridden && overridden.color == color && overridden.depth == depth {
            let mut storage = self.storage.borrow_mut();
            let mode = if state.view_count > 1 && storage.multiview_supported() {
                AttachmentMode::Multiview {
                    view_count: state.view_count,
                }
            } else {
                AttachmentMode::Texture2D
            };
            if let Err(err) = storage.reattach_render_target(target, mode) {
                log::warn!("[webxr] failed to reattach render target {}: {err}", target.0);
            }
        }

        true
    }

    fn post_draw_viewport(
        &mut self,
        _target: RenderTargetId,
        _screen_rect: Rect2,
    ) -> Vec<BlitToScreen> {
        // The host presents the external textures itself.
        Vec::new()
    }

    fn color_texture(&self) -> Option<TextureId> {
        self.frame_textures.color
    }

    fn depth_texture(&self) -> Option<TextureId> {
        self.frame_textures.depth
    }

    fn velocity_texture(&self) -> Option<TextureId> {
        self.frame_textures.velocity
    }
}

impl Drop for WebXrInterface {
    fn drop(&mut self) {
        self.uninitialize();
    }
}
