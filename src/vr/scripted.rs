//! A data-driven [`XrHost`]. Each frame's answers come from a [`HostFrame`],
//! either set directly through a [`ScriptedHostHandle`] or replayed from a
//! JSON [`HostScript`].

use crate::engine::XrServer;
use crate::render::{
    FrameDriver, HeadlessTextureStorage, RenderError, RenderTargetId, SharedTextureStorage,
};
use crate::vr::config::{SessionConfig, SessionMode};
use crate::vr::events::{PointerEvent, XrEvent};
use crate::vr::host::{
    HostCallback, HostEvent, InputSourceSample, SessionId, SessionRequest, ViewIndex, XrHost,
};
use crate::vr::transform::HostMatrix;
use crate::vr::webxr::WebXrInterface;
use crate::vr::{XrError, XrInterface};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

/// Everything the host reports for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostFrame {
    pub view_count: u32,
    pub render_target_size: Option<[u32; 2]>,
    pub head: Option<HostMatrix>,
    pub views: Vec<HostMatrix>,
    pub projections: Vec<HostMatrix>,
    pub visibility_state: Option<String>,
    pub bounds_geometry: Vec<f32>,
    pub color_texture: u32,
    pub depth_texture: u32,
    pub velocity_texture: u32,
    pub input_sources: BTreeMap<usize, InputSourceSample>,
    /// Delivered before the frame is processed.
    pub callbacks: Vec<HostEvent>,
}

impl Default for HostFrame {
    fn default() -> Self {
        Self {
            view_count: 1,
            render_target_size: None,
            head: None,
            views: Vec::new(),
            projections: Vec::new(),
            visibility_state: None,
            bounds_geometry: Vec::new(),
            color_texture: 0,
            depth_texture: 0,
            velocity_texture: 0,
            input_sources: BTreeMap::new(),
            callbacks: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct ScriptedHostState {
    supported: bool,
    supported_modes: Vec<SessionMode>,
    reject_reason: Option<String>,
    frame: HostFrame,
    requests: Vec<SessionRequest>,
    active_session: Option<SessionId>,
    end_calls: usize,
}

impl Default for ScriptedHostState {
    fn default() -> Self {
        Self {
            supported: true,
            supported_modes: vec![
                SessionMode::Inline,
                SessionMode::ImmersiveVr,
                SessionMode::ImmersiveAr,
            ],
            reject_reason: None,
            frame: HostFrame::default(),
            requests: Vec::new(),
            active_session: None,
            end_calls: 0,
        }
    }
}

pub struct ScriptedHost {
    state: Rc<RefCell<ScriptedHostState>>,
}

/// Test and replay side of a [`ScriptedHost`]: feeds frames in and inspects
/// what the bridge asked for.
#[derive(Clone)]
pub struct ScriptedHostHandle {
    state: Rc<RefCell<ScriptedHostState>>,
}

impl ScriptedHost {
    pub fn new() -> (Self, ScriptedHostHandle) {
        let state = Rc::new(RefCell::new(ScriptedHostState::default()));
        (
            Self {
                state: Rc::clone(&state),
            },
            ScriptedHostHandle { state },
        )
    }
}

impl ScriptedHostHandle {
    pub fn set_supported(&self, supported: bool) {
        self.state.borrow_mut().supported = supported;
    }

    pub fn set_supported_modes(&self, modes: Vec<SessionMode>) {
        self.state.borrow_mut().supported_modes = modes;
    }

    /// Makes the next session requests fail with `reason`.
    pub fn reject_requests(&self, reason: impl Into<String>) {
        self.state.borrow_mut().reject_reason = Some(reason.into());
    }

    pub fn set_frame(&self, frame: HostFrame) {
        self.state.borrow_mut().frame = frame;
    }

    pub fn update_frame(&self, update: impl FnOnce(&mut HostFrame)) {
        update(&mut self.state.borrow_mut().frame);
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.state.borrow().requests.clone()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.state.borrow().active_session
    }

    pub fn end_calls(&self) -> usize {
        self.state.borrow().end_calls
    }

    /// Tags `event` with the most recently requested session.
    pub fn callback(&self, event: HostEvent) -> HostCallback {
        let state = self.state.borrow();
        let session = state
            .requests
            .last()
            .map(|request| request.session)
            .unwrap_or_default();
        HostCallback { session, event }
    }

    pub fn take_frame_callbacks(&self) -> Vec<HostCallback> {
        let events = std::mem::take(&mut self.state.borrow_mut().frame.callbacks);
        events.into_iter().map(|event| self.callback(event)).collect()
    }
}

impl XrHost for ScriptedHost {
    fn is_supported(&self) -> bool {
        self.state.borrow().supported
    }

    fn is_session_mode_supported(&self, mode: SessionMode) -> bool {
        let state = self.state.borrow();
        state.supported && state.supported_modes.contains(&mode)
    }

    fn request_session(&mut self, request: &SessionRequest) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        state.requests.push(request.clone());
        if let Some(reason) = state.reject_reason.clone() {
            return Err(reason);
        }
        state.active_session = Some(request.session);
        Ok(())
    }

    fn end_session(&mut self) {
        let mut state = self.state.borrow_mut();
        state.end_calls += 1;
        state.active_session = None;
    }

    fn view_count(&self) -> u32 {
        self.state.borrow().frame.view_count
    }

    fn render_target_size(&self) -> Option<[u32; 2]> {
        self.state.borrow().frame.render_target_size
    }

    fn transform_for_view(&self, view: ViewIndex) -> Option<HostMatrix> {
        let state = self.state.borrow();
        match view {
            ViewIndex::Head => state.frame.head,
            ViewIndex::View(index) => state.frame.views.get(index as usize).copied(),
        }
    }

    fn projection_for_view(&self, view: u32) -> Option<HostMatrix> {
        self.state.borrow().frame.projections.get(view as usize).copied()
    }

    fn visibility_state(&self) -> Option<String> {
        self.state.borrow().frame.visibility_state.clone()
    }

    fn bounds_geometry(&self) -> Vec<f32> {
        self.state.borrow().frame.bounds_geometry.clone()
    }

    fn color_texture(&self) -> u32 {
        self.state.borrow().frame.color_texture
    }

    fn depth_texture(&self) -> u32 {
        self.state.borrow().frame.depth_texture
    }

    fn velocity_texture(&self) -> u32 {
        self.state.borrow().frame.velocity_texture
    }

    fn sample_input_source(&mut self, slot: usize) -> Option<InputSourceSample> {
        self.state.borrow().frame.input_sources.get(&slot).cloned()
    }
}

fn default_window_size() -> [u32; 2] {
    [1280, 720]
}

fn default_multiview() -> bool {
    true
}

/// A recorded host session: what to request and what the host answers on
/// each frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostScript {
    #[serde(default)]
    pub config: SessionConfig,
    #[serde(default)]
    pub unsupported_modes: Vec<SessionMode>,
    #[serde(default = "default_window_size")]
    pub window_size: [u32; 2],
    #[serde(default = "default_multiview")]
    pub multiview: bool,
    pub frames: Vec<HostFrame>,
}

impl HostScript {
    pub fn from_json_str(json: &str) -> Result<Self, ReplayError> {
        serde_json::from_str(json).map_err(ReplayError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read replay script: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse replay script: {0}")]
    Parse(serde_json::Error),
    #[error(transparent)]
    Xr(#[from] XrError),
    #[error("render failure: {0}")]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayFrame {
    pub frame: u64,
    pub events: Vec<XrEvent>,
    pub pointer_events: Vec<PointerEvent>,
    pub trackers: usize,
    /// Render targets rebound to unchanged host textures this frame.
    pub reattached: usize,
    /// Wrapped host textures freed this frame.
    pub freed: usize,
}

/// Runs `script` through a fresh bridge on headless storage, one entry per
/// frame.
pub fn replay(script: &HostScript) -> Result<Vec<ReplayFrame>, ReplayError> {
    let (host, handle) = ScriptedHost::new();
    handle.set_supported_modes(
        [
            SessionMode::Inline,
            SessionMode::ImmersiveVr,
            SessionMode::ImmersiveAr,
        ]
        .into_iter()
        .filter(|mode| !script.unsupported_modes.contains(mode))
        .collect(),
    );
    if let Some(first) = script.frames.first() {
        handle.set_frame(first.clone());
    }

    let server = XrServer::shared(script.window_size);
    let headless = Rc::new(RefCell::new(HeadlessTextureStorage::new(script.multiview)));
    let storage: SharedTextureStorage = headless.clone();
    let view_count = script.frames.first().map_or(1, |frame| frame.view_count);
    let target: RenderTargetId = headless.borrow_mut().create_render_target(view_count);

    let mut interface = WebXrInterface::new(Box::new(host), Rc::clone(&server), Rc::clone(&storage))
        .with_config(script.config.clone());
    interface.try_initialize()?;

    let mut driver = FrameDriver::new(interface, storage);
    driver.add_render_target(target);

    let mut frames = Vec::with_capacity(script.frames.len());
    for frame in &script.frames {
        handle.set_frame(frame.clone());
        for callback in handle.take_frame_callbacks() {
            driver.interface_mut().handle_host_callback(callback);
        }
        let report = driver.run_frame()?;
        let (reattached, freed) = {
            let mut headless = headless.borrow_mut();
            let counts = (headless.reattachments().len(), headless.freed_textures().len());
            headless.clear_history();
            counts
        };
        let interface = driver.interface_mut();
        frames.push(ReplayFrame {
            frame: report.frame_index,
            events: interface.drain_events(),
            pointer_events: interface.drain_pointer_events(),
            trackers: server.borrow().tracker_count(),
            reattached,
            freed,
        });
        if !interface.is_initialized() {
            log::info!("[replay] session closed after frame {}", report.frame_index);
        }
    }
    Ok(frames)
}
