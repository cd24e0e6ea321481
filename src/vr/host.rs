//! The narrow interface the bridge uses to reach the externally hosted
//! session, and the raw data shapes it hands back.

use crate::vr::config::SessionMode;
use crate::vr::transform::HostMatrix;
use serde::{Deserialize, Serialize};

/// Maximum buttons or axes the host reports for one input source.
pub const MAX_INPUT_VALUES: usize = 10;

/// Identifies one session request. Callbacks carry it back so the bridge can
/// tell a live session from a torn-down one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewIndex {
    /// The reserved head-relative slot.
    Head,
    View(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub session: SessionId,
    pub mode: SessionMode,
    pub required_features: String,
    pub optional_features: String,
    pub requested_reference_space_types: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetRayMode {
    #[default]
    Unknown,
    Gaze,
    TrackedPointer,
    Screen,
}

/// Fixed-capacity value buffer with an explicit count. Values past
/// [`MAX_INPUT_VALUES`] are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputValues {
    values: [f32; MAX_INPUT_VALUES],
    len: usize,
}

impl InputValues {
    pub fn from_slice(values: &[f32]) -> Self {
        let len = values.len().min(MAX_INPUT_VALUES);
        let mut buffer = Self::default();
        buffer.values[..len].copy_from_slice(&values[..len]);
        buffer.len = len;
        buffer
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values[..self.len]
    }
}

impl Serialize for InputValues {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InputValues {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<f32>::deserialize(deserializer)?;
        if values.len() > MAX_INPUT_VALUES {
            return Err(serde::de::Error::invalid_length(
                values.len(),
                &"at most 10 input values",
            ));
        }
        Ok(Self::from_slice(&values))
    }
}

/// One frame's worth of data for an active input source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSourceSample {
    pub target_pose: HostMatrix,
    #[serde(default)]
    pub target_ray_mode: TargetRayMode,
    #[serde(default)]
    pub touch_index: i32,
    #[serde(default)]
    pub grip_pose: Option<HostMatrix>,
    #[serde(default)]
    pub standard_mapping: bool,
    #[serde(default)]
    pub buttons: InputValues,
    #[serde(default)]
    pub axes: InputValues,
}

/// Callbacks the host delivers on the engine thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    SessionStarted { reference_space_type: String },
    SessionEnded,
    SessionFailed { message: String },
    InputEvent { event_code: i32, input_source: i32 },
    SimpleEvent { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCallback {
    pub session: SessionId,
    #[serde(flatten)]
    pub event: HostEvent,
}

/// Session API of the external host. Every query returns immediately; `None`
/// means the host has nothing for this frame.
pub trait XrHost {
    fn is_supported(&self) -> bool;
    fn is_session_mode_supported(&self, mode: SessionMode) -> bool;

    /// Starts the asynchronous session request. Lifecycle callbacks for it
    /// arrive later tagged with `request.session`.
    fn request_session(&mut self, request: &SessionRequest) -> Result<(), String>;
    fn end_session(&mut self);

    fn view_count(&self) -> u32;
    fn render_target_size(&self) -> Option<[u32; 2]>;
    fn transform_for_view(&self, view: ViewIndex) -> Option<HostMatrix>;
    fn projection_for_view(&self, view: u32) -> Option<HostMatrix>;
    fn visibility_state(&self) -> Option<String>;
    /// Flat list of 3D points.
    fn bounds_geometry(&self) -> Vec<f32>;

    /// Zero means no texture this frame.
    fn color_texture(&self) -> u32;
    fn depth_texture(&self) -> u32;
    fn velocity_texture(&self) -> u32;

    /// `None` when the slot is inactive.
    fn sample_input_source(&mut self, slot: usize) -> Option<InputSourceSample>;
}
