pub mod tracker;

pub use tracker::{
    InputValue, PositionalTracker, TrackerHand, TrackerId, TrackerKind, TrackerPose,
};

use crate::vr::transform::{Transform, Vector2};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Engine-side XR state shared by every interface: the tracker registry,
/// which interface is primary, and the sizes and frames poses are expressed
/// against.
pub struct XrServer {
    trackers: BTreeMap<TrackerId, PositionalTracker>,
    next_tracker: u64,
    primary_interface: Option<String>,
    world_scale: f32,
    reference_frame: Transform,
    window_size: [u32; 2],
    viewport_size: Vector2,
}

pub type SharedXrServer = Rc<RefCell<XrServer>>;

impl XrServer {
    pub fn new(window_size: [u32; 2]) -> Self {
        Self {
            trackers: BTreeMap::new(),
            next_tracker: 1,
            primary_interface: None,
            world_scale: 1.0,
            reference_frame: Transform::IDENTITY,
            window_size,
            viewport_size: [window_size[0] as f32, window_size[1] as f32],
        }
    }

    pub fn shared(window_size: [u32; 2]) -> SharedXrServer {
        Rc::new(RefCell::new(Self::new(window_size)))
    }

    /// Ids are never reused, so a tracker added after a removal is always
    /// distinguishable from the one it replaces.
    pub fn add_tracker(&mut self, tracker: PositionalTracker) -> TrackerId {
        let id = TrackerId(self.next_tracker);
        self.next_tracker += 1;
        log::debug!("[xr] tracker {} added as {}", tracker.name, id.0);
        self.trackers.insert(id, tracker);
        id
    }

    pub fn remove_tracker(&mut self, id: TrackerId) -> Option<PositionalTracker> {
        let removed = self.trackers.remove(&id);
        if let Some(tracker) = &removed {
            log::debug!("[xr] tracker {} removed", tracker.name);
        }
        removed
    }

    pub fn tracker(&self, id: TrackerId) -> Option<&PositionalTracker> {
        self.trackers.get(&id)
    }

    pub fn tracker_mut(&mut self, id: TrackerId) -> Option<&mut PositionalTracker> {
        self.trackers.get_mut(&id)
    }

    pub fn find_tracker(&self, name: &str) -> Option<(TrackerId, &PositionalTracker)> {
        self.trackers
            .iter()
            .find(|(_, tracker)| tracker.name == name)
            .map(|(id, tracker)| (*id, tracker))
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    pub fn set_primary_interface(&mut self, name: Option<&str>) {
        self.primary_interface = name.map(str::to_string);
    }

    pub fn primary_interface(&self) -> Option<&str> {
        self.primary_interface.as_deref()
    }

    pub fn is_primary_interface(&self, name: &str) -> bool {
        self.primary_interface.as_deref() == Some(name)
    }

    pub fn world_scale(&self) -> f32 {
        self.world_scale
    }

    pub fn set_world_scale(&mut self, scale: f32) {
        self.world_scale = scale;
    }

    pub fn reference_frame(&self) -> Transform {
        self.reference_frame
    }

    pub fn set_reference_frame(&mut self, frame: Transform) {
        self.reference_frame = frame;
    }

    pub fn window_size(&self) -> [u32; 2] {
        self.window_size
    }

    pub fn set_window_size(&mut self, size: [u32; 2]) {
        self.window_size = size;
    }

    /// Size of the root viewport in pixels; screen-space input maps onto it.
    pub fn viewport_size(&self) -> Vector2 {
        self.viewport_size
    }

    pub fn set_viewport_size(&mut self, size: Vector2) {
        self.viewport_size = size;
    }
}

impl Default for XrServer {
    fn default() -> Self {
        Self::new([1280, 720])
    }
}
