//! Per-slot input source state, refreshed once per frame from host samples
//! and published to the engine's tracker registry.

use crate::engine::{PositionalTracker, TrackerHand, TrackerId, TrackerKind, TrackerPose, XrServer};
use crate::vr::events::{EventQueue, InputEventKind, PointerEvent};
use crate::vr::host::{InputSourceSample, MAX_INPUT_VALUES, TargetRayMode};
use crate::vr::transform::{Vector2, matrix_to_transform};

pub const INPUT_SOURCE_COUNT: usize = 16;
pub const MAX_TOUCHES: usize = 5;

const TRACKER_NAMES: [&str; INPUT_SOURCE_COUNT] = [
    "left_hand",
    "right_hand",
    "tracker_2",
    "tracker_3",
    "tracker_4",
    "tracker_5",
    "tracker_6",
    "tracker_7",
    "tracker_8",
    "tracker_9",
    "tracker_10",
    "tracker_11",
    "tracker_12",
    "tracker_13",
    "tracker_14",
    "tracker_15",
];

const TOUCH_NAMES: [&str; MAX_TOUCHES] = ["touch_0", "touch_1", "touch_2", "touch_3", "touch_4"];

const STANDARD_BUTTON_NAMES: [&str; MAX_INPUT_VALUES] = [
    "trigger_click",
    "grip_click",
    "touchpad_click",
    "thumbstick_click",
    "ax_button",
    "by_button",
    "button_6",
    "button_7",
    "button_8",
    "button_9",
];

const STANDARD_BUTTON_PRESSURE_NAMES: [&str; MAX_INPUT_VALUES] = [
    "trigger",
    "grip",
    "touchpad_click_pressure",
    "thumbstick_click_pressure",
    "ax_button_pressure",
    "by_button_pressure",
    "button_pressure_6",
    "button_pressure_7",
    "button_pressure_8",
    "button_pressure_9",
];

const STANDARD_AXIS_NAMES: [&str; MAX_INPUT_VALUES] = [
    "touchpad_x",
    "touchpad_y",
    "thumbstick_x",
    "thumbstick_y",
    "axis_4",
    "axis_5",
    "axis_6",
    "axis_7",
    "axis_8",
    "axis_9",
];

const STANDARD_VECTOR_NAMES: [&str; 2] = ["touchpad", "thumbstick"];

const UNKNOWN_BUTTON_NAMES: [&str; MAX_INPUT_VALUES] = [
    "button_0", "button_1", "button_2", "button_3", "button_4", "button_5", "button_6",
    "button_7", "button_8", "button_9",
];

const UNKNOWN_BUTTON_PRESSURE_NAMES: [&str; MAX_INPUT_VALUES] = [
    "button_pressure_0",
    "button_pressure_1",
    "button_pressure_2",
    "button_pressure_3",
    "button_pressure_4",
    "button_pressure_5",
    "button_pressure_6",
    "button_pressure_7",
    "button_pressure_8",
    "button_pressure_9",
];

const UNKNOWN_AXIS_NAMES: [&str; MAX_INPUT_VALUES] = [
    "axis_0", "axis_1", "axis_2", "axis_3", "axis_4", "axis_5", "axis_6", "axis_7", "axis_8",
    "axis_9",
];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSource {
    pub active: bool,
    pub target_ray_mode: TargetRayMode,
    /// Only meaningful for screen sources.
    pub touch_index: i32,
    pub tracker: Option<TrackerId>,
}

impl InputSource {
    fn touch_slot(&self) -> Option<usize> {
        usize::try_from(self.touch_index)
            .ok()
            .filter(|index| *index < MAX_TOUCHES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TouchState {
    pub position: Vector2,
    pub is_touching: bool,
}

#[derive(Debug, Default)]
pub struct InputSources {
    sources: [InputSource; INPUT_SOURCE_COUNT],
    touches: [TouchState; MAX_TOUCHES],
}

impl InputSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, slot: usize) -> Option<&InputSource> {
        self.sources.get(slot)
    }

    pub fn touch(&self, index: usize) -> Option<&TouchState> {
        self.touches.get(index)
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.sources.get(slot).is_some_and(|source| source.active)
    }

    pub fn tracker(&self, slot: usize) -> Option<TrackerId> {
        self.sources.get(slot).and_then(|source| source.tracker)
    }

    pub fn target_ray_mode(&self, slot: usize) -> TargetRayMode {
        match self.sources.get(slot) {
            Some(source) if source.active => source.target_ray_mode,
            _ => TargetRayMode::Unknown,
        }
    }

    /// Applies one slot's sample for this frame. `None` marks the slot
    /// inactive and releases its tracker.
    pub fn update(
        &mut self,
        slot: usize,
        sample: Option<&InputSourceSample>,
        server: &mut XrServer,
        events: &mut EventQueue,
    ) {
        let Some(source) = self.sources.get_mut(slot) else {
            log::warn!("[webxr] input source {slot} is out of range");
            return;
        };

        let Some(sample) = sample else {
            source.active = false;
            if let Some(tracker) = source.tracker.take() {
                server.remove_tracker(tracker);
            }
            return;
        };

        source.active = true;
        source.target_ray_mode = sample.target_ray_mode;
        source.touch_index = sample.touch_index;

        let tracker_id = match source.tracker {
            Some(id) if server.tracker(id).is_some() => id,
            _ => {
                let id = server.add_tracker(new_tracker(slot, source));
                source.tracker = Some(id);
                id
            }
        };

        if let Some(tracker) = server.tracker_mut(tracker_id) {
            publish_sample(tracker, sample);
        }

        let source = *source;
        if source.target_ray_mode == TargetRayMode::Screen {
            self.track_screen_position(&source, sample, server.viewport_size(), events);
        }
    }

    /// Touch bookkeeping for a host select event on `slot`. The slot must
    /// already hold this frame's sample.
    pub fn apply_input_event(&mut self, kind: InputEventKind, slot: usize, events: &mut EventQueue) {
        if !kind.is_select() {
            return;
        }
        let Some(source) = self.sources.get(slot) else {
            return;
        };
        if source.target_ray_mode != TargetRayMode::Screen {
            return;
        }
        let Some(touch_index) = source.touch_slot() else {
            return;
        };

        let pressed = kind == InputEventKind::SelectStart;
        let touch = &mut self.touches[touch_index];
        touch.is_touching = pressed;
        events.dispatch_pointer(PointerEvent::Touch {
            index: touch_index,
            position: touch.position,
            pressed,
        });
    }

    /// Drops every tracker and forgets all slot and touch state.
    pub fn release_all(&mut self, server: &mut XrServer) {
        for source in self.sources.iter_mut() {
            if let Some(tracker) = source.tracker.take() {
                server.remove_tracker(tracker);
            }
        }
        *self = Self::default();
    }

    fn track_screen_position(
        &mut self,
        source: &InputSource,
        sample: &InputSourceSample,
        viewport_size: Vector2,
        events: &mut EventQueue,
    ) {
        let axes = sample.axes.as_slice();
        let Some(touch_index) = source.touch_slot() else {
            return;
        };
        if axes.len() < 2 {
            return;
        }

        // Raw axes: this is an absolute screen position, not a stick direction.
        let position = screen_position_from_axes([axes[0], axes[1]], viewport_size);
        let touch = &mut self.touches[touch_index];
        if touch.is_touching {
            let relative = [
                position[0] - touch.position[0],
                position[1] - touch.position[1],
            ];
            if relative[0].abs() >= 1.0 || relative[1].abs() >= 1.0 {
                events.dispatch_pointer(PointerEvent::Drag {
                    index: touch_index,
                    position,
                    relative,
                });
            }
        }
        touch.position = position;
    }
}

/// Maps a [-1, 1] axis pair onto viewport pixels.
pub fn screen_position_from_axes(axes: Vector2, viewport_size: Vector2) -> Vector2 {
    [
        viewport_size[0] * ((axes[0] + 1.0) / 2.0),
        viewport_size[1] * ((axes[1] + 1.0) / 2.0),
    ]
}

fn new_tracker(slot: usize, source: &InputSource) -> PositionalTracker {
    let name = match source.touch_slot() {
        Some(touch) if source.target_ray_mode == TargetRayMode::Screen => TOUCH_NAMES[touch],
        _ => TRACKER_NAMES[slot],
    };

    // Slots 0 and 1 are always the left and right hands.
    match slot {
        0 => PositionalTracker::new(TrackerKind::Controller, name)
            .with_description("Left hand controller")
            .with_hand(TrackerHand::Left),
        1 => PositionalTracker::new(TrackerKind::Controller, name)
            .with_description("Right hand controller")
            .with_hand(TrackerHand::Right),
        _ => PositionalTracker::new(TrackerKind::Controller, name),
    }
}

fn publish_sample(tracker: &mut PositionalTracker, sample: &InputSourceSample) {
    let aim = TrackerPose::at_rest(matrix_to_transform(&sample.target_pose));
    tracker.set_pose("default", aim);
    tracker.set_pose("aim", aim);
    if let Some(grip) = &sample.grip_pose {
        tracker.set_pose("grip", TrackerPose::at_rest(matrix_to_transform(grip)));
    }

    let standard = sample.standard_mapping;
    let (button_names, pressure_names) = if standard {
        (&STANDARD_BUTTON_NAMES, &STANDARD_BUTTON_PRESSURE_NAMES)
    } else {
        (&UNKNOWN_BUTTON_NAMES, &UNKNOWN_BUTTON_PRESSURE_NAMES)
    };
    for (index, value) in sample.buttons.as_slice().iter().copied().enumerate() {
        tracker.set_input(button_names[index], value > 0.0);
        tracker.set_input(pressure_names[index], value);
    }

    let axis_names = if standard {
        &STANDARD_AXIS_NAMES
    } else {
        &UNKNOWN_AXIS_NAMES
    };
    let axes = sample.axes.as_slice();
    for (index, value) in axes.iter().copied().enumerate() {
        // Y on the touchpad and thumbstick points down on the host.
        let value = if standard && (index == 1 || index == 3) {
            -value
        } else {
            value
        };
        tracker.set_input(axis_names[index], value);
    }

    if standard {
        if axes.len() >= 2 {
            tracker.set_input(STANDARD_VECTOR_NAMES[0], [axes[0], -axes[1]]);
        }
        if axes.len() >= 4 {
            tracker.set_input(STANDARD_VECTOR_NAMES[1], [axes[2], -axes[3]]);
        }
    }
}
