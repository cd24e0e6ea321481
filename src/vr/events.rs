use crate::vr::transform::Vector2;
use serde::Serialize;
use std::collections::VecDeque;

/// Pointer events kept while nobody drains the queue. Older ones are dropped.
pub const MAX_PENDING_POINTER_EVENTS: usize = 256;

/// Select and squeeze codes as the host reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEventKind {
    SelectStart,
    SelectEnd,
    SqueezeStart,
    SqueezeEnd,
}

impl InputEventKind {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(InputEventKind::SelectStart),
            1 => Some(InputEventKind::SelectEnd),
            2 => Some(InputEventKind::SqueezeStart),
            3 => Some(InputEventKind::SqueezeEnd),
            _ => None,
        }
    }

    pub fn is_select(self) -> bool {
        matches!(self, InputEventKind::SelectStart | InputEventKind::SelectEnd)
    }
}

/// Notifications the bridge raises towards application code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum XrEvent {
    SessionSupported { session_mode: String, supported: bool },
    SessionStarted,
    SessionEnded,
    SessionFailed { message: String },
    #[serde(rename = "selectstart")]
    SelectStart { input_source: usize },
    #[serde(rename = "selectend")]
    SelectEnd { input_source: usize },
    Select { input_source: usize },
    #[serde(rename = "squeezestart")]
    SqueezeStart { input_source: usize },
    #[serde(rename = "squeezeend")]
    SqueezeEnd { input_source: usize },
    Squeeze { input_source: usize },
    /// A host event forwarded by name without a payload.
    Simple { name: String },
}

impl XrEvent {
    pub fn name(&self) -> &str {
        match self {
            XrEvent::SessionSupported { .. } => "session_supported",
            XrEvent::SessionStarted => "session_started",
            XrEvent::SessionEnded => "session_ended",
            XrEvent::SessionFailed { .. } => "session_failed",
            XrEvent::SelectStart { .. } => "selectstart",
            XrEvent::SelectEnd { .. } => "selectend",
            XrEvent::Select { .. } => "select",
            XrEvent::SqueezeStart { .. } => "squeezestart",
            XrEvent::SqueezeEnd { .. } => "squeezeend",
            XrEvent::Squeeze { .. } => "squeeze",
            XrEvent::Simple { name } => name,
        }
    }

    /// The outward events one host input event expands to. `select` and
    /// `squeeze` follow their end events directly.
    pub fn for_input(kind: InputEventKind, input_source: usize) -> Vec<XrEvent> {
        match kind {
            InputEventKind::SelectStart => vec![XrEvent::SelectStart { input_source }],
            InputEventKind::SelectEnd => vec![
                XrEvent::SelectEnd { input_source },
                XrEvent::Select { input_source },
            ],
            InputEventKind::SqueezeStart => vec![XrEvent::SqueezeStart { input_source }],
            InputEventKind::SqueezeEnd => vec![
                XrEvent::SqueezeEnd { input_source },
                XrEvent::Squeeze { input_source },
            ],
        }
    }
}

/// Synthetic screen pointer input for screen-space input sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "pointer", rename_all = "snake_case")]
pub enum PointerEvent {
    Touch {
        index: usize,
        position: Vector2,
        pressed: bool,
    },
    Drag {
        index: usize,
        position: Vector2,
        relative: Vector2,
    },
}

/// Outward events waiting for the application. Callers drain both queues
/// once per frame; undrained pointer events are capped at
/// [`MAX_PENDING_POINTER_EVENTS`].
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<XrEvent>,
    pointer_events: VecDeque<PointerEvent>,
}

impl EventQueue {
    pub fn emit(&mut self, event: XrEvent) {
        log::debug!("[webxr] emit {}", event.name());
        self.events.push(event);
    }

    pub fn dispatch_pointer(&mut self, event: PointerEvent) {
        if self.pointer_events.len() == MAX_PENDING_POINTER_EVENTS {
            self.pointer_events.pop_front();
            log::debug!("[webxr] pointer queue full, dropping oldest event");
        }
        self.pointer_events.push_back(event);
    }

    pub fn drain_events(&mut self) -> Vec<XrEvent> {
        self.events.drain(..).collect()
    }

    pub fn drain_pointer_events(&mut self) -> Vec<PointerEvent> {
        self.pointer_events.drain(..).collect()
    }
}
