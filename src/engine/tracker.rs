use crate::vr::transform::{Transform, Vector2, Vector3};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TrackerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackerKind {
    Head,
    Controller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TrackerHand {
    #[default]
    Unknown,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackerPose {
    pub transform: Transform,
    pub linear_velocity: Vector3,
    pub angular_velocity: Vector3,
}

impl TrackerPose {
    pub fn at_rest(transform: Transform) -> Self {
        Self {
            transform,
            linear_velocity: [0.0; 3],
            angular_velocity: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Float(f32),
    Vector2(Vector2),
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Bool(value)
    }
}

impl From<f32> for InputValue {
    fn from(value: f32) -> Self {
        InputValue::Float(value)
    }
}

impl From<Vector2> for InputValue {
    fn from(value: Vector2) -> Self {
        InputValue::Vector2(value)
    }
}

/// A tracked device as the rest of the engine sees it: named poses plus
/// named input values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionalTracker {
    pub name: String,
    pub description: String,
    pub kind: TrackerKind,
    pub hand: TrackerHand,
    poses: BTreeMap<String, TrackerPose>,
    inputs: BTreeMap<String, InputValue>,
}

impl PositionalTracker {
    pub fn new(kind: TrackerKind, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            kind,
            hand: TrackerHand::Unknown,
            poses: BTreeMap::new(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hand(mut self, hand: TrackerHand) -> Self {
        self.hand = hand;
        self
    }

    pub fn set_pose(&mut self, name: &str, pose: TrackerPose) {
        self.poses.insert(name.to_string(), pose);
    }

    pub fn pose(&self, name: &str) -> Option<&TrackerPose> {
        self.poses.get(name)
    }

    pub fn set_input(&mut self, name: &str, value: impl Into<InputValue>) {
        self.inputs.insert(name.to_string(), value.into());
    }

    pub fn float_input(&self, name: &str) -> Option<f32> {
        match self.inputs.get(name) {
            Some(InputValue::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn bool_input(&self, name: &str) -> Option<bool> {
        match self.inputs.get(name) {
            Some(InputValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn vector_input(&self, name: &str) -> Option<Vector2> {
        match self.inputs.get(name) {
            Some(InputValue::Vector2(value)) => Some(*value),
            _ => None,
        }
    }
}
