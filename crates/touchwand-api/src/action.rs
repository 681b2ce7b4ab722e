// Unit action payloads for `POST /units/action`.

use serde_json::{Value, json};

/// Full-on / fully-open level.
pub const LEVEL_MAX: u8 = 255;

/// A command the hub can apply to a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitAction {
    /// Switch on (255) or off (0).
    Switch(bool),
    /// Dimmer level, 0..=255.
    Level(u8),
    ShutterUp,
    ShutterDown,
    ShutterStop,
    /// Anything else, sent verbatim as `value`.
    Raw(Value),
}

impl UnitAction {
    /// The `value` field for this action.
    pub fn value(&self) -> Value {
        match self {
            Self::Switch(true) | Self::ShutterUp => json!(LEVEL_MAX),
            Self::Switch(false) | Self::ShutterDown => json!(0),
            Self::Level(level) => json!(level),
            Self::ShutterStop => json!("stop"),
            Self::Raw(value) => value.clone(),
        }
    }

    /// Request body `{"id": .., "value": ..}`.
    ///
    /// Numeric ids go out as JSON numbers, which is what the hub itself sends.
    pub fn payload(&self, unit_id: &str) -> Value {
        let id = unit_id
            .parse::<u64>()
            .map_or_else(|_| json!(unit_id), |n| json!(n));
        json!({ "id": id, "value": self.value() })
    }
}
