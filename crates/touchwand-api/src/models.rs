// Hub unit records
//
// The hub's JSON is loosely typed: ids arrive as integers or strings,
// type tags vary in case between firmware versions, and `currStatus` is
// an integer for switches/dimmers/shutters but an object for wall
// controllers and alarm sensors. Parsing is done by hand against
// `serde_json::Value` so that a bad field rejects one record, not a batch.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::Error;

/// Liveness tag the hub reports for a reachable unit.
pub const LIVENESS_ALIVE: &str = "ALIVE";

// ── UnitType ─────────────────────────────────────────────────────────

/// Kind of unit, from the hub's `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitType {
    Switch,
    Dimmer,
    Shutter,
    WallController,
    AlarmSensor,
    /// Any tag this crate doesn't model (thermostats, scenes, ...).
    Other(String),
}

impl UnitType {
    /// Case-insensitive match on the hub tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "switch" => Self::Switch,
            "dimmer" => Self::Dimmer,
            "shutter" => Self::Shutter,
            "wallcontroller" => Self::WallController,
            "alarmsensor" => Self::AlarmSensor,
            _ => Self::Other(tag.to_owned()),
        }
    }

    /// The canonical tag as the hub spells it.
    pub fn as_tag(&self) -> &str {
        match self {
            Self::Switch => "Switch",
            Self::Dimmer => "dimmer",
            Self::Shutter => "shutter",
            Self::WallController => "WallController",
            Self::AlarmSensor => "AlarmSensor",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for UnitType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

// ── Connectivity ─────────────────────────────────────────────────────

/// Radio/bus technology the hub uses to reach a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Connectivity {
    ZWave,
    Knx,
    Other(String),
}

impl Connectivity {
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "zwave" | "z-wave" => Self::ZWave,
            "knx" => Self::Knx,
            _ => Self::Other(tag.to_owned()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            Self::ZWave => "zwave",
            Self::Knx => "knx",
            Self::Other(tag) => tag,
        }
    }

    /// Z-Wave and KNX units are driven by the hub itself.
    pub fn is_primary(&self) -> bool {
        matches!(self, Self::ZWave | Self::Knx)
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for Connectivity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

// ── CurrentStatus ────────────────────────────────────────────────────

/// The `currStatus` payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CurrentStatus {
    /// Switch/dimmer/shutter position: 0 = off/closed, 255 = fully on/open.
    Level(i64),
    /// Structured status (wall controller `csc`, alarm sensor readings).
    Structured(Map<String, Value>),
}

// ── UnitRecord ───────────────────────────────────────────────────────

/// One unit as reported by the hub, at one point in time.
///
/// Snapshots are never patched: a newer poll or event produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    pub connectivity: Connectivity,
    #[serde(rename = "currStatus", skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentStatus>,
    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub liveness: Option<String>,
}

impl UnitRecord {
    /// Parse one unit object.
    ///
    /// `id` (string or integer, non-empty) and `type` are required.
    /// A `currStatus` of an unexpected JSON type is treated as absent here;
    /// [`require_status`](Self::require_status) decides whether that matters.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let obj = value
            .as_object()
            .ok_or(Error::MissingField { field: "unit" })?;

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::MissingField { field: "id" }),
        };

        let unit_type = obj
            .get("type")
            .and_then(Value::as_str)
            .map(UnitType::from_tag)
            .ok_or(Error::MissingField { field: "type" })?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let connectivity = Connectivity::from_tag(
            obj.get("connectivity")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        );

        let current = match obj.get("currStatus") {
            Some(Value::Number(n)) => n.as_i64().map(CurrentStatus::Level),
            Some(Value::Object(map)) => Some(CurrentStatus::Structured(map.clone())),
            _ => None,
        };

        let liveness = obj.get("status").and_then(Value::as_str).map(String::from);

        Ok(Self {
            id,
            name,
            unit_type,
            connectivity,
            current,
            liveness,
        })
    }

    /// Reject records that carry no usable status field.
    ///
    /// Used by single-unit queries, where the status is the whole point.
    pub fn require_status(self) -> Result<Self, Error> {
        if self.current.is_some() || self.liveness.is_some() {
            Ok(self)
        } else {
            Err(Error::MissingField {
                field: "currStatus",
            })
        }
    }

    /// Integer level from `currStatus`, if the unit reports one.
    pub fn level(&self) -> Option<i64> {
        match self.current {
            Some(CurrentStatus::Level(level)) => Some(level),
            _ => None,
        }
    }

    /// `true` when the hub's liveness tag says the unit is reachable.
    pub fn is_alive(&self) -> bool {
        self.liveness.as_deref() == Some(LIVENESS_ALIVE)
    }

    /// Display label: the unit name, or its id when the hub has none.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.id } else { &self.name }
    }
}

/// Parse a list-units body.
///
/// Returns `Err` only when the root is not an array. Elements that fail to
/// parse are logged and skipped; the rest keep their order.
pub fn parse_unit_list(value: &Value) -> Result<Vec<UnitRecord>, Error> {
    let items = value
        .as_array()
        .ok_or(Error::MissingField { field: "units" })?;

    Ok(items
        .iter()
        .filter_map(|item| match UnitRecord::from_json(item) {
            Ok(unit) => Some(unit),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable unit");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_string_id_and_lowercase_tags() {
        let unit = UnitRecord::from_json(&json!({
            "id": "7", "name": "Switch A", "type": "switch", "connectivity": "zwave"
        }))
        .unwrap();

        assert_eq!(unit.id, "7");
        assert_eq!(unit.name, "Switch A");
        assert_eq!(unit.unit_type, UnitType::Switch);
        assert_eq!(unit.connectivity, Connectivity::ZWave);
        assert_eq!(unit.current, None);
    }

    #[test]
    fn parses_integer_id_and_hub_casing() {
        let unit = UnitRecord::from_json(&json!({
            "id": 42, "name": "Hall", "type": "WallController",
            "connectivity": "knx", "currStatus": { "csc": { "keyAttr": 1 } }
        }))
        .unwrap();

        assert_eq!(unit.id, "42");
        assert_eq!(unit.unit_type, UnitType::WallController);
        assert!(matches!(unit.current, Some(CurrentStatus::Structured(_))));
        assert_eq!(unit.level(), None);
    }

    #[test]
    fn empty_or_missing_id_is_rejected() {
        assert!(UnitRecord::from_json(&json!({ "id": "", "type": "Switch" })).is_err());
        assert!(UnitRecord::from_json(&json!({ "type": "Switch" })).is_err());
        assert!(UnitRecord::from_json(&json!({ "id": true, "type": "Switch" })).is_err());
    }

    #[test]
    fn wrong_typed_status_fails_require_status() {
        let unit = UnitRecord::from_json(&json!({
            "id": 3, "type": "dimmer", "currStatus": "bright"
        }))
        .unwrap();
        assert_eq!(unit.current, None);
        assert!(matches!(
            unit.require_status(),
            Err(Error::MissingField { field: "currStatus" })
        ));
    }

    #[test]
    fn liveness_alone_satisfies_require_status() {
        let unit = UnitRecord::from_json(&json!({
            "id": 3, "type": "dimmer", "status": "ALIVE"
        }))
        .unwrap()
        .require_status()
        .unwrap();
        assert!(unit.is_alive());
    }

    #[test]
    fn unit_list_skips_bad_elements_in_order() {
        let units = parse_unit_list(&json!([
            { "id": 1, "type": "Switch", "name": "a" },
            { "name": "no id", "type": "Switch" },
            "garbage",
            { "id": 2, "type": "shutter", "name": "b" }
        ]))
        .unwrap();

        let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn unit_list_rejects_non_array_root() {
        assert!(parse_unit_list(&json!({})).is_err());
    }

    #[test]
    fn label_falls_back_to_id() {
        let unit = UnitRecord::from_json(&json!({ "id": 9, "type": "Switch" })).unwrap();
        assert_eq!(unit.label(), "9");
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let t = UnitType::from_tag("Thermostat");
        assert!(!t.is_supported());
        assert_eq!(t.as_tag(), "Thermostat");
        assert!(!Connectivity::from_tag("rissone").is_primary());
    }
}
