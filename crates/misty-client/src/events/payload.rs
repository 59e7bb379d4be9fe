//! Inbound event frame decoding
//!
//! Misty wraps every frame as `{"eventName": ..., "message": ...}`. A string
//! `message` is the registration reply; an object `message` is an event.
//! Frames without the envelope are taken as the event body itself.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use super::types::EventType;
use crate::error::{MistyClientError, Result};

/// One decoded event, exactly as the robot sent it plus a typed view
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    event_name: Option<String>,
    raw: Map<String, Value>,
    payload: EventPayload,
}

impl EventMessage {
    /// Decode `raw` as an event of `event_type`.
    ///
    /// Shapes the typed view cannot hold land in [`EventPayload::Other`];
    /// the raw map is always kept.
    pub fn new(
        event_type: &EventType,
        event_name: Option<String>,
        raw: Map<String, Value>,
    ) -> Self {
        let payload = EventPayload::decode(event_type, &raw);
        Self {
            event_name,
            raw,
            payload,
        }
    }

    /// Subscription name the robot tagged the frame with, if any
    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    /// The decoded JSON object, unvalidated
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn into_raw(self) -> Map<String, Value> {
        self.raw
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Look up a top-level field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Look up a field and convert it
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.raw
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.raw.get(key).and_then(Value::as_f64)
    }

    pub fn as_slam_status(&self) -> Option<&SlamStatus> {
        match &self.payload {
            EventPayload::SlamStatus(status) => Some(status),
            _ => None,
        }
    }

    pub fn as_imu(&self) -> Option<&ImuReading> {
        match &self.payload {
            EventPayload::Imu(reading) => Some(reading),
            _ => None,
        }
    }

    pub fn as_touch(&self) -> Option<&TouchSensorReading> {
        match &self.payload {
            EventPayload::TouchSensor(reading) => Some(reading),
            _ => None,
        }
    }

    pub fn as_hazard(&self) -> Option<&HazardNotification> {
        match &self.payload {
            EventPayload::HazardNotification(hazard) => Some(hazard),
            _ => None,
        }
    }
}

/// Typed view of an event body
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    SlamStatus(SlamStatus),
    Imu(ImuReading),
    TouchSensor(TouchSensorReading),
    HazardNotification(HazardNotification),
    /// Unknown event type, or a body the typed view could not hold
    Other(Map<String, Value>),
}

impl EventPayload {
    fn decode(event_type: &EventType, raw: &Map<String, Value>) -> Self {
        let decoded = match event_type {
            EventType::SlamStatus => {
                // The status fields sit under "slamStatus" unless a return
                // property already narrowed the body down to them.
                let body = match raw.get("slamStatus") {
                    Some(Value::Object(inner)) => inner,
                    _ => raw,
                };
                typed(body).map(Self::SlamStatus)
            }
            EventType::Imu => typed(raw).map(Self::Imu),
            EventType::TouchSensor => typed(raw).map(Self::TouchSensor),
            EventType::HazardNotification => typed(raw).map(Self::HazardNotification),
            EventType::Other(_) => None,
        };
        decoded.unwrap_or_else(|| Self::Other(raw.clone()))
    }
}

fn typed<T: DeserializeOwned>(body: &Map<String, Value>) -> Option<T> {
    match serde_json::from_value(Value::Object(body.clone())) {
        Ok(value) => Some(value),
        Err(e) => {
            trace!("Event body does not fit typed view: {}", e);
            None
        }
    }
}

/// SLAM system status
///
/// `status` is a bit field; `status_list` names the bits that are set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlamStatus {
    #[serde(default)]
    pub run_mode: Option<String>,
    #[serde(default)]
    pub sensor_status: Option<String>,
    #[serde(default)]
    pub status: Option<u64>,
    #[serde(default)]
    pub status_list: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlamStatus {
    pub fn has(&self, flag: &str) -> bool {
        self.status_list.iter().any(|s| s == flag)
    }

    pub fn has_pose(&self) -> bool {
        self.has("HasPose")
    }
}

/// IMU orientation (degrees), angular velocity and acceleration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImuReading {
    #[serde(default)]
    pub pitch: Option<f64>,
    #[serde(default)]
    pub roll: Option<f64>,
    #[serde(default)]
    pub yaw: Option<f64>,
    #[serde(default)]
    pub pitch_velocity: Option<f64>,
    #[serde(default)]
    pub roll_velocity: Option<f64>,
    #[serde(default)]
    pub yaw_velocity: Option<f64>,
    #[serde(default)]
    pub x_acceleration: Option<f64>,
    #[serde(default)]
    pub y_acceleration: Option<f64>,
    #[serde(default)]
    pub z_acceleration: Option<f64>,
    #[serde(default)]
    pub sensor_id: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchSensorReading {
    #[serde(default)]
    pub sensor_position: Option<String>,
    #[serde(default)]
    pub is_contacted: Option<bool>,
    #[serde(default)]
    pub sensor_id: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-sensor hazard flag
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardSensorState {
    #[serde(default)]
    pub sensor_name: Option<String>,
    #[serde(default)]
    pub in_hazard: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardNotification {
    #[serde(default)]
    pub bump_sensors_hazard_state: Vec<HazardSensorState>,
    #[serde(default)]
    pub time_of_flight_sensors_hazard_state: Vec<HazardSensorState>,
    #[serde(default)]
    pub drive_stopped: Vec<HazardSensorState>,
    #[serde(default)]
    pub critical_internal_error: Option<bool>,
    #[serde(default)]
    pub excessive_speed_hazard: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HazardNotification {
    /// Sensors currently reporting a hazard, across all sensor groups
    pub fn active_sensors(&self) -> impl Iterator<Item = &str> {
        self.bump_sensors_hazard_state
            .iter()
            .chain(&self.time_of_flight_sensors_hazard_state)
            .chain(&self.drive_stopped)
            .filter(|s| s.in_hazard == Some(true))
            .filter_map(|s| s.sensor_name.as_deref())
    }
}

/// Result of decoding one text frame
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    /// Reply to a subscribe/unsubscribe request
    Registration(String),
    Event(EventMessage),
}

pub(crate) fn decode_frame(text: &str, event_type: &EventType) -> Result<Frame> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(100).collect();
        MistyClientError::Parse(format!("Invalid event frame: {} (data: {})", e, preview))
    })?;

    let Value::Object(mut outer) = value else {
        return Err(MistyClientError::Parse(format!(
            "Event frame is not a JSON object: {}",
            text
        )));
    };

    let event_name = match outer.get("eventName") {
        Some(Value::String(name)) => Some(name.clone()),
        _ => None,
    };

    match outer.remove("message") {
        Some(Value::String(reply)) => Ok(Frame::Registration(reply)),
        Some(Value::Object(body)) => Ok(Frame::Event(EventMessage::new(
            event_type, event_name, body,
        ))),
        Some(other) => {
            // Unexpected envelope content; keep the frame as-is.
            outer.insert("message".to_string(), other);
            Ok(Frame::Event(EventMessage::new(event_type, event_name, outer)))
        }
        None => Ok(Frame::Event(EventMessage::new(event_type, None, outer))),
    }
}
