//! Types for WebSocket event subscriptions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Robot event stream to subscribe to
///
/// Serialized with the robot's own type names (`"IMU"`, not `"Imu"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    SlamStatus,
    Imu,
    TouchSensor,
    HazardNotification,
    /// Any other event type the firmware knows about (e.g. "BatteryCharge")
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SlamStatus => "SlamStatus",
            Self::Imu => "IMU",
            Self::TouchSensor => "TouchSensor",
            Self::HazardNotification => "HazardNotification",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        match name {
            "SlamStatus" => Self::SlamStatus,
            "IMU" => Self::Imu,
            "TouchSensor" => Self::TouchSensor,
            "HazardNotification" => Self::HazardNotification,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

/// Comparison operator of an event condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inequality {
    #[serde(rename = "=>")]
    GreaterOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "delta")]
    Delta,
}

/// Server-side filter limiting which events a subscription receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventCondition {
    pub property: String,
    pub inequality: Inequality,
    pub value: String,
}

impl EventCondition {
    pub fn new(
        property: impl Into<String>,
        inequality: Inequality,
        value: impl Into<String>,
    ) -> Self {
        Self {
            property: property.into(),
            inequality,
            value: value.into(),
        }
    }
}

/// Everything needed to register a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOptions {
    pub event_type: EventType,
    /// Minimum interval between delivered events, in milliseconds
    pub debounce_ms: u32,
    /// Restrict delivered events to one property (dot notation allowed)
    pub return_property: Option<String>,
    pub conditions: Vec<EventCondition>,
}

impl SubscriptionOptions {
    pub fn new(event_type: EventType, debounce_ms: u32) -> Self {
        Self {
            event_type,
            debounce_ms,
            return_property: None,
            conditions: Vec::new(),
        }
    }

    pub fn with_return_property(mut self, property: impl Into<String>) -> Self {
        self.return_property = Some(property.into());
        self
    }

    pub fn with_conditions(mut self, conditions: Vec<EventCondition>) -> Self {
        self.conditions = conditions;
        self
    }
}

/// Lifecycle of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed,
}

/// Outbound `subscribe` frame
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SubscribeFrame<'a> {
    pub operation: &'static str,
    #[serde(rename = "Type")]
    pub event_type: &'a EventType,
    pub debounce_ms: u32,
    pub event_name: &'a str,
    pub return_property: Option<&'a str>,
    /// `null` rather than `[]` when unfiltered
    pub event_conditions: Option<&'a [EventCondition]>,
}

/// Outbound `unsubscribe` frame
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct UnsubscribeFrame<'a> {
    pub operation: &'static str,
    pub event_name: &'a str,
}

/// Touch sensor locations on Misty's head and chin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorPosition {
    Chin,
    HeadLeft,
    HeadRight,
    HeadBack,
    HeadFront,
    Scruff,
}

impl SensorPosition {
    pub const ALL: [SensorPosition; 6] = [
        Self::Chin,
        Self::HeadLeft,
        Self::HeadRight,
        Self::HeadBack,
        Self::HeadFront,
        Self::Scruff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chin => "Chin",
            Self::HeadLeft => "HeadLeft",
            Self::HeadRight => "HeadRight",
            Self::HeadBack => "HeadBack",
            Self::HeadFront => "HeadFront",
            Self::Scruff => "Scruff",
        }
    }
}

/// Hazard categories reported by `HazardNotification` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HazardType {
    BumpSensorsHazardState,
    CriticalInternalError,
    DriveStopped,
    TimeOfFlightSensorsHazardState,
    ExcessiveSpeedHazard,
}

impl HazardType {
    pub const ALL: [HazardType; 5] = [
        Self::BumpSensorsHazardState,
        Self::CriticalInternalError,
        Self::DriveStopped,
        Self::TimeOfFlightSensorsHazardState,
        Self::ExcessiveSpeedHazard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BumpSensorsHazardState => "bumpSensorsHazardState",
            Self::CriticalInternalError => "criticalInternalError",
            Self::DriveStopped => "driveStopped",
            Self::TimeOfFlightSensorsHazardState => "timeOfFlightSensorsHazardState",
            Self::ExcessiveSpeedHazard => "excessiveSpeedHazard",
        }
    }
}

/// Build conditions selecting `selected` out of `all` on `property`.
///
/// Nothing selected means no filter. A single selection becomes one `==`
/// condition; several become a `!=` condition per excluded value.
pub(crate) fn selection_conditions<T: Copy + PartialEq>(
    property: &str,
    selected: &[T],
    all: &[T],
    name: impl Fn(&T) -> &'static str,
) -> Vec<EventCondition> {
    match selected {
        [] => Vec::new(),
        [only] => vec![EventCondition::new(property, Inequality::Equal, name(only))],
        _ => all
            .iter()
            .filter(|item| !selected.contains(item))
            .map(|item| EventCondition::new(property, Inequality::NotEqual, name(item)))
            .collect(),
    }
}
