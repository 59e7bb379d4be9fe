//! Request and response types for the Misty REST API
//!
//! Request bodies use the robot's PascalCase field names; response bodies
//! come back camelCase. Unknown response fields are kept in `extra`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MistyClientError, Result};

// =============================================================================
// Movement
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DriveRequest {
    pub linear_velocity: f64,
    pub angular_velocity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DriveTimeRequest {
    pub linear_velocity: f64,
    pub angular_velocity: f64,
    pub time_ms: u32,
}

/// Unit for head and arm positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Degrees,
    Radians,
    Position,
}

/// How fast a head movement runs: exactly one of velocity or duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadMotion {
    /// Percentage of maximum velocity
    Velocity(f64),
    /// Seconds to complete the movement
    Duration(f64),
}

impl Default for HeadMotion {
    fn default() -> Self {
        Self::Velocity(10.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct HeadRequest {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
    pub velocity: Option<f64>,
    pub duration: Option<f64>,
    pub units: Units,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    Left,
    Right,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ArmRequest {
    pub arm: Arm,
    pub position: f64,
    pub velocity: f64,
    pub units: Units,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ArmsRequest {
    pub left_arm_position: f64,
    pub right_arm_position: f64,
    pub left_arm_velocity: f64,
    pub right_arm_velocity: f64,
    pub units: Units,
}

// =============================================================================
// Navigation
// =============================================================================

/// Tuning for `follow_path`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowPathOptions {
    /// Fraction of maximum straight-line velocity
    pub velocity: f64,
    /// Seconds for a full 360 degree spin
    pub full_spin_duration: f64,
    /// Metres from a waypoint that count as reaching it
    pub waypoint_accuracy: f64,
    /// Bearing (degrees) above which the robot pivots before driving
    pub rotate_threshold: f64,
}

impl Default for FollowPathOptions {
    fn default() -> Self {
        Self {
            velocity: 0.5,
            full_spin_duration: 15.0,
            waypoint_accuracy: 0.1,
            rotate_threshold: 10.0,
        }
    }
}

/// Occupancy grid cell value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Unknown,
    Open,
    Occupied,
    Covered,
    /// Value outside the documented range
    Other(u8),
}

impl From<u8> for Cell {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Unknown,
            1 => Self::Open,
            2 => Self::Occupied,
            3 => Self::Covered,
            other => Self::Other(other),
        }
    }
}

/// Grid as sent by the robot: flat or one array per row
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum GridLayout {
    Flat(Vec<u8>),
    Rows(Vec<Vec<u8>>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSlamMap {
    grid: GridLayout,
    height: usize,
    width: usize,
    #[serde(default)]
    is_valid: Option<bool>,
    #[serde(default)]
    origin_x: Option<f64>,
    #[serde(default)]
    origin_y: Option<f64>,
    #[serde(default)]
    resolution: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Occupancy grid of the active SLAM map
///
/// `grid` is row-major and always holds exactly `width * height` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct SlamMap {
    pub grid: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub is_valid: Option<bool>,
    pub origin_x: Option<f64>,
    pub origin_y: Option<f64>,
    /// Metres per cell
    pub resolution: Option<f64>,
    pub extra: Map<String, Value>,
}

impl SlamMap {
    /// Decode a `slam/map` result, rejecting grids that do not match their
    /// declared dimensions
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawSlamMap = serde_json::from_value(value)
            .map_err(|e| MistyClientError::Parse(format!("Invalid map: {}", e)))?;

        let grid = match raw.grid {
            GridLayout::Flat(cells) => cells,
            GridLayout::Rows(rows) => rows.into_iter().flatten().collect(),
        };

        let expected = raw.width.checked_mul(raw.height).ok_or_else(|| {
            MistyClientError::Parse(format!(
                "Map dimensions overflow: {}x{}",
                raw.width, raw.height
            ))
        })?;
        if grid.len() != expected {
            return Err(MistyClientError::Parse(format!(
                "Map grid has {} cells, expected {}x{} = {}",
                grid.len(),
                raw.height,
                raw.width,
                expected
            )));
        }

        Ok(Self {
            grid,
            width: raw.width,
            height: raw.height,
            is_valid: raw.is_valid,
            origin_x: raw.origin_x,
            origin_y: raw.origin_y,
            resolution: raw.resolution,
            extra: raw.extra,
        })
    }

    /// Iterate rows of `width` cells
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        // chunks(0) panics; an empty map has no rows anyway
        self.grid.chunks(self.width.max(1)).take(self.height)
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.grid.get(y * self.width + x).map(|&v| Cell::from(v))
    }

    /// Number of cells with the given value
    pub fn count(&self, cell: Cell) -> usize {
        self.grid.iter().filter(|&&v| Cell::from(v) == cell).count()
    }
}

/// Saved map as listed by `slam/map/ids`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlamMapInfo {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Camera exposure (seconds) and gain (dB)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureAndGain {
    pub exposure: f64,
    pub gain: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ExposureAndGainRequest {
    pub exposure: f64,
    pub gain: u32,
}

/// Depth image; `image` is row-major with `None` for unknown distances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthImage {
    pub image: Vec<Option<f64>>,
    pub height: usize,
    pub width: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BumpSensorSetting {
    pub sensor_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOfFlightThreshold {
    pub sensor_name: String,
    /// Metres; 0 disables the hazard for this sensor
    pub threshold: f64,
}

/// Hazard system settings as reported by the robot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardSettings {
    #[serde(default)]
    pub bump_sensors: Vec<BumpSensorSetting>,
    #[serde(default)]
    pub time_of_flight_sensors: Vec<TimeOfFlightThreshold>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Changes to apply to the hazard system; settings reset on reboot
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HazardSettingsUpdate {
    pub revert_to_default: bool,
    pub disable_time_of_flights: bool,
    pub disable_bump_sensors: bool,
    pub bump_sensors_enabled: Option<Vec<BumpSensorSetting>>,
    pub time_of_flight_thresholds: Option<Vec<TimeOfFlightThreshold>>,
}

// =============================================================================
// Assets
// =============================================================================

/// Audio file stored on the robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFile {
    pub name: String,
    #[serde(default)]
    pub system_asset: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where `save_audio` gets its bytes from
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Already base64-encoded audio
    Base64(String),
    Bytes(Vec<u8>),
    /// Audio file on local disk (.wav, .mp3, .wma, .aac)
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SaveAudioRequest<'a> {
    pub file_name: &'a str,
    pub data: String,
    pub immediately_apply: bool,
    pub overwrite_existing: bool,
}

/// Options for `text_to_speech`
#[derive(Debug, Clone, PartialEq)]
pub struct TtsOptions {
    pub language: String,
    /// Name the synthesized audio is stored under on the robot
    pub file_name: String,
    /// Remove the file from the robot once it has been played
    pub delete_after: bool,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            language: "es".to_string(),
            file_name: "temp.mp3".to_string(),
            delete_after: true,
        }
    }
}

// =============================================================================
// Skills
// =============================================================================

/// Skill metadata as reported by the robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInfo {
    pub unique_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub startup_arguments: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
