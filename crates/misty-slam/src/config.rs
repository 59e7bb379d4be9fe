//! Configuration file handling for misty-slam

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use misty_client::config::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_TIMEOUT_MS};
use misty_client::ClientConfig;
use serde::Deserialize;

/// Walkthrough settings as read from TOML; every field is optional
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Robot address
    pub robot: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Event debounce for the SLAM and IMU subscriptions
    pub debounce_ms: Option<u32>,
    /// Longest spin while waiting for a pose, in seconds
    pub pose_timeout_secs: Option<u64>,
    /// Angular velocity (%) used for every turn
    pub turn_speed: Option<f64>,
    /// Linear velocity (%) for the arms of the cross
    pub drive_speed: Option<f64>,
    /// Duration of each arm of the cross, in milliseconds
    pub leg_ms: Option<u32>,
    /// Heading tolerance in degrees when stopping a turn
    pub heading_tolerance: Option<f64>,
    /// Longest single turn, in seconds
    pub turn_timeout_secs: Option<u64>,
    /// Seconds to let SLAM settle after stop/reset
    pub settle_secs: Option<u64>,
    /// Where the map image is written
    pub output: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, robot: Option<&str>, output: Option<&Path>) -> Result<Settings> {
        let robot = robot
            .map(String::from)
            .or_else(|| self.robot.clone())
            .context("No robot address given (use --robot or set `robot` in the config file)")?;

        let mut client = ClientConfig::new(robot);
        client.timeout_ms = self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        client.connect_timeout_ms = DEFAULT_CONNECT_TIMEOUT_MS;
        client.debounce_ms = self.debounce_ms.unwrap_or(100);

        Ok(Settings {
            client,
            pose_timeout_secs: self.pose_timeout_secs.unwrap_or(30),
            turn_speed: self.turn_speed.unwrap_or(20.0),
            drive_speed: self.drive_speed.unwrap_or(10.0),
            leg_ms: self.leg_ms.unwrap_or(3000),
            heading_tolerance: self.heading_tolerance.unwrap_or(5.0),
            turn_timeout_secs: self.turn_timeout_secs.unwrap_or(60),
            settle_secs: self.settle_secs.unwrap_or(5),
            output: output
                .map(Path::to_path_buf)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| PathBuf::from("map.pgm")),
        })
    }
}

/// Fully resolved settings after merging CLI args
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub pose_timeout_secs: u64,
    pub turn_speed: f64,
    pub drive_speed: f64,
    pub leg_ms: u32,
    pub heading_tolerance: f64,
    pub turn_timeout_secs: u64,
    pub settle_secs: u64,
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_args_override_file() {
        let config = Config {
            robot: Some("10.0.0.5".into()),
            debounce_ms: Some(50),
            ..Default::default()
        };
        let settings = config
            .merge_with_args(Some("192.168.1.96"), None)
            .unwrap();
        assert_eq!(settings.client.address, "192.168.1.96");
        assert_eq!(settings.client.debounce_ms, 50);
        assert_eq!(settings.output, PathBuf::from("map.pgm"));
    }

    #[test]
    fn test_robot_required() {
        assert!(Config::default().merge_with_args(None, None).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "robot = \"misty.local\"\nturn_speed = 15.0\nleg_ms = 2000").unwrap();

        let settings = Config::load_from(file.path())
            .unwrap()
            .merge_with_args(None, None)
            .unwrap();
        assert_eq!(settings.client.address, "misty.local");
        assert_eq!(settings.turn_speed, 15.0);
        assert_eq!(settings.leg_ms, 2000);
        assert_eq!(settings.pose_timeout_secs, 30);
    }
}
