//! SLAM mapping, tracking and depth-sensor settings

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use tracing::instrument;

use crate::client::MistyClient;
use crate::error::{MistyClientError, Result};
use crate::types::{
    DepthImage, ExposureAndGain, ExposureAndGainRequest, FollowPathOptions, HazardSettings,
    HazardSettingsUpdate, SlamMap, SlamMapInfo,
};

impl MistyClient {
    // =========================================================================
    // Mapping
    // =========================================================================

    /// Begin mapping the surrounding area
    #[instrument(skip(self))]
    pub async fn start_mapping(&self) -> Result<()> {
        self.post_empty("slam/map/start").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop_mapping(&self) -> Result<()> {
        self.post_empty("slam/map/stop").await?;
        Ok(())
    }

    /// Occupancy grid of the active map
    ///
    /// Cells: 0 unknown, 1 open, 2 occupied, 3 covered.
    #[instrument(skip(self))]
    pub async fn get_map(&self) -> Result<SlamMap> {
        let value = self.request(reqwest::Method::GET, "slam/map", None).await?;
        SlamMap::from_value(value)
    }

    /// Key of the active map
    #[instrument(skip(self))]
    pub async fn get_current_slam_map(&self) -> Result<String> {
        self.get("slam/map/current").await
    }

    /// Keys and names of all saved maps
    #[instrument(skip(self))]
    pub async fn get_slam_maps(&self) -> Result<Vec<SlamMapInfo>> {
        self.get("slam/map/ids").await
    }

    #[instrument(skip(self))]
    pub async fn rename_slam_map(&self, key: &str, name: &str) -> Result<()> {
        self.post("slam/map/rename", &json!({"Key": key, "Name": name}))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_slam_map(&self, key: &str) -> Result<()> {
        self.delete("slam/map", &json!({"Key": key})).await?;
        Ok(())
    }

    // =========================================================================
    // Tracking
    // =========================================================================

    /// Start tracking the robot's location in the active map
    #[instrument(skip(self))]
    pub async fn start_tracking(&self) -> Result<()> {
        self.post_empty("slam/track/start").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop_tracking(&self) -> Result<()> {
        self.post_empty("slam/track/stop").await?;
        Ok(())
    }

    /// Drive to occupancy-grid cell (`x`, `y`); requires tracking
    #[instrument(skip(self))]
    pub async fn drive_to_location(&self, x: u32, y: u32) -> Result<()> {
        self.post("drive/coordinates", &json!({"Destination": format!("{}:{}", x, y)}))
            .await?;
        Ok(())
    }

    /// Drive through a list of grid waypoints; requires tracking
    #[instrument(skip(self, path))]
    pub async fn follow_path(&self, path: &[(u32, u32)], options: FollowPathOptions) -> Result<()> {
        if path.is_empty() {
            return Err(MistyClientError::InvalidArgument(
                "Path needs at least one waypoint".to_string(),
            ));
        }
        let path = path
            .iter()
            .map(|(x, y)| format!("{}:{}", x, y))
            .collect::<Vec<_>>()
            .join(",");

        let body = json!({
            "Path": path,
            "Velocity": options.velocity,
            "FullSpinDuration": options.full_spin_duration,
            "WaypointAccuracy": options.waypoint_accuracy,
            "RotateThreshold": options.rotate_threshold,
        });
        self.post("drive/path", &body).await?;
        Ok(())
    }

    // =========================================================================
    // SLAM settings
    // =========================================================================

    /// Reset the SLAM sensors
    #[instrument(skip(self))]
    pub async fn reset_slam(&self) -> Result<()> {
        self.post_empty("slam/reset").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_hazard_settings(&self) -> Result<HazardSettings> {
        self.get("hazards/settings").await
    }

    /// Change hazard thresholds; the robot reverts them on reboot
    #[instrument(skip(self))]
    pub async fn update_hazard_settings(&self, update: &HazardSettingsUpdate) -> Result<()> {
        self.post("hazard/updatebasesettings", update).await?;
        Ok(())
    }

    /// Exposure and gain of the depth sensor's infrared cameras
    #[instrument(skip(self))]
    pub async fn get_slam_ir_exposure_and_gain(&self) -> Result<ExposureAndGain> {
        self.get("slam/settings/ir").await
    }

    /// Only takes effect while the depth sensor is streaming
    #[instrument(skip(self))]
    pub async fn set_slam_ir_exposure_and_gain(&self, exposure: f64, gain: u32) -> Result<()> {
        self.post("slam/settings/ir", &ExposureAndGainRequest { exposure, gain })
            .await?;
        Ok(())
    }

    /// Exposure and gain of the depth sensor's fisheye camera
    #[instrument(skip(self))]
    pub async fn get_slam_visible_exposure_and_gain(&self) -> Result<ExposureAndGain> {
        self.get("slam/settings/visible").await
    }

    /// Only takes effect while the depth sensor is streaming
    #[instrument(skip(self))]
    pub async fn set_slam_visible_exposure_and_gain(&self, exposure: f64, gain: u32) -> Result<()> {
        self.post("slam/settings/visible", &ExposureAndGainRequest { exposure, gain })
            .await?;
        Ok(())
    }

    /// Open the depth sensor stream outside of mapping/tracking
    #[instrument(skip(self))]
    pub async fn start_slam_streaming(&self) -> Result<()> {
        self.post_empty("slam/streaming/start").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop_slam_streaming(&self) -> Result<()> {
        self.post_empty("slam/streaming/stop").await?;
        Ok(())
    }

    /// Navigation diagnostics; the shape changes between firmware releases
    #[instrument(skip(self))]
    pub async fn get_slam_navigation_diagnostics(&self) -> Result<Value> {
        self.request(reqwest::Method::GET, "slam/diagnostics", None)
            .await
    }

    /// Per-pixel distances (mm) from the depth sensor
    #[instrument(skip(self))]
    pub async fn take_depth_picture(&self) -> Result<DepthImage> {
        self.get("cameras/depth").await
    }

    /// PNG bytes from the depth sensor's fisheye camera
    #[instrument(skip(self))]
    pub async fn take_fisheye_picture(&self) -> Result<Vec<u8>> {
        let value = self
            .request(reqwest::Method::GET, "cameras/fisheye?Base64=true", None)
            .await?;
        let encoded = value
            .get("base64")
            .and_then(Value::as_str)
            .ok_or_else(|| MistyClientError::Parse("Missing base64 image data".to_string()))?;
        BASE64
            .decode(encoded)
            .map_err(|e| MistyClientError::Parse(format!("Invalid base64 image: {}", e)))
    }
}
