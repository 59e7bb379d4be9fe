//! Driving, head and arm movement
//!
//! Velocities are percentages in -100..=100 and positions depend on
//! `Units`; neither is range-checked here. The robot clamps or rejects
//! out-of-range values itself.

use tracing::instrument;

use crate::client::MistyClient;
use crate::error::Result;
use crate::types::{
    Arm, ArmRequest, ArmsRequest, DriveRequest, DriveTimeRequest, HeadMotion, HeadRequest, Units,
};

impl MistyClient {
    /// Drive continuously until `stop()` or another drive command
    #[instrument(skip(self))]
    pub async fn drive(&self, linear_velocity: f64, angular_velocity: f64) -> Result<()> {
        let request = DriveRequest {
            linear_velocity,
            angular_velocity,
        };
        self.post("drive", &request).await?;
        Ok(())
    }

    /// Drive for `time_ms` milliseconds, then stop
    #[instrument(skip(self))]
    pub async fn drive_time(
        &self,
        linear_velocity: f64,
        angular_velocity: f64,
        time_ms: u32,
    ) -> Result<()> {
        let request = DriveTimeRequest {
            linear_velocity,
            angular_velocity,
            time_ms,
        };
        self.post("drive/time", &request).await?;
        Ok(())
    }

    /// Stop driving
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        self.post_empty("drive/stop").await?;
        Ok(())
    }

    /// Move the head to an absolute pitch/roll/yaw
    ///
    /// In degrees the robot accepts pitch -40 (up) to 26 (down), roll -40
    /// to 40 and yaw -81 (right) to 81 (left).
    #[instrument(skip(self))]
    pub async fn move_head(
        &self,
        pitch: f64,
        roll: f64,
        yaw: f64,
        motion: HeadMotion,
        units: Units,
    ) -> Result<()> {
        let (velocity, duration) = match motion {
            HeadMotion::Velocity(v) => (Some(v), None),
            HeadMotion::Duration(d) => (None, Some(d)),
        };
        let request = HeadRequest {
            pitch,
            roll,
            yaw,
            velocity,
            duration,
            units,
        };
        self.post("head", &request).await?;
        Ok(())
    }

    /// Move one arm (or both to the same position)
    #[instrument(skip(self))]
    pub async fn move_arm(
        &self,
        arm: Arm,
        position: f64,
        velocity: f64,
        units: Units,
    ) -> Result<()> {
        let request = ArmRequest {
            arm,
            position,
            velocity,
            units,
        };
        self.post("arms", &request).await?;
        Ok(())
    }

    /// Move both arms independently in one command
    #[instrument(skip(self))]
    pub async fn move_arms(
        &self,
        left_position: f64,
        right_position: f64,
        left_velocity: f64,
        right_velocity: f64,
        units: Units,
    ) -> Result<()> {
        let request = ArmsRequest {
            left_arm_position: left_position,
            right_arm_position: right_position,
            left_arm_velocity: left_velocity,
            right_arm_velocity: right_velocity,
            units,
        };
        self.post("arms/set", &request).await?;
        Ok(())
    }
}
