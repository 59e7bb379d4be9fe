//! The mapping session: settle SLAM, find a pose, trace a cross, fetch the map

use std::time::Duration;

use anyhow::{bail, Context, Result};
use misty_client::events::unique_event_name;
use misty_client::{HeadMotion, MistyClient, MistyClientError, SlamMap, Units};
use tracing::{info, warn};

use crate::config::Settings;

/// Longest wait for an IMU frame carrying a yaw reading
const HEADING_TIMEOUT: Duration = Duration::from_secs(10);

/// Smallest angle between two headings, in degrees
pub fn heading_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Heading `degrees` to the left of `heading`, in 0..360
pub fn heading_plus(heading: f64, degrees: f64) -> f64 {
    (heading + degrees).rem_euclid(360.0)
}

struct Session {
    robot: MistyClient,
    slam: String,
    imu: String,
}

/// Run the whole walkthrough and return the final map
pub async fn run(settings: &Settings) -> Result<SlamMap> {
    let robot =
        MistyClient::with_config(settings.client.clone()).context("Failed to create client")?;
    let mut session = Session {
        robot,
        slam: unique_event_name("slam"),
        imu: unique_event_name("imu"),
    };

    let result = session.map_area(settings).await;

    // Always leave the robot still and the sockets closed
    if let Err(e) = session.robot.stop().await {
        warn!("Failed to stop robot: {}", e);
    }
    if let Err(e) = session.robot.stop_mapping().await {
        warn!("Failed to stop mapping: {}", e);
    }
    session.robot.close_all().await;
    info!("Unsubscribed");

    result
}

impl Session {
    async fn map_area(&mut self, settings: &Settings) -> Result<SlamMap> {
        let settle = Duration::from_secs(settings.settle_secs);

        self.robot
            .move_head(0.0, 0.0, 0.0, HeadMotion::default(), Units::Degrees)
            .await?;

        self.robot.stop_mapping().await?;
        info!("Stopping mapping...");
        tokio::time::sleep(settle).await;
        self.robot.reset_slam().await?;
        info!("Resetting SLAM...");
        tokio::time::sleep(settle * 2).await;
        self.robot.start_mapping().await?;
        info!("Starting mapping...");

        self.robot.add_slam_status(&self.slam, None)?;
        self.robot.subscribe(&self.slam).await?;
        self.robot.add_imu(&self.imu, None)?;
        self.robot.subscribe(&self.imu).await?;

        self.find_pose(settings).await?;

        for arm in 0..4 {
            info!(arm, "Tracing arm of the cross");
            self.trace_arm(settings).await?;
        }

        let map = self.robot.get_map().await?;
        info!(width = map.width, height = map.height, "Map retrieved");
        Ok(map)
    }

    /// Spin in place until SLAM reports a pose
    async fn find_pose(&mut self, settings: &Settings) -> Result<()> {
        let timeout = Duration::from_secs(settings.pose_timeout_secs);
        let spin_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);

        self.robot.drive_time(0.0, settings.turn_speed, spin_ms).await?;
        let found = self
            .robot
            .wait_for_slam_status(&self.slam, "HasPose", timeout)
            .await;
        self.robot.stop().await?;

        match found {
            Ok(_) => {
                info!("Pose acquired");
                Ok(())
            }
            Err(MistyClientError::Timeout) => {
                bail!("No pose after {} s of spinning", settings.pose_timeout_secs)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Out and back along one arm, a full turn at the tip, then a quarter turn
    async fn trace_arm(&mut self, settings: &Settings) -> Result<()> {
        let leg = Duration::from_millis(u64::from(settings.leg_ms));

        self.robot
            .drive_time(settings.drive_speed, 0.0, settings.leg_ms)
            .await?;
        tokio::time::sleep(leg).await;

        let heading = self.current_heading().await?;
        self.turn_until(settings, heading, true).await?;

        self.robot
            .drive_time(-settings.drive_speed, 0.0, settings.leg_ms)
            .await?;
        tokio::time::sleep(leg).await;

        let heading = self.current_heading().await?;
        let goal = heading_plus(heading, 90.0);
        info!(heading, goal, "Quarter turn");
        self.turn_until(settings, goal, false).await
    }

    async fn current_heading(&mut self) -> Result<f64> {
        let msg = self
            .robot
            .subscription_mut(&self.imu)
            .context("IMU subscription missing")?
            .wait_for(|m| m.get_f64("yaw").is_some(), HEADING_TIMEOUT)
            .await
            .context("No IMU heading")?;
        msg.get_f64("yaw").context("IMU frame without yaw")
    }

    /// Turn left until the IMU yaw is within tolerance of `goal`.
    ///
    /// With `leave_first` the robot must first swing out of the tolerance
    /// window, so a full revolution back to the start heading completes.
    async fn turn_until(
        &mut self,
        settings: &Settings,
        goal: f64,
        leave_first: bool,
    ) -> Result<()> {
        let tolerance = settings.heading_tolerance;
        let timeout = Duration::from_secs(settings.turn_timeout_secs);
        let deadline = tokio::time::Instant::now() + timeout;

        self.robot.drive(0.0, settings.turn_speed).await?;

        let imu = self
            .robot
            .subscription_mut(&self.imu)
            .context("IMU subscription missing")?;
        let near = move |m: &misty_client::EventMessage| {
            m.get_f64("yaw")
                .is_some_and(|yaw| heading_distance(yaw, goal) < tolerance)
        };

        let outcome = async {
            if leave_first {
                imu.wait_for(|m| !near(m), remaining(deadline)).await?;
            }
            imu.wait_for(near, remaining(deadline)).await
        }
        .await;

        self.robot.stop().await?;
        outcome.with_context(|| format!("Turn to heading {:.1} did not finish", goal))?;
        Ok(())
    }
}

fn remaining(deadline: tokio::time::Instant) -> Duration {
    deadline.saturating_duration_since(tokio::time::Instant::now())
}
