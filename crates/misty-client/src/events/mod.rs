//! WebSocket event subscriptions
//!
//! Misty publishes sensor and system events over `ws://<robot>/pubsub`.
//! Each [`EventSubscription`] owns one socket and keeps only the most recent
//! event, so consumers poll it in their own loop.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use misty_client::MistyClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut robot = MistyClient::new("192.168.1.96")?;
//!
//! let name = misty_client::events::unique_event_name("slam");
//! robot.add_slam_status(&name, Some(100))?;
//! robot.subscribe(&name).await?;
//!
//! // Spin in place until SLAM reports a pose, for at most 30 s
//! robot.drive_time(0.0, 20.0, 30_000).await?;
//! let found = robot
//!     .wait_for_slam_status(&name, "HasPose", Duration::from_secs(30))
//!     .await;
//! robot.stop().await?;
//! println!("has pose: {}", found.is_ok());
//!
//! robot.close_all().await;
//! # Ok(())
//! # }
//! ```

mod payload;
mod subscription;
mod types;

pub use payload::{
    EventMessage, EventPayload, HazardNotification, HazardSensorState, ImuReading, SlamStatus,
    TouchSensorReading,
};
pub use subscription::EventSubscription;
pub use types::{
    EventCondition, EventType, HazardType, Inequality, SensorPosition, SubscriptionOptions,
    SubscriptionState,
};

pub(crate) use types::selection_conditions;

/// Event name with a random suffix, for sessions that must not collide
/// with names left registered on the robot by an earlier run.
pub fn unique_event_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}
