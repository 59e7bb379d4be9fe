//! Misty Client Library
//!
//! Typed access to a Misty II robot's REST API and WebSocket event streams.
//!
//! # Example
//!
//! ```rust,no_run
//! use misty_client::{MistyClient, EventType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut robot = MistyClient::new("192.168.1.96")?;
//!
//!     // Drive forward at 10% for three seconds
//!     robot.drive_time(10.0, 0.0, 3000).await?;
//!
//!     // Follow the IMU heading
//!     robot.register_subscription("imu", EventType::Imu, 100)?;
//!     robot.subscribe("imu").await?;
//!     if let Some(msg) = robot.get_message("imu")? {
//!         println!("yaw = {:?}", msg.get_f64("yaw"));
//!     }
//!
//!     // Occupancy grid of the current map
//!     let map = robot.get_map().await?;
//!     println!("{}x{} cells", map.width, map.height);
//!
//!     robot.close_all().await;
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module provides an in-process mock robot:
//!
//! ```rust,ignore
//! use misty_client::testing::MockRobot;
//!
//! let robot = MockRobot::start().await?;
//! let client = robot.client()?;
//! client.stop().await?;
//! assert_eq!(robot.last_request("drive/stop").unwrap().method, "POST");
//! ```

mod api;
mod client;
pub mod config;
mod error;
pub mod events;
pub mod speech;
pub mod testing;
mod types;

pub use client::MistyClient;
pub use config::ClientConfig;
pub use error::{MistyClientError, Result};
pub use types::*;

// Re-export event types for convenience
pub use events::{EventMessage, EventPayload, EventSubscription, EventType, SubscriptionState};
pub use speech::SpeechSynthesizer;

// Request methods accepted by `MistyClient::request`
pub use reqwest::Method;
