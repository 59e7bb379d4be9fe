//! Convenience wrappers over the Misty REST API, one module per API category
//!
//! Each module adds methods to [`MistyClient`](crate::MistyClient).

mod asset;
mod movement;
mod navigation;
mod skills;
mod system;
