//! HTTP handlers for resource operations and the configuration document.

pub mod config;
pub mod entity;
pub use config::*;
pub use entity::*;
