//! Shared utilities for the work-time engine
//!
//! This crate provides:
//! - ID types (EntityId)
//! - Time primitives (TimeOfDay, DateValue, mockable wall clock)
//! - The typed day-of-week set used on the wire
//! - Error types
//! - Default paths for config and data directories

mod days;
mod error;
mod ids;
mod paths;
mod time;

pub use days::*;
pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
