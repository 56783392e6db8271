//! Wire records for the work-time engine
//!
//! This crate defines the shapes exchanged with the storage/REST layer:
//! - Global policy, per-entity and exception records
//! - Exception write requests
//! - Evaluated views and the fleet summary
//! - The `{status, data, message}` response envelope

mod response;
mod types;

pub use response::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
