//! Work-time policy engine
//!
//! This crate is the heart of worktimed, containing:
//! - The weekly enforcement window
//! - Per-entity exceptions, normalized from both storage shapes
//! - Toggle derivation and fleet aggregates
//! - The validator gating exception writes
//! - Effective policy and app decisions for a single device
//! - The store-backed service tying it together

mod apps;
mod effective;
mod evaluator;
mod exception;
mod schedule;
mod service;
mod validator;

pub use apps::*;
pub use effective::*;
pub use evaluator::*;
pub use exception::*;
pub use schedule::*;
pub use service::*;
pub use validator::*;
