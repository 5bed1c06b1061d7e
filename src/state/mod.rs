//! State module for tracking feed walks
//!
//! # Components
//!
//! - `WalkPhase`: the phase a feed walk is in (loading, scrolling, stalled, done)
//! - `StopReason`: why a finished walk ended

mod walk_state;

// Re-export main types
pub use walk_state::{StopReason, WalkPhase};
