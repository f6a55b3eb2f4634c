//! Integration test suite for the coroutine bridge
//!
//! This crate provides integration tests that verify the host loop, the
//! bridge and the demo CLI work together across component boundaries.

/// Re-export components for test convenience
pub mod components {
    pub use async_runtime;
    pub use core_types;
    pub use coro_bridge;
    pub use coro_cli;
}
