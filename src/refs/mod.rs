//! Foreign object handles and the per-instance set that keeps them alive.

// Handles to foreign objects
mod handle;
pub use handle::*;

// Per-instance lifetime pinning
mod keeper;
pub use keeper::*;
