//! Vigil Adapters - Infrastructure implementations
//!
//! Concrete implementations of the ports defined in vigil-core: a synthetic
//! capture backend and the process terminators used on escalation.

pub mod capture;
pub mod terminator;

// Re-export primary adapter types
pub use capture::{SyntheticBackend, SyntheticConfig};
pub use terminator::{ExitCodeReceiver, ProcessExitTerminator, ShutdownTerminator};
