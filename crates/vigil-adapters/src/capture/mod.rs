//! Capture backend implementations

mod synthetic;

pub use synthetic::{SyntheticBackend, SyntheticConfig};
