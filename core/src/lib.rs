//! # Fibra Engine Core
//!
//! Core crate for the Fibra engine: the fiber-based job scheduler that drives
//! frame work across worker threads, and the profiling instrumentation shared
//! by every other crate.

pub mod jobs;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core crate banner.
pub fn init() {
    log::info!("Fibra Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
