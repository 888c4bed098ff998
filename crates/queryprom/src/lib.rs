//! Top-level facade crate for queryprom.
//!
//! Re-exports the engine primitives and the exporter library so users can depend on a single crate.

pub mod core {
    pub use queryprom_core::*;
}

pub mod exporter {
    pub use queryprom_exporter::*;
}
