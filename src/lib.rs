//! Workspace umbrella crate.
//!
//! Exposes feature flags mapping to the individual workspace crates
//! (`core-assembly`, `core-runtime`, `bridge-memory`). Host applications can
//! depend on `assembly-workspace` and enable the documented features without
//! wiring each crate individually.

#[cfg(feature = "engine")]
pub use core_assembly as assembly;
#[cfg(feature = "engine")]
pub use core_runtime as runtime;

#[cfg(feature = "in-memory")]
pub use bridge_memory as memory;
