//! Platform adapters implementing the catalog, reader and sink traits.

pub mod memory;

pub use memory::{furnace_detail, MemoryPlatform};
