//! Session memory implementations for ANMI.

pub mod in_memory;

pub use in_memory::InMemorySessionStore;
