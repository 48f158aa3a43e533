//! # Core Value Components
//!
//! Value types, their byte codec, and the hash-array container.
//!
//! These components have no dependency on connections or the bus: a
//! [`hasharray::HashArray`] can be built, persisted and restored on its own.
//!
//! ## Components
//! - **Value**: tagged integer/text/blob union with size introspection
//! - **Codec**: bounds-checked payload encoding over `bytes` buffers
//! - **HashArray**: shared, persistable array of ordered key/value maps

pub mod codec;
pub mod hasharray;
pub mod value;
