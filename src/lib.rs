//! # lipc
//!
//! Device-local IPC core. Services expose typed properties backed by
//! getter/setter callbacks, emit ordered parameterized events to
//! subscribers, and exchange hash-arrays: persistable arrays of ordered
//! key/value maps.
//!
//! ## Modules
//! - [`core`](crate::core): values, their codec and the [`HashArray`] container
//! - [`protocol`]: property registry, events, subscription dispatcher, bus messages
//! - [`service`]: the [`Lipc`] connection handle
//! - [`transport`]: the bus boundary and the in-process [`LocalBus`]
//! - [`config`], [`error`], [`utils`]: configuration, status codes, logging and metrics
//!
//! ## Quick Start
//! ```rust
//! use lipc::{Lipc, LipcConfig, LocalBus, StringProperty};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> lipc::Result<()> {
//! let bus = LocalBus::new();
//! let lipc = Lipc::open_with_config(bus.shared(), Some("com.example"), LipcConfig::default())?;
//!
//! lipc.register_property(
//!     "greeting",
//!     StringProperty::new().getter(|_, buf| buf.write("hello")),
//!     None,
//! )?;
//! assert_eq!(lipc.get_string_property("com.example", "greeting").await?, "hello");
//! assert_eq!(lipc.get_properties("com.example").await?, "greeting Str r ");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::{LipcConfig, LoggingConfig};
pub use crate::core::hasharray::HashArray;
pub use crate::core::value::{Value, ValueKind};
pub use error::{LipcCode, LipcError, Result};
pub use protocol::event::{Event, EventArg};
pub use protocol::property::{
    AccessMode, Context, IntProperty, PropertyCall, PropertyKind, StringBuffer, StringProperty,
};
pub use service::Lipc;
pub use transport::local::LocalBus;
pub use transport::Transport;
pub use utils::logging::{init_logging, LogMask};
