//! # Protocol Layer
//!
//! Per-connection protocol state: the property registry, events and the
//! subscription dispatcher, plus the messages that carry them over the bus.
//!
//! ## Components
//! - **Property**: typed getter/setter registry with string buffer renegotiation
//! - **Event**: parameter list with cursor reads and the `%d`/`%s` format builder
//! - **Dispatcher**: subscription filters and in-order callback delivery
//! - **Message**: bincode frames exchanged between connections
//!
//! ## Message Flow
//! ```text
//! get/set ──► local? ──yes──► PropertyRegistry ──► getter/setter
//!                │
//!                no ──► Transport ──► remote run loop ──► PropertyRegistry
//!
//! send_event ──► Transport (other connections) ──► SubscriptionDispatcher
//!           └──► own SubscriptionDispatcher (before returning)
//! ```

pub mod dispatcher;
pub mod event;
pub mod message;
pub mod property;
