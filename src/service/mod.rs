//! # Connection Handle
//!
//! [`Lipc`] is one connection to the bus, optionally registered under a
//! service name. It owns the connection's property registry and
//! subscription dispatcher and drives both from the inbound frame queue.
//!
//! ## Lifecycle
//! ```text
//! open ──► (register properties, subscribe) ──► run / dispatch_pending ──► close
//! ```
//! `Lipc` is a cheap-clone handle. Every clone refers to the same
//! connection; dropping the last one closes it. A running receive loop
//! holds a clone, so a connection with a loop spawned stays open until
//! [`Lipc::close`] is called.
//!
//! ## Dispatch Model
//! Inbound frames are handled one at a time and to completion. Callbacks
//! receive the connection as `&Lipc` and run with no internal lock held,
//! so they may emit events, read properties or change registrations.
//!
//! ## Example
//! ```rust,no_run
//! use lipc::{IntProperty, Lipc, LocalBus};
//!
//! # async fn demo() -> lipc::Result<()> {
//! let bus = LocalBus::new();
//! let server = Lipc::open(bus.shared(), "com.example.server")?;
//! server.register_property("volume", IntProperty::new().getter(|_| Ok(7)), None)?;
//! tokio::spawn({
//!     let server = server.clone();
//!     async move { server.run().await }
//! });
//!
//! let client = Lipc::open_no_name(bus.shared())?;
//! assert_eq!(client.get_int_property("com.example.server", "volume").await?, 7);
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::config::LipcConfig;
use crate::core::hasharray::HashArray;
use crate::error::{LipcError, Result};
use crate::protocol::dispatcher::SubscriptionDispatcher;
use crate::protocol::event::Event;
use crate::protocol::message::{
    Message, PropertyOp, PropertyOutcome, PropertyReply, PropertyRequest,
};
use crate::protocol::property::PropertyRegistry;
use crate::transport::{EndpointId, Transport};
use crate::utils::metrics::Metrics;

mod events;
mod properties;

struct Inner {
    transport: Arc<dyn Transport>,
    endpoint: EndpointId,
    service: Option<String>,
    config: LipcConfig,
    properties: PropertyRegistry,
    dispatcher: SubscriptionDispatcher,
    metrics: Metrics,
    inbound: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    closed: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            if let Err(e) = self.transport.disconnect(self.endpoint) {
                debug!(error = %e, "Disconnect on drop failed");
            }
        }
    }
}

/// A connection to the bus
#[derive(Clone)]
pub struct Lipc {
    inner: Arc<Inner>,
}

impl Lipc {
    /// Open a connection registered as `service`, with configuration from
    /// [`LipcConfig::load`]
    pub fn open(transport: Arc<dyn Transport>, service: &str) -> Result<Self> {
        Self::open_with_config(transport, Some(service), LipcConfig::load()?)
    }

    /// Open an anonymous connection. It can read and write properties of
    /// other services but cannot emit events.
    pub fn open_no_name(transport: Arc<dyn Transport>) -> Result<Self> {
        Self::open_with_config(transport, None, LipcConfig::load()?)
    }

    #[instrument(skip(transport, config))]
    pub fn open_with_config(
        transport: Arc<dyn Transport>,
        service: Option<&str>,
        config: LipcConfig,
    ) -> Result<Self> {
        config.validate_strict()?;
        let endpoint = transport.connect(service)?;

        info!(
            endpoint = endpoint.id,
            timeout_ms = config.access_timeout.as_millis() as u64,
            "Connection opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                endpoint: endpoint.id,
                service: endpoint.service,
                config,
                properties: PropertyRegistry::new(),
                dispatcher: SubscriptionDispatcher::new(),
                metrics: Metrics::new(),
                inbound: Mutex::new(endpoint.inbound),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Leave the bus. Every later operation on any clone fails with
    /// `InvalidHandle`.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(LipcError::InvalidHandle);
        }
        self.inner.transport.disconnect(self.inner.endpoint)?;
        self.inner.metrics.log_metrics();
        info!(service = ?self.inner.service, "Connection closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Registered service name; `None` for anonymous connections
    pub fn service_name(&self) -> Option<&str> {
        self.inner.service.as_deref()
    }

    /// Timeout applied to remote property access, fixed at open time
    pub fn prop_access_timeout(&self) -> Duration {
        self.inner.config.access_timeout
    }

    pub fn config(&self) -> &LipcConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Whether two handles refer to the same connection
    pub fn same_connection(&self, other: &Lipc) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create an empty hash-array
    pub fn new_hasharray(&self) -> Result<HashArray> {
        self.ensure_open()?;
        Ok(HashArray::new())
    }

    /// Receive loop: handle inbound frames until the connection is closed
    pub async fn run(&self) -> Result<()> {
        self.ensure_open()?;
        let mut inbound = self.inner.inbound.lock().await;
        debug!(service = ?self.inner.service, "Receive loop started");

        while let Some(frame) = inbound.recv().await {
            self.handle_frame(&frame);
        }

        debug!(service = ?self.inner.service, "Receive loop finished");
        Ok(())
    }

    /// Handle whatever is queued without waiting; returns the number of
    /// frames handled.
    ///
    /// Fails with `OperationNotAllowed` while [`Lipc::run`] is active or
    /// when called from inside a callback.
    pub fn dispatch_pending(&self) -> Result<usize> {
        self.ensure_open()?;
        let mut inbound = self
            .inner
            .inbound
            .try_lock()
            .map_err(|_| LipcError::OperationNotAllowed)?;

        let mut handled = 0;
        while let Ok(frame) = inbound.try_recv() {
            self.handle_frame(&frame);
            handled += 1;
        }
        Ok(handled)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(LipcError::InvalidHandle);
        }
        Ok(())
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn endpoint(&self) -> EndpointId {
        self.inner.endpoint
    }

    pub(crate) fn registry(&self) -> &PropertyRegistry {
        &self.inner.properties
    }

    pub(crate) fn dispatcher(&self) -> &SubscriptionDispatcher {
        &self.inner.dispatcher
    }

    fn handle_frame(&self, frame: &[u8]) {
        match Message::from_bytes(frame) {
            Ok(Message::PropertyRequest { id, request }) => {
                let outcome = self.serve_request(request);
                if let Err(e) = self.inner.transport.send_reply(PropertyReply { id, outcome }) {
                    warn!(request = id, error = %e, "Failed to send property reply");
                }
            }
            Ok(Message::Event(message)) => {
                self.inner.metrics.event_received();
                self.deliver(&Event::received(message));
            }
            Err(e) => warn!(error = %e, len = frame.len(), "Dropping undecodable frame"),
        }
    }

    fn serve_request(&self, request: PropertyRequest) -> PropertyOutcome {
        let PropertyRequest { property, op } = request;
        let result = match op {
            PropertyOp::Get(kind) => self.local_get(&property, kind).map(Some),
            PropertyOp::Set(value) => self.local_set(&property, value).map(|()| None),
        };
        result.map_err(|e| e.code())
    }

    pub(crate) fn deliver(&self, event: &Event) {
        match self.inner.dispatcher.dispatch(self, event) {
            Ok(report) => debug!(
                source = event.source(),
                event = event.name(),
                matched = report.matched,
                failed = report.failed,
                "Event dispatched"
            ),
            Err(e) => warn!(error = %e, "Event dispatch failed"),
        }
    }
}

impl fmt::Debug for Lipc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lipc")
            .field("service", &self.inner.service)
            .field("endpoint", &self.inner.endpoint)
            .field("closed", &self.is_closed())
            .finish()
    }
}
