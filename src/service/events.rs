//! Event emission and subscription on a connection.
//!
//! Emitting is fire-and-forget towards other connections. Subscriptions of
//! the emitting connection itself are served before `send_event` returns.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::value::Value;
use crate::error::{LipcError, Result};
use crate::protocol::dispatcher::SubscriptionCallback;
use crate::protocol::event::{self, Event, EventArg};
use crate::protocol::property::Context;
use crate::service::Lipc;

impl Lipc {
    /// Create an empty event sourced from this connection.
    ///
    /// Anonymous connections cannot emit events.
    pub fn new_event(&self, name: &str) -> Result<Event> {
        self.ensure_open()?;
        let service = self.service_name().ok_or(LipcError::OperationNotAllowed)?;
        if name.is_empty() {
            return Err(LipcError::invalid_arg("event name cannot be empty"));
        }
        Ok(Event::new(service, name))
    }

    /// Emit `event` to every other connection and to this connection's own
    /// matching subscriptions
    #[instrument(skip(self, event), fields(event = event.name()))]
    pub fn send_event(&self, event: &Event) -> Result<()> {
        self.ensure_open()?;
        let service = self.service_name().ok_or(LipcError::OperationNotAllowed)?;
        if event.source() != service {
            return Err(LipcError::invalid_arg(format!(
                "event from {:?} cannot be sent by {service:?}",
                event.source()
            )));
        }

        let message = event.to_message();
        let size = bincode::serialized_size(&message)? as usize;
        if size > self.config().max_payload_size {
            return Err(LipcError::ParamsSizeExceeded(size));
        }

        let delivered = self.transport().send_event(self.endpoint(), &message)?;
        self.inner.metrics.event_sent();
        debug!(delivered, size, "Event sent");

        self.deliver(&Event::received(message));
        Ok(())
    }

    /// Emit a parameterless event
    pub fn create_and_send_event(&self, name: &str) -> Result<()> {
        let event = self.new_event(name)?;
        self.send_event(&event)
    }

    /// Emit an event whose parameters are described by a `%d`/`%s` format
    /// string, e.g. `("changed", "%d%s", &[3.into(), "on".into()])`
    pub fn create_and_send_event_with_parameters(
        &self,
        name: &str,
        format: &str,
        args: &[EventArg<'_>],
    ) -> Result<()> {
        let params = event::build_params(format, args)?;
        let mut event = self.new_event(name)?;
        for param in params {
            match param {
                Value::Integer(v) => event.add_int_param(v)?,
                Value::Text(s) => event.add_string_param(&s)?,
                Value::Blob(_) => {
                    return Err(LipcError::invalid_arg("events cannot carry blobs"))
                }
            }
        }
        self.send_event(&event)
    }

    /// Set the callback serving subscriptions made with [`Lipc::subscribe`]
    pub fn set_event_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&Lipc, &str, &mut Event) -> Result<()> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.dispatcher()
            .set_default_callback(Arc::new(
                move |lipc: &Lipc, name: &str, event: &mut Event, _: Option<&Context>| {
                    callback(lipc, name, event)
                },
            ))
    }

    /// Receive every event of `service` through the default callback
    pub fn subscribe(&self, service: &str) -> Result<()> {
        self.ensure_open()?;
        self.dispatcher()
            .subscribe(service, None, SubscriptionCallback::Default, None)
    }

    /// Receive events of `service`, all of them or only `name`, through
    /// `callback` with `context`
    pub fn subscribe_ext<F>(
        &self,
        service: &str,
        name: Option<&str>,
        callback: F,
        context: Option<Context>,
    ) -> Result<()>
    where
        F: Fn(&Lipc, &str, &mut Event, Option<&Context>) -> Result<()> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.dispatcher().subscribe(
            service,
            name,
            SubscriptionCallback::extended(callback),
            context,
        )
    }

    /// Drop the service-wide subscription of `service`
    pub fn unsubscribe(&self, service: &str) -> Result<()> {
        self.unsubscribe_ext(service, None).map(|_| ())
    }

    /// Drop one subscription with exactly this filter and return its context
    pub fn unsubscribe_ext(&self, service: &str, name: Option<&str>) -> Result<Option<Context>> {
        self.ensure_open()?;
        self.dispatcher().unsubscribe(service, name)
    }
}
