//! # Subscription Dispatcher
//!
//! Keeps each connection's event subscriptions and delivers received events
//! to every matching one, in registration order.
//!
//! A subscription filters on a source service and optionally on an event
//! name. Subscriptions made without a callback of their own use the
//! connection's default callback as it stands at delivery time.

use crate::error::{constants, LipcError, Result};
use crate::protocol::event::Event;
use crate::protocol::property::Context;
use crate::service::Lipc;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Event callback: connection, event name, event view, subscription context
pub type EventCallback =
    Arc<dyn Fn(&Lipc, &str, &mut Event, Option<&Context>) -> Result<()> + Send + Sync + 'static>;

/// Callback bound to a subscription
#[derive(Clone)]
pub enum SubscriptionCallback {
    /// Whatever default callback is set when the event arrives
    Default,
    /// A callback of its own
    Extended(EventCallback),
}

impl SubscriptionCallback {
    pub fn extended<F>(callback: F) -> Self
    where
        F: Fn(&Lipc, &str, &mut Event, Option<&Context>) -> Result<()> + Send + Sync + 'static,
    {
        SubscriptionCallback::Extended(Arc::new(callback))
    }
}

/// One (service, optional event name) filter with its callback and context
pub struct Subscription {
    service: String,
    name: Option<String>,
    callback: SubscriptionCallback,
    context: Option<Context>,
}

impl Subscription {
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Event name filter; `None` matches every event of the service
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_default(&self) -> bool {
        matches!(self.callback, SubscriptionCallback::Default)
    }

    pub fn matches(&self, source: &str, name: &str) -> bool {
        self.service == source && self.name.as_deref().map_or(true, |n| n == name)
    }

    fn is_filter(&self, service: &str, name: Option<&str>) -> bool {
        self.service == service && self.name.as_deref() == name
    }

    /// Without a name only the service-wide default subscription is removable
    fn is_removable_by(&self, service: &str, name: Option<&str>) -> bool {
        self.is_filter(service, name) && (name.is_some() || self.is_default())
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("service", &self.service)
            .field("name", &self.name)
            .field("default", &self.is_default())
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

/// Outcome of delivering one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscriptions whose filter matched
    pub matched: usize,
    /// Callbacks actually run
    pub invoked: usize,
    /// Callbacks that returned an error
    pub failed: usize,
}

/// Routes received events to subscriptions in registration order.
///
/// The tables are snapshotted before any callback runs, so callbacks may
/// subscribe, unsubscribe or emit events of their own.
pub struct SubscriptionDispatcher {
    subscriptions: Arc<RwLock<Vec<Arc<Subscription>>>>,
    default_callback: Arc<RwLock<Option<EventCallback>>>,
}

impl Default for SubscriptionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionDispatcher {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            default_callback: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the callback used by subscriptions made without one
    pub fn set_default_callback(&self, callback: EventCallback) -> Result<()> {
        let mut slot = self
            .default_callback
            .write()
            .map_err(|_| LipcError::internal(constants::ERR_DISPATCHER_LOCK))?;
        *slot = Some(callback);
        Ok(())
    }

    pub fn subscribe(
        &self,
        service: &str,
        name: Option<&str>,
        callback: SubscriptionCallback,
        context: Option<Context>,
    ) -> Result<()> {
        if service.is_empty() {
            return Err(LipcError::invalid_arg("subscription service cannot be empty"));
        }
        if name.is_some_and(str::is_empty) {
            return Err(LipcError::invalid_arg("event name filter cannot be empty"));
        }

        let subscription = Arc::new(Subscription {
            service: service.to_string(),
            name: name.map(str::to_string),
            callback,
            context,
        });

        let mut subs = self
            .subscriptions
            .write()
            .map_err(|_| LipcError::internal(constants::ERR_DISPATCHER_LOCK))?;
        debug!(?subscription, "Subscribed");
        subs.push(subscription);
        Ok(())
    }

    /// Remove the earliest subscription with exactly this filter and return
    /// its context.
    ///
    /// With `name` set, default and extended subscriptions are both
    /// candidates. With no name, only a subscription served by the default
    /// callback is.
    pub fn unsubscribe(&self, service: &str, name: Option<&str>) -> Result<Option<Context>> {
        let mut subs = self
            .subscriptions
            .write()
            .map_err(|_| LipcError::internal(constants::ERR_DISPATCHER_LOCK))?;

        let pos = subs
            .iter()
            .position(|s| s.is_removable_by(service, name))
            .ok_or(LipcError::NoSuchSource)?;
        let removed = subs.remove(pos);
        debug!(service, ?name, "Unsubscribed");
        Ok(removed.context.clone())
    }

    pub fn is_subscribed(&self, service: &str, name: Option<&str>) -> bool {
        self.subscriptions
            .read()
            .map(|subs| subs.iter().any(|s| s.is_filter(service, name)))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscriptions matching an event, in registration order
    pub fn matching(&self, source: &str, name: &str) -> Result<Vec<Arc<Subscription>>> {
        let subs = self
            .subscriptions
            .read()
            .map_err(|_| LipcError::internal(constants::ERR_DISPATCHER_LOCK))?;
        Ok(subs
            .iter()
            .filter(|s| s.matches(source, name))
            .cloned()
            .collect())
    }

    /// Deliver `event` to every matching subscription.
    ///
    /// Callback errors are logged and counted; they never stop the batch.
    pub fn dispatch(&self, lipc: &Lipc, event: &Event) -> Result<DispatchReport> {
        let matches = self.matching(event.source(), event.name())?;
        let default = self
            .default_callback
            .read()
            .map_err(|_| LipcError::internal(constants::ERR_DISPATCHER_LOCK))?
            .clone();

        let mut report = DispatchReport {
            matched: matches.len(),
            ..DispatchReport::default()
        };

        for sub in matches {
            let callback = match &sub.callback {
                SubscriptionCallback::Extended(cb) => cb.clone(),
                SubscriptionCallback::Default => match &default {
                    Some(cb) => cb.clone(),
                    None => {
                        debug!(service = %sub.service, "No default callback set, skipping");
                        continue;
                    }
                },
            };

            let mut view = event.clone();
            view.rewind_params();
            let outcome = callback(lipc, event.name(), &mut view, sub.context.as_ref());

            report.invoked += 1;
            if let Err(e) = &outcome {
                report.failed += 1;
                warn!(
                    source = event.source(),
                    event = event.name(),
                    error = %e,
                    "Event callback failed"
                );
            }
            lipc.metrics().callback_invoked(outcome.is_err());
        }

        Ok(report)
    }
}
