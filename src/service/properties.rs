//! Property access on a connection.
//!
//! Requests addressed to the connection's own service name are served from
//! its registry without touching the bus. Anything else is forwarded to the
//! owning service and bounded by the access timeout.

use tracing::{debug, instrument};

use crate::core::value::Value;
use crate::error::{LipcError, Result};
use crate::protocol::message::{PropertyOp, PropertyRequest};
use crate::protocol::property::{Context, PropertyHandler, PropertyKind, PROPERTIES_PSEUDO};
use crate::service::Lipc;
use crate::utils::metrics::Timer;

impl Lipc {
    pub async fn get_int_property(&self, service: &str, property: &str) -> Result<i32> {
        match self.get_property(service, property, PropertyKind::Integer).await? {
            Value::Integer(v) => Ok(v),
            other => Err(unexpected_reply(property, &other)),
        }
    }

    pub async fn set_int_property(&self, service: &str, property: &str, value: i32) -> Result<()> {
        self.set_property(service, property, Value::Integer(value))
            .await
    }

    pub async fn get_string_property(&self, service: &str, property: &str) -> Result<String> {
        match self.get_property(service, property, PropertyKind::String).await? {
            Value::Text(s) => Ok(s),
            other => Err(unexpected_reply(property, &other)),
        }
    }

    pub async fn set_string_property(
        &self,
        service: &str,
        property: &str,
        value: &str,
    ) -> Result<()> {
        self.set_property(service, property, Value::Text(value.to_string()))
            .await
    }

    /// Listing of every property `service` exposes, as
    /// `"<name> <Int|Str> <r|w|rw> "` tokens, most recently registered first
    pub async fn get_properties(&self, service: &str) -> Result<String> {
        self.get_string_property(service, PROPERTIES_PSEUDO).await
    }

    /// Register a property served by this connection. A previous
    /// registration under `name` is replaced and its context dropped.
    pub fn register_property(
        &self,
        name: &str,
        handler: impl Into<PropertyHandler>,
        context: Option<Context>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.registry().register(name, handler, context)
    }

    /// Remove a property and return the context it was registered with
    pub fn unregister_property(&self, name: &str) -> Result<Option<Context>> {
        self.ensure_open()?;
        self.registry().unregister(name)
    }

    #[instrument(skip(self), level = "debug")]
    async fn get_property(
        &self,
        service: &str,
        property: &str,
        kind: PropertyKind,
    ) -> Result<Value> {
        self.ensure_open()?;
        if self.is_local(service) {
            return self.local_get(property, kind);
        }

        self.inner.metrics.property_get();
        let value = self
            .remote(
                service,
                PropertyRequest {
                    property: property.to_string(),
                    op: PropertyOp::Get(kind),
                },
            )
            .await?;
        value.ok_or_else(|| LipcError::internal(format!("empty reply for {property:?}")))
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_property(&self, service: &str, property: &str, value: Value) -> Result<()> {
        self.ensure_open()?;
        if self.is_local(service) {
            return self.local_set(property, value);
        }

        self.inner.metrics.property_set();
        self.remote(
            service,
            PropertyRequest {
                property: property.to_string(),
                op: PropertyOp::Set(value),
            },
        )
        .await
        .map(|_| ())
    }

    async fn remote(&self, service: &str, request: PropertyRequest) -> Result<Option<Value>> {
        let _timer = Timer::start("remote_property_access");
        self.inner.metrics.remote_request();

        let result = self
            .transport()
            .send_property_request(
                self.endpoint(),
                service,
                request,
                self.prop_access_timeout(),
            )
            .await;

        if let Err(e) = &result {
            self.inner.metrics.property_error();
            if matches!(e, LipcError::Timeout) {
                self.inner.metrics.remote_timeout();
            }
            debug!(service, error = %e, "Remote property access failed");
        }
        result
    }

    fn is_local(&self, service: &str) -> bool {
        self.service_name() == Some(service)
    }

    pub(crate) fn local_get(&self, property: &str, kind: PropertyKind) -> Result<Value> {
        self.inner.metrics.property_get();
        let result = self.registry().read(self, property, kind);
        if result.is_err() {
            self.inner.metrics.property_error();
        }
        result
    }

    pub(crate) fn local_set(&self, property: &str, value: Value) -> Result<()> {
        self.inner.metrics.property_set();
        let result = self.registry().write(self, property, value);
        if result.is_err() {
            self.inner.metrics.property_error();
        }
        result
    }
}

fn unexpected_reply(property: &str, value: &Value) -> LipcError {
    LipcError::internal(format!(
        "property {property:?} answered with a {} value",
        value.kind()
    ))
}
