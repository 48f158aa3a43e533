//! In-process message bus.
//!
//! Every connection opened on the same [`LocalBus`] can reach the others by
//! service name. Frames are bincode-encoded and queued on unbounded tokio
//! channels; property replies resolve oneshot slots held by the bus.

use bytes::Bytes;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use crate::core::value::Value;
use crate::error::{constants, LipcError, Result};
use crate::protocol::message::{EventMessage, Message, PropertyReply, PropertyRequest};
use crate::transport::{validate_service_name, Endpoint, EndpointId, Transport};
use crate::utils::timeout::with_timeout_error;

struct Route {
    service: Option<String>,
    tx: mpsc::UnboundedSender<Bytes>,
}

#[derive(Default)]
struct Routes {
    endpoints: HashMap<EndpointId, Route>,
    services: HashMap<String, EndpointId>,
}

#[derive(Default)]
struct BusState {
    routes: Mutex<Routes>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Bytes>>>,
    next_endpoint: AtomicU64,
    next_request: AtomicU64,
}

impl BusState {
    fn forget_pending(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }
}

/// Shared in-process bus; clones refer to the same bus
#[derive(Clone, Default)]
pub struct LocalBus {
    state: Arc<BusState>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the bus for `Lipc::open*`
    pub fn shared(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Registered service names, sorted
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .routes
            .lock()
            .map(|r| r.services.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn endpoint_count(&self) -> usize {
        self.state
            .routes
            .lock()
            .map(|r| r.endpoints.len())
            .unwrap_or(0)
    }

    /// Requests still waiting for a reply
    pub fn pending_requests(&self) -> usize {
        self.state.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBus")
            .field("services", &self.services())
            .field("endpoints", &self.endpoint_count())
            .finish()
    }
}

impl Transport for LocalBus {
    #[instrument(skip(self))]
    fn connect(&self, service: Option<&str>) -> Result<Endpoint> {
        if let Some(name) = service {
            validate_service_name(name)?;
        }

        let mut routes = self
            .state
            .routes
            .lock()
            .map_err(|_| LipcError::internal(constants::ERR_BUS_LOCK))?;

        if let Some(name) = service {
            if routes.services.contains_key(name) {
                return Err(LipcError::DuplicateServiceName(name.to_string()));
            }
        }

        let id = self.state.next_endpoint.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, inbound) = mpsc::unbounded_channel();
        routes.endpoints.insert(
            id,
            Route {
                service: service.map(str::to_string),
                tx,
            },
        );
        if let Some(name) = service {
            routes.services.insert(name.to_string(), id);
        }

        info!(endpoint = id, "Endpoint connected");
        Ok(Endpoint {
            id,
            service: service.map(str::to_string),
            inbound,
        })
    }

    fn disconnect(&self, id: EndpointId) -> Result<()> {
        let mut routes = self
            .state
            .routes
            .lock()
            .map_err(|_| LipcError::internal(constants::ERR_BUS_LOCK))?;

        let route = routes.endpoints.remove(&id).ok_or(LipcError::InvalidHandle)?;
        if let Some(name) = &route.service {
            routes.services.remove(name);
        }
        info!(endpoint = id, service = ?route.service, "Endpoint disconnected");
        Ok(())
    }

    fn send_property_request(
        &self,
        from: EndpointId,
        target: &str,
        request: PropertyRequest,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<Option<Value>>> {
        let state = self.state.clone();
        let target = target.to_string();

        Box::pin(async move {
            let id = state.next_request.fetch_add(1, Ordering::Relaxed) + 1;
            let (reply_tx, reply_rx) = oneshot::channel();

            {
                let routes = state
                    .routes
                    .lock()
                    .map_err(|_| LipcError::internal(constants::ERR_BUS_LOCK))?;
                let route = routes
                    .services
                    .get(&target)
                    .and_then(|ep| routes.endpoints.get(ep))
                    .ok_or(LipcError::NoSuchSource)?;

                let frame = Message::PropertyRequest { id, request }.to_bytes()?;
                state
                    .pending
                    .lock()
                    .map_err(|_| LipcError::internal(constants::ERR_BUS_LOCK))?
                    .insert(id, reply_tx);
                if route.tx.send(Bytes::from(frame)).is_err() {
                    state.forget_pending(id);
                    return Err(LipcError::NoSuchSource);
                }
            }
            debug!(from, request = id, target = %target, "Property request queued");

            let waited = with_timeout_error(
                async {
                    reply_rx
                        .await
                        .map_err(|_| LipcError::internal(constants::ERR_REPLY_DROPPED))
                },
                timeout,
            )
            .await;

            let bytes = match waited {
                Ok(bytes) => bytes,
                Err(e) => {
                    state.forget_pending(id);
                    return Err(e);
                }
            };

            let reply = PropertyReply::from_bytes(&bytes)?;
            reply.outcome.map_err(LipcError::from)
        })
    }

    fn send_reply(&self, reply: PropertyReply) -> Result<()> {
        let slot = self
            .state
            .pending
            .lock()
            .map_err(|_| LipcError::internal(constants::ERR_BUS_LOCK))?
            .remove(&reply.id);

        match slot {
            Some(tx) => {
                let frame = reply.to_bytes()?;
                if tx.send(Bytes::from(frame)).is_err() {
                    warn!(request = reply.id, "Requester went away before the reply");
                }
            }
            None => warn!(request = reply.id, "Dropping reply to an expired request"),
        }
        Ok(())
    }

    fn send_event(&self, from: EndpointId, event: &EventMessage) -> Result<usize> {
        let frame = Bytes::from(Message::Event(event.clone()).to_bytes()?);

        let routes = self
            .state
            .routes
            .lock()
            .map_err(|_| LipcError::internal(constants::ERR_BUS_LOCK))?;

        let mut delivered = 0;
        for (id, route) in routes.endpoints.iter() {
            if *id == from {
                continue;
            }
            if route.tx.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(endpoint = id, "{}", constants::ERR_ENDPOINT_GONE);
            }
        }
        debug!(from, event = %event.name, delivered, "Event broadcast");
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::LipcCode;
    use crate::protocol::message::PropertyOp;
    use crate::protocol::property::PropertyKind;

    #[test]
    fn test_duplicate_service_rejected() {
        let bus = LocalBus::new();
        let _first = bus.connect(Some("com.example")).unwrap();
        assert!(matches!(
            bus.connect(Some("com.example")),
            Err(LipcError::DuplicateServiceName(_))
        ));
        assert!(bus.connect(None).is_ok());
        assert_eq!(bus.services(), vec!["com.example".to_string()]);
    }

    #[test]
    fn test_disconnect_releases_name() {
        let bus = LocalBus::new();
        let ep = bus.connect(Some("com.example")).unwrap();
        bus.disconnect(ep.id).unwrap();
        assert!(bus.services().is_empty());
        assert!(bus.connect(Some("com.example")).is_ok());
        assert!(matches!(bus.disconnect(ep.id), Err(LipcError::InvalidHandle)));
    }

    #[tokio::test]
    async fn test_request_to_unknown_service() {
        let bus = LocalBus::new();
        let ep = bus.connect(None).unwrap();
        let request = PropertyRequest {
            property: "p".into(),
            op: PropertyOp::Get(PropertyKind::Integer),
        };
        let result = bus
            .send_property_request(ep.id, "com.nobody", request, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(LipcError::NoSuchSource)));
    }

    #[tokio::test]
    async fn test_reply_resolves_request() {
        let bus = LocalBus::new();
        let client = bus.connect(None).unwrap();
        let mut server = bus.connect(Some("com.server")).unwrap();

        let request = PropertyRequest {
            property: "p".into(),
            op: PropertyOp::Get(PropertyKind::Integer),
        };
        let pending =
            bus.send_property_request(client.id, "com.server", request, Duration::from_secs(1));

        let responder = {
            let bus = bus.clone();
            tokio::spawn(async move {
                let frame = server.inbound.recv().await.expect("request frame");
                match Message::from_bytes(&frame).unwrap() {
                    Message::PropertyRequest { id, .. } => bus
                        .send_reply(PropertyReply {
                            id,
                            outcome: Err(LipcCode::AccessNotAllowed),
                        })
                        .unwrap(),
                    other => panic!("unexpected frame {other:?}"),
                }
            })
        };

        assert!(matches!(pending.await, Err(LipcError::AccessNotAllowed)));
        responder.await.unwrap();
        assert_eq!(bus.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_timeout_clears_pending_slot() {
        let bus = LocalBus::new();
        let client = bus.connect(None).unwrap();
        let _silent = bus.connect(Some("com.silent")).unwrap();

        let request = PropertyRequest {
            property: "p".into(),
            op: PropertyOp::Get(PropertyKind::String),
        };
        let result = bus
            .send_property_request(client.id, "com.silent", request, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(LipcError::Timeout)));
        assert_eq!(bus.pending_requests(), 0);
    }

    #[test]
    fn test_event_skips_sender() {
        let bus = LocalBus::new();
        let sender = bus.connect(Some("com.sender")).unwrap();
        let mut other = bus.connect(None).unwrap();

        let event = EventMessage {
            source: "com.sender".into(),
            name: "ping".into(),
            params: vec![],
        };
        assert_eq!(bus.send_event(sender.id, &event).unwrap(), 1);

        let frame = other.inbound.try_recv().unwrap();
        assert_eq!(Message::from_bytes(&frame).unwrap(), Message::Event(event));
    }
}
