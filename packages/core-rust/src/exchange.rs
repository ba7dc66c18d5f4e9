//! The exchange: one message in flight through the routing pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::route::RouteId;
use crate::traits::Synchronization;
use crate::types::Value;

/// Exchange property: creation time in milliseconds since the Unix epoch.
pub const CREATED_TIMESTAMP: &str = "RelayCreatedTimestamp";

/// Exchange property: whether the source endpoint redelivered the message.
pub const EXTERNAL_REDELIVERED: &str = "RelayExternalRedelivered";

/// Message header: correlation id shared by every copy of a logical message.
pub const BREADCRUMB_ID: &str = "breadcrumbId";

/// Unique identifier of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExchangeId(pub String);

impl ExchangeId {
    /// Borrows the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ExchangeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One message in flight.
///
/// Owns the inbound message, a property bag and the failure state. While no
/// unit of work is attached, completion callbacks registered through
/// [`Exchange::add_on_completion`] are parked on the exchange and picked up
/// when the unit of work is created.
#[derive(Debug)]
pub struct Exchange {
    id: ExchangeId,
    message: Message,
    properties: BTreeMap<String, Value>,
    external_redelivered: Option<bool>,
    failure: Option<String>,
    from_route: Option<RouteId>,
    on_completions: Vec<Arc<dyn Synchronization>>,
}

impl Exchange {
    /// Creates an exchange around `message`, binding the message to it.
    #[must_use]
    pub fn new(id: impl Into<ExchangeId>, message: impl Into<Message>) -> Self {
        let id = id.into();
        let mut message = message.into();
        message.bind_exchange(id.clone());
        Self {
            id,
            message,
            properties: BTreeMap::new(),
            external_redelivered: None,
            failure: None,
            from_route: None,
            on_completions: Vec::new(),
        }
    }

    /// The exchange id.
    #[must_use]
    pub fn id(&self) -> &ExchangeId {
        &self.id
    }

    /// The inbound message.
    #[must_use]
    pub fn in_message(&self) -> &Message {
        &self.message
    }

    /// Mutable access to the inbound message.
    pub fn in_message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    /// Replaces the inbound message, binding the new one to this exchange.
    pub fn set_in_message(&mut self, message: impl Into<Message>) {
        let mut message = message.into();
        message.bind_exchange(self.id.clone());
        self.message = message;
    }

    /// Looks up a property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a property, returning the previous value if any.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// Removes a property, returning its value if it was present.
    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// All properties.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Redelivery flag as reported by the source endpoint. `None` when the
    /// endpoint cannot tell (non-transactional sources).
    #[must_use]
    pub fn external_redelivered(&self) -> Option<bool> {
        self.external_redelivered
    }

    /// Records the redelivery flag reported by the source endpoint.
    pub fn set_external_redelivered(&mut self, redelivered: bool) {
        self.external_redelivered = Some(redelivered);
    }

    /// Creation time in epoch millis, once stamped.
    #[must_use]
    pub fn created_timestamp(&self) -> Option<i64> {
        self.property(CREATED_TIMESTAMP).and_then(Value::as_i64)
    }

    /// Whether processing failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Failure description, if processing failed.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Marks the exchange as failed.
    pub fn set_failure(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    /// Clears the failure state (e.g., after an error handler recovered).
    pub fn clear_failure(&mut self) -> Option<String> {
        self.failure.take()
    }

    /// Route that first consumed this exchange.
    #[must_use]
    pub fn from_route(&self) -> Option<&RouteId> {
        self.from_route.as_ref()
    }

    /// Records the route that first consumed this exchange.
    pub fn set_from_route(&mut self, route: RouteId) {
        self.from_route = Some(route);
    }

    /// Parks a completion callback until a unit of work is attached.
    pub fn add_on_completion(&mut self, synchronization: Arc<dyn Synchronization>) {
        self.on_completions.push(synchronization);
    }

    /// Removes and returns every parked completion callback, in insertion order.
    pub fn take_on_completions(&mut self) -> Vec<Arc<dyn Synchronization>> {
        std::mem::take(&mut self.on_completions)
    }

    /// Parked completion callbacks.
    #[must_use]
    pub fn on_completions(&self) -> &[Arc<dyn Synchronization>] {
        &self.on_completions
    }
}
