use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a route within a routing context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId(pub String);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A route as seen by components that observe routing: its identity and
/// the endpoint it consumes from. Dispatch itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Unique route id.
    pub id: RouteId,
    /// URI of the endpoint feeding this route (e.g., `direct:billing`).
    pub endpoint_uri: String,
}

impl Route {
    /// Creates a route description.
    #[must_use]
    pub fn new(id: impl Into<String>, endpoint_uri: impl Into<String>) -> Self {
        Self {
            id: RouteId(id.into()),
            endpoint_uri: endpoint_uri.into(),
        }
    }
}
