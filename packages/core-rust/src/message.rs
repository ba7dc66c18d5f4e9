//! Message model: the payload half of an [`Exchange`](crate::Exchange).
//!
//! Messages form a closed set of variants. Most inbound endpoints produce a
//! [`DefaultMessage`]; broker endpoints produce a [`BrokerMessage`] whose
//! headers are materialized from the broker delivery rather than owned by the
//! message, which changes how the message may be copied.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::exchange::ExchangeId;
use crate::types::Value;

/// Header map of a message. Ordered for deterministic iteration.
pub type Headers = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// DefaultMessage
// ---------------------------------------------------------------------------

/// Plain message owning its body and headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultMessage {
    body: Value,
    headers: Headers,
    exchange_id: Option<ExchangeId>,
}

impl DefaultMessage {
    /// Creates a message with the given body and no headers.
    #[must_use]
    pub fn new(body: impl Into<Value>) -> Self {
        Self {
            body: body.into(),
            headers: Headers::new(),
            exchange_id: None,
        }
    }

    /// Creates a message from a body and a full header map.
    #[must_use]
    pub fn from_parts(body: Value, headers: Headers) -> Self {
        Self {
            body,
            headers,
            exchange_id: None,
        }
    }

    /// Builder-style header insertion.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// BrokerMessage
// ---------------------------------------------------------------------------

/// Broker delivery a [`BrokerMessage`] was read from.
///
/// Holds the headers exactly as the broker delivered them. The session is
/// shared between a message and any copies made from it.
#[derive(Debug, PartialEq)]
pub struct BrokerSession {
    /// Destination (queue or topic) the delivery came from.
    pub destination: String,
    /// Broker-assigned delivery tag, used for acknowledgement.
    pub delivery_tag: u64,
    /// Headers as delivered by the broker.
    pub delivered_headers: Headers,
}

/// Message bound to a broker delivery.
///
/// Headers are materialized from the [`BrokerSession`] when the message is
/// created. A structural copy re-materializes them from the session, so
/// headers set on the live message after delivery are not carried over.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerMessage {
    body: Value,
    headers: Headers,
    session: Arc<BrokerSession>,
    exchange_id: Option<ExchangeId>,
}

impl BrokerMessage {
    /// Creates a message for a delivery, materializing the delivered headers.
    #[must_use]
    pub fn new(body: impl Into<Value>, session: Arc<BrokerSession>) -> Self {
        Self {
            body: body.into(),
            headers: session.delivered_headers.clone(),
            session,
            exchange_id: None,
        }
    }

    /// The broker delivery this message belongs to.
    #[must_use]
    pub fn session(&self) -> &Arc<BrokerSession> {
        &self.session
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A message travelling inside an exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Plain, self-contained message.
    Default(DefaultMessage),
    /// Message bound to a broker delivery.
    Broker(BrokerMessage),
}

impl Message {
    /// Returns the message body.
    #[must_use]
    pub fn body(&self) -> &Value {
        match self {
            Self::Default(m) => &m.body,
            Self::Broker(m) => &m.body,
        }
    }

    /// Replaces the message body.
    pub fn set_body(&mut self, body: impl Into<Value>) {
        let body = body.into();
        match self {
            Self::Default(m) => m.body = body,
            Self::Broker(m) => m.body = body,
        }
    }

    /// Returns all headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        match self {
            Self::Default(m) => &m.headers,
            Self::Broker(m) => &m.headers,
        }
    }

    fn headers_mut(&mut self) -> &mut Headers {
        match self {
            Self::Default(m) => &mut m.headers,
            Self::Broker(m) => &mut m.headers,
        }
    }

    /// Looks up a single header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers().get(name)
    }

    /// Sets a header, returning the previous value if any.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.headers_mut().insert(name.into(), value.into())
    }

    /// Removes a header, returning its value if it was present.
    pub fn remove_header(&mut self, name: &str) -> Option<Value> {
        self.headers_mut().remove(name)
    }

    /// Id of the exchange this message is bound to.
    #[must_use]
    pub fn exchange_id(&self) -> Option<&ExchangeId> {
        match self {
            Self::Default(m) => m.exchange_id.as_ref(),
            Self::Broker(m) => m.exchange_id.as_ref(),
        }
    }

    /// Binds this message to an exchange.
    pub fn bind_exchange(&mut self, id: ExchangeId) {
        match self {
            Self::Default(m) => m.exchange_id = Some(id),
            Self::Broker(m) => m.exchange_id = Some(id),
        }
    }

    /// Whether [`Message::copy`] reproduces the current body and headers.
    ///
    /// Broker messages re-read their headers from the delivery when copied.
    #[must_use]
    pub fn supports_structural_copy(&self) -> bool {
        matches!(self, Self::Default(_))
    }

    /// Copies the message, keeping its variant.
    #[must_use]
    pub fn copy(&self) -> Self {
        match self {
            Self::Default(m) => Self::Default(m.clone()),
            Self::Broker(m) => Self::Broker(BrokerMessage::new(
                m.body.clone(),
                Arc::clone(&m.session),
            )),
        }
    }

    /// Takes a snapshot whose body and headers equal the current ones.
    ///
    /// Uses [`Message::copy`] when the variant supports a structural copy and
    /// otherwise lifts body and headers into a [`DefaultMessage`].
    #[must_use]
    pub fn snapshot(&self) -> Self {
        if self.supports_structural_copy() {
            self.copy()
        } else {
            Self::Default(DefaultMessage::from_parts(
                self.body().clone(),
                self.headers().clone(),
            ))
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::Default(DefaultMessage::default())
    }
}

impl From<DefaultMessage> for Message {
    fn from(message: DefaultMessage) -> Self {
        Self::Default(message)
    }
}

impl From<BrokerMessage> for Message {
    fn from(message: BrokerMessage) -> Self {
        Self::Broker(message)
    }
}
