//! Exchange lifecycle event notification.
//!
//! Defines [`EventNotifier`] for reacting to exchange creation and
//! completion, and [`CompositeEventNotifier`] which fans out notifications to
//! multiple notifiers. Notification is fire-and-forget: the unit of work
//! isolates any failure through [`best_effort`](crate::observer::best_effort).

use std::sync::Arc;

use relay_core::Exchange;

use crate::observer::{best_effort, ObserverKind};

/// Exchange lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeEventKind {
    /// A unit of work was created for the exchange.
    Created,
    /// The exchange completed successfully.
    Completed,
    /// The exchange completed with a failure.
    Failed,
}

/// Observer for exchange lifecycle events.
///
/// Used as `Arc<dyn EventNotifier>`.
pub trait EventNotifier: Send + Sync {
    /// Called once a unit of work has been created for `exchange`.
    fn notify_created(&self, exchange: &Exchange) -> anyhow::Result<()>;

    /// Called when `exchange` completed successfully.
    fn notify_done(&self, exchange: &Exchange) -> anyhow::Result<()>;

    /// Called when `exchange` completed with a failure.
    fn notify_failed(&self, exchange: &Exchange) -> anyhow::Result<()>;

    /// Lets a notifier opt out of individual event kinds.
    fn is_enabled(&self, _event: ExchangeEventKind) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// NoopEventNotifier
// ---------------------------------------------------------------------------

/// Notifier that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventNotifier;

impl EventNotifier for NoopEventNotifier {
    fn notify_created(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        Ok(())
    }

    fn notify_done(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        Ok(())
    }

    fn notify_failed(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_enabled(&self, _event: ExchangeEventKind) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// CompositeEventNotifier
// ---------------------------------------------------------------------------

/// Composite notifier that fans out to multiple notifiers.
///
/// Each notifier is called through the best-effort wrapper, so a failing
/// notifier does not prevent the remaining ones from seeing the event.
#[derive(Default)]
pub struct CompositeEventNotifier {
    notifiers: Vec<Arc<dyn EventNotifier>>,
}

impl CompositeEventNotifier {
    /// Creates a composite notifier with the given list of notifiers.
    #[must_use]
    pub fn new(notifiers: Vec<Arc<dyn EventNotifier>>) -> Self {
        Self { notifiers }
    }

    /// Adds a notifier after construction.
    pub fn add(&mut self, notifier: Arc<dyn EventNotifier>) {
        self.notifiers.push(notifier);
    }

    fn fan_out(
        &self,
        event: ExchangeEventKind,
        exchange: &Exchange,
        call: impl Fn(&dyn EventNotifier) -> anyhow::Result<()>,
    ) {
        for notifier in &self.notifiers {
            if notifier.is_enabled(event) {
                best_effort(ObserverKind::EventNotification, exchange.id(), || {
                    call(notifier.as_ref())
                });
            }
        }
    }
}

impl EventNotifier for CompositeEventNotifier {
    fn notify_created(&self, exchange: &Exchange) -> anyhow::Result<()> {
        self.fan_out(ExchangeEventKind::Created, exchange, |n| {
            n.notify_created(exchange)
        });
        Ok(())
    }

    fn notify_done(&self, exchange: &Exchange) -> anyhow::Result<()> {
        self.fan_out(ExchangeEventKind::Completed, exchange, |n| {
            n.notify_done(exchange)
        });
        Ok(())
    }

    fn notify_failed(&self, exchange: &Exchange) -> anyhow::Result<()> {
        self.fan_out(ExchangeEventKind::Failed, exchange, |n| {
            n.notify_failed(exchange)
        });
        Ok(())
    }

    fn is_enabled(&self, event: ExchangeEventKind) -> bool {
        self.notifiers.iter().any(|n| n.is_enabled(event))
    }
}

// ---------------------------------------------------------------------------
// LoggingEventNotifier
// ---------------------------------------------------------------------------

/// Logs every lifecycle event at `debug` (`warn` for failures).
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventNotifier;

impl EventNotifier for LoggingEventNotifier {
    fn notify_created(&self, exchange: &Exchange) -> anyhow::Result<()> {
        tracing::debug!(exchange_id = %exchange.id(), "exchange created");
        Ok(())
    }

    fn notify_done(&self, exchange: &Exchange) -> anyhow::Result<()> {
        tracing::debug!(exchange_id = %exchange.id(), "exchange completed");
        Ok(())
    }

    fn notify_failed(&self, exchange: &Exchange) -> anyhow::Result<()> {
        tracing::warn!(
            exchange_id = %exchange.id(),
            failure = exchange.failure().unwrap_or_default(),
            "exchange failed"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MetricsEventNotifier
// ---------------------------------------------------------------------------

/// Counter of created exchanges.
pub const EXCHANGES_CREATED_METRIC: &str = "relay_exchanges_created_total";
/// Counter of successfully completed exchanges.
pub const EXCHANGES_COMPLETED_METRIC: &str = "relay_exchanges_completed_total";
/// Counter of failed exchanges.
pub const EXCHANGES_FAILED_METRIC: &str = "relay_exchanges_failed_total";

/// Records lifecycle events as `metrics` counters labelled by context name.
#[derive(Debug, Clone)]
pub struct MetricsEventNotifier {
    context: String,
}

impl MetricsEventNotifier {
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

impl EventNotifier for MetricsEventNotifier {
    fn notify_created(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        metrics::counter!(EXCHANGES_CREATED_METRIC, "context" => self.context.clone()).increment(1);
        Ok(())
    }

    fn notify_done(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        metrics::counter!(EXCHANGES_COMPLETED_METRIC, "context" => self.context.clone())
            .increment(1);
        Ok(())
    }

    fn notify_failed(&self, _exchange: &Exchange) -> anyhow::Result<()> {
        metrics::counter!(EXCHANGES_FAILED_METRIC, "context" => self.context.clone()).increment(1);
        Ok(())
    }
}
