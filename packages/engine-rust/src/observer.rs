//! Failure isolation at observer boundaries.
//!
//! Every call into code the unit of work does not own (completion callbacks,
//! route callbacks, event notifiers, handover vetoes) goes through
//! [`best_effort`]. A failing observer is logged and counted; the caller
//! carries on with the next one.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use relay_core::ExchangeId;

/// Counter incremented for every isolated observer failure.
pub const OBSERVER_FAILURES_METRIC: &str = "relay_observer_failures_total";

/// Observer boundary a callback belongs to. Used as a log field and metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverKind {
    /// `Synchronization::on_complete` / `on_failure`.
    Completion,
    /// `RouteAwareSynchronization::on_before_route`.
    BeforeRoute,
    /// `RouteAwareSynchronization::on_after_route`.
    AfterRoute,
    /// An `EventNotifier` call.
    EventNotification,
    /// `Synchronization::allow_handover` or a handover filter.
    HandoverCheck,
}

impl ObserverKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::BeforeRoute => "before_route",
            Self::AfterRoute => "after_route",
            Self::EventNotification => "event_notification",
            Self::HandoverCheck => "handover_check",
        }
    }
}

/// Runs `call`, swallowing both returned errors and panics.
///
/// Returns `true` when the observer finished normally.
pub fn best_effort<F>(kind: ObserverKind, exchange_id: &ExchangeId, call: F) -> bool
where
    F: FnOnce() -> anyhow::Result<()>,
{
    let failure = match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => return true,
        Ok(Err(err)) => format!("{err:#}"),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    tracing::warn!(
        exchange_id = %exchange_id,
        observer = kind.as_str(),
        error = %failure,
        "Exception occurred during observer callback. This exception will be ignored."
    );
    metrics::counter!(OBSERVER_FAILURES_METRIC, "observer" => kind.as_str()).increment(1);
    false
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
