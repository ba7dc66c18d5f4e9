use std::fmt;
use std::sync::Arc;

use crate::exchange::Exchange;
use crate::route::Route;

/// Completion callback attached to an exchange's unit of work.
///
/// Exactly one of `on_complete` / `on_failure` is invoked when the unit of
/// work is done, depending on whether the exchange failed. Errors returned
/// from either are logged by the caller and never abort routing.
///
/// Identity is pointer identity of the `Arc` holding the callback, so the
/// same instance may be registered more than once.
pub trait Synchronization: Send + Sync + fmt::Debug {
    /// Called when the exchange completed successfully.
    fn on_complete(&self, exchange: &Exchange) -> anyhow::Result<()>;

    /// Called when the exchange failed.
    fn on_failure(&self, exchange: &Exchange) -> anyhow::Result<()>;

    /// Whether this callback may follow the message onto another exchange.
    /// Return `false` for callbacks bound to resources of the current exchange.
    fn allow_handover(&self) -> bool {
        true
    }

    /// Notification priority. Lower runs first; equal orders run in
    /// registration order.
    fn order(&self) -> i32 {
        0
    }

    /// Route-scoped capability, if this callback also wants route entry/exit
    /// notifications.
    fn as_route_aware(&self) -> Option<&dyn RouteAwareSynchronization> {
        None
    }
}

/// Callback notified as an exchange enters and leaves (sub-)routes.
pub trait RouteAwareSynchronization: Send + Sync {
    /// Called before `route` processes the exchange.
    fn on_before_route(&self, route: &Route, exchange: &Exchange) -> anyhow::Result<()>;

    /// Called after `route` processed the exchange.
    fn on_after_route(&self, route: &Route, exchange: &Exchange) -> anyhow::Result<()>;
}

/// Whether two handles refer to the same callback instance.
#[must_use]
pub fn same_synchronization(a: &Arc<dyn Synchronization>, b: &Arc<dyn Synchronization>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain;

    impl Synchronization for Plain {
        fn on_complete(&self, _exchange: &Exchange) -> anyhow::Result<()> {
            Ok(())
        }

        fn on_failure(&self, _exchange: &Exchange) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn defaults_allow_handover_without_route_callbacks() {
        let sync = Plain;
        assert!(sync.allow_handover());
        assert_eq!(sync.order(), 0);
        assert!(sync.as_route_aware().is_none());
    }

    #[test]
    fn identity_is_per_instance() {
        let a: Arc<dyn Synchronization> = Arc::new(Plain);
        let b: Arc<dyn Synchronization> = Arc::new(Plain);
        let a2 = Arc::clone(&a);

        assert!(same_synchronization(&a, &a2));
        assert!(!same_synchronization(&a, &b));
    }
}
