//! Process-wide tracking of exchanges currently being routed.
//!
//! Each unit of work registers its exchange on creation and unregisters it
//! when done, so the repository size is the number of exchanges in flight.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use relay_core::{Exchange, ExchangeId, RouteId};

/// Registry of in-flight exchanges.
///
/// Used as `Arc<dyn InflightRepository>` by the routing context.
pub trait InflightRepository: Send + Sync {
    /// Registers an exchange as in flight.
    fn add(&self, exchange: &Exchange);

    /// Unregisters an exchange.
    fn remove(&self, exchange: &Exchange);

    /// Number of exchanges currently in flight.
    fn size(&self) -> usize;
}

/// Snapshot of one in-flight exchange, as returned by
/// [`DefaultInflightRepository::browse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InflightExchange {
    /// Id of the exchange.
    pub exchange_id: ExchangeId,
    /// Route that consumed the exchange, if known at registration time.
    pub from_route: Option<RouteId>,
    /// Time since registration.
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
struct InflightEntry {
    registered_at: Instant,
    from_route: Option<RouteId>,
}

/// In-memory repository backed by a `DashMap` keyed by exchange id.
#[derive(Debug, Default)]
pub struct DefaultInflightRepository {
    entries: DashMap<ExchangeId, InflightEntry>,
}

impl DefaultInflightRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given exchange is currently registered.
    #[must_use]
    pub fn contains(&self, exchange_id: &ExchangeId) -> bool {
        self.entries.contains_key(exchange_id)
    }

    /// Number of in-flight exchanges that were consumed by `route`.
    #[must_use]
    pub fn size_for_route(&self, route: &RouteId) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().from_route.as_ref() == Some(route))
            .count()
    }

    /// Lists in-flight exchanges, longest running first.
    #[must_use]
    pub fn browse(&self) -> Vec<InflightExchange> {
        let now = Instant::now();
        let mut list: Vec<InflightExchange> = self
            .entries
            .iter()
            .map(|entry| InflightExchange {
                exchange_id: entry.key().clone(),
                from_route: entry.value().from_route.clone(),
                elapsed: now.saturating_duration_since(entry.value().registered_at),
            })
            .collect();
        list.sort_by(|a, b| b.elapsed.cmp(&a.elapsed));
        list
    }

    /// The longest running in-flight exchange, if any.
    #[must_use]
    pub fn oldest(&self) -> Option<InflightExchange> {
        self.browse().into_iter().next()
    }

    /// Waits for the repository to drain, up to the given timeout.
    ///
    /// Returns `true` if no exchange was in flight before the deadline.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if self.entries.is_empty() {
                return true;
            }

            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    in_flight = self.entries.len(),
                    "Drain timeout expired with in-flight exchanges remaining"
                );
                return false;
            }

            // Poll at 10ms intervals to avoid busy-waiting
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl InflightRepository for DefaultInflightRepository {
    fn add(&self, exchange: &Exchange) {
        let entry = InflightEntry {
            registered_at: Instant::now(),
            from_route: exchange.from_route().cloned(),
        };
        if self.entries.insert(exchange.id().clone(), entry).is_some() {
            tracing::warn!(
                exchange_id = %exchange.id(),
                "Exchange registered as in flight more than once"
            );
        }
    }

    fn remove(&self, exchange: &Exchange) {
        if self.entries.remove(exchange.id()).is_none() {
            tracing::debug!(
                exchange_id = %exchange.id(),
                "Removing exchange that was not in flight"
            );
        }
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relay_core::DefaultMessage;

    use super::*;

    fn exchange(id: &str) -> Exchange {
        Exchange::new(id, DefaultMessage::default())
    }

    #[test]
    fn add_then_remove_nets_zero() {
        let repo = DefaultInflightRepository::new();
        let ex = exchange("ex-1");

        repo.add(&ex);
        assert_eq!(repo.size(), 1);
        assert!(repo.contains(ex.id()));

        repo.remove(&ex);
        assert_eq!(repo.size(), 0);
        assert!(!repo.contains(ex.id()));
    }

    #[test]
    fn remove_unknown_is_harmless() {
        let repo = DefaultInflightRepository::new();
        repo.remove(&exchange("ghost"));
        assert_eq!(repo.size(), 0);
    }

    #[test]
    fn browse_lists_oldest_first() {
        let repo = DefaultInflightRepository::new();
        repo.add(&exchange("first"));
        std::thread::sleep(Duration::from_millis(5));
        repo.add(&exchange("second"));

        let listed: Vec<String> = repo
            .browse()
            .into_iter()
            .map(|e| e.exchange_id.0)
            .collect();
        assert_eq!(listed, vec!["first", "second"]);
        assert_eq!(
            repo.oldest().map(|e| e.exchange_id),
            Some(ExchangeId::from("first"))
        );
    }

    #[test]
    fn counts_per_route() {
        let repo = DefaultInflightRepository::new();
        let mut a = exchange("a");
        a.set_from_route(RouteId::from("billing"));
        let mut b = exchange("b");
        b.set_from_route(RouteId::from("billing"));
        let c = exchange("c");

        repo.add(&a);
        repo.add(&b);
        repo.add(&c);

        assert_eq!(repo.size_for_route(&RouteId::from("billing")), 2);
        assert_eq!(repo.size_for_route(&RouteId::from("shipping")), 0);
    }

    #[tokio::test]
    async fn wait_for_drain_succeeds_once_removed() {
        let repo = Arc::new(DefaultInflightRepository::new());
        let ex = exchange("ex-1");
        repo.add(&ex);

        let repo_clone = Arc::clone(&repo);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            repo_clone.remove(&ex);
        });

        assert!(repo.wait_for_drain(Duration::from_secs(2)).await);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_drain_times_out() {
        let repo = DefaultInflightRepository::new();
        repo.add(&exchange("stuck"));
        assert!(!repo.wait_for_drain(Duration::from_millis(30)).await);
    }
}
