//! The routing context: process-wide collaborators shared by every unit of work.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use relay_core::{Exchange, Message};

use crate::config::RoutingConfig;
use crate::events::{EventNotifier, LoggingEventNotifier};
use crate::id_generator::{RandomUuidGenerator, UuidGenerator};
use crate::inflight::{DefaultInflightRepository, InflightRepository};

/// Collaborators and configuration owned by one routing context.
///
/// Units of work hold an `Arc<RoutingContext>` instead of reaching for
/// process globals. The configuration sits behind an `ArcSwap` so flags can
/// be flipped at runtime; each read sees a consistent snapshot.
pub struct RoutingContext {
    config: ArcSwap<RoutingConfig>,
    inflight: Arc<dyn InflightRepository>,
    events: Arc<dyn EventNotifier>,
    uuid_generator: Arc<dyn UuidGenerator>,
}

impl RoutingContext {
    /// Creates a context with default collaborators: an in-memory in-flight
    /// repository, a logging event notifier and random UUIDs.
    #[must_use]
    pub fn new(config: RoutingConfig) -> Self {
        Self::builder(config).build()
    }

    /// Starts building a context with custom collaborators.
    #[must_use]
    pub fn builder(config: RoutingConfig) -> RoutingContextBuilder {
        RoutingContextBuilder {
            config,
            inflight: None,
            events: None,
            uuid_generator: None,
        }
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<RoutingConfig> {
        self.config.load_full()
    }

    /// Applies `update` to a copy of the configuration and publishes it.
    pub fn update_config(&self, update: impl Fn(&mut RoutingConfig)) {
        self.config.rcu(|current| {
            let mut next = RoutingConfig::clone(current);
            update(&mut next);
            next
        });
    }

    #[must_use]
    pub fn inflight_repository(&self) -> &Arc<dyn InflightRepository> {
        &self.inflight
    }

    #[must_use]
    pub fn event_notifier(&self) -> &Arc<dyn EventNotifier> {
        &self.events
    }

    #[must_use]
    pub fn uuid_generator(&self) -> &Arc<dyn UuidGenerator> {
        &self.uuid_generator
    }

    /// Creates an exchange with a freshly generated id.
    #[must_use]
    pub fn create_exchange(&self, message: impl Into<Message>) -> Exchange {
        Exchange::new(self.uuid_generator.generate_uuid(), message)
    }
}

impl fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingContext")
            .field("config", &self.config.load_full())
            .field("in_flight", &self.inflight.size())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RoutingContext`].
pub struct RoutingContextBuilder {
    config: RoutingConfig,
    inflight: Option<Arc<dyn InflightRepository>>,
    events: Option<Arc<dyn EventNotifier>>,
    uuid_generator: Option<Arc<dyn UuidGenerator>>,
}

impl RoutingContextBuilder {
    #[must_use]
    pub fn inflight_repository(mut self, repository: Arc<dyn InflightRepository>) -> Self {
        self.inflight = Some(repository);
        self
    }

    #[must_use]
    pub fn event_notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.events = Some(notifier);
        self
    }

    #[must_use]
    pub fn uuid_generator(mut self, generator: Arc<dyn UuidGenerator>) -> Self {
        self.uuid_generator = Some(generator);
        self
    }

    #[must_use]
    pub fn build(self) -> RoutingContext {
        RoutingContext {
            config: ArcSwap::from_pointee(self.config),
            inflight: self
                .inflight
                .unwrap_or_else(|| Arc::new(DefaultInflightRepository::new())),
            events: self
                .events
                .unwrap_or_else(|| Arc::new(LoggingEventNotifier)),
            uuid_generator: self
                .uuid_generator
                .unwrap_or_else(|| Arc::new(RandomUuidGenerator)),
        }
    }
}
