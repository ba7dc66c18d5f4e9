//! The per-exchange unit of work.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use relay_core::{
    Exchange, ExchangeId, Message, Route, Synchronization, Value, BREADCRUMB_ID,
    CREATED_TIMESTAMP, EXTERNAL_REDELIVERED,
};

use super::registry::SynchronizationRegistry;
use super::route_stack::{RouteContext, RouteContextStack};
use super::transaction::{TransactionTag, TransactionTagSet};
use crate::context::RoutingContext;
use crate::error::UnitOfWorkError;
use crate::events::ExchangeEventKind;
use crate::observer::{best_effort, ObserverKind};

/// Predicate selecting which callbacks follow a handover.
pub type HandoverFilter<'a> = &'a dyn Fn(&dyn Synchronization) -> bool;

/// Transactional context of one exchange while it is routed.
///
/// Tracks completion callbacks, the stack of routes the exchange is nested
/// in, and the transactional resources that own it. Created when the exchange
/// enters the pipeline and finalized exactly once by [`UnitOfWork::done`].
///
/// Shared as `Arc<UnitOfWork>` between the threads that process the exchange.
pub struct UnitOfWork {
    id: OnceLock<String>,
    exchange_id: ExchangeId,
    context: Arc<RoutingContext>,
    synchronizations: SynchronizationRegistry,
    route_contexts: Mutex<RouteContextStack>,
    original_in_message: Option<Message>,
    transacted_by: TransactionTagSet,
    parent: Option<Weak<UnitOfWork>>,
}

impl UnitOfWork {
    /// Admits `exchange` into the pipeline.
    ///
    /// Captures the original message (when retention is enabled), stamps the
    /// creation time, normalizes the external-redelivered flag, injects the
    /// breadcrumb header (when enabled), adopts callbacks parked on the
    /// exchange, fires the created event and registers the exchange as in
    /// flight.
    #[must_use]
    pub fn create(exchange: &mut Exchange, context: &Arc<RoutingContext>) -> Arc<Self> {
        Self::create_with_parent(exchange, context, None)
    }

    /// Creates the unit of work of a derived exchange (a split or multicast
    /// part, for example) and links it to `self`.
    ///
    /// The link is advisory: completion of the child does not cascade and
    /// transaction tags are not inherited.
    #[must_use]
    pub fn create_child(self: &Arc<Self>, child_exchange: &mut Exchange) -> Arc<Self> {
        Self::create_with_parent(child_exchange, &self.context, Some(Arc::downgrade(self)))
    }

    fn create_with_parent(
        exchange: &mut Exchange,
        context: &Arc<RoutingContext>,
        parent: Option<Weak<UnitOfWork>>,
    ) -> Arc<Self> {
        let config = context.config();
        tracing::trace!(
            context = %config.name,
            exchange_id = %exchange.id(),
            "UnitOfWork created"
        );

        let original_in_message = config.allow_use_original_message.then(|| {
            let mut snapshot = exchange.in_message().snapshot();
            // Queries against the snapshot resolve to the live exchange.
            snapshot.bind_exchange(exchange.id().clone());
            snapshot
        });

        if exchange.property(CREATED_TIMESTAMP).is_none() {
            exchange.set_property(CREATED_TIMESTAMP, epoch_millis());
        }

        if config.use_breadcrumb {
            let has_breadcrumb = exchange
                .in_message()
                .header(BREADCRUMB_ID)
                .is_some_and(|v| !v.is_null());
            if !has_breadcrumb {
                let breadcrumb = exchange.id().to_string();
                exchange.in_message_mut().set_header(BREADCRUMB_ID, breadcrumb);
            }
        }

        if exchange.property(EXTERNAL_REDELIVERED).is_none() {
            // Sources that cannot tell count as not redelivered.
            let redelivered = exchange.external_redelivered().unwrap_or(false);
            exchange.set_property(EXTERNAL_REDELIVERED, redelivered);
        }

        let synchronizations =
            SynchronizationRegistry::with_entries(exchange.take_on_completions());

        let uow = Arc::new(Self {
            id: OnceLock::new(),
            exchange_id: exchange.id().clone(),
            context: Arc::clone(context),
            synchronizations,
            route_contexts: Mutex::new(RouteContextStack::new()),
            original_in_message,
            transacted_by: TransactionTagSet::new(),
            parent,
        });

        let exchange = &*exchange;
        let notifier = context.event_notifier();
        best_effort(ObserverKind::EventNotification, exchange.id(), || {
            if notifier.is_enabled(ExchangeEventKind::Created) {
                notifier.notify_created(exchange)
            } else {
                Ok(())
            }
        });

        context.inflight_repository().add(exchange);
        uow
    }

    /// Unique id of this unit of work, generated on first access.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id
            .get_or_init(|| self.context.uuid_generator().generate_uuid())
    }

    /// Id of the exchange this unit of work was created for.
    #[must_use]
    pub fn exchange_id(&self) -> &ExchangeId {
        &self.exchange_id
    }

    #[must_use]
    pub fn routing_context(&self) -> &Arc<RoutingContext> {
        &self.context
    }

    /// The parent unit of work, if this is a child that is still linked to a
    /// live parent.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<UnitOfWork>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Whether [`UnitOfWork::done`] has run.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.synchronizations.is_closed()
    }

    fn already_done(&self) -> UnitOfWorkError {
        UnitOfWorkError::AlreadyDone {
            exchange_id: self.exchange_id.clone(),
        }
    }

    fn ensure_active(&self) -> Result<(), UnitOfWorkError> {
        if self.is_done() {
            return Err(self.already_done());
        }
        Ok(())
    }

    // --- Completion ---

    /// Finalizes the unit of work.
    ///
    /// Runs every callback's success or failure branch in notification order,
    /// unregisters the exchange from the in-flight repository, then fires the
    /// done or failed event. Callback and notifier failures are logged and
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::AlreadyDone`] on a second call, without
    /// running anything again.
    pub fn done(&self, exchange: &Exchange) -> Result<(), UnitOfWorkError> {
        let Some(synchronizations) = self.synchronizations.close() else {
            tracing::error!(exchange_id = %exchange.id(), "UnitOfWork done more than once");
            return Err(self.already_done());
        };

        tracing::trace!(
            exchange_id = %exchange.id(),
            synchronizations = synchronizations.len(),
            "UnitOfWork done"
        );

        let failed = exchange.is_failed();
        for synchronization in &synchronizations {
            best_effort(ObserverKind::Completion, exchange.id(), || {
                if failed {
                    synchronization.on_failure(exchange)
                } else {
                    synchronization.on_complete(exchange)
                }
            });
        }

        self.context.inflight_repository().remove(exchange);

        let notifier = self.context.event_notifier();
        let event = if failed {
            ExchangeEventKind::Failed
        } else {
            ExchangeEventKind::Completed
        };
        best_effort(ObserverKind::EventNotification, exchange.id(), || {
            if !notifier.is_enabled(event) {
                return Ok(());
            }
            if failed {
                notifier.notify_failed(exchange)
            } else {
                notifier.notify_done(exchange)
            }
        });
        Ok(())
    }

    /// Notifies route-aware callbacks that `route` is about to process the exchange.
    pub fn before_route(&self, exchange: &Exchange, route: &Route) {
        tracing::trace!(
            exchange_id = %exchange.id(),
            route_id = %route.id,
            "UnitOfWork beforeRoute"
        );
        for synchronization in self.synchronizations.snapshot() {
            if let Some(aware) = synchronization.as_route_aware() {
                best_effort(ObserverKind::BeforeRoute, exchange.id(), || {
                    aware.on_before_route(route, exchange)
                });
            }
        }
    }

    /// Notifies route-aware callbacks that `route` has processed the exchange.
    pub fn after_route(&self, exchange: &Exchange, route: &Route) {
        tracing::trace!(
            exchange_id = %exchange.id(),
            route_id = %route.id,
            "UnitOfWork afterRoute"
        );
        for synchronization in self.synchronizations.snapshot() {
            if let Some(aware) = synchronization.as_route_aware() {
                best_effort(ObserverKind::AfterRoute, exchange.id(), || {
                    aware.on_after_route(route, exchange)
                });
            }
        }
    }

    // --- Synchronizations ---

    /// Registers a completion callback.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::AlreadyDone`] once the unit of work is done,
    /// since the callback could never fire.
    pub fn add_synchronization(
        &self,
        synchronization: Arc<dyn Synchronization>,
    ) -> Result<(), UnitOfWorkError> {
        tracing::trace!(
            exchange_id = %self.exchange_id,
            ?synchronization,
            "Adding synchronization"
        );
        self.synchronizations
            .add(synchronization)
            .map_err(|_| self.already_done())
    }

    /// Removes one registration of `synchronization`. Returns whether it was registered.
    pub fn remove_synchronization(&self, synchronization: &Arc<dyn Synchronization>) -> bool {
        self.synchronizations.remove(synchronization)
    }

    #[must_use]
    pub fn contains_synchronization(&self, synchronization: &Arc<dyn Synchronization>) -> bool {
        self.synchronizations.contains(synchronization)
    }

    /// Registered callbacks in notification order.
    #[must_use]
    pub fn synchronizations(&self) -> Vec<Arc<dyn Synchronization>> {
        self.synchronizations.snapshot()
    }

    // Runs user code under the registry lock; a panicking veto or filter
    // counts as "stay".
    fn is_eligible(
        &self,
        synchronization: &Arc<dyn Synchronization>,
        filter: Option<HandoverFilter<'_>>,
    ) -> bool {
        let mut eligible = false;
        let decided = best_effort(ObserverKind::HandoverCheck, &self.exchange_id, || {
            eligible = synchronization.allow_handover()
                && match filter {
                    Some(accept) => accept(synchronization.as_ref()),
                    None => true,
                };
            Ok(())
        });
        decided && eligible
    }

    fn trace_handover(&self, moved: &[Arc<dyn Synchronization>]) {
        for synchronization in moved {
            tracing::trace!(
                exchange_id = %self.exchange_id,
                ?synchronization,
                "Handover synchronization"
            );
        }
    }

    /// Moves the callbacks that allow handover (and pass `filter`) to `target`.
    ///
    /// Both registries are locked for the move, so a concurrent add or remove
    /// sees each callback on exactly one side. Callbacks that stay keep their
    /// relative order. Returns how many callbacks moved.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::AlreadyDone`] if `target` is already done;
    /// nothing is moved in that case.
    pub fn handover_synchronization(
        &self,
        target: &UnitOfWork,
        filter: Option<HandoverFilter<'_>>,
    ) -> Result<usize, UnitOfWorkError> {
        let moved = self
            .synchronizations
            .transfer_where(&target.synchronizations, |s| self.is_eligible(s, filter))
            .map_err(|_| target.already_done())?;
        self.trace_handover(&moved);
        Ok(moved.len())
    }

    /// Moves eligible callbacks onto an exchange that has no unit of work yet.
    /// They are adopted when that exchange's unit of work is created.
    pub fn handover_to_exchange(
        &self,
        target: &mut Exchange,
        filter: Option<HandoverFilter<'_>>,
    ) -> usize {
        let moved = self
            .synchronizations
            .drain_where(|s| self.is_eligible(s, filter));
        self.trace_handover(&moved);
        let count = moved.len();
        for synchronization in moved {
            target.add_on_completion(synchronization);
        }
        count
    }

    // --- Original message ---

    /// Snapshot of the inbound message as it was when the exchange entered
    /// the pipeline. Later changes to the live message are not reflected.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::OriginalMessageDisabled`] if retention was
    /// disabled when this unit of work was created.
    pub fn original_in_message(&self) -> Result<&Message, UnitOfWorkError> {
        self.original_in_message
            .as_ref()
            .ok_or(UnitOfWorkError::OriginalMessageDisabled)
    }

    // --- Transactions ---

    /// Marks the exchange as owned by the transactional resource `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::AlreadyDone`] once the unit of work is done.
    pub fn begin_transacted_by(&self, tag: TransactionTag) -> Result<(), UnitOfWorkError> {
        self.ensure_active()?;
        self.transacted_by.begin(tag);
        Ok(())
    }

    /// Releases ownership by `tag`. Returns whether it was held.
    pub fn end_transacted_by(&self, tag: &TransactionTag) -> bool {
        self.transacted_by.end(tag)
    }

    #[must_use]
    pub fn is_transacted(&self) -> bool {
        self.transacted_by.is_transacted()
    }

    #[must_use]
    pub fn is_transacted_by(&self, tag: &TransactionTag) -> bool {
        self.transacted_by.is_transacted_by(tag)
    }

    /// Resources currently owning the exchange, in the order they began.
    #[must_use]
    pub fn transaction_tags(&self) -> Vec<TransactionTag> {
        self.transacted_by.tags()
    }

    // --- Route stack ---

    /// Enters `route`. The frame becomes the current route context.
    ///
    /// # Errors
    ///
    /// Returns [`UnitOfWorkError::AlreadyDone`] once the unit of work is done.
    pub fn push_route_context(&self, route: Arc<Route>) -> Result<(), UnitOfWorkError> {
        self.ensure_active()?;
        self.route_contexts.lock().push(RouteContext::new(route));
        Ok(())
    }

    /// Leaves the innermost route. `None` if no route is active.
    pub fn pop_route_context(&self) -> Option<RouteContext> {
        self.route_contexts.lock().pop()
    }

    /// The innermost active route, if any.
    #[must_use]
    pub fn route_context(&self) -> Option<RouteContext> {
        self.route_contexts.lock().current().cloned()
    }

    /// Current route nesting depth.
    #[must_use]
    pub fn route_depth(&self) -> usize {
        self.route_contexts.lock().depth()
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("exchange_id", &self.exchange_id)
            .field("synchronizations", &self.synchronizations.len())
            .field("route_depth", &self.route_depth())
            .field("transacted", &self.is_transacted())
            .field("done", &self.is_done())
            .finish_non_exhaustive()
    }
}

fn epoch_millis() -> Value {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
    Value::Int(millis)
}
