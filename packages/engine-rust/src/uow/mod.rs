//! Per-exchange unit of work and the parts it is built from.
//!
//! - [`UnitOfWork`]: lifecycle, completion, handover, route and transaction tracking
//! - [`SynchronizationRegistry`]: ordered, lock-guarded completion callbacks
//! - [`RouteContextStack`]: nested route frames
//! - [`TransactionTagSet`]: transactional resources owning the exchange

pub mod registry;
pub mod route_stack;
pub mod transaction;
pub mod unit_of_work;

pub use registry::{RegistryClosed, SynchronizationRegistry};
pub use route_stack::{RouteContext, RouteContextStack};
pub use transaction::{TransactionTag, TransactionTagSet};
pub use unit_of_work::{HandoverFilter, UnitOfWork};
