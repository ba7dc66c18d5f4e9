use relay_core::ExchangeId;

/// Errors surfaced by a unit of work to its caller.
///
/// Observer failures never appear here; they are logged and isolated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitOfWorkError {
    #[error("original message retention is disabled; cannot access the original message")]
    OriginalMessageDisabled,
    #[error("unit of work for exchange {exchange_id} is already done")]
    AlreadyDone { exchange_id: ExchangeId },
}

/// Errors from loading a [`RoutingConfig`](crate::config::RoutingConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid boolean for {var}: {value:?}")]
    InvalidBool { var: &'static str, value: String },
}
