use thiserror::Error;

/// Errors raised while composing dialers.
///
/// Dial-time failures are always [`pd_transport::DialError`]; this type only
/// covers construction and lookup.
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("{strategy}: no dialers")]
    NoDialers { strategy: &'static str },

    #[error("unknown strategy {0:?}")]
    UnknownStrategy(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
