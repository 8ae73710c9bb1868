use kaspa_trade_sdk::EscrowError;
use thiserror::Error;

use crate::task::TaskFailure;
use crate::trade::TradePhase;
use crate::wallet::WalletError;

/// Coarse classification used by the trade-lifecycle layer to decide between
/// re-requesting data and escalating to arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required trade data or wallet entry is missing.
    Precondition,
    /// Amounts, keys or hashes disagree; the peer is inconsistent or malicious.
    Consistency,
    /// Wallet, signing or serialization failure.
    Collaborator,
}

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("consistency violation: {0}")]
    Consistency(String),
    #[error("task {0} intercepted")]
    Intercepted(&'static str),
    #[error("event {event} not expected in phase {phase:?}")]
    UnexpectedEvent { event: &'static str, phase: TradePhase },
    #[error("invalid phase transition {from:?} -> {to:?}")]
    InvalidTransition { from: TradePhase, to: TradePhase },
    #[error("unknown trade {0}")]
    UnknownTrade(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Escrow(#[from] EscrowError),
    #[error("contract serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Task(Box<TaskFailure>),
}

impl From<TaskFailure> for TradeError {
    fn from(failure: TaskFailure) -> Self {
        TradeError::Task(Box::new(failure))
    }
}

impl TradeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TradeError::Task(failure) => failure.error.kind(),
            TradeError::Precondition(_)
            | TradeError::UnexpectedEvent { .. }
            | TradeError::InvalidTransition { .. }
            | TradeError::UnknownTrade(_) => ErrorKind::Precondition,
            TradeError::Consistency(_) => ErrorKind::Consistency,
            TradeError::Wallet(WalletError::EntryNotFound { .. }) => ErrorKind::Precondition,
            TradeError::Wallet(_) | TradeError::Serialization(_) | TradeError::Intercepted(_) => {
                ErrorKind::Collaborator
            }
            TradeError::Escrow(e) => match e {
                EscrowError::AmountOverflow(_)
                | EscrowError::NegativeAmount(_)
                | EscrowError::AmountMismatch { .. }
                | EscrowError::InsufficientFunds { .. }
                | EscrowError::Verification(_)
                | EscrowError::InvalidAddress { .. } => ErrorKind::Consistency,
                EscrowError::InvalidConfig(_) => ErrorKind::Precondition,
                EscrowError::ScriptBuild(_) | EscrowError::Signing(_) => ErrorKind::Collaborator,
            },
        }
    }
}

/// `Option` to precondition error, mirroring a null check.
pub(crate) fn require<T>(value: Option<T>, what: &str) -> Result<T, TradeError> {
    value.ok_or_else(|| TradeError::Precondition(format!("{what} must not be null")))
}
