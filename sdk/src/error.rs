use thiserror::Error;

#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("script build error: {0}")]
    ScriptBuild(String),
    #[error("verification error: {0}")]
    Verification(String),
    #[error("insufficient funds: need {needed} sompi, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("amount overflow while computing {0}")]
    AmountOverflow(&'static str),
    #[error("negative amount while computing {0}")]
    NegativeAmount(&'static str),
    #[error("amount mismatch for {context}: expected {expected} sompi, got {actual}")]
    AmountMismatch {
        context: &'static str,
        expected: u64,
        actual: u64,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("signing error: {0}")]
    Signing(String),
}

impl From<kaspa_txscript::script_builder::ScriptBuilderError> for EscrowError {
    fn from(e: kaspa_txscript::script_builder::ScriptBuilderError) -> Self {
        Self::ScriptBuild(format!("{e:?}"))
    }
}
