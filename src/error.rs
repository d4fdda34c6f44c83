use thiserror::Error;

use crate::address::Address;
use crate::Amount;

/// Canonical error type returned by ledger construction and transitions.
///
/// Every variant is a rejection: the ledger state is left exactly as it was
/// before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Minting would push total supply above the immutable cap.
    #[error("supply cap exceeded: cap {cap}, would have {would_have}")]
    CapExceeded { cap: Amount, would_have: Amount },

    /// A credit would leave a holder above the ownership limit.
    #[error("OwnershipLimitExceeded: {holder} would hold {balance}, limit {limit}")]
    OwnershipLimitExceeded {
        holder: Address,
        balance: Amount,
        limit: Amount,
    },

    /// The sender cannot cover the transfer amount.
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    /// Mint or transfer target is the null address.
    #[error("invalid recipient: the zero address cannot hold tokens")]
    InvalidRecipient,

    /// Construction-time parameter is out of bounds.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("zero amount not allowed")]
    ZeroAmount,

    /// The mint authority refused the minter.
    #[error("unauthorized minter {minter}")]
    Unauthorized { minter: Address },

    #[error("arithmetic overflow")]
    Overflow,

    /// A snapshot failed validation on restore.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
