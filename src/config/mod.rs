use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::serde_amount;
use crate::error::{LedgerError, LedgerResult};
use crate::policy::{FeeSchedule, OwnershipLimit, MAX_BPS};
use crate::Amount;

/// Initial balance handed out when the ledger is created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub address: Address,
    #[serde(with = "serde_amount")]
    pub amount: Amount,
}

/// Immutable parameters fixed when a ledger is created.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerConfig {
    pub name: String,
    pub symbol: String,
    #[serde(with = "serde_amount")]
    pub cap: Amount,
    pub fee_rate_bps: u16,
    pub fee_recipient: Address,
    #[serde(default)]
    pub ownership_limit: OwnershipLimit,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub genesis: Vec<Allocation>,
}

impl LedgerConfig {
    /// Configuration with the default ownership limit and no genesis
    /// allocations.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        cap: Amount,
        fee_rate_bps: u16,
        fee_recipient: Address,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            cap,
            fee_rate_bps,
            fee_recipient,
            ownership_limit: OwnershipLimit::default(),
            genesis: Vec::new(),
        }
    }

    pub fn with_ownership_limit(mut self, limit: OwnershipLimit) -> Self {
        self.ownership_limit = limit;
        self
    }

    pub fn with_genesis(mut self, genesis: Vec<Allocation>) -> Self {
        self.genesis = genesis;
        self
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule::new(self.fee_rate_bps)
    }

    pub fn from_json(raw: &str) -> LedgerResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| LedgerError::InvalidConfiguration(format!("malformed config: {e}")))
    }

    /// Bounds checks on the scalar parameters. Genesis allocations are
    /// checked when the ledger applies them.
    pub fn validate(&self) -> LedgerResult<()> {
        let invalid =
            |msg: &str| -> LedgerResult<()> { Err(LedgerError::InvalidConfiguration(msg.into())) };
        if self.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.symbol.trim().is_empty() {
            return invalid("symbol must not be empty");
        }
        if self.cap == 0 {
            return invalid("cap must be greater than zero");
        }
        if self.fee_rate_bps > MAX_BPS {
            return invalid("fee rate must not exceed 10000 bps");
        }
        if self.fee_recipient.is_zero() {
            return invalid("fee recipient must not be the zero address");
        }
        if self.ownership_limit.bps == 0 || self.ownership_limit.bps > MAX_BPS {
            return invalid("ownership limit must be within 1..=10000 bps");
        }
        Ok(())
    }
}
