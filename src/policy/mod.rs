//! Economic rules shared by the ledger: basis-point arithmetic, the transfer
//! fee split, the ownership-limit threshold and the mint capability check.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{LedgerError, LedgerResult};
use crate::Amount;

/// 100% in basis points.
pub const MAX_BPS: u16 = 10_000;

/// Default ownership limit: half of the cap.
pub const DEFAULT_OWNERSHIP_LIMIT_BPS: u16 = 5_000;

/// `floor(amount * bps / 10_000)` without an intermediate product that could
/// overflow. Exact for every `amount` as long as `bps <= MAX_BPS`.
pub fn apply_bps(amount: Amount, bps: u16) -> Amount {
    let bps = bps as Amount;
    let denom = MAX_BPS as Amount;
    (amount / denom) * bps + (amount % denom) * bps / denom
}

/// Fee charged on every transfer, paid out of the transferred amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub rate_bps: u16,
}

/// How a transfer amount divides between the recipient and the fee recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeeSplit {
    pub fee: Amount,
    pub net: Amount,
}

impl FeeSchedule {
    pub fn new(rate_bps: u16) -> Self {
        Self { rate_bps }
    }

    /// Fee rounds down, so `fee + net == amount` always.
    pub fn split(&self, amount: Amount) -> FeeSplit {
        let fee = apply_bps(amount, self.rate_bps);
        FeeSplit {
            fee,
            net: amount - fee,
        }
    }
}

/// What the ownership limit is a percentage of.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitBasis {
    /// Total supply after the operation completes.
    Supply,
    /// The immutable supply cap.
    #[default]
    Cap,
}

/// Maximum share a single holder may own after a credit.
///
/// The default, 50% of the cap, lets a fresh ledger take its first mint. A
/// supply-based limit only admits holders seeded through genesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipLimit {
    pub bps: u16,
    #[serde(default)]
    pub basis: LimitBasis,
}

impl Default for OwnershipLimit {
    fn default() -> Self {
        Self {
            bps: DEFAULT_OWNERSHIP_LIMIT_BPS,
            basis: LimitBasis::Cap,
        }
    }
}

impl OwnershipLimit {
    pub fn of_supply(bps: u16) -> Self {
        Self {
            bps,
            basis: LimitBasis::Supply,
        }
    }

    pub fn of_cap(bps: u16) -> Self {
        Self {
            bps,
            basis: LimitBasis::Cap,
        }
    }

    /// Largest balance a holder may have. A balance equal to the threshold is
    /// allowed; one unit more is not.
    pub fn threshold(&self, supply_after: Amount, cap: Amount) -> Amount {
        let base = match self.basis {
            LimitBasis::Supply => supply_after,
            LimitBasis::Cap => cap,
        };
        apply_bps(base, self.bps)
    }

    pub fn check(
        &self,
        holder: &Address,
        balance: Amount,
        supply_after: Amount,
        cap: Amount,
    ) -> LedgerResult<()> {
        let limit = self.threshold(supply_after, cap);
        if balance > limit {
            return Err(LedgerError::OwnershipLimitExceeded {
                holder: *holder,
                balance,
                limit,
            });
        }
        Ok(())
    }
}

/// Capability check run before every mint.
///
/// Minting is open to any caller by default ([`OpenMint`]); swap in another
/// implementation with `TokenLedger::with_authority` to gate it.
pub trait MintAuthority: Send + Sync {
    fn may_mint(&self, minter: &Address, recipient: &Address, amount: Amount) -> bool;
}

/// Lets anyone mint; cap and ownership limit are the only gates.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenMint;

impl MintAuthority for OpenMint {
    fn may_mint(&self, _minter: &Address, _recipient: &Address, _amount: Amount) -> bool {
        true
    }
}
