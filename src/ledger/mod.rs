use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::serde_amount;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::policy::{FeeSchedule, FeeSplit, MintAuthority, OpenMint, OwnershipLimit};
use crate::Amount;

mod snapshot;

pub use snapshot::{Holding, LedgerSnapshot};

/// Journal entry for every applied transition, in application order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Genesis {
        to: Address,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Mint {
        minter: Address,
        to: Address,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "serde_amount")]
        amount: Amount,
        #[serde(with = "serde_amount")]
        fee: Amount,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MintReceipt {
    pub amount: Amount,
    pub balance: Amount,
    pub total_supply: Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferReceipt {
    pub amount: Amount,
    pub fee: Amount,
    pub net: Amount,
}

/// Single-token ledger enforcing a supply cap, an ownership limit and a
/// transfer fee.
///
/// `mint` and `transfer` are the only operations that change supply or
/// balances. Both validate everything against staged values first and only
/// then commit, so a rejected call leaves the ledger untouched.
pub struct TokenLedger {
    config: LedgerConfig,
    fees: FeeSchedule,
    total_supply: Amount,
    // zero balances are never stored
    balances: BTreeMap<Address, Amount>,
    events: Vec<LedgerEvent>,
    height: u64,
    authority: Box<dyn MintAuthority>,
}

impl fmt::Debug for TokenLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenLedger")
            .field("symbol", &self.config.symbol)
            .field("cap", &self.config.cap)
            .field("total_supply", &self.total_supply)
            .field("holders", &self.balances.len())
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl TokenLedger {
    /// Create a ledger from the five deployment parameters, using the default
    /// ownership limit.
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        cap: Amount,
        fee_rate_bps: u16,
        fee_recipient: Address,
    ) -> LedgerResult<Self> {
        Self::create(LedgerConfig::new(
            name,
            symbol,
            cap,
            fee_rate_bps,
            fee_recipient,
        ))
    }

    /// Validate `config`, then apply its genesis allocations as one batch.
    pub fn create(config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        let mut ledger = Self::empty(config);
        ledger.apply_genesis()?;
        Ok(ledger)
    }

    fn empty(config: LedgerConfig) -> Self {
        Self {
            fees: config.fee_schedule(),
            config,
            total_supply: 0,
            balances: BTreeMap::new(),
            events: Vec::new(),
            height: 0,
            authority: Box::new(OpenMint),
        }
    }

    /// Replace the mint capability check.
    pub fn with_authority(mut self, authority: impl MintAuthority + 'static) -> Self {
        self.authority = Box::new(authority);
        self
    }

    fn apply_genesis(&mut self) -> LedgerResult<()> {
        let invalid = |msg: String| LedgerError::InvalidConfiguration(format!("genesis: {msg}"));
        let cap = self.config.cap;
        let mut staged: BTreeMap<Address, Amount> = BTreeMap::new();
        let mut supply: Amount = 0;
        for alloc in &self.config.genesis {
            if alloc.address.is_zero() {
                return Err(invalid("allocation to the zero address".into()));
            }
            if alloc.amount == 0 {
                return Err(invalid(format!("zero allocation to {}", alloc.address)));
            }
            supply = supply
                .checked_add(alloc.amount)
                .ok_or_else(|| invalid("allocations overflow".into()))?;
            *staged.entry(alloc.address).or_insert(0) += alloc.amount;
        }
        if supply > cap {
            return Err(invalid(format!("supply {supply} exceeds cap {cap}")));
        }
        for (holder, balance) in &staged {
            self.config
                .ownership_limit
                .check(holder, *balance, supply, cap)
                .map_err(|e| invalid(e.to_string()))?;
        }

        let events: Vec<LedgerEvent> = self
            .config
            .genesis
            .iter()
            .map(|alloc| LedgerEvent::Genesis {
                to: alloc.address,
                amount: alloc.amount,
            })
            .collect();
        self.balances = staged;
        self.total_supply = supply;
        for event in events {
            self.record(event);
        }
        Ok(())
    }

    /// Mint with the recipient acting as its own minter.
    pub fn mint(&mut self, recipient: Address, amount: Amount) -> LedgerResult<MintReceipt> {
        self.mint_by(recipient, recipient, amount)
    }

    /// Mint `amount` new tokens to `recipient` on behalf of `minter`.
    ///
    /// Checks run in a fixed order: amount, recipient, mint authority, cap,
    /// ownership limit against the post-mint supply.
    pub fn mint_by(
        &mut self,
        minter: Address,
        recipient: Address,
        amount: Amount,
    ) -> LedgerResult<MintReceipt> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if recipient.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }
        if !self.authority.may_mint(&minter, &recipient, amount) {
            return Err(LedgerError::Unauthorized { minter });
        }

        let cap = self.config.cap;
        let supply_after = match self.total_supply.checked_add(amount) {
            Some(next) if next <= cap => next,
            Some(next) => {
                return Err(LedgerError::CapExceeded {
                    cap,
                    would_have: next,
                })
            }
            None => {
                return Err(LedgerError::CapExceeded {
                    cap,
                    would_have: Amount::MAX,
                })
            }
        };
        let balance_after = self
            .balance_of(&recipient)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.config
            .ownership_limit
            .check(&recipient, balance_after, supply_after, cap)?;

        self.total_supply = supply_after;
        self.balances.insert(recipient, balance_after);
        self.record(LedgerEvent::Mint {
            minter,
            to: recipient,
            amount,
        });
        Ok(MintReceipt {
            amount,
            balance: balance_after,
            total_supply: supply_after,
        })
    }

    /// Move `amount` from `sender`, crediting `recipient` with the amount net
    /// of the fee and the fee recipient with the fee.
    ///
    /// Sender, recipient and fee recipient may coincide; credits and debits
    /// then combine arithmetically. Every credited holder must stay within
    /// the ownership limit, the fee recipient included.
    pub fn transfer(
        &mut self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> LedgerResult<TransferReceipt> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        if recipient.is_zero() {
            return Err(LedgerError::InvalidRecipient);
        }
        let have = self.balance_of(&sender);
        if have < amount {
            return Err(LedgerError::InsufficientBalance { have, need: amount });
        }

        let FeeSplit { fee, net } = self.fees.split(amount);
        let fee_recipient = self.config.fee_recipient;

        let mut staged = BTreeMap::new();
        staged.insert(sender, have - amount);
        let mut credited = Vec::with_capacity(2);
        if net > 0 {
            self.stage_credit(&mut staged, recipient, net)?;
            credited.push(recipient);
        }
        if fee > 0 {
            self.stage_credit(&mut staged, fee_recipient, fee)?;
            credited.push(fee_recipient);
        }
        // supply is unchanged by a transfer
        for holder in &credited {
            let balance = staged.get(holder).copied().unwrap_or_default();
            self.config
                .ownership_limit
                .check(holder, balance, self.total_supply, self.config.cap)?;
        }

        for (holder, balance) in staged {
            if balance == 0 {
                self.balances.remove(&holder);
            } else {
                self.balances.insert(holder, balance);
            }
        }
        self.record(LedgerEvent::Transfer {
            from: sender,
            to: recipient,
            amount,
            fee,
        });
        Ok(TransferReceipt { amount, fee, net })
    }

    fn stage_credit(
        &self,
        staged: &mut BTreeMap<Address, Amount>,
        holder: Address,
        value: Amount,
    ) -> LedgerResult<()> {
        let current = match staged.get(&holder) {
            Some(balance) => *balance,
            None => self.balance_of(&holder),
        };
        let next = current.checked_add(value).ok_or(LedgerError::Overflow)?;
        staged.insert(holder, next);
        Ok(())
    }

    fn record(&mut self, event: LedgerEvent) {
        self.height += 1;
        self.events.push(event);
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn cap(&self) -> Amount {
        self.config.cap
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn fee_rate_bps(&self) -> u16 {
        self.config.fee_rate_bps
    }

    pub fn fee_recipient(&self) -> Address {
        self.config.fee_recipient
    }

    pub fn ownership_limit(&self) -> OwnershipLimit {
        self.config.ownership_limit
    }

    /// Largest balance any holder may currently have.
    pub fn ownership_threshold(&self) -> Amount {
        self.config
            .ownership_limit
            .threshold(self.total_supply, self.config.cap)
    }

    /// Tokens that can still be minted before the cap is reached.
    pub fn mintable(&self) -> Amount {
        self.config.cap - self.total_supply
    }

    /// Holders with a non-zero balance, in address order.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, Amount)> {
        self.balances.iter().map(|(addr, bal)| (addr, *bal))
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Number of transitions applied since creation, genesis included.
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Re-derive the supply and limit invariants from the stored balances.
    pub fn check_invariants(&self) -> LedgerResult<()> {
        let corrupt = |msg: String| -> LedgerResult<()> { Err(LedgerError::CorruptSnapshot(msg)) };
        if self.total_supply > self.config.cap {
            return corrupt(format!(
                "supply {} exceeds cap {}",
                self.total_supply, self.config.cap
            ));
        }
        let mut sum: Amount = 0;
        for (holder, balance) in &self.balances {
            if holder.is_zero() {
                return corrupt("zero address holds a balance".into());
            }
            if *balance == 0 {
                return corrupt(format!("empty balance entry for {holder}"));
            }
            sum = match sum.checked_add(*balance) {
                Some(next) => next,
                None => return corrupt("balances overflow".into()),
            };
            if let Err(e) = self.config.ownership_limit.check(
                holder,
                *balance,
                self.total_supply,
                self.config.cap,
            ) {
                return corrupt(e.to_string());
            }
        }
        if sum != self.total_supply {
            return corrupt(format!(
                "balances sum to {sum} but supply is {}",
                self.total_supply
            ));
        }
        Ok(())
    }
}
