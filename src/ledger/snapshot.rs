use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{LedgerEvent, TokenLedger};
use crate::address::Address;
use crate::amount::serde_amount;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::policy::LimitBasis;
use crate::Amount;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Holding {
    pub address: Address,
    #[serde(with = "serde_amount")]
    pub balance: Amount,
}

/// Point-in-time copy of a ledger, suitable for persisting and restoring.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub config: LedgerConfig,
    #[serde(with = "serde_amount")]
    pub total_supply: Amount,
    pub balances: Vec<Holding>,
    pub height: u64,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "hex_root")]
    pub state_root: [u8; 32],
}

impl LedgerSnapshot {
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }
}

impl TokenLedger {
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            config: self.config.clone(),
            total_supply: self.total_supply,
            balances: self
                .balances
                .iter()
                .map(|(address, balance)| Holding {
                    address: *address,
                    balance: *balance,
                })
                .collect(),
            height: self.height,
            events: self.events.clone(),
            state_root: self.state_root(),
        }
    }

    /// Commitment over the token parameters, supply, height, the journal and
    /// every non-zero balance.
    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(
            &self.config,
            self.total_supply,
            self.height,
            &self.events,
            &self.balances,
        )
    }

    /// Rebuild a ledger from a snapshot. The configuration, the supply
    /// invariants and the recorded state root are all re-checked, and the
    /// journal is replayed to confirm it produces the stored balances.
    /// Genesis allocations are not re-applied.
    pub fn restore(snapshot: LedgerSnapshot) -> LedgerResult<Self> {
        snapshot.config.validate()?;
        let mut balances = BTreeMap::new();
        for holding in &snapshot.balances {
            if balances.insert(holding.address, holding.balance).is_some() {
                return Err(LedgerError::CorruptSnapshot(format!(
                    "duplicate holder {}",
                    holding.address
                )));
            }
        }
        if snapshot.events.len() as u64 != snapshot.height {
            return Err(LedgerError::CorruptSnapshot(format!(
                "journal holds {} events but height is {}",
                snapshot.events.len(),
                snapshot.height
            )));
        }
        let root = compute_state_root(
            &snapshot.config,
            snapshot.total_supply,
            snapshot.height,
            &snapshot.events,
            &balances,
        );
        if root != snapshot.state_root {
            return Err(LedgerError::CorruptSnapshot(format!(
                "state root mismatch: recorded {}, computed {}",
                snapshot.state_root_hex(),
                hex::encode(root)
            )));
        }

        let mut ledger = Self::empty(snapshot.config);
        ledger.total_supply = snapshot.total_supply;
        ledger.balances = balances;
        ledger.height = snapshot.height;
        ledger.events = snapshot.events;
        ledger.check_invariants()?;
        ledger.check_journal()?;
        Ok(ledger)
    }

    /// Replay the journal from an empty ledger and compare the outcome with
    /// the stored supply and balances.
    fn check_journal(&self) -> LedgerResult<()> {
        let corrupt = |msg: String| LedgerError::CorruptSnapshot(format!("journal: {msg}"));
        let mut supply: Amount = 0;
        let mut balances: BTreeMap<Address, Amount> = BTreeMap::new();
        let credit = |balances: &mut BTreeMap<Address, Amount>,
                      to: Address,
                      value: Amount|
         -> LedgerResult<()> {
            let entry = balances.entry(to).or_insert(0);
            *entry = entry
                .checked_add(value)
                .ok_or_else(|| corrupt(format!("credit to {to} overflows")))?;
            Ok(())
        };

        for (idx, event) in self.events.iter().enumerate() {
            match *event {
                LedgerEvent::Genesis { to, amount } | LedgerEvent::Mint { to, amount, .. } => {
                    supply = supply
                        .checked_add(amount)
                        .ok_or_else(|| corrupt(format!("supply overflows at event {idx}")))?;
                    credit(&mut balances, to, amount)?;
                }
                LedgerEvent::Transfer {
                    from,
                    to,
                    amount,
                    fee,
                } => {
                    let split = self.fees.split(amount);
                    if split.fee != fee {
                        return Err(corrupt(format!(
                            "event {idx} records fee {fee}, schedule gives {}",
                            split.fee
                        )));
                    }
                    let have = balances.get(&from).copied().unwrap_or(0);
                    if have < amount {
                        return Err(corrupt(format!(
                            "event {idx} spends {amount} from {from} holding {have}"
                        )));
                    }
                    balances.insert(from, have - amount);
                    credit(&mut balances, to, split.net)?;
                    credit(&mut balances, self.config.fee_recipient, fee)?;
                }
            }
        }
        balances.retain(|_, balance| *balance > 0);

        if supply != self.total_supply || balances != self.balances {
            return Err(corrupt(
                "replay does not reproduce the stored balances".into(),
            ));
        }
        Ok(())
    }
}

fn compute_state_root(
    config: &LedgerConfig,
    total_supply: Amount,
    height: u64,
    events: &[LedgerEvent],
    balances: &BTreeMap<Address, Amount>,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::with_capacity(balances.len() + 2);

    let mut hasher = Sha256::new();
    hasher.update(b"meta");
    hasher.update((config.name.len() as u64).to_le_bytes());
    hasher.update(config.name.as_bytes());
    hasher.update((config.symbol.len() as u64).to_le_bytes());
    hasher.update(config.symbol.as_bytes());
    hasher.update(config.cap.to_le_bytes());
    hasher.update(config.fee_rate_bps.to_le_bytes());
    hasher.update(config.fee_recipient.as_bytes());
    hasher.update(config.ownership_limit.bps.to_le_bytes());
    hasher.update([match config.ownership_limit.basis {
        LimitBasis::Supply => 0u8,
        LimitBasis::Cap => 1u8,
    }]);
    hasher.update(total_supply.to_le_bytes());
    hasher.update(height.to_le_bytes());
    leaves.push(hasher.finalize().into());
    leaves.push(journal_digest(events));

    for (holder, balance) in balances {
        let mut hasher = Sha256::new();
        hasher.update(b"acct");
        hasher.update(holder.as_bytes());
        hasher.update(balance.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn journal_digest(events: &[LedgerEvent]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"jrnl");
    hasher.update((events.len() as u64).to_le_bytes());
    for event in events {
        match event {
            LedgerEvent::Genesis { to, amount } => {
                hasher.update(b"gen");
                hasher.update(to.as_bytes());
                hasher.update(amount.to_le_bytes());
            }
            LedgerEvent::Mint { minter, to, amount } => {
                hasher.update(b"mint");
                hasher.update(minter.as_bytes());
                hasher.update(to.as_bytes());
                hasher.update(amount.to_le_bytes());
            }
            LedgerEvent::Transfer {
                from,
                to,
                amount,
                fee,
            } => {
                hasher.update(b"xfer");
                hasher.update(from.as_bytes());
                hasher.update(to.as_bytes());
                hasher.update(amount.to_le_bytes());
                hasher.update(fee.to_le_bytes());
            }
        }
    }
    hasher.finalize().into()
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"galai-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            if chunk.len() == 2 {
                hasher.update(chunk[1]);
            } else {
                hasher.update(chunk[0]);
            }
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}

mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(root: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(root))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = hex::decode(raw.trim()).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| D::Error::custom(format!("state root must be 32 bytes, got {}", b.len())))
    }
}
