use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::address::Address;
use crate::error::LedgerResult;
use crate::ledger::{LedgerSnapshot, MintReceipt, TokenLedger, TransferReceipt};
use crate::Amount;

/// Cloneable handle that serializes every operation on one ledger behind a
/// single mutex, giving concurrent callers a total order of transitions.
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<Mutex<TokenLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: TokenLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    // A panic while holding the lock cannot leave a half-applied transition:
    // the ledger only mutates after all checks pass.
    fn lock(&self) -> MutexGuard<'_, TokenLedger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mint(&self, recipient: Address, amount: Amount) -> LedgerResult<MintReceipt> {
        self.mint_by(recipient, recipient, amount)
    }

    pub fn mint_by(
        &self,
        minter: Address,
        recipient: Address,
        amount: Amount,
    ) -> LedgerResult<MintReceipt> {
        let result = self.lock().mint_by(minter, recipient, amount);
        if let Err(err) = &result {
            debug!(%minter, %recipient, %amount, %err, "mint rejected");
        }
        result
    }

    pub fn transfer(
        &self,
        sender: Address,
        recipient: Address,
        amount: Amount,
    ) -> LedgerResult<TransferReceipt> {
        let result = self.lock().transfer(sender, recipient, amount);
        if let Err(err) = &result {
            debug!(%sender, %recipient, %amount, %err, "transfer rejected");
        }
        result
    }

    pub fn balance_of(&self, holder: &Address) -> Amount {
        self.lock().balance_of(holder)
    }

    pub fn total_supply(&self) -> Amount {
        self.lock().total_supply()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.lock().snapshot()
    }

    /// Run a read-only closure against a consistent view of the ledger.
    pub fn read<R>(&self, f: impl FnOnce(&TokenLedger) -> R) -> R {
        f(&self.lock())
    }

    /// Take the ledger back once this is the last handle.
    pub fn try_into_inner(self) -> Result<TokenLedger, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(Self { inner }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::config::LedgerConfig;
    use crate::error::LedgerError;
    use crate::policy::OwnershipLimit;

    fn addr(tag: u8) -> Address {
        Address::new([tag; 32])
    }

    #[test]
    fn concurrent_mints_never_exceed_cap() {
        let cfg = LedgerConfig::new("T", "T", 1_000, 0, addr(0xee))
            .with_ownership_limit(OwnershipLimit::of_cap(10_000));
        let shared = SharedLedger::new(TokenLedger::create(cfg).unwrap());

        let handles: Vec<_> = (1..=8u8)
            .map(|tag| {
                let shared = shared.clone();
                thread::spawn(move || {
                    let mut minted = 0u128;
                    for _ in 0..50 {
                        match shared.mint(addr(tag), 7) {
                            Ok(_) => minted += 7,
                            Err(LedgerError::CapExceeded { .. }) => {}
                            Err(other) => panic!("unexpected {other}"),
                        }
                    }
                    minted
                })
            })
            .collect();
        let minted: u128 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // 8 * 50 * 7 = 2_800 requested; only multiples of 7 fit under 1_000
        assert_eq!(minted, 994);
        assert_eq!(shared.total_supply(), 994);
        shared.read(|ledger| ledger.check_invariants()).unwrap();
    }

    #[test]
    fn concurrent_transfers_conserve_supply() {
        let cfg = LedgerConfig::new("T", "T", 100_000, 100, addr(0xee))
            .with_ownership_limit(OwnershipLimit::of_cap(10_000));
        let shared = SharedLedger::new(TokenLedger::create(cfg).unwrap());
        shared.mint(addr(1), 50_000).unwrap();
        shared.mint(addr(2), 50_000).unwrap();

        let a = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let _ = shared.transfer(addr(1), addr(2), 250);
                }
            })
        };
        let b = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let _ = shared.transfer(addr(2), addr(1), 300);
                }
            })
        };
        a.join().unwrap();
        b.join().unwrap();

        let ledger = shared.try_into_inner().ok().unwrap();
        assert_eq!(ledger.total_supply(), 100_000);
        // 100 * 2 + 100 * 3 in fees
        assert_eq!(ledger.balance_of(&addr(0xee)), 500);
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn try_into_inner_fails_while_shared() {
        let cfg = LedgerConfig::new("T", "T", 10, 0, addr(0xee));
        let shared = SharedLedger::new(TokenLedger::create(cfg).unwrap());
        let other = shared.clone();
        let shared = shared.try_into_inner().err().unwrap();
        drop(other);
        assert!(shared.try_into_inner().is_ok());
    }
}
