use galai_ledger::{
    policy::apply_bps, Address, Allocation, Amount, FeeSchedule, LedgerConfig, LedgerResult,
    OwnershipLimit, TokenLedger,
};
use proptest::prelude::*;

const HOLDERS: usize = 7;
const FEE_RECIPIENT: usize = HOLDERS - 1;

fn holder(idx: usize) -> Address {
    if idx == FEE_RECIPIENT {
        Address::new([0xee; 32])
    } else {
        Address::new([idx as u8 + 1; 32])
    }
}

#[derive(Debug, Clone)]
enum Op {
    Mint { to: usize, amount: Amount },
    Transfer { from: usize, to: usize, amount: Amount },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..HOLDERS, 0u128..5_000).prop_map(|(to, amount)| Op::Mint { to, amount }),
        (0..HOLDERS, 0..HOLDERS, 0u128..5_000)
            .prop_map(|(from, to, amount)| Op::Transfer { from, to, amount }),
    ]
}

/// Six ordinary holders share an equal genesis so a supply-based limit down
/// to 20% can still be satisfied.
fn ledger() -> impl Strategy<Value = TokenLedger> {
    (
        1_000u128..100_000,
        0u16..=10_000,
        2_000u16..=10_000,
        any::<bool>(),
        1u128..100,
    )
        .prop_map(|(cap, fee_bps, limit_bps, cap_basis, each)| {
            let limit = if cap_basis {
                OwnershipLimit::of_cap(limit_bps)
            } else {
                OwnershipLimit::of_supply(limit_bps)
            };
            let genesis = (0..FEE_RECIPIENT)
                .map(|i| Allocation {
                    address: holder(i),
                    amount: each,
                })
                .collect();
            let cfg = LedgerConfig::new("PROP", "PRP", cap, fee_bps, holder(FEE_RECIPIENT))
                .with_ownership_limit(limit)
                .with_genesis(genesis);
            TokenLedger::create(cfg).expect("genesis fits by construction")
        })
}

fn apply(ledger: &mut TokenLedger, op: &Op) -> LedgerResult<()> {
    match *op {
        Op::Mint { to, amount } => ledger.mint(holder(to), amount).map(|_| ()),
        Op::Transfer { from, to, amount } => {
            let supply = ledger.total_supply();
            let receipt = ledger.transfer(holder(from), holder(to), amount)?;
            assert_eq!(receipt.fee + receipt.net, amount);
            assert_eq!(
                receipt.fee,
                amount * ledger.fee_rate_bps() as Amount / 10_000
            );
            assert_eq!(ledger.total_supply(), supply);
            Ok(())
        }
    }
}

fn assert_invariants(ledger: &TokenLedger) -> Result<(), TestCaseError> {
    prop_assert!(ledger.total_supply() <= ledger.cap());
    let sum: Amount = ledger.holders().map(|(_, b)| b).sum();
    prop_assert_eq!(sum, ledger.total_supply());
    let threshold = ledger.ownership_threshold();
    for (addr, balance) in ledger.holders() {
        prop_assert!(
            balance <= threshold,
            "{} holds {} over limit {}",
            addr,
            balance,
            threshold
        );
    }
    prop_assert!(ledger.check_invariants().is_ok());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, failure_persistence: None, .. ProptestConfig::default() })]

    #[test]
    fn prop_random_operations_preserve_invariants(
        mut ledger in ledger(),
        ops in prop::collection::vec(op(), 1..60),
    ) {
        assert_invariants(&ledger)?;
        for op in &ops {
            let before = ledger.snapshot();
            match apply(&mut ledger, op) {
                Ok(()) => {
                    prop_assert_eq!(ledger.height(), before.height + 1);
                }
                Err(_) => {
                    prop_assert_eq!(&ledger.snapshot(), &before);
                }
            }
            assert_invariants(&ledger)?;
        }
    }

    #[test]
    fn prop_snapshot_restore_preserves_root(
        mut ledger in ledger(),
        ops in prop::collection::vec(op(), 0..30),
    ) {
        for op in &ops {
            let _ = apply(&mut ledger, op);
        }
        let restored = TokenLedger::restore(ledger.snapshot()).unwrap();
        prop_assert_eq!(restored.state_root(), ledger.state_root());
        prop_assert_eq!(restored.total_supply(), ledger.total_supply());
    }

    #[test]
    fn prop_fee_split_is_exact(amount in 0u128..(1u128 << 100), bps in 0u16..=10_000) {
        let split = FeeSchedule::new(bps).split(amount);
        prop_assert_eq!(split.fee + split.net, amount);
        prop_assert_eq!(split.fee, amount * bps as u128 / 10_000);
        prop_assert_eq!(apply_bps(amount, bps), split.fee);
    }

    #[test]
    fn prop_over_cap_mint_changes_nothing(
        mut ledger in ledger(),
        extra in 1u128..1_000,
    ) {
        let before = ledger.snapshot();
        let amount = ledger.mintable() + extra;
        prop_assert!(ledger.mint(holder(0), amount).is_err());
        prop_assert_eq!(ledger.snapshot(), before);
    }
}
