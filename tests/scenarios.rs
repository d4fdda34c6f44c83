use galai_ledger::{
    Address, Allocation, Amount, LedgerConfig, LedgerError, OwnershipLimit, SharedLedger,
    TokenLedger,
};

const TOKEN: Amount = 1_000_000_000_000_000_000;

fn addr(tag: u8) -> Address {
    Address::new([tag; 32])
}

const A: u8 = 0xa1;
const B: u8 = 0xb2;
const C: u8 = 0xc3;
const R: u8 = 0xee;

/// cap = 1,000,000 tokens, 1% fee to R, ownership limit 50% of cap: the
/// configuration under which a single holder can take 500,000 tokens.
fn galai_cap_basis() -> TokenLedger {
    let cfg = LedgerConfig::new("GALAI", "GAL", 1_000_000 * TOKEN, 100, addr(R))
        .with_ownership_limit(OwnershipLimit::of_cap(5_000));
    TokenLedger::create(cfg).unwrap()
}

fn sum_of_balances(ledger: &TokenLedger) -> Amount {
    ledger.holders().map(|(_, balance)| balance).sum()
}

#[test]
fn mint_half_the_cap_to_a_single_holder() {
    let mut ledger = galai_cap_basis();
    ledger.mint(addr(A), 500_000 * TOKEN).unwrap();
    assert_eq!(ledger.balance_of(&addr(A)), 500_000 * TOKEN);
    assert_eq!(ledger.total_supply(), 500_000 * TOKEN);
}

#[test]
fn five_argument_ledger_runs_the_galai_deployment() {
    let mut ledger = TokenLedger::new("GALAI", "GAL", 1_000_000 * TOKEN, 100, addr(R)).unwrap();
    ledger.mint(addr(A), 500_000 * TOKEN).unwrap();
    assert_eq!(ledger.total_supply(), 500_000 * TOKEN);

    let receipt = ledger.transfer(addr(A), addr(C), 100_000 * TOKEN).unwrap();
    assert_eq!(receipt.fee, 1_000 * TOKEN);
    assert_eq!(ledger.balance_of(&addr(C)), 99_000 * TOKEN);
    assert_eq!(sum_of_balances(&ledger), ledger.total_supply());

    let mut fresh = TokenLedger::new("GALAI", "GAL", 1_000_000 * TOKEN, 100, addr(R)).unwrap();
    assert!(matches!(
        fresh.mint(addr(B), 510_000 * TOKEN),
        Err(LedgerError::OwnershipLimitExceeded { .. })
    ));
    assert_eq!(fresh.total_supply(), 0);
}

#[test]
fn mint_over_five_percent_of_resulting_supply_fails() {
    // 20 holders of 25,000 each: everyone sits at exactly 5% of 500,000
    let genesis = (1..=20)
        .map(|i| Allocation {
            address: addr(i),
            amount: 25_000 * TOKEN,
        })
        .collect();
    // cap is 2,000,000 so the cap check passes and the limit is what trips
    let cfg = LedgerConfig::new("GALAI", "GAL", 2_000_000 * TOKEN, 100, addr(R))
        .with_ownership_limit(OwnershipLimit::of_supply(500))
        .with_genesis(genesis);
    let mut ledger = TokenLedger::create(cfg).unwrap();
    assert_eq!(ledger.total_supply(), 500_000 * TOKEN);

    let err = ledger.mint(addr(B), 510_000 * TOKEN).unwrap_err();
    assert_eq!(
        err,
        LedgerError::OwnershipLimitExceeded {
            holder: addr(B),
            balance: 510_000 * TOKEN,
            limit: 50_500 * TOKEN,
        }
    );
    assert_eq!(ledger.total_supply(), 500_000 * TOKEN);
    assert_eq!(ledger.balance_of(&addr(B)), 0);
}

#[test]
fn same_mint_under_a_one_million_cap_hits_the_cap_first() {
    let genesis = (1..=20)
        .map(|i| Allocation {
            address: addr(i),
            amount: 25_000 * TOKEN,
        })
        .collect();
    let cfg = LedgerConfig::new("GALAI", "GAL", 1_000_000 * TOKEN, 100, addr(R))
        .with_ownership_limit(OwnershipLimit::of_supply(500))
        .with_genesis(genesis);
    let mut ledger = TokenLedger::create(cfg).unwrap();
    assert!(matches!(
        ledger.mint(addr(B), 510_000 * TOKEN),
        Err(LedgerError::CapExceeded { .. })
    ));
}

#[test]
fn transfer_routes_one_percent_to_fee_recipient() {
    let mut ledger = galai_cap_basis();
    ledger.mint(addr(A), 500_000).unwrap();
    let fee_before = ledger.balance_of(&addr(R));

    let receipt = ledger.transfer(addr(A), addr(C), 100_000).unwrap();
    assert_eq!(receipt.fee, 1_000);
    assert_eq!(receipt.net, 99_000);
    assert_eq!(ledger.balance_of(&addr(A)), 400_000);
    assert_eq!(ledger.balance_of(&addr(C)), 99_000);
    assert_eq!(ledger.balance_of(&addr(R)), fee_before + 1_000);
    assert_eq!(ledger.total_supply(), 500_000);
    assert_eq!(sum_of_balances(&ledger), ledger.total_supply());
}

#[test]
fn shared_handle_applies_the_same_rules() {
    let shared = SharedLedger::new(galai_cap_basis());
    shared.mint(addr(A), 500_000 * TOKEN).unwrap();
    assert!(matches!(
        shared.mint(addr(A), 1),
        Err(LedgerError::OwnershipLimitExceeded { .. })
    ));
    shared.transfer(addr(A), addr(C), 100_000 * TOKEN).unwrap();
    assert_eq!(shared.balance_of(&addr(R)), 1_000 * TOKEN);
    let snapshot = shared.snapshot();
    let restored = TokenLedger::restore(snapshot).unwrap();
    assert_eq!(restored.balance_of(&addr(C)), 99_000 * TOKEN);
}
