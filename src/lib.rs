//! Capped fungible-token ledger.
//!
//! A single [`TokenLedger`] tracks one token's supply and balances and
//! enforces three rules on top of plain transfers:
//!
//! * a hard supply cap fixed at creation,
//! * an ownership limit bounding any holder's share (see [`OwnershipLimit`]),
//! * a transfer fee in basis points paid to a fixed fee recipient.
//!
//! The surrounding modules are collaborators: [`SharedLedger`] serializes
//! access from many threads, [`store`] persists snapshots as JSON, and the
//! `galai` binary drives everything from the command line.

pub mod address;
pub mod amount;
pub mod config;
pub mod ledger;
pub mod policy;
pub mod shared;
pub mod store;

mod error;

pub use address::Address;
pub use amount::Amount;
pub use config::{Allocation, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{
    Holding, LedgerEvent, LedgerSnapshot, MintReceipt, TokenLedger, TransferReceipt,
};
pub use policy::{FeeSchedule, LimitBasis, MintAuthority, OpenMint, OwnershipLimit};
pub use shared::SharedLedger;
