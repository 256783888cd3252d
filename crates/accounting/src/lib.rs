//! Double-entry ledger for tally.
//!
//! Finalized documents become balanced posting sets that are appended to an
//! append-only, tenant-scoped ledger. Balances are always derivable by
//! replaying entries; the engine keeps an incremental cache for reads.

pub mod account;
pub mod balance;
pub mod clock;
pub mod config;
pub mod document;
pub mod engine;
pub mod entry;
pub mod error;
pub mod locks;
pub mod posting;
pub mod store;
pub mod voucher;

pub use account::{Account, AccountKind, AccountStatus, NormalBalance};
pub use balance::{
    AccountTotals, BalanceCache, StatementLine, TrialBalance, TrialBalanceRow, replay_balance,
    statement,
};
pub use clock::{
    Clock, FixedClock, IdGenerator, SequentialVoucherNumbers, SystemClock, UuidV7Ids,
    VoucherNumbering,
};
pub use config::LedgerConfig;
pub use document::{Document, DocumentId, ExpenseLine, PostingRule};
pub use engine::{BalanceDrift, LedgerEngine};
pub use entry::{EntryType, LedgerEntry, PostingLine, PostingSet, ReferenceType};
pub use error::{LedgerError, LedgerResult};
pub use locks::AccountLocks;
pub use posting::posting_lines;
pub use store::{InMemoryLedgerStore, LedgerStore};
pub use voucher::{
    LedgerEvent, PostVoucher, ReverseVoucher, Voucher, VoucherCommand, VoucherStatus,
};
