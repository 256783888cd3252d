//! Shared building blocks for the pricing and ledger crates.
//!
//! Pure domain primitives only: identifiers, the domain error model, aggregate
//! traits and money rounding.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, AggregateId, EntryId, TenantId};
pub use money::{MONEY_SCALE, money_epsilon, round_money, within_rounding};
