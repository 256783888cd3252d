use rust_decimal::Decimal;
use thiserror::Error;

use tally_core::{AccountId, DomainError};
use tally_pricing::PricingError;

use crate::account::AccountKind;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger posting and balance failures.
///
/// None of these are retried: each one is either a caller defect (bad account,
/// bad amount, wrong document state) or an invariant violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),

    /// Debits and credits of a posting set differ. Indicates a caller bug.
    #[error("unbalanced posting: debits {debits} != credits {credits}")]
    UnbalancedPosting { debits: Decimal, credits: Decimal },

    /// A posting set without both a debit and a credit side.
    #[error("posting set must contain at least one debit and one credit entry")]
    SingleSidedPosting,

    #[error("account {account} is {found}, expected {expected}")]
    AccountKindMismatch {
        account: AccountId,
        expected: &'static str,
        found: AccountKind,
    },

    #[error("account {0} is deactivated")]
    InactiveAccount(AccountId),

    #[error("amount mismatch: declared {declared}, computed {computed}")]
    AmountMismatch { declared: Decimal, computed: Decimal },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid document state: {0}")]
    InvalidDocumentState(String),

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("account {0} already exists")]
    DuplicateAccount(AccountId),

    #[error("account {0} has postings and cannot be deleted")]
    AccountHasPostings(AccountId),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("ledger store failure: {0}")]
    Store(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Domain(DomainError),
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => LedgerError::Concurrency(msg),
            other => LedgerError::Domain(other),
        }
    }
}

impl LedgerError {
    /// Invariant violations that must abort and alert rather than be shown as
    /// an input problem.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::UnbalancedPosting { .. }
                | LedgerError::SingleSidedPosting
                | LedgerError::TenantIsolation(_)
                | LedgerError::Store(_)
        )
    }

    /// Message suitable for showing next to the document being saved.
    pub fn user_message(&self) -> String {
        match self {
            LedgerError::UnknownAccount(_)
            | LedgerError::InactiveAccount(_)
            | LedgerError::AccountKindMismatch { .. } => "select a valid account".to_string(),
            LedgerError::UnbalancedPosting { .. } | LedgerError::SingleSidedPosting => {
                "document not saved: total debits must equal total credits".to_string()
            }
            LedgerError::AmountMismatch { declared, computed } => format!(
                "document total {declared} does not match the sum of its lines {computed}"
            ),
            LedgerError::Pricing(e) => e.to_string(),
            other => format!("document not saved: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unbalanced_posting_is_fatal_and_names_the_invariant() {
        let err = LedgerError::UnbalancedPosting {
            debits: dec!(100),
            credits: dec!(90),
        };
        assert!(err.is_fatal());
        assert!(err.user_message().contains("debits must equal total credits"));
    }

    #[test]
    fn account_errors_ask_for_a_valid_account() {
        let err = LedgerError::UnknownAccount(AccountId::new());
        assert!(!err.is_fatal());
        assert_eq!(err.user_message(), "select a valid account");
    }

    #[test]
    fn domain_conflict_maps_to_concurrency() {
        let err: LedgerError = DomainError::conflict("stale").into();
        assert_eq!(err, LedgerError::Concurrency("stale".to_string()));
    }
}
