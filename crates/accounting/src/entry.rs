use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, EntryId, round_money};

use crate::document::DocumentId;
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn mirrored(self) -> Self {
        match self {
            EntryType::Debit => EntryType::Credit,
            EntryType::Credit => EntryType::Debit,
        }
    }
}

/// What kind of document produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Invoice,
    Payment,
    Bill,
    CreditNote,
    Expense,
    Contra,
    Reversal,
}

impl ReferenceType {
    /// Voucher number prefix (e.g. `INV-000042`).
    pub fn voucher_prefix(self) -> &'static str {
        match self {
            ReferenceType::Invoice => "INV",
            ReferenceType::Payment => "PAY",
            ReferenceType::Bill => "BILL",
            ReferenceType::CreditNote => "CN",
            ReferenceType::Expense => "EXP",
            ReferenceType::Contra => "CON",
            ReferenceType::Reversal => "REV",
        }
    }
}

/// A single immutable debit or credit against one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub document_id: DocumentId,
    pub voucher_number: String,
    pub date: NaiveDate,
    pub entry_type: EntryType,
    /// Strictly positive, at most two decimal places.
    pub amount: Decimal,
    pub reference_type: ReferenceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
}

impl LedgerEntry {
    /// Debit-positive signed amount.
    pub fn net_debit(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => self.amount,
            EntryType::Credit => -self.amount,
        }
    }

    /// Replay order: document date, then entry id for same-date entries.
    pub fn replay_key(&self) -> (NaiveDate, EntryId) {
        (self.date, self.id)
    }
}

/// One side of a posting before ids and voucher numbers are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingLine {
    pub account_id: AccountId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub narration: Option<String>,
}

impl PostingLine {
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            entry_type: EntryType::Debit,
            amount,
            narration: None,
        }
    }

    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            entry_type: EntryType::Credit,
            amount,
            narration: None,
        }
    }

    pub fn narrated(mut self, narration: Option<String>) -> Self {
        self.narration = narration;
        self
    }
}

/// The balanced group of entries produced by one document, appended atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingSet {
    pub document_id: DocumentId,
    pub voucher_number: String,
    pub date: NaiveDate,
    pub reference_type: ReferenceType,
    pub entries: Vec<LedgerEntry>,
}

impl PostingSet {
    /// Stamp posting lines with ids and voucher metadata, then validate.
    pub fn assemble(
        document_id: DocumentId,
        voucher_number: impl Into<String>,
        date: NaiveDate,
        reference_type: ReferenceType,
        lines: Vec<PostingLine>,
        mut next_id: impl FnMut() -> EntryId,
    ) -> LedgerResult<Self> {
        let voucher_number = voucher_number.into();
        let entries = lines
            .into_iter()
            .map(|line| LedgerEntry {
                id: next_id(),
                account_id: line.account_id,
                document_id,
                voucher_number: voucher_number.clone(),
                date,
                entry_type: line.entry_type,
                amount: line.amount,
                reference_type,
                narration: line.narration,
            })
            .collect();

        let set = Self {
            document_id,
            voucher_number,
            date,
            reference_type,
            entries,
        };
        set.validate()?;
        Ok(set)
    }

    /// Saturates instead of overflowing; `validate` rejects sets whose sides
    /// do not fit.
    pub fn debit_total(&self) -> Decimal {
        self.side_total(EntryType::Debit).unwrap_or(Decimal::MAX)
    }

    pub fn credit_total(&self) -> Decimal {
        self.side_total(EntryType::Credit).unwrap_or(Decimal::MAX)
    }

    fn side_total(&self, side: EntryType) -> Option<Decimal> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == side)
            .try_fold(Decimal::ZERO, |total, e| total.checked_add(e.amount))
    }

    /// Accounts touched, in lock order.
    pub fn accounts(&self) -> BTreeSet<AccountId> {
        self.entries.iter().map(|e| e.account_id).collect()
    }

    /// Enforce the double-entry law and entry well-formedness.
    ///
    /// Debits must equal credits exactly; there is no tolerance.
    pub fn validate(&self) -> LedgerResult<()> {
        let mut has_debit = false;
        let mut has_credit = false;

        for entry in &self.entries {
            if entry.amount <= Decimal::ZERO {
                return Err(LedgerError::InvalidAmount(format!(
                    "entry amount {} must be positive",
                    entry.amount
                )));
            }
            if round_money(entry.amount) != entry.amount {
                return Err(LedgerError::InvalidAmount(format!(
                    "entry amount {} has more than two decimal places",
                    entry.amount
                )));
            }
            if entry.document_id != self.document_id || entry.voucher_number != self.voucher_number {
                return Err(LedgerError::InvalidDocument(
                    "entry does not belong to this posting set".to_string(),
                ));
            }
            match entry.entry_type {
                EntryType::Debit => has_debit = true,
                EntryType::Credit => has_credit = true,
            }
        }

        if !has_debit || !has_credit {
            return Err(LedgerError::SingleSidedPosting);
        }

        let (Some(debits), Some(credits)) = (
            self.side_total(EntryType::Debit),
            self.side_total(EntryType::Credit),
        ) else {
            return Err(LedgerError::InvalidAmount(
                "posting set total exceeds the representable range".to_string(),
            ));
        };
        if debits != credits {
            return Err(LedgerError::UnbalancedPosting { debits, credits });
        }

        Ok(())
    }

    /// Mirror-image set: every debit becomes a credit and vice versa.
    pub fn reversal(
        &self,
        voucher_number: impl Into<String>,
        date: NaiveDate,
        narration: Option<String>,
        next_id: impl FnMut() -> EntryId,
    ) -> LedgerResult<Self> {
        let narration = narration.or_else(|| Some(format!("Reversal of {}", self.voucher_number)));
        let lines = self
            .entries
            .iter()
            .map(|e| PostingLine {
                account_id: e.account_id,
                entry_type: e.entry_type.mirrored(),
                amount: e.amount,
                narration: narration.clone(),
            })
            .collect();

        Self::assemble(
            self.document_id,
            voucher_number,
            date,
            ReferenceType::Reversal,
            lines,
            next_id,
        )
    }
}
