use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::AccountId;

use crate::entry::EntryType;

/// Ledger participant kind. Determines the normal balance side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountKind {
    Customer,
    Vendor,
    Cash,
    Bank,
    Expense,
    Income,
    Equity,
}

/// Side on which an account's balance is reported as positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalBalance {
    Debit,
    Credit,
}

impl AccountKind {
    /// Customers, cash, bank and expenses are debit-normal; vendors, income
    /// and equity are credit-normal.
    pub fn normal_balance(self) -> NormalBalance {
        match self {
            AccountKind::Customer | AccountKind::Cash | AccountKind::Bank | AccountKind::Expense => {
                NormalBalance::Debit
            }
            AccountKind::Vendor | AccountKind::Income | AccountKind::Equity => {
                NormalBalance::Credit
            }
        }
    }

    /// Customer or vendor (a trading party rather than an internal account).
    pub fn is_party(self) -> bool {
        matches!(self, AccountKind::Customer | AccountKind::Vendor)
    }

    pub fn is_cash_or_bank(self) -> bool {
        matches!(self, AccountKind::Cash | AccountKind::Bank)
    }

    /// Effect of one entry on a balance reported in this kind's sign convention.
    pub fn balance_change(self, entry_type: EntryType, amount: Decimal) -> Decimal {
        match (self.normal_balance(), entry_type) {
            (NormalBalance::Debit, EntryType::Debit) | (NormalBalance::Credit, EntryType::Credit) => {
                amount
            }
            _ => -amount,
        }
    }

    /// Convert a debit-positive net movement into this kind's sign convention.
    pub fn signed_net(self, net_debit: Decimal) -> Decimal {
        match self.normal_balance() {
            NormalBalance::Debit => net_debit,
            NormalBalance::Credit => -net_debit,
        }
    }
}

impl core::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            AccountKind::Customer => "customer",
            AccountKind::Vendor => "vendor",
            AccountKind::Cash => "cash",
            AccountKind::Bank => "bank",
            AccountKind::Expense => "expense",
            AccountKind::Income => "income",
            AccountKind::Equity => "equity",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Deactivated,
}

/// A ledger account owned by a tenant.
///
/// `opening_balance` is expressed in the kind's sign convention: a positive
/// opening balance on a vendor means the tenant owes that vendor. The current
/// balance is always derived from entries; there is no stored copy to mutate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub kind: AccountKind,
    pub name: String,
    pub opening_balance: Decimal,
    pub status: AccountStatus,
}

impl Account {
    pub fn new(id: AccountId, kind: AccountKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            opening_balance: Decimal::ZERO,
            status: AccountStatus::Active,
        }
    }

    pub fn with_opening_balance(mut self, opening_balance: Decimal) -> Self {
        self.opening_balance = opening_balance;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Balance given the debit-positive net of all entries posted so far.
    pub fn balance_after(&self, net_debit: Decimal) -> Decimal {
        self.opening_balance + self.kind.signed_net(net_debit)
    }
}
