use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, AggregateId};
use tally_pricing::{DocumentTotals, LineItem};

use crate::entry::ReferenceType;

/// Identifier of a finalized financial document (invoice, payment, voucher).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub AggregateId);

impl DocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// One expense row: the account it is charged to and how it is priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseLine {
    pub account: AccountId,
    pub item: LineItem,
}

/// Which accounts a document debits and credits, with the amounts involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum PostingRule {
    /// DEBIT customer, CREDIT income for the grand total.
    SalesInvoice {
        customer: AccountId,
        income: AccountId,
        totals: DocumentTotals,
    },
    /// DEBIT cash/bank, CREDIT customer.
    PaymentReceived {
        customer: AccountId,
        deposit_to: AccountId,
        amount: Decimal,
    },
    /// DEBIT expense, CREDIT vendor for the grand total.
    PurchaseBill {
        vendor: AccountId,
        expense: AccountId,
        totals: DocumentTotals,
    },
    /// DEBIT vendor, CREDIT cash/bank.
    PaymentMade {
        vendor: AccountId,
        paid_from: AccountId,
        amount: Decimal,
    },
    /// DEBIT income, CREDIT customer for the grand total.
    SalesCreditNote {
        customer: AccountId,
        income: AccountId,
        totals: DocumentTotals,
    },
    /// DEBIT each line's expense account, CREDIT the paying account for the
    /// sum. `total` is the amount the user entered and must match.
    ExpenseVoucher {
        paid_from: AccountId,
        lines: Vec<ExpenseLine>,
        total: Decimal,
    },
    /// DEBIT `to`, CREDIT `from`: a transfer between two cash/bank accounts.
    ContraVoucher {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    },
}

impl PostingRule {
    pub fn reference_type(&self) -> ReferenceType {
        match self {
            PostingRule::SalesInvoice { .. } => ReferenceType::Invoice,
            PostingRule::PaymentReceived { .. } | PostingRule::PaymentMade { .. } => {
                ReferenceType::Payment
            }
            PostingRule::PurchaseBill { .. } => ReferenceType::Bill,
            PostingRule::SalesCreditNote { .. } => ReferenceType::CreditNote,
            PostingRule::ExpenseVoucher { .. } => ReferenceType::Expense,
            PostingRule::ContraVoucher { .. } => ReferenceType::Contra,
        }
    }
}

/// A finalized document ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    /// Voucher date; drives replay order.
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    pub rule: PostingRule,
}

impl Document {
    pub fn new(id: DocumentId, date: NaiveDate, rule: PostingRule) -> Self {
        Self {
            id,
            date,
            narration: None,
            rule,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rule_is_tagged_by_kind_with_camel_case_fields() {
        let rule = PostingRule::ContraVoucher {
            from: AccountId::new(),
            to: AccountId::new(),
            amount: dec!(250),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["kind"], "CONTRA_VOUCHER");
        assert!(json.get("from").is_some());

        let payment = PostingRule::PaymentReceived {
            customer: AccountId::new(),
            deposit_to: AccountId::new(),
            amount: dec!(150),
        };
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["kind"], "PAYMENT_RECEIVED");
        assert!(json.get("depositTo").is_some());

        let back: PostingRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, payment);
    }

    #[test]
    fn payments_in_and_out_share_a_reference_type() {
        let received = PostingRule::PaymentReceived {
            customer: AccountId::new(),
            deposit_to: AccountId::new(),
            amount: dec!(1),
        };
        let made = PostingRule::PaymentMade {
            vendor: AccountId::new(),
            paid_from: AccountId::new(),
            amount: dec!(1),
        };
        assert_eq!(received.reference_type(), ReferenceType::Payment);
        assert_eq!(made.reference_type(), ReferenceType::Payment);
    }
}
