use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::round_money;

use crate::config::DuePolicy;
use crate::error::{PricingError, PricingResult};
use crate::line_item::{LineItem, compute_line_total};

/// Kind of document being priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Invoice,
    Quotation,
    PurchaseBill,
    CreditNote,
    ExpenseVoucher,
    ContraVoucher,
}

impl DocumentKind {
    /// Sales and purchase documents need at least one row. Vouchers post
    /// against free-form accounts and may be priced without rows.
    pub fn requires_lines(self) -> bool {
        !matches!(self, Self::ExpenseVoucher | Self::ContraVoucher)
    }

    /// Vouchers post one ledger entry per row, so their grand total is the sum
    /// of the rounded line totals. Other documents round once, at the end.
    pub fn sums_rounded_lines(self) -> bool {
        matches!(self, Self::ExpenseVoucher | Self::ContraVoucher)
    }
}

impl core::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Invoice => "invoice",
            Self::Quotation => "quotation",
            Self::PurchaseBill => "purchase bill",
            Self::CreditNote => "credit note",
            Self::ExpenseVoucher => "expense voucher",
            Self::ContraVoucher => "contra voucher",
        };
        f.write_str(name)
    }
}

/// Settlement state derived from totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Overpaid,
}

/// Document-level totals.
///
/// `grand_total == subtotal - discount_total + tax_total` holds within one
/// cent: `tax_total` is rounded for display while `grand_total` is rounded
/// from the unrounded tax sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    /// Sum of `quantity * unit_rate`, before discount and tax.
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub paid_amount: Decimal,
    pub credit_note_amount: Decimal,
    /// Negative when overpaid, unless the `FloorAtZero` policy was applied.
    pub due_amount: Decimal,
}

impl DocumentTotals {
    /// Amount settled by payments and credit notes.
    pub fn settled_amount(&self) -> Decimal {
        self.paid_amount + self.credit_note_amount
    }

    /// Derived from the raw balance so that a floored due amount still reports
    /// an overpayment.
    pub fn payment_status(&self) -> PaymentStatus {
        let settled = self.settled_amount();
        let outstanding = self.grand_total - settled;

        if outstanding < Decimal::ZERO {
            PaymentStatus::Overpaid
        } else if outstanding.is_zero() {
            PaymentStatus::Paid
        } else if settled.is_zero() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::PartiallyPaid
        }
    }
}

/// Compute document totals, reporting overpayments as a negative due amount.
pub fn compute_document_totals(
    kind: DocumentKind,
    items: &[LineItem],
    paid_amount: Decimal,
    credit_note_amount: Decimal,
) -> PricingResult<DocumentTotals> {
    compute_document_totals_with_policy(kind, items, paid_amount, credit_note_amount, DuePolicy::AsIs)
}

/// Compute document totals under an explicit due-amount policy.
///
/// Tax is taken per line and summed; it is never recomputed from the
/// aggregate. The first invalid row aborts with its index attached.
pub fn compute_document_totals_with_policy(
    kind: DocumentKind,
    items: &[LineItem],
    paid_amount: Decimal,
    credit_note_amount: Decimal,
    policy: DuePolicy,
) -> PricingResult<DocumentTotals> {
    if items.is_empty() && kind.requires_lines() {
        return Err(PricingError::EmptyDocument(kind));
    }
    if paid_amount < Decimal::ZERO {
        return Err(PricingError::InvalidAmount(format!(
            "paid amount {paid_amount} must not be negative"
        )));
    }
    if credit_note_amount < Decimal::ZERO {
        return Err(PricingError::InvalidAmount(format!(
            "credit note amount {credit_note_amount} must not be negative"
        )));
    }

    let mut subtotal = Decimal::ZERO;
    let mut discount_total = Decimal::ZERO;
    let mut tax_sum = Decimal::ZERO;
    let mut line_totals = Decimal::ZERO;

    for (index, item) in items.iter().enumerate() {
        let line = compute_line_total(item).map_err(|e| e.at_line(index))?;

        subtotal = add(subtotal, line.gross, "subtotal")?;
        discount_total = add(discount_total, line.discount, "discount total")?;
        tax_sum = add(tax_sum, line.tax_amount, "tax total")?;
        line_totals = add(line_totals, line.total, "line totals")?;
    }

    let grand_total = if kind.sums_rounded_lines() {
        line_totals
    } else {
        round_money(add(subtotal - discount_total, tax_sum, "grand total")?)
    };

    let settled = add(paid_amount, credit_note_amount, "settled amount")?;
    let raw_due = grand_total - settled;
    let due_amount = match policy {
        DuePolicy::AsIs => raw_due,
        DuePolicy::FloorAtZero => raw_due.max(Decimal::ZERO),
    };

    Ok(DocumentTotals {
        subtotal,
        discount_total,
        tax_total: round_money(tax_sum),
        grand_total,
        paid_amount,
        credit_note_amount,
        due_amount,
    })
}

fn add(a: Decimal, b: Decimal, what: &str) -> PricingResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| PricingError::InvalidAmount(format!("{what} overflow")))
}
