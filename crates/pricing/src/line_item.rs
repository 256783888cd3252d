use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::round_money;

use crate::error::{PricingError, PricingResult};

/// One row of a document as entered by the user.
///
/// Amounts are in the document currency. A zero quantity is a free item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub quantity: Decimal,
    pub unit_rate: Decimal,
    /// Percentage in `[0, 100]`.
    #[serde(default)]
    pub tax_percent: Decimal,
    /// Flat discount taken off `quantity * unit_rate`, before tax.
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LineItem {
    pub fn new(quantity: Decimal, unit_rate: Decimal) -> Self {
        Self {
            quantity,
            unit_rate,
            tax_percent: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            description: None,
        }
    }

    pub fn with_tax(mut self, tax_percent: Decimal) -> Self {
        self.tax_percent = tax_percent;
        self
    }

    pub fn with_discount(mut self, discount_amount: Decimal) -> Self {
        self.discount_amount = discount_amount;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn validate(&self) -> PricingResult<()> {
        if self.quantity < Decimal::ZERO {
            return Err(PricingError::invalid_line("quantity must not be negative"));
        }
        if self.unit_rate < Decimal::ZERO {
            return Err(PricingError::invalid_line("unit rate must not be negative"));
        }
        if self.discount_amount < Decimal::ZERO {
            return Err(PricingError::invalid_line("discount must not be negative"));
        }
        if self.tax_percent < Decimal::ZERO || self.tax_percent > Decimal::ONE_HUNDRED {
            return Err(PricingError::invalid_line(format!(
                "tax percent {} is outside 0..=100",
                self.tax_percent
            )));
        }
        Ok(())
    }
}

/// Priced breakdown of a single line.
///
/// Only `total` is rounded; the intermediates keep full precision so that
/// document totals can be summed without compounding rounding error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineTotal {
    /// `quantity * unit_rate`.
    pub gross: Decimal,
    pub discount: Decimal,
    /// `gross - discount`.
    pub taxable_base: Decimal,
    pub tax_amount: Decimal,
    /// `round2(taxable_base + tax_amount)`.
    pub total: Decimal,
}

/// Price one line item.
///
/// Rejects negative inputs, tax outside `0..=100`, and discounts larger than
/// the gross amount. Nothing is clamped.
pub fn compute_line_total(item: &LineItem) -> PricingResult<LineTotal> {
    item.validate()?;

    let gross = item
        .quantity
        .checked_mul(item.unit_rate)
        .ok_or_else(|| PricingError::invalid_line("line amount overflow"))?;

    let taxable_base = gross - item.discount_amount;
    if taxable_base < Decimal::ZERO {
        return Err(PricingError::invalid_line(format!(
            "discount {} exceeds line amount {}",
            item.discount_amount, gross
        )));
    }

    let tax_amount = taxable_base
        .checked_mul(item.tax_percent)
        .map(|t| t / Decimal::ONE_HUNDRED)
        .ok_or_else(|| PricingError::invalid_line("tax amount overflow"))?;

    let total = taxable_base
        .checked_add(tax_amount)
        .map(round_money)
        .ok_or_else(|| PricingError::invalid_line("line total overflow"))?;

    Ok(LineTotal {
        gross,
        discount: item.discount_amount,
        taxable_base,
        tax_amount,
        total,
    })
}
