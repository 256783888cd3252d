use rust_decimal::Decimal;

use crate::config::{DuePolicy, PricingConfig};
use crate::error::PricingResult;
use crate::line_item::{LineItem, LineTotal, compute_line_total};
use crate::totals::{DocumentKind, DocumentTotals, compute_document_totals_with_policy};

/// Accumulates the rows of a document during an edit session.
///
/// Rows are collected as plain values and priced once by [`finish`]; there is
/// no running total to keep in sync.
///
/// [`finish`]: DocumentBuilder::finish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentBuilder {
    kind: DocumentKind,
    items: Vec<LineItem>,
    due_policy: DuePolicy,
}

impl DocumentBuilder {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            due_policy: DuePolicy::default(),
        }
    }

    pub fn with_config(kind: DocumentKind, config: &PricingConfig) -> Self {
        Self::new(kind).due_policy(config.due_policy)
    }

    pub fn due_policy(mut self, policy: DuePolicy) -> Self {
        self.due_policy = policy;
        self
    }

    pub fn line(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn lines(mut self, items: impl IntoIterator<Item = LineItem>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Price each row independently, for inline per-row display.
    pub fn preview(&self) -> Vec<PricingResult<LineTotal>> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| compute_line_total(item).map_err(|e| e.at_line(index)))
            .collect()
    }

    pub fn finish(
        self,
        paid_amount: Decimal,
        credit_note_amount: Decimal,
    ) -> PricingResult<(Vec<LineItem>, DocumentTotals)> {
        let totals = compute_document_totals_with_policy(
            self.kind,
            &self.items,
            paid_amount,
            credit_note_amount,
            self.due_policy,
        )?;
        Ok((self.items, totals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn finish_prices_accumulated_rows() {
        let (items, totals) = DocumentBuilder::new(DocumentKind::Invoice)
            .line(LineItem::new(dec!(2), dec!(100)).with_tax(dec!(10)).with_discount(dec!(20)))
            .line(LineItem::new(dec!(1), dec!(2)).with_description("sticker"))
            .finish(dec!(0), dec!(0))
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(totals.subtotal, dec!(202));
        assert_eq!(totals.grand_total, dec!(200));
    }

    #[test]
    fn preview_flags_only_the_bad_row() {
        let builder = DocumentBuilder::new(DocumentKind::Quotation).lines([
            LineItem::new(dec!(1), dec!(10)),
            LineItem::new(dec!(-1), dec!(10)),
        ]);

        let preview = builder.preview();
        assert!(preview[0].is_ok());
        assert_eq!(preview[1].as_ref().unwrap_err().line(), Some(1));
    }

    #[test]
    fn config_policy_is_applied() {
        let config = PricingConfig {
            due_policy: DuePolicy::FloorAtZero,
        };
        let (_, totals) = DocumentBuilder::with_config(DocumentKind::Invoice, &config)
            .line(LineItem::new(dec!(1), dec!(10)))
            .finish(dec!(15), dec!(0))
            .unwrap();

        assert_eq!(totals.due_amount, Decimal::ZERO);
    }
}
