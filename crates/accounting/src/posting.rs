//! Posting rules: which accounts a finalized document debits and credits.

use rust_decimal::Decimal;

use tally_core::{AccountId, round_money};
use tally_pricing::compute_line_total;

use crate::account::{Account, AccountKind};
use crate::document::{Document, PostingRule};
use crate::entry::PostingLine;
use crate::error::{LedgerError, LedgerResult};

/// Account role within a posting rule, used for kind checks.
#[derive(Debug, Clone, Copy)]
enum Role {
    Customer,
    Vendor,
    Income,
    Expense,
    CashOrBank,
}

impl Role {
    fn accepts(self, kind: AccountKind) -> bool {
        match self {
            Role::Customer => kind == AccountKind::Customer,
            Role::Vendor => kind == AccountKind::Vendor,
            Role::Income => kind == AccountKind::Income,
            Role::Expense => kind == AccountKind::Expense,
            Role::CashOrBank => kind.is_cash_or_bank(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Vendor => "vendor",
            Role::Income => "income",
            Role::Expense => "expense",
            Role::CashOrBank => "cash or bank",
        }
    }
}

/// Derive the debit/credit lines a document posts.
///
/// `resolve` looks an account up by id and fails with `UnknownAccount` when it
/// does not exist. Every referenced account must be active and of the kind
/// its role requires.
pub fn posting_lines(
    doc: &Document,
    resolve: impl Fn(AccountId) -> LedgerResult<Account>,
) -> LedgerResult<Vec<PostingLine>> {
    let check = |id: AccountId, role: Role| -> LedgerResult<Account> {
        let account = resolve(id)?;
        if !account.is_active() {
            return Err(LedgerError::InactiveAccount(id));
        }
        if !role.accepts(account.kind) {
            return Err(LedgerError::AccountKindMismatch {
                account: id,
                expected: role.label(),
                found: account.kind,
            });
        }
        Ok(account)
    };
    let narration = doc.narration.clone();

    let lines = match &doc.rule {
        PostingRule::SalesInvoice {
            customer,
            income,
            totals,
        } => {
            check(*customer, Role::Customer)?;
            check(*income, Role::Income)?;
            let amount = postable(totals.grand_total, "invoice grand total")?;
            vec![
                PostingLine::debit(*customer, amount),
                PostingLine::credit(*income, amount),
            ]
        }
        PostingRule::PaymentReceived {
            customer,
            deposit_to,
            amount,
        } => {
            check(*customer, Role::Customer)?;
            check(*deposit_to, Role::CashOrBank)?;
            let amount = postable(*amount, "payment amount")?;
            vec![
                PostingLine::debit(*deposit_to, amount),
                PostingLine::credit(*customer, amount),
            ]
        }
        PostingRule::PurchaseBill {
            vendor,
            expense,
            totals,
        } => {
            check(*vendor, Role::Vendor)?;
            check(*expense, Role::Expense)?;
            let amount = postable(totals.grand_total, "bill grand total")?;
            vec![
                PostingLine::debit(*expense, amount),
                PostingLine::credit(*vendor, amount),
            ]
        }
        PostingRule::PaymentMade {
            vendor,
            paid_from,
            amount,
        } => {
            check(*vendor, Role::Vendor)?;
            check(*paid_from, Role::CashOrBank)?;
            let amount = postable(*amount, "payment amount")?;
            vec![
                PostingLine::debit(*vendor, amount),
                PostingLine::credit(*paid_from, amount),
            ]
        }
        PostingRule::SalesCreditNote {
            customer,
            income,
            totals,
        } => {
            check(*customer, Role::Customer)?;
            check(*income, Role::Income)?;
            let amount = postable(totals.grand_total, "credit note grand total")?;
            vec![
                PostingLine::debit(*income, amount),
                PostingLine::credit(*customer, amount),
            ]
        }
        PostingRule::ExpenseVoucher {
            paid_from,
            lines,
            total,
        } => {
            check(*paid_from, Role::CashOrBank)?;

            let mut debits = Vec::with_capacity(lines.len() + 1);
            let mut computed = Decimal::ZERO;
            for (index, line) in lines.iter().enumerate() {
                check(line.account, Role::Expense)?;
                let priced = compute_line_total(&line.item).map_err(|e| e.at_line(index))?;
                // Free rows carry nothing to post.
                if priced.total.is_zero() {
                    continue;
                }
                computed = computed.checked_add(priced.total).ok_or_else(|| {
                    LedgerError::InvalidAmount(
                        "expense voucher total exceeds the representable range".to_string(),
                    )
                })?;
                let line_narration = line.item.description.clone().or_else(|| narration.clone());
                debits.push(PostingLine::debit(line.account, priced.total).narrated(line_narration));
            }

            if computed != *total {
                return Err(LedgerError::AmountMismatch {
                    declared: *total,
                    computed,
                });
            }
            let amount = postable(computed, "expense voucher total")?;
            debits.push(PostingLine::credit(*paid_from, amount).narrated(narration.clone()));
            debits
        }
        PostingRule::ContraVoucher { from, to, amount } => {
            if from == to {
                return Err(LedgerError::InvalidDocument(
                    "contra voucher must move funds between two different accounts".to_string(),
                ));
            }
            check(*from, Role::CashOrBank)?;
            check(*to, Role::CashOrBank)?;
            let amount = postable(*amount, "transfer amount")?;
            vec![
                PostingLine::debit(*to, amount),
                PostingLine::credit(*from, amount),
            ]
        }
    };

    Ok(lines
        .into_iter()
        .map(|line| {
            if line.narration.is_some() {
                line
            } else {
                line.narrated(narration.clone())
            }
        })
        .collect())
}

fn postable(amount: Decimal, what: &str) -> LedgerResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "{what} {amount} must be positive"
        )));
    }
    if round_money(amount) != amount {
        return Err(LedgerError::InvalidAmount(format!(
            "{what} {amount} has more than two decimal places"
        )));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tally_core::AggregateId;
    use tally_pricing::{DocumentKind, LineItem, PricingError, compute_document_totals};

    use super::*;
    use crate::account::AccountStatus;
    use crate::document::{DocumentId, ExpenseLine};
    use crate::entry::EntryType;

    struct Chart {
        accounts: HashMap<AccountId, Account>,
    }

    impl Chart {
        fn new() -> Self {
            Self {
                accounts: HashMap::new(),
            }
        }

        fn add(&mut self, kind: AccountKind) -> AccountId {
            let id = AccountId::new();
            self.accounts.insert(id, Account::new(id, kind, kind.to_string()));
            id
        }

        fn resolve(&self) -> impl Fn(AccountId) -> LedgerResult<Account> + '_ {
            |id| {
                self.accounts
                    .get(&id)
                    .cloned()
                    .ok_or(LedgerError::UnknownAccount(id))
            }
        }
    }

    fn doc(rule: PostingRule) -> Document {
        Document::new(
            DocumentId::new(AggregateId::new()),
            NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            rule,
        )
    }

    fn invoice_totals() -> tally_pricing::DocumentTotals {
        let item = LineItem::new(dec!(2), dec!(100))
            .with_tax(dec!(10))
            .with_discount(dec!(20));
        compute_document_totals(DocumentKind::Invoice, &[item], dec!(0), dec!(0)).unwrap()
    }

    fn sides(lines: &[PostingLine]) -> Vec<(AccountId, EntryType, Decimal)> {
        lines
            .iter()
            .map(|l| (l.account_id, l.entry_type, l.amount))
            .collect()
    }

    #[test]
    fn sales_invoice_debits_customer_and_credits_income() {
        let mut chart = Chart::new();
        let customer = chart.add(AccountKind::Customer);
        let income = chart.add(AccountKind::Income);

        let lines = posting_lines(
            &doc(PostingRule::SalesInvoice {
                customer,
                income,
                totals: invoice_totals(),
            }),
            chart.resolve(),
        )
        .unwrap();

        assert_eq!(
            sides(&lines),
            vec![
                (customer, EntryType::Debit, dec!(198)),
                (income, EntryType::Credit, dec!(198)),
            ]
        );
    }

    #[test]
    fn payment_received_debits_bank_and_credits_customer() {
        let mut chart = Chart::new();
        let customer = chart.add(AccountKind::Customer);
        let bank = chart.add(AccountKind::Bank);

        let lines = posting_lines(
            &doc(PostingRule::PaymentReceived {
                customer,
                deposit_to: bank,
                amount: dec!(150),
            }),
            chart.resolve(),
        )
        .unwrap();

        assert_eq!(
            sides(&lines),
            vec![
                (bank, EntryType::Debit, dec!(150)),
                (customer, EntryType::Credit, dec!(150)),
            ]
        );
    }

    #[test]
    fn vendor_bill_and_payment_pair_correctly() {
        let mut chart = Chart::new();
        let vendor = chart.add(AccountKind::Vendor);
        let expense = chart.add(AccountKind::Expense);
        let cash = chart.add(AccountKind::Cash);

        let bill = posting_lines(
            &doc(PostingRule::PurchaseBill {
                vendor,
                expense,
                totals: invoice_totals(),
            }),
            chart.resolve(),
        )
        .unwrap();
        assert_eq!(
            sides(&bill),
            vec![
                (expense, EntryType::Debit, dec!(198)),
                (vendor, EntryType::Credit, dec!(198)),
            ]
        );

        let payment = posting_lines(
            &doc(PostingRule::PaymentMade {
                vendor,
                paid_from: cash,
                amount: dec!(98),
            }),
            chart.resolve(),
        )
        .unwrap();
        assert_eq!(
            sides(&payment),
            vec![
                (vendor, EntryType::Debit, dec!(98)),
                (cash, EntryType::Credit, dec!(98)),
            ]
        );
    }

    #[test]
    fn credit_note_reverses_the_invoice_pairing() {
        let mut chart = Chart::new();
        let customer = chart.add(AccountKind::Customer);
        let income = chart.add(AccountKind::Income);

        let lines = posting_lines(
            &doc(PostingRule::SalesCreditNote {
                customer,
                income,
                totals: invoice_totals(),
            }),
            chart.resolve(),
        )
        .unwrap();

        assert_eq!(
            sides(&lines),
            vec![
                (income, EntryType::Debit, dec!(198)),
                (customer, EntryType::Credit, dec!(198)),
            ]
        );
    }

    #[test]
    fn expense_voucher_debits_each_line_and_credits_the_sum() {
        let mut chart = Chart::new();
        let cash = chart.add(AccountKind::Cash);
        let rent = chart.add(AccountKind::Expense);
        let travel = chart.add(AccountKind::Expense);

        let lines = posting_lines(
            &doc(PostingRule::ExpenseVoucher {
                paid_from: cash,
                lines: vec![
                    ExpenseLine {
                        account: rent,
                        item: LineItem::new(dec!(1), dec!(1000)).with_description("March rent"),
                    },
                    ExpenseLine {
                        account: travel,
                        item: LineItem::new(dec!(2), dec!(45.50)).with_tax(dec!(5)),
                    },
                    ExpenseLine {
                        account: travel,
                        item: LineItem::new(dec!(0), dec!(10)),
                    },
                ],
                total: dec!(1095.55),
            })
            .with_narration("Petty cash"),
            chart.resolve(),
        )
        .unwrap();

        assert_eq!(
            sides(&lines),
            vec![
                (rent, EntryType::Debit, dec!(1000)),
                (travel, EntryType::Debit, dec!(95.55)),
                (cash, EntryType::Credit, dec!(1095.55)),
            ]
        );
        assert_eq!(lines[0].narration.as_deref(), Some("March rent"));
        assert_eq!(lines[1].narration.as_deref(), Some("Petty cash"));
    }

    #[test]
    fn expense_voucher_total_must_match_lines() {
        let mut chart = Chart::new();
        let cash = chart.add(AccountKind::Cash);
        let rent = chart.add(AccountKind::Expense);

        let err = posting_lines(
            &doc(PostingRule::ExpenseVoucher {
                paid_from: cash,
                lines: vec![ExpenseLine {
                    account: rent,
                    item: LineItem::new(dec!(1), dec!(1000)),
                }],
                total: dec!(999),
            }),
            chart.resolve(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            LedgerError::AmountMismatch {
                declared: dec!(999),
                computed: dec!(1000)
            }
        );
    }

    #[test]
    fn expense_voucher_sum_past_decimal_range_is_rejected() {
        let mut chart = Chart::new();
        let cash = chart.add(AccountKind::Cash);
        let rent = chart.add(AccountKind::Expense);
        let huge = ExpenseLine {
            account: rent,
            item: LineItem::new(dec!(1), dec!(50000000000000000000000000000)),
        };

        let err = posting_lines(
            &doc(PostingRule::ExpenseVoucher {
                paid_from: cash,
                lines: vec![huge.clone(), huge],
                total: dec!(1),
            }),
            chart.resolve(),
        )
        .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    #[test]
    fn expense_voucher_surfaces_bad_rows_as_pricing_errors() {
        let mut chart = Chart::new();
        let cash = chart.add(AccountKind::Cash);
        let rent = chart.add(AccountKind::Expense);

        let err = posting_lines(
            &doc(PostingRule::ExpenseVoucher {
                paid_from: cash,
                lines: vec![ExpenseLine {
                    account: rent,
                    item: LineItem::new(dec!(1), dec!(10)).with_discount(dec!(20)),
                }],
                total: dec!(0),
            }),
            chart.resolve(),
        )
        .unwrap_err();

        match err {
            LedgerError::Pricing(PricingError::InvalidLineItem { line, .. }) => {
                assert_eq!(line, Some(0))
            }
            other => panic!("expected pricing error, got {other:?}"),
        }
    }

    #[test]
    fn contra_moves_between_cash_and_bank_only() {
        let mut chart = Chart::new();
        let cash = chart.add(AccountKind::Cash);
        let bank = chart.add(AccountKind::Bank);
        let customer = chart.add(AccountKind::Customer);

        let lines = posting_lines(
            &doc(PostingRule::ContraVoucher {
                from: cash,
                to: bank,
                amount: dec!(500),
            }),
            chart.resolve(),
        )
        .unwrap();
        assert_eq!(
            sides(&lines),
            vec![
                (bank, EntryType::Debit, dec!(500)),
                (cash, EntryType::Credit, dec!(500)),
            ]
        );

        let err = posting_lines(
            &doc(PostingRule::ContraVoucher {
                from: cash,
                to: customer,
                amount: dec!(500),
            }),
            chart.resolve(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::AccountKindMismatch { account, .. } if account == customer));

        let err = posting_lines(
            &doc(PostingRule::ContraVoucher {
                from: cash,
                to: cash,
                amount: dec!(500),
            }),
            chart.resolve(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDocument(_)));
    }

    #[test]
    fn unknown_and_inactive_accounts_are_rejected() {
        let mut chart = Chart::new();
        let customer = chart.add(AccountKind::Customer);
        let income = chart.add(AccountKind::Income);
        let missing = AccountId::new();

        let err = posting_lines(
            &doc(PostingRule::SalesInvoice {
                customer: missing,
                income,
                totals: invoice_totals(),
            }),
            chart.resolve(),
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::UnknownAccount(missing));

        if let Some(account) = chart.accounts.get_mut(&customer) {
            account.status = AccountStatus::Deactivated;
        }
        let err = posting_lines(
            &doc(PostingRule::SalesInvoice {
                customer,
                income,
                totals: invoice_totals(),
            }),
            chart.resolve(),
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::InactiveAccount(customer));
    }

    #[test]
    fn zero_or_fractional_cent_amounts_are_not_postable() {
        let mut chart = Chart::new();
        let customer = chart.add(AccountKind::Customer);
        let bank = chart.add(AccountKind::Bank);

        for amount in [dec!(0), dec!(-5), dec!(10.001)] {
            let err = posting_lines(
                &doc(PostingRule::PaymentReceived {
                    customer,
                    deposit_to: bank,
                    amount,
                }),
                chart.resolve(),
            )
            .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)), "{amount}");
        }
    }
}
