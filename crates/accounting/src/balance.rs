//! Balance derivation: replay, running statements and the incremental cache.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, AggregateId, TenantId};
use tally_events::{EventEnvelope, Projection};

use crate::account::{Account, AccountKind};
use crate::entry::{EntryType, LedgerEntry};
use crate::error::{LedgerError, LedgerResult};
use crate::voucher::LedgerEvent;

fn checked_sum(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_add(b).ok_or_else(|| {
        LedgerError::InvalidAmount(format!("{a} + {b} exceeds the representable range"))
    })
}

/// Sort entries into replay order: by date, then by entry id.
pub fn sort_for_replay(entries: &mut [LedgerEntry]) {
    entries.sort_by_key(LedgerEntry::replay_key);
}

/// Balance rebuilt from the opening balance and every entry, in replay order.
pub fn replay_balance(account: &Account, entries: &[LedgerEntry]) -> LedgerResult<Decimal> {
    let mut ordered = entries.to_vec();
    sort_for_replay(&mut ordered);
    ordered.iter().try_fold(account.opening_balance, |balance, entry| {
        checked_sum(balance, account.kind.balance_change(entry.entry_type, entry.amount))
    })
}

/// One row of an account statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    pub entry: LedgerEntry,
    /// Balance after this entry, in the account kind's sign convention.
    pub running_balance: Decimal,
}

/// Entries in replay order, each with the balance it leaves behind.
pub fn statement(account: &Account, entries: &[LedgerEntry]) -> LedgerResult<Vec<StatementLine>> {
    let mut ordered = entries.to_vec();
    sort_for_replay(&mut ordered);

    let mut running = account.opening_balance;
    ordered
        .into_iter()
        .map(|entry| {
            running = checked_sum(
                running,
                account.kind.balance_change(entry.entry_type, entry.amount),
            )?;
            Ok(StatementLine {
                entry,
                running_balance: running,
            })
        })
        .collect()
}

/// Gross movement on each side of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTotals {
    pub debit_total: Decimal,
    pub credit_total: Decimal,
}

impl AccountTotals {
    pub fn from_entries(entries: &[LedgerEntry]) -> LedgerResult<Self> {
        entries.iter().try_fold(Self::default(), |mut totals, entry| {
            match entry.entry_type {
                EntryType::Debit => {
                    totals.debit_total = checked_sum(totals.debit_total, entry.amount)?
                }
                EntryType::Credit => {
                    totals.credit_total = checked_sum(totals.credit_total, entry.amount)?
                }
            }
            Ok(totals)
        })
    }

    pub fn net_debit(&self) -> Decimal {
        self.debit_total - self.credit_total
    }
}

/// Read model: net debit movement per account, maintained from ledger events.
///
/// Opening balances are not part of the cache; they are added on read so an
/// account's metadata can change without invalidating it.
#[derive(Debug, Default)]
pub struct BalanceCache {
    net: HashMap<(TenantId, AccountId), Decimal>,
    cursors: HashMap<(TenantId, AggregateId), u64>,
    warmed: HashSet<TenantId>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cache has been built for this tenant.
    pub fn is_warm(&self, tenant_id: TenantId) -> bool {
        self.warmed.contains(&tenant_id)
    }

    /// Drop a tenant's state, then fold every event of its ledger.
    pub fn rebuild<'a>(
        &mut self,
        tenant_id: TenantId,
        events: impl IntoIterator<Item = &'a EventEnvelope<LedgerEvent>>,
    ) {
        self.clear_tenant(tenant_id);
        for envelope in events {
            self.apply(envelope);
        }
        self.warmed.insert(tenant_id);
    }

    pub fn clear_tenant(&mut self, tenant_id: TenantId) {
        self.net.retain(|(tenant, _), _| *tenant != tenant_id);
        self.cursors.retain(|(tenant, _), _| *tenant != tenant_id);
        self.warmed.remove(&tenant_id);
    }

    /// Net debit movement recorded for an account.
    pub fn net_debit(&self, tenant_id: TenantId, account_id: AccountId) -> Decimal {
        self.net
            .get(&(tenant_id, account_id))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Current balance in the account kind's sign convention.
    pub fn balance(&self, tenant_id: TenantId, account: &Account) -> Decimal {
        account.balance_after(self.net_debit(tenant_id, account.id))
    }
}

impl Projection for BalanceCache {
    type Ev = LedgerEvent;

    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
        let tenant_id = envelope.tenant_id();
        let key = (tenant_id, envelope.aggregate_id());
        let last = self.cursors.get(&key).copied().unwrap_or(0);
        if envelope.sequence_number() <= last {
            return;
        }

        // Compute every new value first so an overflow leaves the cache as it was.
        let mut updates: HashMap<AccountId, Decimal> = HashMap::new();
        for entry in &envelope.payload().posting_set().entries {
            let current = updates
                .get(&entry.account_id)
                .copied()
                .unwrap_or_else(|| self.net_debit(tenant_id, entry.account_id));
            let Some(next) = current.checked_add(entry.net_debit()) else {
                tracing::error!(
                    %tenant_id,
                    account_id = %entry.account_id,
                    sequence = envelope.sequence_number(),
                    "balance overflow; event not applied to cache"
                );
                return;
            };
            updates.insert(entry.account_id, next);
        }
        for (account_id, net) in updates {
            self.net.insert((tenant_id, account_id), net);
        }
        self.cursors.insert(key, envelope.sequence_number());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub name: String,
    pub kind: AccountKind,
    pub totals: AccountTotals,
    /// Opening balance plus movement, in the kind's sign convention.
    pub closing_balance: Decimal,
}

/// Every account's movement for a tenant.
///
/// Debit and credit totals cover posted entries only. Opening balances are
/// reported per row but excluded from the totals, so the totals agree exactly
/// whenever every posting set balanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
}

impl TrialBalance {
    pub fn build(
        accounts: &[Account],
        entries: &BTreeMap<AccountId, Vec<LedgerEntry>>,
    ) -> LedgerResult<Self> {
        let mut total_debits = Decimal::ZERO;
        let mut total_credits = Decimal::ZERO;
        let rows = accounts
            .iter()
            .map(|account| {
                let totals = match entries.get(&account.id) {
                    Some(e) => AccountTotals::from_entries(e)?,
                    None => AccountTotals::default(),
                };
                total_debits = checked_sum(total_debits, totals.debit_total)?;
                total_credits = checked_sum(total_credits, totals.credit_total)?;
                Ok(TrialBalanceRow {
                    account_id: account.id,
                    name: account.name.clone(),
                    kind: account.kind,
                    totals,
                    closing_balance: checked_sum(
                        account.opening_balance,
                        account.kind.signed_net(totals.net_debit()),
                    )?,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        Ok(Self {
            rows,
            total_debits,
            total_credits,
        })
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits == self.total_credits
    }
}
