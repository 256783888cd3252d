use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use uuid::Uuid;

use tally_core::{AccountId, EntryId, ExpectedVersion, TenantId};
use tally_events::EventEnvelope;

use crate::account::Account;
use crate::document::DocumentId;
use crate::entry::LedgerEntry;
use crate::error::{LedgerError, LedgerResult};
use crate::voucher::{LedgerEvent, VOUCHER_AGGREGATE_TYPE};

/// Tenant-scoped persistence for accounts and the append-only ledger.
///
/// Entries are never updated or deleted. `append` is all-or-nothing: either
/// every entry of the event's posting set becomes visible or none does.
pub trait LedgerStore: Send + Sync {
    fn insert_account(&self, tenant_id: TenantId, account: Account) -> LedgerResult<()>;

    /// Replace account metadata. The account must already exist.
    fn update_account(&self, tenant_id: TenantId, account: Account) -> LedgerResult<()>;

    /// Remove an account that has never been posted to.
    fn remove_account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<()>;

    fn account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<Option<Account>>;

    fn accounts(&self, tenant_id: TenantId) -> LedgerResult<Vec<Account>>;

    /// Append one event to a document stream, recording its entries.
    fn append(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        expected_version: ExpectedVersion,
        event: LedgerEvent,
    ) -> LedgerResult<EventEnvelope<LedgerEvent>>;

    fn load_stream(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>>;

    /// Every entry posted against an account, in append order.
    fn entries_for_account(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<LedgerEntry>>;

    /// Every event for a tenant, in append order.
    fn events(&self, tenant_id: TenantId) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn insert_account(&self, tenant_id: TenantId, account: Account) -> LedgerResult<()> {
        (**self).insert_account(tenant_id, account)
    }

    fn update_account(&self, tenant_id: TenantId, account: Account) -> LedgerResult<()> {
        (**self).update_account(tenant_id, account)
    }

    fn remove_account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<()> {
        (**self).remove_account(tenant_id, account_id)
    }

    fn account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<Option<Account>> {
        (**self).account(tenant_id, account_id)
    }

    fn accounts(&self, tenant_id: TenantId) -> LedgerResult<Vec<Account>> {
        (**self).accounts(tenant_id)
    }

    fn append(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        expected_version: ExpectedVersion,
        event: LedgerEvent,
    ) -> LedgerResult<EventEnvelope<LedgerEvent>> {
        (**self).append(tenant_id, document_id, expected_version, event)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>> {
        (**self).load_stream(tenant_id, document_id)
    }

    fn entries_for_account(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        (**self).entries_for_account(tenant_id, account_id)
    }

    fn events(&self, tenant_id: TenantId) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>> {
        (**self).events(tenant_id)
    }
}

#[derive(Debug, Default)]
struct TenantLedger {
    accounts: BTreeMap<AccountId, Account>,
    /// Positions in `log`, per document stream.
    streams: HashMap<DocumentId, Vec<usize>>,
    log: Vec<EventEnvelope<LedgerEvent>>,
    /// Entries per account, in append order.
    entries: HashMap<AccountId, Vec<LedgerEntry>>,
    entry_ids: HashSet<EntryId>,
    /// Gross movement per account, both sides added together.
    movement: HashMap<AccountId, Decimal>,
    /// Sum of every posted debit.
    posted: Decimal,
}

/// In-memory ledger store.
///
/// Intended for tests, single-process deployments and benchmarks.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tenants: RwLock<HashMap<TenantId, TenantLedger>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, HashMap<TenantId, TenantLedger>>> {
        self.tenants
            .read()
            .map_err(|_| LedgerError::Store("lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, HashMap<TenantId, TenantLedger>>> {
        self.tenants
            .write()
            .map_err(|_| LedgerError::Store("lock poisoned".to_string()))
    }
}

fn out_of_range(account_id: AccountId) -> LedgerError {
    LedgerError::InvalidAmount(format!(
        "movement on account {account_id} would exceed the representable range"
    ))
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert_account(&self, tenant_id: TenantId, account: Account) -> LedgerResult<()> {
        let mut tenants = self.write()?;
        let ledger = tenants.entry(tenant_id).or_default();
        if ledger.accounts.contains_key(&account.id) {
            return Err(LedgerError::DuplicateAccount(account.id));
        }
        ledger.accounts.insert(account.id, account);
        Ok(())
    }

    fn update_account(&self, tenant_id: TenantId, account: Account) -> LedgerResult<()> {
        let mut tenants = self.write()?;
        let slot = tenants
            .get_mut(&tenant_id)
            .and_then(|ledger| ledger.accounts.get_mut(&account.id))
            .ok_or(LedgerError::UnknownAccount(account.id))?;
        *slot = account;
        Ok(())
    }

    fn remove_account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<()> {
        let mut tenants = self.write()?;
        let ledger = tenants
            .get_mut(&tenant_id)
            .ok_or(LedgerError::UnknownAccount(account_id))?;
        if !ledger.accounts.contains_key(&account_id) {
            return Err(LedgerError::UnknownAccount(account_id));
        }
        if ledger.entries.get(&account_id).is_some_and(|e| !e.is_empty()) {
            return Err(LedgerError::AccountHasPostings(account_id));
        }
        ledger.accounts.remove(&account_id);
        Ok(())
    }

    fn account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<Option<Account>> {
        let tenants = self.read()?;
        Ok(tenants
            .get(&tenant_id)
            .and_then(|ledger| ledger.accounts.get(&account_id))
            .cloned())
    }

    fn accounts(&self, tenant_id: TenantId) -> LedgerResult<Vec<Account>> {
        let tenants = self.read()?;
        Ok(tenants
            .get(&tenant_id)
            .map(|ledger| ledger.accounts.values().cloned().collect())
            .unwrap_or_default())
    }

    fn append(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        expected_version: ExpectedVersion,
        event: LedgerEvent,
    ) -> LedgerResult<EventEnvelope<LedgerEvent>> {
        if event.tenant_id() != tenant_id {
            return Err(LedgerError::TenantIsolation(format!(
                "event for another tenant appended under {tenant_id}"
            )));
        }
        if event.document_id() != document_id || event.posting_set().document_id != document_id {
            return Err(LedgerError::InvalidDocument(
                "event does not belong to this document stream".to_string(),
            ));
        }
        let set = event.posting_set();
        set.validate()?;

        let mut tenants = self.write()?;
        let ledger = tenants.entry(tenant_id).or_default();

        let current = ledger
            .streams
            .get(&document_id)
            .map(|positions| positions.len() as u64)
            .unwrap_or(0);
        expected_version.check(current)?;

        // Validate everything before the first mutation. Opening balance plus
        // gross movement must stay representable for every touched account.
        let mut movement: HashMap<AccountId, Decimal> = HashMap::new();
        for entry in &set.entries {
            let Some(account) = ledger.accounts.get(&entry.account_id) else {
                return Err(LedgerError::UnknownAccount(entry.account_id));
            };
            if ledger.entry_ids.contains(&entry.id) {
                return Err(LedgerError::InvalidDocument(format!(
                    "entry {} already recorded",
                    entry.id
                )));
            }
            let current = movement
                .get(&entry.account_id)
                .or_else(|| ledger.movement.get(&entry.account_id))
                .copied()
                .unwrap_or(Decimal::ZERO);
            let next = current
                .checked_add(entry.amount)
                .filter(|next| account.opening_balance.abs().checked_add(*next).is_some())
                .ok_or_else(|| out_of_range(entry.account_id))?;
            movement.insert(entry.account_id, next);
        }
        let posted = ledger
            .posted
            .checked_add(set.debit_total())
            .ok_or_else(|| {
                LedgerError::InvalidAmount(format!(
                    "ledger totals for tenant {tenant_id} would exceed the representable range"
                ))
            })?;

        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            document_id.0,
            VOUCHER_AGGREGATE_TYPE,
            current + 1,
            event,
        );

        for entry in &envelope.payload().posting_set().entries {
            ledger.entry_ids.insert(entry.id);
            ledger
                .entries
                .entry(entry.account_id)
                .or_default()
                .push(entry.clone());
        }
        ledger.movement.extend(movement);
        ledger.posted = posted;
        ledger
            .streams
            .entry(document_id)
            .or_default()
            .push(ledger.log.len());
        ledger.log.push(envelope.clone());

        Ok(envelope)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>> {
        let tenants = self.read()?;
        let Some(ledger) = tenants.get(&tenant_id) else {
            return Ok(vec![]);
        };
        Ok(ledger
            .streams
            .get(&document_id)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|&pos| ledger.log.get(pos).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn entries_for_account(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        let tenants = self.read()?;
        Ok(tenants
            .get(&tenant_id)
            .and_then(|ledger| ledger.entries.get(&account_id))
            .cloned()
            .unwrap_or_default())
    }

    fn events(&self, tenant_id: TenantId) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>> {
        let tenants = self.read()?;
        Ok(tenants
            .get(&tenant_id)
            .map(|ledger| ledger.log.clone())
            .unwrap_or_default())
    }
}
