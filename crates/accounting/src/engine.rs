use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, Aggregate, AggregateRoot, ExpectedVersion, TenantId, round_money};
use tally_events::{EventEnvelope, Projection};

use crate::account::{Account, AccountStatus};
use crate::balance::{self, AccountTotals, BalanceCache, StatementLine, TrialBalance};
use crate::clock::{
    Clock, IdGenerator, SequentialVoucherNumbers, SystemClock, UuidV7Ids, VoucherNumbering,
};
use crate::config::LedgerConfig;
use crate::document::{Document, DocumentId};
use crate::entry::{LedgerEntry, PostingSet, ReferenceType};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::AccountLocks;
use crate::posting::posting_lines;
use crate::store::{InMemoryLedgerStore, LedgerStore};
use crate::voucher::{LedgerEvent, PostVoucher, ReverseVoucher, Voucher, VoucherCommand, VoucherStatus};

/// An account whose cached balance disagrees with a full replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub cached: Decimal,
    pub replayed: Decimal,
}

/// Posts documents and answers balance queries for every tenant.
///
/// Writes go through [`LedgerStore::append`] only. Balances are served from a
/// [`BalanceCache`] that is warmed per tenant on first read and updated after
/// every successful append; [`LedgerEngine::replay_balance`] recomputes from
/// entries and is authoritative.
pub struct LedgerEngine<S = InMemoryLedgerStore> {
    store: S,
    cache: RwLock<BalanceCache>,
    locks: AccountLocks,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    numbering: Arc<dyn VoucherNumbering>,
    config: LedgerConfig,
}

impl LedgerEngine<InMemoryLedgerStore> {
    pub fn in_memory() -> Self {
        Self::new(InMemoryLedgerStore::new())
    }
}

impl<S> LedgerEngine<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: RwLock::new(BalanceCache::new()),
            locks: AccountLocks::new(),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidV7Ids),
            numbering: Arc::new(SequentialVoucherNumbers::new()),
            config: LedgerConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_numbering(mut self, numbering: Arc<dyn VoucherNumbering>) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- accounts ----

    pub fn open_account(&self, tenant_id: TenantId, account: Account) -> LedgerResult<()> {
        if round_money(account.opening_balance) != account.opening_balance {
            return Err(LedgerError::InvalidAmount(format!(
                "opening balance {} has more than two decimal places",
                account.opening_balance
            )));
        }
        let account_id = account.id;
        let kind = account.kind;
        self.store.insert_account(tenant_id, account)?;
        tracing::info!(%tenant_id, %account_id, %kind, "account opened");
        Ok(())
    }

    /// Block new postings to an account. Existing entries and balances stay.
    pub fn deactivate_account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<()> {
        let accounts = BTreeSet::from([account_id]);
        self.locks.with_locked(tenant_id, &accounts, || {
            let mut account = self.account(tenant_id, account_id)?;
            account.status = AccountStatus::Deactivated;
            self.store.update_account(tenant_id, account)
        })?;
        tracing::info!(%tenant_id, %account_id, "account deactivated");
        Ok(())
    }

    /// Remove an account that has never been posted to.
    pub fn delete_account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<()> {
        let accounts = BTreeSet::from([account_id]);
        self.locks.with_locked(tenant_id, &accounts, || {
            self.store.remove_account(tenant_id, account_id)
        })?;
        tracing::info!(%tenant_id, %account_id, "account deleted");
        Ok(())
    }

    pub fn account(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<Account> {
        self.store
            .account(tenant_id, account_id)?
            .ok_or(LedgerError::UnknownAccount(account_id))
    }

    pub fn accounts(&self, tenant_id: TenantId) -> LedgerResult<Vec<Account>> {
        self.store.accounts(tenant_id)
    }

    // ---- posting ----

    /// Post a finalized document: derive its entries, validate them and append
    /// them atomically. Returns the recorded posting set.
    pub fn post_document(&self, tenant_id: TenantId, document: &Document) -> LedgerResult<PostingSet> {
        self.try_post(tenant_id, document).inspect_err(|e| {
            log_failure(e, tenant_id, document.id, "posting rejected");
        })
    }

    fn try_post(&self, tenant_id: TenantId, document: &Document) -> LedgerResult<PostingSet> {
        let lines = posting_lines(document, |id| self.account(tenant_id, id))?;
        let reference_type = document.rule.reference_type();
        let voucher_number = self.numbering.next(tenant_id, reference_type);
        let posting_set = PostingSet::assemble(
            document.id,
            voucher_number,
            document.date,
            reference_type,
            lines,
            || self.ids.entry_id(),
        )?;

        let accounts = posting_set.accounts();
        let command = VoucherCommand::Post(PostVoucher {
            tenant_id,
            posting_set,
            occurred_at: self.clock.now(),
        });
        self.commit(tenant_id, document.id, &accounts, command)
    }

    /// Append the mirror image of a posted document's entries.
    pub fn reverse_document(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        date: NaiveDate,
        reason: Option<String>,
    ) -> LedgerResult<PostingSet> {
        self.try_reverse(tenant_id, document_id, date, reason)
            .inspect_err(|e| log_failure(e, tenant_id, document_id, "reversal rejected"))
    }

    fn try_reverse(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        date: NaiveDate,
        reason: Option<String>,
    ) -> LedgerResult<PostingSet> {
        let voucher = self.voucher(tenant_id, document_id)?;
        let original = match (voucher.status(), voucher.posting_set()) {
            (VoucherStatus::Posted, Some(set)) => set,
            (VoucherStatus::Reversed, _) => {
                return Err(LedgerError::InvalidDocumentState(format!(
                    "document {document_id} is already reversed"
                )));
            }
            _ => {
                return Err(LedgerError::InvalidDocumentState(format!(
                    "document {document_id} has not been posted"
                )));
            }
        };

        let accounts = original.accounts();
        let command = VoucherCommand::Reverse(ReverseVoucher {
            tenant_id,
            voucher_number: self.numbering.next(tenant_id, ReferenceType::Reversal),
            date,
            entry_ids: original.entries.iter().map(|_| self.ids.entry_id()).collect(),
            reason,
            occurred_at: self.clock.now(),
        });
        self.commit(tenant_id, document_id, &accounts, command)
    }

    /// Decide and append under the locks of every touched account.
    fn commit(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        accounts: &BTreeSet<AccountId>,
        command: VoucherCommand,
    ) -> LedgerResult<PostingSet> {
        self.locks.with_locked(tenant_id, accounts, || {
            let voucher = self.voucher(tenant_id, document_id)?;
            let events = voucher.handle(&command)?;
            if matches!(command, VoucherCommand::Post(_)) {
                self.ensure_active(tenant_id, accounts)?;
            }

            let mut version = voucher.version();
            let mut recorded = None;
            for event in events {
                let envelope = self.store.append(
                    tenant_id,
                    document_id,
                    ExpectedVersion::Exact(version),
                    event,
                )?;
                version = envelope.sequence_number();
                self.apply_to_cache(&envelope)?;

                let set = envelope.payload().posting_set();
                tracing::info!(
                    %tenant_id,
                    %document_id,
                    voucher_number = %set.voucher_number,
                    reference_type = ?set.reference_type,
                    amount = %set.debit_total(),
                    entries = set.entries.len(),
                    "ledger entries appended"
                );
                recorded = Some(set.clone());
            }

            recorded.ok_or_else(|| {
                LedgerError::InvalidDocument(format!("document {document_id} produced no entries"))
            })
        })
    }

    /// Status as of now, under the locks. It may have changed since the
    /// document's accounts were resolved.
    fn ensure_active(&self, tenant_id: TenantId, accounts: &BTreeSet<AccountId>) -> LedgerResult<()> {
        for &account_id in accounts {
            if !self.account(tenant_id, account_id)?.is_active() {
                return Err(LedgerError::InactiveAccount(account_id));
            }
        }
        Ok(())
    }

    fn apply_to_cache(&self, envelope: &EventEnvelope<LedgerEvent>) -> LedgerResult<()> {
        let mut cache = self.cache_write()?;
        if cache.is_warm(envelope.tenant_id()) {
            cache.apply(envelope);
        }
        Ok(())
    }

    /// Current state of a document, rebuilt from its event stream.
    pub fn voucher(&self, tenant_id: TenantId, document_id: DocumentId) -> LedgerResult<Voucher> {
        let stream = self.store.load_stream(tenant_id, document_id)?;
        Ok(Voucher::replay(
            document_id,
            stream.iter().map(|envelope| envelope.payload()),
        ))
    }

    pub fn document_status(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> LedgerResult<VoucherStatus> {
        Ok(self.voucher(tenant_id, document_id)?.status())
    }

    // ---- balances ----

    /// Balance in the account kind's sign convention, served from the cache.
    pub fn current_balance(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<Decimal> {
        let account = self.account(tenant_id, account_id)?;
        self.ensure_warm(tenant_id)?;
        let cached = self.cache_read()?.balance(tenant_id, &account);

        if !self.config.verify_balances_on_read {
            return Ok(cached);
        }
        let replayed = self.replay_account(tenant_id, &account)?;
        if replayed != cached {
            tracing::error!(
                %tenant_id,
                %account_id,
                %cached,
                %replayed,
                "balance cache drift detected; serving replayed balance"
            );
            return Ok(replayed);
        }
        Ok(cached)
    }

    /// Balance recomputed from the opening balance and every entry.
    pub fn replay_balance(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<Decimal> {
        let account = self.account(tenant_id, account_id)?;
        self.replay_account(tenant_id, &account)
    }

    fn replay_account(&self, tenant_id: TenantId, account: &Account) -> LedgerResult<Decimal> {
        let entries = self.store.entries_for_account(tenant_id, account.id)?;
        balance::replay_balance(account, &entries)
    }

    /// Entries in replay order with the running balance after each.
    pub fn statement(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> LedgerResult<Vec<StatementLine>> {
        let account = self.account(tenant_id, account_id)?;
        let entries = self.store.entries_for_account(tenant_id, account_id)?;
        balance::statement(&account, &entries)
    }

    pub fn entries(&self, tenant_id: TenantId, account_id: AccountId) -> LedgerResult<Vec<LedgerEntry>> {
        self.account(tenant_id, account_id)?;
        let mut entries = self.store.entries_for_account(tenant_id, account_id)?;
        balance::sort_for_replay(&mut entries);
        Ok(entries)
    }

    pub fn account_totals(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
    ) -> LedgerResult<AccountTotals> {
        self.account(tenant_id, account_id)?;
        let entries = self.store.entries_for_account(tenant_id, account_id)?;
        AccountTotals::from_entries(&entries)
    }

    pub fn trial_balance(&self, tenant_id: TenantId) -> LedgerResult<TrialBalance> {
        let accounts = self.store.accounts(tenant_id)?;
        let mut entries = BTreeMap::new();
        for account in &accounts {
            entries.insert(
                account.id,
                self.store.entries_for_account(tenant_id, account.id)?,
            );
        }
        let trial_balance = TrialBalance::build(&accounts, &entries)?;
        if !trial_balance.is_balanced() {
            tracing::error!(
                %tenant_id,
                debits = %trial_balance.total_debits,
                credits = %trial_balance.total_credits,
                "trial balance does not agree"
            );
        }
        Ok(trial_balance)
    }

    /// Compare every cached balance with a full replay.
    pub fn reconcile(&self, tenant_id: TenantId) -> LedgerResult<Vec<BalanceDrift>> {
        self.ensure_warm(tenant_id)?;
        let mut drift = Vec::new();
        for account in self.store.accounts(tenant_id)? {
            let cached = self.cache_read()?.balance(tenant_id, &account);
            let replayed = self.replay_account(tenant_id, &account)?;
            if cached != replayed {
                tracing::error!(
                    %tenant_id,
                    account_id = %account.id,
                    %cached,
                    %replayed,
                    "balance cache drift detected"
                );
                drift.push(BalanceDrift {
                    account_id: account.id,
                    cached,
                    replayed,
                });
            }
        }
        Ok(drift)
    }

    /// Discard the tenant's cached balances and replay every ledger event.
    pub fn rebuild_cache(&self, tenant_id: TenantId) -> LedgerResult<()> {
        let mut cache = self.cache_write()?;
        let events = self.store.events(tenant_id)?;
        cache.rebuild(tenant_id, &events);
        tracing::debug!(%tenant_id, events = events.len(), "balance cache rebuilt");
        Ok(())
    }

    fn ensure_warm(&self, tenant_id: TenantId) -> LedgerResult<()> {
        if self.cache_read()?.is_warm(tenant_id) {
            return Ok(());
        }
        let mut cache = self.cache_write()?;
        // Another reader may have won the race.
        if cache.is_warm(tenant_id) {
            return Ok(());
        }
        let events = self.store.events(tenant_id)?;
        cache.rebuild(tenant_id, &events);
        tracing::debug!(%tenant_id, events = events.len(), "balance cache warmed");
        Ok(())
    }

    fn cache_read(&self) -> LedgerResult<RwLockReadGuard<'_, BalanceCache>> {
        self.cache
            .read()
            .map_err(|_| LedgerError::Store("balance cache poisoned".to_string()))
    }

    fn cache_write(&self) -> LedgerResult<RwLockWriteGuard<'_, BalanceCache>> {
        self.cache
            .write()
            .map_err(|_| LedgerError::Store("balance cache poisoned".to_string()))
    }
}

fn log_failure(error: &LedgerError, tenant_id: TenantId, document_id: DocumentId, message: &str) {
    if error.is_fatal() {
        tracing::error!(%tenant_id, %document_id, error = %error, "{message}");
    } else {
        tracing::warn!(%tenant_id, %document_id, error = %error, "{message}");
    }
}
