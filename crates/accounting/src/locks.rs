use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tally_core::{AccountId, TenantId};

use crate::error::{LedgerError, LedgerResult};

/// Per-account mutual exclusion for postings.
///
/// Postings touching disjoint accounts proceed in parallel. A posting takes
/// every lock it needs in ascending account order, so two postings sharing
/// accounts cannot deadlock.
#[derive(Debug, Default)]
pub struct AccountLocks {
    table: Mutex<HashMap<(TenantId, AccountId), Arc<Mutex<()>>>>,
}

/// Guards held for the duration of one posting.
pub struct HeldLocks<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(
        &self,
        tenant_id: TenantId,
        accounts: &BTreeSet<AccountId>,
    ) -> LedgerResult<Vec<Arc<Mutex<()>>>> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| LedgerError::Store("account lock table poisoned".to_string()))?;
        Ok(accounts
            .iter()
            .map(|account_id| {
                Arc::clone(
                    table
                        .entry((tenant_id, *account_id))
                        .or_insert_with(|| Arc::new(Mutex::new(()))),
                )
            })
            .collect())
    }

    /// Run `f` while holding the locks of every account in `accounts`.
    pub fn with_locked<T>(
        &self,
        tenant_id: TenantId,
        accounts: &BTreeSet<AccountId>,
        f: impl FnOnce() -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let handles = self.handles(tenant_id, accounts)?;
        let _held = lock_all(&handles)?;
        f()
    }
}

/// Lock every handle in slice order.
pub fn lock_all(handles: &[Arc<Mutex<()>>]) -> LedgerResult<HeldLocks<'_>> {
    let guards = handles
        .iter()
        .map(|handle| {
            handle
                .lock()
                .map_err(|_| LedgerError::Store("account lock poisoned".to_string()))
        })
        .collect::<LedgerResult<Vec<_>>>()?;
    Ok(HeldLocks { _guards: guards })
}
