//! Sources of time, ids and voucher numbers, injected into the engine.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use tally_core::{EntryId, TenantId};

use crate::entry::ReferenceType;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant. For tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait IdGenerator: Send + Sync {
    fn entry_id(&self) -> EntryId;
}

/// Time-ordered UUIDv7 entry ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Ids;

impl IdGenerator for UuidV7Ids {
    fn entry_id(&self) -> EntryId {
        EntryId::new()
    }
}

/// Issues human-facing voucher numbers.
pub trait VoucherNumbering: Send + Sync {
    fn next(&self, tenant_id: TenantId, reference_type: ReferenceType) -> String;
}

/// `PREFIX-000001` style numbers, one counter per tenant and document type.
///
/// Numbers are consumed even when the posting that requested one fails, so
/// the sequence can have gaps.
#[derive(Debug, Default)]
pub struct SequentialVoucherNumbers {
    counters: Mutex<HashMap<(TenantId, ReferenceType), u64>>,
}

impl SequentialVoucherNumbers {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VoucherNumbering for SequentialVoucherNumbers {
    fn next(&self, tenant_id: TenantId, reference_type: ReferenceType) -> String {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let counter = counters.entry((tenant_id, reference_type)).or_insert(0);
        *counter += 1;
        format!("{}-{:06}", reference_type.voucher_prefix(), counter)
    }
}
