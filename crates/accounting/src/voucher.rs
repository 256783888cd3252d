//! Voucher lifecycle: one event stream per posted document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{Aggregate, AggregateId, AggregateRoot, EntryId, TenantId};
use tally_events::Event;

use crate::document::DocumentId;
use crate::entry::PostingSet;
use crate::error::{LedgerError, LedgerResult};

pub const VOUCHER_AGGREGATE_TYPE: &str = "accounting.voucher";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    /// No entries written yet.
    Draft,
    Posted,
    /// A mirror-image posting set has been appended. Terminal.
    Reversed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostVoucher {
    pub tenant_id: TenantId,
    pub posting_set: PostingSet,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseVoucher {
    pub tenant_id: TenantId,
    pub voucher_number: String,
    pub date: NaiveDate,
    /// One fresh id per original entry, in order.
    pub entry_ids: Vec<EntryId>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoucherCommand {
    Post(PostVoucher),
    Reverse(ReverseVoucher),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    VoucherPosted {
        tenant_id: TenantId,
        document_id: DocumentId,
        posting_set: PostingSet,
        occurred_at: DateTime<Utc>,
    },
    VoucherReversed {
        tenant_id: TenantId,
        document_id: DocumentId,
        reversed_voucher: String,
        posting_set: PostingSet,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Entries this event writes to the ledger.
    pub fn posting_set(&self) -> &PostingSet {
        match self {
            LedgerEvent::VoucherPosted { posting_set, .. }
            | LedgerEvent::VoucherReversed { posting_set, .. } => posting_set,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            LedgerEvent::VoucherPosted { tenant_id, .. }
            | LedgerEvent::VoucherReversed { tenant_id, .. } => *tenant_id,
        }
    }

    pub fn document_id(&self) -> DocumentId {
        match self {
            LedgerEvent::VoucherPosted { document_id, .. }
            | LedgerEvent::VoucherReversed { document_id, .. } => *document_id,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::VoucherPosted { .. } => "accounting.voucher.posted",
            LedgerEvent::VoucherReversed { .. } => "accounting.voucher.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::VoucherPosted { occurred_at, .. }
            | LedgerEvent::VoucherReversed { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Event-sourced voucher state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voucher {
    id: DocumentId,
    tenant_id: Option<TenantId>,
    status: VoucherStatus,
    posted: Option<PostingSet>,
    reversal_voucher: Option<String>,
    version: u64,
}

impl Voucher {
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            tenant_id: None,
            status: VoucherStatus::Draft,
            posted: None,
            reversal_voucher: None,
            version: 0,
        }
    }

    /// Rebuild state by folding a document's event stream.
    pub fn replay<'a>(id: DocumentId, events: impl IntoIterator<Item = &'a LedgerEvent>) -> Self {
        let mut voucher = Self::empty(id);
        for event in events {
            voucher.apply(event);
        }
        voucher
    }

    pub fn status(&self) -> VoucherStatus {
        self.status
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// The original posting, if any.
    pub fn posting_set(&self) -> Option<&PostingSet> {
        self.posted.as_ref()
    }

    pub fn reversal_voucher(&self) -> Option<&str> {
        self.reversal_voucher.as_deref()
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> LedgerResult<()> {
        match self.tenant_id {
            Some(owner) if owner != tenant_id => Err(LedgerError::TenantIsolation(format!(
                "document {} belongs to another tenant",
                self.id
            ))),
            _ => Ok(()),
        }
    }
}

impl AggregateRoot for Voucher {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id.0
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Voucher {
    type Command = VoucherCommand;
    type Event = LedgerEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::VoucherPosted {
                tenant_id,
                posting_set,
                ..
            } => {
                self.tenant_id = Some(*tenant_id);
                self.posted = Some(posting_set.clone());
                self.status = VoucherStatus::Posted;
            }
            LedgerEvent::VoucherReversed { posting_set, .. } => {
                self.reversal_voucher = Some(posting_set.voucher_number.clone());
                self.status = VoucherStatus::Reversed;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VoucherCommand::Post(cmd) => {
                if self.status != VoucherStatus::Draft {
                    return Err(LedgerError::InvalidDocumentState(format!(
                        "document {} is already posted",
                        self.id
                    )));
                }
                if cmd.posting_set.document_id != self.id {
                    return Err(LedgerError::InvalidDocument(
                        "posting set belongs to another document".to_string(),
                    ));
                }
                cmd.posting_set.validate()?;

                Ok(vec![LedgerEvent::VoucherPosted {
                    tenant_id: cmd.tenant_id,
                    document_id: self.id,
                    posting_set: cmd.posting_set.clone(),
                    occurred_at: cmd.occurred_at,
                }])
            }
            VoucherCommand::Reverse(cmd) => {
                self.ensure_tenant(cmd.tenant_id)?;
                let original = match (self.status, &self.posted) {
                    (VoucherStatus::Posted, Some(set)) => set,
                    (VoucherStatus::Reversed, _) => {
                        return Err(LedgerError::InvalidDocumentState(format!(
                            "document {} is already reversed",
                            self.id
                        )));
                    }
                    _ => {
                        return Err(LedgerError::InvalidDocumentState(format!(
                            "document {} has not been posted",
                            self.id
                        )));
                    }
                };
                if cmd.entry_ids.len() != original.entries.len() {
                    return Err(LedgerError::InvalidDocument(format!(
                        "reversal needs {} entry ids, got {}",
                        original.entries.len(),
                        cmd.entry_ids.len()
                    )));
                }

                let mut ids = cmd.entry_ids.iter().copied();
                let reversal = original.reversal(
                    cmd.voucher_number.clone(),
                    cmd.date,
                    cmd.reason.clone(),
                    || ids.next().unwrap_or_default(),
                )?;

                Ok(vec![LedgerEvent::VoucherReversed {
                    tenant_id: cmd.tenant_id,
                    document_id: self.id,
                    reversed_voucher: original.voucher_number.clone(),
                    posting_set: reversal,
                    reason: cmd.reason.clone(),
                    occurred_at: cmd.occurred_at,
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryType, PostingLine, ReferenceType};
    use rust_decimal_macros::dec;
    use tally_core::AccountId;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
    }

    fn posting_set(id: DocumentId) -> PostingSet {
        PostingSet::assemble(
            id,
            "INV-000001",
            date(),
            ReferenceType::Invoice,
            vec![
                PostingLine::debit(AccountId::new(), dec!(198)),
                PostingLine::credit(AccountId::new(), dec!(198)),
            ],
            EntryId::new,
        )
        .unwrap()
    }

    fn post(voucher: &Voucher, tenant_id: TenantId) -> LedgerEvent {
        let cmd = VoucherCommand::Post(PostVoucher {
            tenant_id,
            posting_set: posting_set(voucher.id),
            occurred_at: Utc::now(),
        });
        voucher.handle(&cmd).unwrap().remove(0)
    }

    fn reverse_cmd(tenant_id: TenantId) -> VoucherCommand {
        VoucherCommand::Reverse(ReverseVoucher {
            tenant_id,
            voucher_number: "REV-000001".to_string(),
            date: date(),
            entry_ids: vec![EntryId::new(), EntryId::new()],
            reason: Some("entered twice".to_string()),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn post_then_reverse_walks_the_lifecycle() {
        let tenant = TenantId::new();
        let mut voucher = Voucher::empty(DocumentId::new(AggregateId::new()));
        assert_eq!(voucher.status(), VoucherStatus::Draft);

        let posted = post(&voucher, tenant);
        voucher.apply(&posted);
        assert_eq!(voucher.status(), VoucherStatus::Posted);
        assert_eq!(voucher.version(), 1);

        let reversed = voucher.handle(&reverse_cmd(tenant)).unwrap().remove(0);
        match &reversed {
            LedgerEvent::VoucherReversed {
                reversed_voucher,
                posting_set,
                ..
            } => {
                assert_eq!(reversed_voucher, "INV-000001");
                assert_eq!(posting_set.entries[0].entry_type, EntryType::Credit);
                assert_eq!(posting_set.entries[0].narration.as_deref(), Some("entered twice"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        voucher.apply(&reversed);
        assert_eq!(voucher.status(), VoucherStatus::Reversed);
        assert_eq!(voucher.reversal_voucher(), Some("REV-000001"));
        assert_eq!(voucher.version(), 2);
    }

    #[test]
    fn a_document_posts_at_most_once() {
        let tenant = TenantId::new();
        let mut voucher = Voucher::empty(DocumentId::new(AggregateId::new()));
        let posted = post(&voucher, tenant);
        voucher.apply(&posted);

        let again = VoucherCommand::Post(PostVoucher {
            tenant_id: tenant,
            posting_set: posting_set(voucher.id),
            occurred_at: Utc::now(),
        });
        assert!(matches!(
            voucher.handle(&again),
            Err(LedgerError::InvalidDocumentState(_))
        ));
    }

    #[test]
    fn only_posted_vouchers_can_be_reversed_once() {
        let tenant = TenantId::new();
        let mut voucher = Voucher::empty(DocumentId::new(AggregateId::new()));
        assert!(matches!(
            voucher.handle(&reverse_cmd(tenant)),
            Err(LedgerError::InvalidDocumentState(_))
        ));

        let posted = post(&voucher, tenant);
        voucher.apply(&posted);
        let reversed = voucher.handle(&reverse_cmd(tenant)).unwrap().remove(0);
        voucher.apply(&reversed);

        assert!(matches!(
            voucher.handle(&reverse_cmd(tenant)),
            Err(LedgerError::InvalidDocumentState(_))
        ));
    }

    #[test]
    fn reversal_from_another_tenant_is_refused() {
        let mut voucher = Voucher::empty(DocumentId::new(AggregateId::new()));
        let posted = post(&voucher, TenantId::new());
        voucher.apply(&posted);

        assert!(matches!(
            voucher.handle(&reverse_cmd(TenantId::new())),
            Err(LedgerError::TenantIsolation(_))
        ));
    }

    #[test]
    fn replay_matches_incremental_application() {
        let tenant = TenantId::new();
        let id = DocumentId::new(AggregateId::new());
        let mut voucher = Voucher::empty(id);
        let posted = post(&voucher, tenant);
        voucher.apply(&posted);
        let reversed = voucher.handle(&reverse_cmd(tenant)).unwrap().remove(0);
        voucher.apply(&reversed);

        let replayed = Voucher::replay(id, [&posted, &reversed]);
        assert_eq!(replayed, voucher);
    }

    #[test]
    fn events_carry_stable_type_names() {
        let voucher = Voucher::empty(DocumentId::new(AggregateId::new()));
        let event = post(&voucher, TenantId::new());
        assert_eq!(event.event_type(), "accounting.voucher.posted");
        assert_eq!(event.version(), 1);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "voucher_posted");
        assert!(json.get("postingSet").is_some());
    }
}
