use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Read models are disposable: they can be cleared and rebuilt by replaying
/// every envelope in stream order. Events stay the source of truth.
///
/// ## Idempotency
///
/// `apply` must tolerate redelivery. Projections typically track the last
/// sequence number seen per stream and skip anything at or below it.
///
/// ## Tenant isolation
///
/// Read model updates must be scoped to `envelope.tenant_id()`.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
