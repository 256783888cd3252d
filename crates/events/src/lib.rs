//! Ledger events and the plumbing to replay them.
//!
//! Posted and reversed documents are recorded as immutable events; balances
//! are projections rebuilt from those events.

pub mod envelope;
pub mod event;
pub mod projection;

pub use envelope::EventEnvelope;
pub use event::Event;
pub use projection::Projection;
