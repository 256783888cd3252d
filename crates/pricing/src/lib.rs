//! Line-item pricing engine.
//!
//! Turns the rows of an invoice, quotation, bill or voucher into per-line and
//! document-level totals. Everything here is a pure function over immutable
//! records: no IO, no shared state.

pub mod builder;
pub mod config;
pub mod error;
pub mod line_item;
pub mod totals;

pub use builder::DocumentBuilder;
pub use config::{DuePolicy, PricingConfig};
pub use error::{PricingError, PricingResult};
pub use line_item::{LineItem, LineTotal, compute_line_total};
pub use totals::{
    DocumentKind, DocumentTotals, PaymentStatus, compute_document_totals,
    compute_document_totals_with_policy,
};
