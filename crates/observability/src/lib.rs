//! Process-wide logging setup shared by tally binaries and tests.

pub mod tracing;

pub use crate::tracing::{LogFormat, init_with};

/// Install the default (JSON) subscriber.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init() {
    tracing::init_with(LogFormat::Json);
}
