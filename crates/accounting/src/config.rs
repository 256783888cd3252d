use serde::{Deserialize, Serialize};

/// Ledger engine settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    /// Replay every balance read from the entries and compare it with the
    /// cached value. Drift is logged and the replayed value wins.
    pub verify_balances_on_read: bool,
}

impl LedgerConfig {
    pub const VERIFY_BALANCES_VAR: &'static str = "TALLY_VERIFY_BALANCES";

    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(Self::VERIFY_BALANCES_VAR) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.verify_balances_on_read = true,
                "0" | "false" | "no" | "off" | "" => config.verify_balances_on_read = false,
                other => {
                    tracing::warn!(
                        var = Self::VERIFY_BALANCES_VAR,
                        value = %other,
                        "ignoring invalid flag; using default"
                    );
                }
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_boolean_flags() {
        let on = LedgerConfig::from_lookup(|_| Some("TRUE".to_string()));
        assert!(on.verify_balances_on_read);

        let off = LedgerConfig::from_lookup(|_| Some("0".to_string()));
        assert!(!off.verify_balances_on_read);

        let unset = LedgerConfig::from_lookup(|_| None);
        assert_eq!(unset, LedgerConfig::default());
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let config = LedgerConfig::from_lookup(|_| Some("sometimes".to_string()));
        assert!(!config.verify_balances_on_read);
    }
}
