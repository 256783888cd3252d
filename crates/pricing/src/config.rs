//! Pricing configuration.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// What to do when payments and credits exceed the grand total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuePolicy {
    /// Report the negative due amount (overpayment) as-is.
    #[default]
    AsIs,
    /// Report overpayments as zero due.
    FloorAtZero,
}

impl FromStr for DuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "as_is" | "as-is" => Ok(Self::AsIs),
            "floor_at_zero" | "floor-at-zero" | "floor" => Ok(Self::FloorAtZero),
            other => Err(format!("unknown due policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub due_policy: DuePolicy,
}

impl PricingConfig {
    /// Environment variable holding the due policy.
    pub const DUE_POLICY_VAR: &'static str = "TALLY_DUE_POLICY";

    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let due_policy = match lookup(Self::DUE_POLICY_VAR) {
            None => DuePolicy::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(
                    var = Self::DUE_POLICY_VAR,
                    error = %e,
                    "ignoring invalid due policy; using default"
                );
                DuePolicy::default()
            }),
        };

        Self { due_policy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_value_selects_policy() {
        let config = PricingConfig::from_lookup(|_| Some("floor_at_zero".to_string()));
        assert_eq!(config.due_policy, DuePolicy::FloorAtZero);
    }

    #[test]
    fn invalid_or_missing_value_falls_back_to_as_is() {
        assert_eq!(
            PricingConfig::from_lookup(|_| Some("clamp".to_string())).due_policy,
            DuePolicy::AsIs
        );
        assert_eq!(PricingConfig::from_lookup(|_| None).due_policy, DuePolicy::AsIs);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: PricingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PricingConfig::default());

        let config: PricingConfig =
            serde_json::from_str(r#"{"due_policy":"floor_at_zero"}"#).unwrap();
        assert_eq!(config.due_policy, DuePolicy::FloorAtZero);
    }
}
