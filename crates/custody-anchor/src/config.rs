use serde::{Deserialize, Serialize};

use crate::chain::parse_address;
use crate::error::{AnchorError, AnchorResult};

/// Ledger adapter settings.
///
/// The presence of `contract_address` selects contract-mediated anchoring;
/// without it every anchor is a direct transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Registry contract address (`0x` + 40 hex).
    pub contract_address: Option<String>,
    /// Hex Ed25519 seed; a fresh key is generated when absent.
    pub signing_key: Option<String>,
    /// Gas limit attached to every transaction.
    pub gas_limit: u64,
    /// How long contract-mode anchoring waits for a receipt.
    pub confirm_timeout_ms: u64,
    /// Receipt polling interval.
    pub poll_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: None,
            signing_key: None,
            gas_limit: 100_000,
            confirm_timeout_ms: 30_000,
            poll_interval_ms: 50,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> AnchorResult<()> {
        if let Some(address) = &self.contract_address {
            parse_address(address)?;
        }
        if self.gas_limit == 0 {
            return Err(AnchorError::Malformed("gas_limit must be positive".into()));
        }
        if self.confirm_timeout_ms == 0 {
            return Err(AnchorError::Malformed(
                "confirm_timeout_ms must be positive".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(AnchorError::Malformed(
                "poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_direct_mode() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.contract_address.is_none());
    }

    #[test]
    fn rejects_bad_contract_and_zero_values() {
        let config = LedgerConfig {
            contract_address: Some("0x12".into()),
            ..LedgerConfig::default()
        };
        assert!(config.validate().unwrap_err().is_validation());

        let config = LedgerConfig {
            poll_interval_ms: 0,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: LedgerConfig =
            toml::from_str("contract_address = \"0x5FbDB2315678afecb367f032d93F642f64180aa3\"")
                .unwrap();
        assert_eq!(config.gas_limit, 100_000);
        assert!(config.validate().is_ok());
    }
}
