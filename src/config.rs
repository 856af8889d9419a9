use crate::error::{MarketError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Platform-wide knobs. Injected into the managers at construction; there is
/// no process-wide singleton.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Fraction of the budget kept by the platform at release time.
    pub fee_rate: Decimal,
    /// Free revision cycles a student may request per assignment.
    pub revision_cap: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            fee_rate: dec!(0.15),
            revision_cap: 2,
        }
    }
}

impl PlatformConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(Decimal::ZERO..Decimal::ONE).contains(&self.fee_rate) {
            return Err(MarketError::ValidationError(format!(
                "fee rate {} outside [0, 1)",
                self.fee_rate
            )));
        }
        Ok(())
    }
}
