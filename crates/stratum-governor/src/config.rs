//! Governance configuration

use serde::{Deserialize, Serialize};

/// Configuration for tier governance and contradiction checking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Require an evidence field for promotions from tiers 3/4
    pub require_promotion_evidence: bool,

    /// Require an evidence field for promotion of tier 2 to FROZEN
    pub require_freeze_evidence: bool,

    /// Flag candidates sharing a claim key with a binding record of another family
    pub flag_shared_claim_keys: bool,

    /// Flag declared relations whose target is unknown or non-binding
    pub flag_unresolved_relations: bool,

    /// Records scanned between cancellation polls
    pub cancellation_check_interval: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            require_promotion_evidence: true,
            require_freeze_evidence: true,
            flag_shared_claim_keys: true,
            flag_unresolved_relations: true,
            cancellation_check_interval: 64,
        }
    }
}

impl GovernanceConfig {
    /// Create a permissive configuration (structural rules only)
    ///
    /// Terminal tiers and declared conflicts are still enforced; evidence
    /// requirements and review flags are off.
    pub fn permissive() -> Self {
        Self {
            require_promotion_evidence: false,
            require_freeze_evidence: false,
            flag_shared_claim_keys: false,
            flag_unresolved_relations: false,
            cancellation_check_interval: 256,
        }
    }

    /// Create a strict configuration (every requirement and flag enabled)
    pub fn strict() -> Self {
        Self {
            require_promotion_evidence: true,
            require_freeze_evidence: true,
            flag_shared_claim_keys: true,
            flag_unresolved_relations: true,
            cancellation_check_interval: 16,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cancellation_check_interval == 0 {
            return Err("cancellation_check_interval must be greater than 0".to_string());
        }
        Ok(())
    }
}
