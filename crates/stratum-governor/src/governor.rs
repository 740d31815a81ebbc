//! Tier state machine

use crate::{GovernanceConfig, GovernorError};
use serde::{Deserialize, Serialize};
use stratum_domain::{Policy, ReviewState, Tier};

/// What a legal tier change amounts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// First version of a new family
    Insert,

    /// Tier 2 replaced by a new tier-2 version
    Revise,

    /// Tier 3/4 content edited in place (as a new version)
    Edit,

    /// Tier 3/4 raised to 2, or 4 raised to 3
    Promote,

    /// Tier 2 raised to FROZEN
    Freeze,
}

/// Enforces the 5-level epistemic state machine
///
/// ```text
/// 0 FROZEN      -- terminal
/// 1 FALSIFIED   -- terminal
/// 2 ESTABLISHED -- revise (2), freeze (0) with proof
/// 3 SPECULATIVE -- edit (3), promote (2) with evidence, discard
/// 4 EXPLORATORY -- edit (4), promote (3 or 2) with evidence, discard
/// ```
#[derive(Debug, Clone, Default)]
pub struct TierGovernor {
    config: GovernanceConfig,
}

impl TierGovernor {
    /// Create a governor with the given configuration
    pub fn new(config: GovernanceConfig) -> Self {
        Self { config }
    }

    /// Create a governor with default configuration
    pub fn default_config() -> Self {
        Self::new(GovernanceConfig::default())
    }

    /// Active configuration
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Kind of a transition, or `None` if the state machine forbids it
    pub fn transition_kind(old: Tier, new: Tier) -> Option<TransitionKind> {
        use Tier::*;
        match (old, new) {
            (Established, Established) => Some(TransitionKind::Revise),
            (Established, Frozen) => Some(TransitionKind::Freeze),
            (Speculative, Speculative) | (Exploratory, Exploratory) => Some(TransitionKind::Edit),
            (Speculative, Established)
            | (Exploratory, Established)
            | (Exploratory, Speculative) => Some(TransitionKind::Promote),
            _ => None,
        }
    }

    /// Whether the state machine allows `old -> new`
    pub fn validate_transition(&self, old: Tier, new: Tier) -> bool {
        Self::transition_kind(old, new).is_some()
    }

    /// Mutability policy for a freshly inserted record
    pub fn classify_insert(&self, tier: Tier) -> Policy {
        tier.policy()
    }

    /// Authorize a new version of a family whose head is at `old`
    ///
    /// Evidence requirements are checked here. The non-contradiction proof a
    /// freeze needs is only known after the contradiction check, see
    /// [`TierGovernor::confirm`].
    pub fn authorize(
        &self,
        old: Tier,
        new: Tier,
        evidence: Option<&str>,
    ) -> Result<TransitionKind, GovernorError> {
        if old.is_terminal() {
            return Err(GovernorError::IllegalTierTransition {
                from: old,
                to: new,
                reason: format!("{} is terminal", old.as_str()),
            });
        }

        let kind = Self::transition_kind(old, new).ok_or_else(|| {
            GovernorError::IllegalTierTransition {
                from: old,
                to: new,
                reason: "no such transition".to_string(),
            }
        })?;

        let has_evidence = evidence.is_some_and(|e| !e.trim().is_empty());
        let needs_evidence = match kind {
            TransitionKind::Promote => self.config.require_promotion_evidence,
            TransitionKind::Freeze => self.config.require_freeze_evidence,
            _ => false,
        };
        if needs_evidence && !has_evidence {
            return Err(GovernorError::IllegalTierTransition {
                from: old,
                to: new,
                reason: "promotion requires an evidence field".to_string(),
            });
        }

        Ok(kind)
    }

    /// Confirm a transition once the contradiction verdict is known
    ///
    /// A freeze needs unanimous non-contradiction: the review must be clear,
    /// not merely unverified.
    pub fn confirm(
        &self,
        kind: TransitionKind,
        old: Tier,
        review: &ReviewState,
    ) -> Result<(), GovernorError> {
        if kind == TransitionKind::Freeze && !review.is_clear() {
            return Err(GovernorError::IllegalTierTransition {
                from: old,
                to: Tier::Frozen,
                reason: "promotion to FROZEN requires a clear contradiction check".to_string(),
            });
        }
        Ok(())
    }

    /// Authorize discarding a record at `tier`
    pub fn authorize_discard(&self, tier: Tier) -> Result<(), GovernorError> {
        match self.classify_insert(tier) {
            Policy::Discardable => Ok(()),
            _ => Err(GovernorError::IllegalDiscard(tier)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::ReviewNote;

    #[test]
    fn test_terminal_tiers_have_no_transitions() {
        let governor = TierGovernor::default_config();
        for new in Tier::ALL {
            assert!(!governor.validate_transition(Tier::Frozen, new));
            assert!(!governor.validate_transition(Tier::Falsified, new));
        }
    }

    #[test]
    fn test_established_transitions() {
        let governor = TierGovernor::default_config();
        assert!(governor.validate_transition(Tier::Established, Tier::Established));
        assert!(governor.validate_transition(Tier::Established, Tier::Frozen));
        assert!(!governor.validate_transition(Tier::Established, Tier::Falsified));
        assert!(!governor.validate_transition(Tier::Established, Tier::Speculative));
    }

    #[test]
    fn test_speculative_and_exploratory_transitions() {
        let governor = TierGovernor::default_config();
        assert!(governor.validate_transition(Tier::Speculative, Tier::Established));
        assert!(governor.validate_transition(Tier::Speculative, Tier::Speculative));
        assert!(!governor.validate_transition(Tier::Speculative, Tier::Exploratory));
        assert!(!governor.validate_transition(Tier::Speculative, Tier::Frozen));
        assert!(governor.validate_transition(Tier::Exploratory, Tier::Speculative));
        assert!(governor.validate_transition(Tier::Exploratory, Tier::Established));
        assert!(!governor.validate_transition(Tier::Exploratory, Tier::Falsified));
    }

    #[test]
    fn test_authorize_terminal() {
        let governor = TierGovernor::default_config();
        let err = governor
            .authorize(Tier::Frozen, Tier::Frozen, Some("more data"))
            .unwrap_err();
        match err {
            GovernorError::IllegalTierTransition { from, reason, .. } => {
                assert_eq!(from, Tier::Frozen);
                assert!(reason.contains("terminal"));
            }
            _ => panic!("Expected IllegalTierTransition"),
        }
    }

    #[test]
    fn test_promotion_requires_evidence() {
        let governor = TierGovernor::default_config();
        assert!(governor
            .authorize(Tier::Speculative, Tier::Established, None)
            .is_err());
        assert!(governor
            .authorize(Tier::Speculative, Tier::Established, Some("   "))
            .is_err());
        assert_eq!(
            governor
                .authorize(Tier::Speculative, Tier::Established, Some("phase 80 replication"))
                .unwrap(),
            TransitionKind::Promote
        );
    }

    #[test]
    fn test_permissive_promotion_without_evidence() {
        let governor = TierGovernor::new(GovernanceConfig::permissive());
        assert_eq!(
            governor
                .authorize(Tier::Exploratory, Tier::Established, None)
                .unwrap(),
            TransitionKind::Promote
        );
    }

    #[test]
    fn test_freeze_needs_clear_review() {
        let governor = TierGovernor::default_config();
        let kind = governor
            .authorize(Tier::Established, Tier::Frozen, Some("all phases agree"))
            .unwrap();
        assert_eq!(kind, TransitionKind::Freeze);

        assert!(governor.confirm(kind, Tier::Established, &ReviewState::Clear).is_ok());
        assert!(governor
            .confirm(kind, Tier::Established, &ReviewState::Unchecked)
            .is_err());
        let flagged = ReviewState::Unverified(vec![ReviewNote::new(None, "shared key")]);
        assert!(governor.confirm(kind, Tier::Established, &flagged).is_err());

        // Other kinds never need the proof
        assert!(governor
            .confirm(TransitionKind::Revise, Tier::Established, &ReviewState::Unchecked)
            .is_ok());
    }

    #[test]
    fn test_discard_policy() {
        let governor = TierGovernor::default_config();
        assert!(governor.authorize_discard(Tier::Speculative).is_ok());
        assert!(governor.authorize_discard(Tier::Exploratory).is_ok());
        assert_eq!(
            governor.authorize_discard(Tier::Established),
            Err(GovernorError::IllegalDiscard(Tier::Established))
        );
        assert!(governor.authorize_discard(Tier::Frozen).is_err());
    }
}
