//! Tier module - epistemic status levels for constraints

use serde::{Deserialize, Serialize};
use std::fmt;

/// Epistemic tier of a constraint
///
/// Tiers govern both authority and mutability:
/// - Frozen (0): proven, never reopened
/// - Falsified (1): disproven, never retried
/// - Established (2): binding but revisable through a new version
/// - Speculative (3): non-binding, editable, discardable
/// - Exploratory (4): non-binding, editable, discardable
///
/// Tiers 0-2 are *binding*: they constrain contracts and contradiction checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Proven fact (terminal)
    Frozen = 0,

    /// Disproven hypothesis (terminal)
    Falsified = 1,

    /// Accepted, revisable by supersession
    Established = 2,

    /// Plausible, not yet supported
    Speculative = 3,

    /// Working idea
    Exploratory = 4,
}

/// Mutability policy assigned to a record at insert time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Policy {
    /// Tier 0: immutable, asserts its claim
    ImmutablePositive,

    /// Tier 1: immutable, denies its claim
    ImmutableNegative,

    /// Tier 2: revisable by a new suffixed version
    Revisable,

    /// Tiers 3-4: freely edited or discarded
    Discardable,
}

/// Direction of a terminal claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    /// The claim is held true (tier 0)
    Affirmed,

    /// The claim is held false (tier 1)
    Denied,
}

impl Polarity {
    /// The opposite polarity
    pub fn opposite(self) -> Self {
        match self {
            Polarity::Affirmed => Polarity::Denied,
            Polarity::Denied => Polarity::Affirmed,
        }
    }
}

impl Tier {
    /// All tiers in level order
    pub const ALL: [Tier; 5] = [
        Tier::Frozen,
        Tier::Falsified,
        Tier::Established,
        Tier::Speculative,
        Tier::Exploratory,
    ];

    /// Numeric level (0-4)
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Tier for a numeric level
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Tier::Frozen),
            1 => Some(Tier::Falsified),
            2 => Some(Tier::Established),
            3 => Some(Tier::Speculative),
            4 => Some(Tier::Exploratory),
            _ => None,
        }
    }

    /// Get the tier name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Frozen => "FROZEN",
            Tier::Falsified => "FALSIFIED",
            Tier::Established => "ESTABLISHED",
            Tier::Speculative => "SPECULATIVE",
            Tier::Exploratory => "EXPLORATORY",
        }
    }

    /// Parse a tier from a level number or a name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(level) = s.parse::<u8>() {
            return Self::from_level(level);
        }
        match s.to_ascii_uppercase().as_str() {
            "FROZEN" => Some(Tier::Frozen),
            "FALSIFIED" => Some(Tier::Falsified),
            "ESTABLISHED" => Some(Tier::Established),
            "SPECULATIVE" => Some(Tier::Speculative),
            "EXPLORATORY" => Some(Tier::Exploratory),
            _ => None,
        }
    }

    /// Whether constraints at this tier are binding (tiers 0-2)
    pub fn is_binding(self) -> bool {
        self <= Tier::Established
    }

    /// Whether this tier is terminal (no outgoing transitions)
    pub fn is_terminal(self) -> bool {
        matches!(self, Tier::Frozen | Tier::Falsified)
    }

    /// Insert policy for a record at this tier
    pub fn policy(self) -> Policy {
        match self {
            Tier::Frozen => Policy::ImmutablePositive,
            Tier::Falsified => Policy::ImmutableNegative,
            Tier::Established => Policy::Revisable,
            Tier::Speculative | Tier::Exploratory => Policy::Discardable,
        }
    }

    /// Polarity of a terminal tier; `None` for tiers 2-4
    pub fn polarity(self) -> Option<Polarity> {
        match self {
            Tier::Frozen => Some(Polarity::Affirmed),
            Tier::Falsified => Some(Polarity::Denied),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.level(), self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid tier: {}", s))
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| format!("Tier level out of range: {}", level))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.level()
    }
}
