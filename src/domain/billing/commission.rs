//! Influencer commission milestones, tiers and the bonus schedule.
//!
//! Amounts are integer minor currency units (pence).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Affiliate tier of a promo code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoTier {
    Micro,
    Mid,
    Top,
}

impl PromoTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoTier::Micro => "micro",
            PromoTier::Mid => "mid",
            PromoTier::Top => "top",
        }
    }
}

impl fmt::Display for PromoTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromoTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "micro" => Ok(PromoTier::Micro),
            "mid" => Ok(PromoTier::Mid),
            "top" => Ok(PromoTier::Top),
            other => Err(ValidationError::invalid_format(
                "tier",
                format!("unknown tier '{}'", other),
            )),
        }
    }
}

/// Time-since-acquisition checkpoint that pays a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Milestone {
    #[serde(rename = "first_month")]
    FirstMonth,
    #[serde(rename = "3_months")]
    ThreeMonths,
    #[serde(rename = "6_months")]
    SixMonths,
}

impl Milestone {
    /// Retention milestones checked on each successful renewal.
    pub const RETENTION: [Milestone; 2] = [Milestone::ThreeMonths, Milestone::SixMonths];

    pub fn as_str(&self) -> &'static str {
        match self {
            Milestone::FirstMonth => "first_month",
            Milestone::ThreeMonths => "3_months",
            Milestone::SixMonths => "6_months",
        }
    }

    /// Whole months of account age at which the milestone is reached.
    pub fn months_required(&self) -> u32 {
        match self {
            Milestone::FirstMonth => 0,
            Milestone::ThreeMonths => 3,
            Milestone::SixMonths => 6,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Milestone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_month" => Ok(Milestone::FirstMonth),
            "3_months" => Ok(Milestone::ThreeMonths),
            "6_months" => Ok(Milestone::SixMonths),
            other => Err(ValidationError::invalid_format(
                "milestone",
                format!("unknown milestone '{}'", other),
            )),
        }
    }
}

/// Bonus per tier for one milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TierAmounts {
    pub micro: i64,
    pub mid: i64,
    pub top: i64,
}

impl TierAmounts {
    pub fn for_tier(&self, tier: PromoTier) -> i64 {
        match tier {
            PromoTier::Micro => self.micro,
            PromoTier::Mid => self.mid,
            PromoTier::Top => self.top,
        }
    }

    fn validate(&self, field: &'static str) -> Result<(), ValidationError> {
        if self.micro < 0 || self.mid < 0 || self.top < 0 {
            return Err(ValidationError::invalid_format(
                field,
                "commission amounts must not be negative",
            ));
        }
        Ok(())
    }
}

/// The one table of retention bonuses.
///
/// `first_month` is not listed: it pays the subscriber's first-period revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CommissionSchedule {
    #[serde(default = "default_three_months")]
    pub three_months: TierAmounts,
    #[serde(default = "default_six_months")]
    pub six_months: TierAmounts,
}

fn default_three_months() -> TierAmounts {
    TierAmounts {
        micro: 500,
        mid: 750,
        top: 1000,
    }
}

fn default_six_months() -> TierAmounts {
    TierAmounts {
        micro: 750,
        mid: 1000,
        top: 1500,
    }
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        Self {
            three_months: default_three_months(),
            six_months: default_six_months(),
        }
    }
}

impl CommissionSchedule {
    /// Bonus for a retention milestone, `None` for `first_month`.
    pub fn bonus(&self, tier: PromoTier, milestone: Milestone) -> Option<i64> {
        match milestone {
            Milestone::FirstMonth => None,
            Milestone::ThreeMonths => Some(self.three_months.for_tier(tier)),
            Milestone::SixMonths => Some(self.six_months.for_tier(tier)),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.three_months.validate("commission.three_months")?;
        self.six_months.validate("commission.six_months")
    }
}
