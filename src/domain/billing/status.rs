//! Local subscription status and plan.
//!
//! These are the simplified entitlement states the application reads.
//! Stripe's richer status vocabulary is folded into them by the
//! [`StatusMapper`](super::StatusMapper).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Entitlement state stored on the customer profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStatus {
    /// No paid entitlement.
    Free,

    /// Inside a provider-managed trial period.
    Trial,

    /// Paid and entitled.
    Active,

    /// Payment lapsed; entitlement withdrawn.
    Expired,
}

impl LocalStatus {
    /// Returns true if this status grants premium features.
    pub fn has_access(&self) -> bool {
        matches!(self, LocalStatus::Trial | LocalStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LocalStatus::Free => "free",
            LocalStatus::Trial => "trial",
            LocalStatus::Active => "active",
            LocalStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for LocalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(LocalStatus::Free),
            "trial" => Ok(LocalStatus::Trial),
            "active" => Ok(LocalStatus::Active),
            "expired" => Ok(LocalStatus::Expired),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// Subscription plan stored on the customer profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    PremiumMonthly,
    PremiumAnnual,
}

impl Plan {
    /// Returns true if this plan is billed.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::PremiumMonthly => "premium_monthly",
            Plan::PremiumAnnual => "premium_annual",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "premium_monthly" => Ok(Plan::PremiumMonthly),
            "premium_annual" => Ok(Plan::PremiumAnnual),
            other => Err(ValidationError::invalid_format(
                "subscription_plan",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}
