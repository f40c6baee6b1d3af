//! Status mapper - the single authority for local status and plan.
//!
//! Every code path that writes `subscription_status` or `subscription_plan`
//! asks this module first. Policies for the cases where Stripe's vocabulary
//! has no obvious local equivalent (`past_due`, ended subscriptions, failed
//! invoices) are explicit configuration rather than per-handler choices.

use serde::Deserialize;
use std::collections::HashSet;

use super::{LocalStatus, Plan};

/// Subscription status as reported by Stripe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
    Unknown,
}

impl ExternalStatus {
    /// Parses a raw Stripe status string. Unrecognised values map to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }
}

/// How a `past_due` subscription is entitled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PastDuePolicy {
    /// Keep access while Stripe retries the payment.
    #[default]
    Grace,
    /// Withdraw access immediately.
    Revoke,
}

/// Local status for subscriptions Stripe considers over or never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndedPolicy {
    #[default]
    Free,
    Expired,
}

/// Reaction to `invoice.payment_failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFailedPolicy {
    /// Set the profile to `expired`.
    #[default]
    Expire,
    /// Treat the failure like a `past_due` status update.
    FollowPastDue,
}

/// Status policies, loaded from configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusPolicy {
    #[serde(default)]
    pub past_due: PastDuePolicy,
    #[serde(default)]
    pub ended: EndedPolicy,
    #[serde(default)]
    pub payment_failed: PaymentFailedPolicy,
}

/// Lookup table from Stripe price ids to plans.
#[derive(Debug, Clone)]
pub struct PriceTable {
    monthly: HashSet<String>,
    annual: HashSet<String>,
    fallback: Plan,
}

impl PriceTable {
    pub fn new<M, A>(monthly: M, annual: A, fallback: Plan) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            monthly: monthly.into_iter().map(Into::into).collect(),
            annual: annual.into_iter().map(Into::into).collect(),
            fallback,
        }
    }

    /// Resolves the plan for a price id, falling back for unknown or absent ids.
    pub fn plan_for(&self, price_id: Option<&str>) -> Plan {
        match price_id {
            Some(id) if self.annual.contains(id) => Plan::PremiumAnnual,
            Some(id) if self.monthly.contains(id) => Plan::PremiumMonthly,
            Some(id) => {
                tracing::warn!(price_id = id, fallback = %self.fallback, "Unknown price id");
                self.fallback
            }
            None => self.fallback,
        }
    }

    pub fn fallback(&self) -> Plan {
        self.fallback
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::new(Vec::<String>::new(), Vec::<String>::new(), Plan::PremiumMonthly)
    }
}

/// Maps Stripe state onto local status and plan.
#[derive(Debug, Clone, Default)]
pub struct StatusMapper {
    policy: StatusPolicy,
    prices: PriceTable,
}

impl StatusMapper {
    pub fn new(policy: StatusPolicy, prices: PriceTable) -> Self {
        Self { policy, prices }
    }

    /// Maps a raw Stripe subscription status to the local status.
    pub fn map_status(&self, external: &str) -> LocalStatus {
        match ExternalStatus::parse(external) {
            ExternalStatus::Trialing => LocalStatus::Trial,
            ExternalStatus::Active => LocalStatus::Active,
            ExternalStatus::PastDue => self.past_due_status(),
            ExternalStatus::Canceled
            | ExternalStatus::Incomplete
            | ExternalStatus::IncompleteExpired
            | ExternalStatus::Unpaid
            | ExternalStatus::Paused
            | ExternalStatus::Unknown => self.ended_status(),
        }
    }

    /// Maps a price id to the local plan.
    ///
    /// A `free` status always carries the free plan. An `expired` profile keeps
    /// the plan it lapsed on.
    pub fn map_plan(&self, price_id: Option<&str>, status: LocalStatus) -> Plan {
        match status {
            LocalStatus::Free => Plan::Free,
            _ => self.prices.plan_for(price_id),
        }
    }

    pub fn on_payment_succeeded(&self) -> LocalStatus {
        LocalStatus::Active
    }

    pub fn on_payment_failed(&self) -> LocalStatus {
        match self.policy.payment_failed {
            PaymentFailedPolicy::Expire => LocalStatus::Expired,
            PaymentFailedPolicy::FollowPastDue => self.past_due_status(),
        }
    }

    pub fn on_subscription_deleted(&self) -> (LocalStatus, Plan) {
        (LocalStatus::Free, Plan::Free)
    }

    fn past_due_status(&self) -> LocalStatus {
        match self.policy.past_due {
            PastDuePolicy::Grace => LocalStatus::Active,
            PastDuePolicy::Revoke => LocalStatus::Expired,
        }
    }

    fn ended_status(&self) -> LocalStatus {
        match self.policy.ended {
            EndedPolicy::Free => LocalStatus::Free,
            EndedPolicy::Expired => LocalStatus::Expired,
        }
    }
}
