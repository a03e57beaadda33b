use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::subscription_plans::SubscriptionPlan;

/// Limits and feature flags attached to a plan.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanFeatures {
    pub monthly_credits: i32,
    pub max_generations_per_day: i32,
    pub stem_separation: bool,
    pub priority_queue: bool,
    pub api_access: bool,
}

/// Static mapping between Stripe price ids and plans, loaded from config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceCatalog {
    pub basic: String,
    pub creator: String,
    pub team: String,
}

impl PriceCatalog {
    pub fn new(basic: String, creator: String, team: String) -> Self {
        Self {
            basic,
            creator,
            team,
        }
    }

    pub fn plan_for_price(&self, price_id: &str) -> Option<SubscriptionPlan> {
        if price_id.is_empty() {
            return None;
        }
        if price_id == self.basic {
            Some(SubscriptionPlan::Basic)
        } else if price_id == self.creator {
            Some(SubscriptionPlan::Creator)
        } else if price_id == self.team {
            Some(SubscriptionPlan::Team)
        } else {
            None
        }
    }

    pub fn price_for_plan(&self, plan: SubscriptionPlan) -> Option<&str> {
        match plan {
            SubscriptionPlan::Free => None,
            SubscriptionPlan::Basic => Some(&self.basic),
            SubscriptionPlan::Creator => Some(&self.creator),
            SubscriptionPlan::Team => Some(&self.team),
        }
    }
}
