use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::plans::PlanFeatures;

/// Credits a brand new account starts with.
pub const FREE_SIGNUP_CREDITS: i32 = 50;

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Basic,
    Creator,
    Team,
}

impl Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan = match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Creator => "creator",
            SubscriptionPlan::Team => "team",
        };
        write!(f, "{}", plan)
    }
}

impl SubscriptionPlan {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "free" => Some(SubscriptionPlan::Free),
            "basic" => Some(SubscriptionPlan::Basic),
            "creator" => Some(SubscriptionPlan::Creator),
            "team" => Some(SubscriptionPlan::Team),
            _ => None,
        }
    }

    /// Credits granted at the start of every paid billing period. The free
    /// tier only receives its one-time signup grant.
    pub fn monthly_credits(&self) -> i32 {
        match self {
            SubscriptionPlan::Free => FREE_SIGNUP_CREDITS,
            SubscriptionPlan::Basic => 500,
            SubscriptionPlan::Creator => 1500,
            SubscriptionPlan::Team => 5000,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionPlan::Free)
    }

    pub fn features(&self) -> PlanFeatures {
        let advanced = matches!(self, SubscriptionPlan::Creator | SubscriptionPlan::Team);
        PlanFeatures {
            monthly_credits: self.monthly_credits(),
            max_generations_per_day: match self {
                SubscriptionPlan::Free => 5,
                SubscriptionPlan::Basic => 50,
                SubscriptionPlan::Creator => 150,
                SubscriptionPlan::Team => 500,
            },
            stem_separation: advanced,
            priority_queue: advanced,
            api_access: advanced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_allotments_match_pricing_table() {
        assert_eq!(SubscriptionPlan::Free.monthly_credits(), 50);
        assert_eq!(SubscriptionPlan::Basic.monthly_credits(), 500);
        assert_eq!(SubscriptionPlan::Creator.monthly_credits(), 1500);
        assert_eq!(SubscriptionPlan::Team.monthly_credits(), 5000);
    }

    #[test]
    fn advanced_features_start_at_creator() {
        assert!(!SubscriptionPlan::Basic.features().stem_separation);
        assert!(SubscriptionPlan::Creator.features().stem_separation);
        assert_eq!(SubscriptionPlan::Team.features().max_generations_per_day, 500);
    }

    #[test]
    fn rejects_unknown_plan_names() {
        assert_eq!(SubscriptionPlan::from_str("pro"), None);
        assert_eq!(
            SubscriptionPlan::from_str("creator"),
            Some(SubscriptionPlan::Creator)
        );
    }
}
