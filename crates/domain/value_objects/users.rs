use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{entities::users::UserEntity, value_objects::plans::PlanFeatures};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryDto {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub credits: i32,
    pub credits_used: i32,
    pub total_credits: i32,
    pub subscription_plan: String,
    pub subscription_status: Option<String>,
    pub subscription_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub features: PlanFeatures,
}

impl From<UserEntity> for UserSummaryDto {
    fn from(value: UserEntity) -> Self {
        let features = value.plan().features();
        Self {
            id: value.id,
            email: value.email,
            name: value.name,
            image: value.image,
            credits: value.credits,
            credits_used: value.credits_used,
            total_credits: value.total_credits,
            subscription_plan: value.subscription_plan,
            subscription_status: value.subscription_status,
            subscription_period_end: value.subscription_period_end,
            cancel_at_period_end: value.cancel_at_period_end,
            features,
        }
    }
}

/// Identity taken from the verified session token.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
}
