use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        subscription_plans::{FREE_SIGNUP_CREDITS, SubscriptionPlan},
        subscription_statuses::SubscriptionStatus,
    },
    infra::db::postgres::schema::users,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = users)]
pub struct UserEntity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub credits: i32,
    pub credits_used: i32,
    pub total_credits: i32,
    pub subscription_plan: String,
    pub subscription_status: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub stripe_customer_id: Option<String>,
    pub last_credit_allocation: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserEntity {
    pub fn plan(&self) -> SubscriptionPlan {
        SubscriptionPlan::from_str(&self.subscription_plan).unwrap_or_default()
    }

    pub fn status(&self) -> Option<SubscriptionStatus> {
        self.subscription_status
            .as_deref()
            .map(SubscriptionStatus::from_str)
    }

    pub fn has_active_subscription(&self) -> bool {
        self.status() == Some(SubscriptionStatus::Active)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct InsertUserEntity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub credits: i32,
    pub total_credits: i32,
    pub subscription_plan: String,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl InsertUserEntity {
    /// New accounts start on the free plan with the one-time signup grant.
    pub fn new_free(id: Uuid, email: String, name: Option<String>, image: Option<String>) -> Self {
        Self {
            id,
            email,
            name,
            image,
            credits: FREE_SIGNUP_CREDITS,
            total_credits: FREE_SIGNUP_CREDITS,
            subscription_plan: SubscriptionPlan::Free.to_string(),
            last_login_at: Some(Utc::now()),
        }
    }
}

/// Partial update of the subscription fields mirrored onto a user. `None`
/// leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserSubscriptionChangeset {
    pub stripe_customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_plan: Option<String>,
    pub subscription_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: Option<bool>,
}
