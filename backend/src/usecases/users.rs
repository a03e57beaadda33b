use std::sync::Arc;

use anyhow::anyhow;
use axum::http::StatusCode;
use crates::domain::{
    entities::users::{InsertUserEntity, UserEntity},
    repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
    value_objects::{
        subscriptions::SubscriptionDto,
        users::{SessionIdentity, UserSummaryDto},
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,
    #[error("Session has no email address")]
    MissingEmail,
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError for UserError {
    fn status_code(&self) -> StatusCode {
        match self {
            UserError::NotFound => StatusCode::NOT_FOUND,
            UserError::MissingEmail => StatusCode::BAD_REQUEST,
            UserError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            UserError::NotFound => "NOT_FOUND",
            UserError::MissingEmail => "VALIDATION_ERROR",
            UserError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Loads the caller's row, creating a free-plan account on first sight.
pub async fn ensure_user<U>(user_repo: &U, identity: &SessionIdentity) -> anyhow::Result<UserEntity>
where
    U: UserRepository + Send + Sync,
{
    if let Some(user) = user_repo.find_by_id(identity.user_id).await? {
        return Ok(user);
    }

    let email = identity
        .email
        .clone()
        .ok_or_else(|| anyhow!("cannot create user {} without an email", identity.user_id))?;

    info!(user_id = %identity.user_id, "users: creating account on first request");
    user_repo
        .get_or_create(InsertUserEntity::new_free(
            identity.user_id,
            email,
            identity.name.clone(),
            identity.image.clone(),
        ))
        .await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusDto {
    pub user: UserSummaryDto,
    pub subscription: Option<SubscriptionDto>,
}

pub struct UserUseCase<U, S>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
}

impl<U, S> UserUseCase<U, S>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, subscription_repo: Arc<S>) -> Self {
        Self {
            user_repo,
            subscription_repo,
        }
    }

    /// Get-or-create on login. Refreshes `last_login_at` and the avatar.
    pub async fn init_user(&self, identity: SessionIdentity) -> Result<UserSummaryDto, UserError> {
        let user_id = identity.user_id;
        let email = identity.email.clone().ok_or(UserError::MissingEmail)?;

        let user = self
            .user_repo
            .get_or_create(InsertUserEntity::new_free(
                user_id,
                email,
                identity.name,
                identity.image,
            ))
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "users: failed to initialize user");
                UserError::Internal(err)
            })?;

        info!(%user_id, plan = %user.subscription_plan, "users: user initialized");
        Ok(UserSummaryDto::from(user))
    }

    pub async fn subscription_status(
        &self,
        user_id: Uuid,
    ) -> Result<SubscriptionStatusDto, UserError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "users: failed to load user");
                UserError::Internal(err)
            })?
            .ok_or(UserError::NotFound)?;

        let subscription = self
            .subscription_repo
            .find_active_by_user(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "users: failed to load active subscription");
                UserError::Internal(err)
            })?;

        let mut summary = UserSummaryDto::from(user);
        if summary.subscription_period_end.is_none() {
            summary.subscription_period_end =
                subscription.as_ref().map(|sub| sub.current_period_end);
        }

        Ok(SubscriptionStatusDto {
            user: summary,
            subscription: subscription.map(SubscriptionDto::from),
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use crates::domain::entities::users::UserEntity;
    use uuid::Uuid;

    pub fn user(user_id: Uuid) -> UserEntity {
        let now = Utc::now();
        UserEntity {
            id: user_id,
            email: "listener@example.com".to_string(),
            name: Some("Listener".to_string()),
            image: None,
            credits: 50,
            credits_used: 0,
            total_credits: 50,
            subscription_plan: "free".to_string(),
            subscription_status: None,
            subscription_id: None,
            subscription_period_end: None,
            cancel_at_period_end: false,
            stripe_customer_id: None,
            last_credit_allocation: None,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        }
    }
}
