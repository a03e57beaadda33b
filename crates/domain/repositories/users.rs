use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::users::{InsertUserEntity, UserEntity, UserSubscriptionChangeset};

#[automock]
#[async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserEntity>>;

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> Result<Option<UserEntity>>;

    /// Inserts the user if absent, then refreshes `last_login_at` and returns the row.
    async fn get_or_create(&self, insert_user_entity: InsertUserEntity) -> Result<UserEntity>;

    async fn apply_subscription_changes(
        &self,
        user_id: Uuid,
        changeset: UserSubscriptionChangeset,
    ) -> Result<()>;

    async fn list_with_stripe_customer(&self) -> Result<Vec<UserEntity>>;
}
