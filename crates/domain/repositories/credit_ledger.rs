use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::credit_ledger::CreditLedgerEntryEntity,
    value_objects::credits::{
        AllocateCreditsModel, AllocationOutcome, DebitCreditsModel, DebitOutcome, UsageTotal,
    },
};

#[automock]
#[async_trait]
pub trait CreditLedgerRepository {
    /// Checks the cached balance, decrements it and appends the usage entry in
    /// one transaction.
    async fn debit(&self, debit_credits_model: DebitCreditsModel) -> Result<DebitOutcome>;

    /// Resets the balance to the plan allotment and appends the allocation entry
    /// unless an entry with the same idempotency key already exists.
    async fn allocate(
        &self,
        allocate_credits_model: AllocateCreditsModel,
    ) -> Result<AllocationOutcome>;

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditLedgerEntryEntity>>;

    /// Debit entries created at or after `since`, newest first.
    async fn list_usage_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CreditLedgerEntryEntity>>;

    /// Lifetime debit sums and counts per entry type.
    async fn usage_totals(&self, user_id: Uuid) -> Result<Vec<UsageTotal>>;
}
