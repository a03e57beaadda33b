use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    RunQueryDsl,
    dsl::{count, sum},
    insert_into,
    prelude::*,
    update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{credit_ledger, users},
    },
};
use domain::{
    entities::credit_ledger::{CreditLedgerEntryEntity, InsertCreditLedgerEntryEntity},
    repositories::credit_ledger::CreditLedgerRepository,
    value_objects::{
        credits::{
            AllocateCreditsModel, AllocationOutcome, DebitCreditsModel, DebitOutcome, UsageTotal,
        },
        enums::ledger_entry_types::LedgerEntryType,
    },
};

pub struct CreditLedgerPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CreditLedgerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CreditLedgerRepository for CreditLedgerPostgres {
    async fn debit(&self, debit_credits_model: DebitCreditsModel) -> Result<DebitOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<DebitOutcome, diesel::result::Error, _>(|conn| {
            let balance = users::table
                .find(debit_credits_model.user_id)
                .select(users::credits)
                .for_update()
                .first::<i32>(conn)?;

            if balance < debit_credits_model.amount {
                return Ok(DebitOutcome::InsufficientCredits { balance });
            }

            let balance_after = balance - debit_credits_model.amount;
            update(users::table.find(debit_credits_model.user_id))
                .set((
                    users::credits.eq(balance_after),
                    users::credits_used.eq(users::credits_used + debit_credits_model.amount),
                    users::updated_at.eq(Utc::now()),
                ))
                .execute(conn)?;

            let entry = insert_into(credit_ledger::table)
                .values(&InsertCreditLedgerEntryEntity {
                    user_id: debit_credits_model.user_id,
                    entry_type: debit_credits_model.entry_type.to_string(),
                    amount: debit_credits_model.amount,
                    description: debit_credits_model.description.clone(),
                    metadata: debit_credits_model.metadata.clone(),
                    subscription_id: None,
                    idempotency_key: None,
                    balance_before: balance,
                    balance_after,
                })
                .returning(CreditLedgerEntryEntity::as_returning())
                .get_result::<CreditLedgerEntryEntity>(conn)?;

            Ok(DebitOutcome::Debited(entry))
        })?;

        Ok(outcome)
    }

    async fn allocate(
        &self,
        allocate_credits_model: AllocateCreditsModel,
    ) -> Result<AllocationOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let idempotency_key = allocate_credits_model.idempotency_key();
        let allotment = allocate_credits_model.plan.monthly_credits();

        let outcome = conn.transaction::<AllocationOutcome, diesel::result::Error, _>(|conn| {
            // The row lock serializes redelivered events for the same user.
            let balance = users::table
                .find(allocate_credits_model.user_id)
                .select(users::credits)
                .for_update()
                .first::<i32>(conn)?;

            let already_granted = credit_ledger::table
                .filter(credit_ledger::idempotency_key.eq(&idempotency_key))
                .select(credit_ledger::id)
                .first::<Uuid>(conn)
                .optional()?;

            if already_granted.is_some() {
                return Ok(AllocationOutcome::AlreadyGranted);
            }

            let now = Utc::now();
            update(users::table.find(allocate_credits_model.user_id))
                .set((
                    users::credits.eq(allotment),
                    users::total_credits.eq(allotment),
                    users::last_credit_allocation.eq(Some(now)),
                    users::updated_at.eq(now),
                ))
                .execute(conn)?;

            let entry = insert_into(credit_ledger::table)
                .values(&InsertCreditLedgerEntryEntity {
                    user_id: allocate_credits_model.user_id,
                    entry_type: LedgerEntryType::Allocation.to_string(),
                    amount: allotment,
                    description: format!(
                        "Monthly credit allocation ({} plan)",
                        allocate_credits_model.plan
                    ),
                    metadata: serde_json::json!({
                        "plan": allocate_credits_model.plan.to_string(),
                        "period_start": allocate_credits_model.period_start.timestamp(),
                    }),
                    subscription_id: Some(allocate_credits_model.subscription_id.clone()),
                    idempotency_key: Some(idempotency_key.clone()),
                    balance_before: balance,
                    balance_after: allotment,
                })
                .returning(CreditLedgerEntryEntity::as_returning())
                .get_result::<CreditLedgerEntryEntity>(conn)?;

            Ok(AllocationOutcome::Granted(entry))
        })?;

        Ok(outcome)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CreditLedgerEntryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = credit_ledger::table
            .filter(credit_ledger::user_id.eq(user_id))
            .order(credit_ledger::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(CreditLedgerEntryEntity::as_select())
            .load::<CreditLedgerEntryEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_usage_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CreditLedgerEntryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = credit_ledger::table
            .filter(credit_ledger::user_id.eq(user_id))
            .filter(credit_ledger::entry_type.ne_all(grant_types()))
            .filter(credit_ledger::created_at.ge(since))
            .order(credit_ledger::created_at.desc())
            .select(CreditLedgerEntryEntity::as_select())
            .load::<CreditLedgerEntryEntity>(&mut conn)?;

        Ok(results)
    }

    async fn usage_totals(&self, user_id: Uuid) -> Result<Vec<UsageTotal>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = credit_ledger::table
            .filter(credit_ledger::user_id.eq(user_id))
            .filter(credit_ledger::entry_type.ne_all(grant_types()))
            .group_by(credit_ledger::entry_type)
            .select((
                credit_ledger::entry_type,
                sum(credit_ledger::amount),
                count(credit_ledger::id),
            ))
            .load::<(String, Option<i64>, i64)>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(entry_type, credits_used, record_count)| UsageTotal {
                entry_type,
                credits_used: credits_used.unwrap_or(0),
                record_count,
            })
            .collect())
    }
}

fn grant_types() -> Vec<String> {
    [
        LedgerEntryType::Allocation,
        LedgerEntryType::Refund,
        LedgerEntryType::Bonus,
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}
