use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::ledger_entry_types::LedgerEntryType,
    infra::db::postgres::schema::credit_ledger,
};

/// Append-only: rows are never updated or deleted.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = credit_ledger)]
pub struct CreditLedgerEntryEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_type: String,
    pub amount: i32,
    pub description: String,
    pub metadata: serde_json::Value,
    pub subscription_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub balance_before: i32,
    pub balance_after: i32,
    pub created_at: DateTime<Utc>,
}

impl CreditLedgerEntryEntity {
    pub fn entry_type(&self) -> LedgerEntryType {
        LedgerEntryType::from_str(&self.entry_type).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = credit_ledger)]
pub struct InsertCreditLedgerEntryEntity {
    pub user_id: Uuid,
    pub entry_type: String,
    pub amount: i32,
    pub description: String,
    pub metadata: serde_json::Value,
    pub subscription_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub balance_before: i32,
    pub balance_after: i32,
}
