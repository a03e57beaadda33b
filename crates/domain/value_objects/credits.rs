use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::credit_ledger::CreditLedgerEntryEntity,
    value_objects::enums::{
        ledger_entry_types::LedgerEntryType, subscription_plans::SubscriptionPlan,
    },
};

pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
pub const MAX_HISTORY_LIMIT: i64 = 500;
pub const DAILY_SERIES_DAYS: i64 = 30;

/// Idempotency key of the allotment granted for one billing period of a subscription.
pub fn allocation_idempotency_key(subscription_id: &str, period_start: DateTime<Utc>) -> String {
    format!("allocation:{}:{}", subscription_id, period_start.timestamp())
}

pub fn clamp_history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebitCreditsModel {
    pub user_id: Uuid,
    pub amount: i32,
    pub entry_type: LedgerEntryType,
    pub description: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocateCreditsModel {
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub subscription_id: String,
    pub period_start: DateTime<Utc>,
}

impl AllocateCreditsModel {
    pub fn idempotency_key(&self) -> String {
        allocation_idempotency_key(&self.subscription_id, self.period_start)
    }
}

#[derive(Debug, Clone)]
pub enum DebitOutcome {
    Debited(CreditLedgerEntryEntity),
    InsufficientCredits { balance: i32 },
}

#[derive(Debug, Clone)]
pub enum AllocationOutcome {
    Granted(CreditLedgerEntryEntity),
    /// The allotment for this billing period was already written.
    AlreadyGranted,
}

/// Body of a client-reported usage record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsageModel {
    pub credits_used: Option<i32>,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsageDto {
    pub success: bool,
    pub id: Uuid,
    pub balance: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreditHistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditLedgerEntryDto {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub credits_used: i32,
    pub description: String,
    pub metadata: serde_json::Value,
    pub subscription_id: Option<String>,
    pub balance_before: i32,
    pub balance_after: i32,
    pub created_at: DateTime<Utc>,
}

impl From<CreditLedgerEntryEntity> for CreditLedgerEntryDto {
    fn from(value: CreditLedgerEntryEntity) -> Self {
        Self {
            id: value.id,
            entry_type: value.entry_type,
            credits_used: value.amount,
            description: value.description,
            metadata: value.metadata,
            subscription_id: value.subscription_id,
            balance_before: value.balance_before,
            balance_after: value.balance_after,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub credits_used: i64,
}

/// Lifetime usage of one entry type, aggregated by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageTotal {
    pub entry_type: String,
    pub credits_used: i64,
    pub record_count: i64,
}

/// Midnight (UTC) of the oldest day in the daily series. Entries older than
/// this only contribute to the lifetime totals.
pub fn analytics_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    (now.date_naive() - Duration::days(DAILY_SERIES_DAYS - 1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageAnalytics {
    pub daily_usage: i64,
    pub weekly_usage: i64,
    pub total_usage: i64,
    pub usage_by_type: BTreeMap<String, i64>,
    pub record_count: i64,
    pub daily_series: Vec<DailyUsage>,
}

impl UsageAnalytics {
    /// Lifetime figures come from `totals`; the 24 h, 7 day and daily windows
    /// from `recent`, the debit entries since [`analytics_window_start`].
    /// Grants (allocation, refund, bonus) are skipped in both.
    pub fn compute(
        totals: &[UsageTotal],
        recent: &[CreditLedgerEntryEntity],
        now: DateTime<Utc>,
    ) -> Self {
        let one_day_ago = now - Duration::hours(24);
        let seven_days_ago = now - Duration::days(7);
        let today = now.date_naive();
        let first_day = today - Duration::days(DAILY_SERIES_DAYS - 1);

        let mut analytics = UsageAnalytics::default();

        for total in totals.iter().filter(|t| {
            LedgerEntryType::from_str(&t.entry_type).is_none_or(|entry_type| entry_type.is_debit())
        }) {
            analytics.record_count += total.record_count;
            analytics.total_usage += total.credits_used;
            *analytics
                .usage_by_type
                .entry(total.entry_type.clone())
                .or_insert(0) += total.credits_used;
        }

        let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for entry in recent.iter().filter(|e| e.entry_type().is_debit()) {
            let amount = i64::from(entry.amount);
            if entry.created_at >= one_day_ago {
                analytics.daily_usage += amount;
            }
            if entry.created_at >= seven_days_ago {
                analytics.weekly_usage += amount;
            }

            let day = entry.created_at.date_naive();
            if day >= first_day && day <= today {
                *per_day.entry(day).or_insert(0) += amount;
            }
        }

        analytics.daily_series = (0..DAILY_SERIES_DAYS)
            .map(|offset| {
                let date = first_day + Duration::days(offset);
                DailyUsage {
                    date,
                    credits_used: per_day.get(&date).copied().unwrap_or(0),
                }
            })
            .collect();

        analytics
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditHistoryDto {
    pub history: Vec<CreditLedgerEntryDto>,
    pub analytics: UsageAnalytics,
}

/// Live balance reported by the generation provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCreditsDto {
    pub credits: i64,
    pub total_credits: i64,
    pub credits_used: i64,
    pub extra_credits: i64,
}

impl ProviderCreditsDto {
    pub fn from_balance(credits: i64, extra_credits: i64) -> Self {
        let total_credits = credits + extra_credits;
        Self {
            credits,
            total_credits,
            credits_used: total_credits - credits,
            extra_credits,
        }
    }
}
