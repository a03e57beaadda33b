use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use crates::{
    domain::{
        repositories::{credit_ledger::CreditLedgerRepository, users::UserRepository},
        value_objects::{
            credits::{
                CreditHistoryDto, CreditHistoryQuery, CreditLedgerEntryDto, DebitCreditsModel,
                DebitOutcome, ProviderCreditsDto, RecordUsageDto, RecordUsageModel,
                UsageAnalytics, analytics_window_start, clamp_history_limit,
            },
            enums::ledger_entry_types::LedgerEntryType,
            users::SessionIdentity,
        },
    },
    generation::suno_client::SunoError,
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    axum_http::error_responses::ApiError,
    usecases::{gateways::MusicGateway, users::ensure_user},
};

const DEFAULT_USAGE_DESCRIPTION: &str = "Music generation";

#[derive(Debug, Error)]
pub enum CreditError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Insufficient credits: {balance} available, {required} required")]
    InsufficientCredits { balance: i32, required: i32 },
    #[error(transparent)]
    Provider(#[from] SunoError),
    #[error("Failed to fetch credit history")]
    Fetch(#[source] anyhow::Error),
    #[error("Failed to log credit usage")]
    Log(#[source] anyhow::Error),
}

impl ApiError for CreditError {
    fn status_code(&self) -> StatusCode {
        match self {
            CreditError::Validation(_) => StatusCode::BAD_REQUEST,
            CreditError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            CreditError::Provider(err) => err.status_code(),
            CreditError::Fetch(_) | CreditError::Log(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            CreditError::Validation(_) => "VALIDATION_ERROR",
            CreditError::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            CreditError::Provider(err) => err.code(),
            CreditError::Fetch(_) => "FETCH_ERROR",
            CreditError::Log(_) => "LOG_ERROR",
        }
    }
}

pub struct CreditLedgerUseCase<U, C, M>
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    credit_ledger_repo: Arc<C>,
    music_gateway: Arc<M>,
}

impl<U, C, M> CreditLedgerUseCase<U, C, M>
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, credit_ledger_repo: Arc<C>, music_gateway: Arc<M>) -> Self {
        Self {
            user_repo,
            credit_ledger_repo,
            music_gateway,
        }
    }

    /// Debits the cached balance and appends the usage entry atomically.
    pub async fn record_usage(
        &self,
        identity: SessionIdentity,
        record_usage_model: RecordUsageModel,
    ) -> Result<RecordUsageDto, CreditError> {
        let user_id = identity.user_id;

        let amount = match record_usage_model.credits_used {
            Some(amount) if amount > 0 => amount,
            _ => return Err(CreditError::Validation("Credits used must be greater than 0")),
        };

        let entry_type = match record_usage_model.entry_type.as_deref() {
            None => LedgerEntryType::Generation,
            Some(raw) => match LedgerEntryType::from_str(raw) {
                Some(entry_type) if entry_type.is_debit() => entry_type,
                _ => return Err(CreditError::Validation("Invalid credit usage type")),
            },
        };

        ensure_user(self.user_repo.as_ref(), &identity)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "credits: failed to load user for usage");
                CreditError::Log(err)
            })?;

        let debit = DebitCreditsModel {
            user_id,
            amount,
            entry_type,
            description: record_usage_model
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USAGE_DESCRIPTION.to_string()),
            metadata: record_usage_model
                .metadata
                .unwrap_or_else(|| serde_json::json!({})),
        };

        let outcome = self.credit_ledger_repo.debit(debit).await.map_err(|err| {
            error!(%user_id, amount, db_error = ?err, "credits: failed to record usage");
            CreditError::Log(err)
        })?;

        match outcome {
            DebitOutcome::Debited(entry) => {
                info!(
                    %user_id,
                    amount,
                    entry_type = %entry_type,
                    balance_after = entry.balance_after,
                    "credits: usage recorded"
                );
                Ok(RecordUsageDto {
                    success: true,
                    id: entry.id,
                    balance: entry.balance_after,
                })
            }
            DebitOutcome::InsufficientCredits { balance } => {
                let err = CreditError::InsufficientCredits {
                    balance,
                    required: amount,
                };
                warn!(
                    %user_id,
                    balance,
                    amount,
                    status = err.status_code().as_u16(),
                    "credits: insufficient balance"
                );
                Err(err)
            }
        }
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        query: CreditHistoryQuery,
    ) -> Result<CreditHistoryDto, CreditError> {
        let limit = clamp_history_limit(query.limit);
        let offset = query.offset.unwrap_or(0).max(0);

        let entries = self
            .credit_ledger_repo
            .list_by_user(user_id, limit, offset)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "credits: failed to list history");
                CreditError::Fetch(err)
            })?;

        let now = Utc::now();
        let recent = self
            .credit_ledger_repo
            .list_usage_since(user_id, analytics_window_start(now))
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "credits: failed to load recent usage");
                CreditError::Fetch(err)
            })?;

        let totals = self
            .credit_ledger_repo
            .usage_totals(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "credits: failed to load usage totals");
                CreditError::Fetch(err)
            })?;

        Ok(CreditHistoryDto {
            history: entries.into_iter().map(CreditLedgerEntryDto::from).collect(),
            analytics: UsageAnalytics::compute(&totals, &recent, now),
        })
    }

    /// Live balance held at the generation provider.
    pub async fn provider_credits(&self) -> Result<ProviderCreditsDto, CreditError> {
        let balance = self.music_gateway.get_credits().await.map_err(|err| {
            error!(error = %err, "credits: failed to fetch provider balance");
            CreditError::Provider(err)
        })?;

        Ok(ProviderCreditsDto::from_balance(
            balance.credits,
            balance.extra_credits,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::{gateways::MockMusicGateway, users::fixtures};
    use chrono::Duration;
    use crates::{
        domain::{
            entities::credit_ledger::CreditLedgerEntryEntity,
            repositories::{
                credit_ledger::MockCreditLedgerRepository, users::MockUserRepository,
            },
            value_objects::credits::UsageTotal,
        },
        generation::suno_client::ProviderBalance,
    };
    use mockall::predicate::eq;

    fn identity(user_id: Uuid) -> SessionIdentity {
        SessionIdentity {
            user_id,
            email: Some("listener@example.com".to_string()),
            name: None,
            image: None,
        }
    }

    fn existing_user_repo() -> MockUserRepository {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_id()
            .returning(|id| Ok(Some(fixtures::user(id))));
        user_repo
    }

    fn ledger_entry(user_id: Uuid, entry_type: &str, amount: i32) -> CreditLedgerEntryEntity {
        CreditLedgerEntryEntity {
            id: Uuid::new_v4(),
            user_id,
            entry_type: entry_type.to_string(),
            amount,
            description: "Music generation".to_string(),
            metadata: serde_json::json!({}),
            subscription_id: None,
            idempotency_key: None,
            balance_before: 50,
            balance_after: 50 - amount,
            created_at: Utc::now() - Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn zero_usage_is_rejected_before_touching_the_ledger() {
        let usecase = CreditLedgerUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockCreditLedgerRepository::new()),
            Arc::new(MockMusicGateway::new()),
        );

        let err = usecase
            .record_usage(
                identity(Uuid::new_v4()),
                RecordUsageModel {
                    credits_used: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.to_string(), "Credits used must be greater than 0");
    }

    #[tokio::test]
    async fn usage_defaults_to_generation_and_returns_new_balance() {
        let user_id = Uuid::new_v4();
        let mut ledger_repo = MockCreditLedgerRepository::new();
        ledger_repo
            .expect_debit()
            .withf(move |debit| {
                debit.user_id == user_id
                    && debit.amount == 10
                    && debit.entry_type == LedgerEntryType::Generation
                    && debit.description == "Music generation"
            })
            .times(1)
            .returning(move |debit| {
                Ok(DebitOutcome::Debited(ledger_entry(
                    debit.user_id,
                    "generation",
                    debit.amount,
                )))
            });

        let usecase = CreditLedgerUseCase::new(
            Arc::new(existing_user_repo()),
            Arc::new(ledger_repo),
            Arc::new(MockMusicGateway::new()),
        );

        let recorded = usecase
            .record_usage(
                identity(user_id),
                RecordUsageModel {
                    credits_used: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(recorded.success);
        assert_eq!(recorded.balance, 40);
    }

    #[tokio::test]
    async fn insufficient_balance_maps_to_payment_required() {
        let mut ledger_repo = MockCreditLedgerRepository::new();
        ledger_repo
            .expect_debit()
            .returning(|_| Ok(DebitOutcome::InsufficientCredits { balance: 5 }));

        let usecase = CreditLedgerUseCase::new(
            Arc::new(existing_user_repo()),
            Arc::new(ledger_repo),
            Arc::new(MockMusicGateway::new()),
        );

        let err = usecase
            .record_usage(
                identity(Uuid::new_v4()),
                RecordUsageModel {
                    credits_used: Some(10),
                    entry_type: Some("lyrics".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.code(), "INSUFFICIENT_CREDITS");
    }

    #[tokio::test]
    async fn grant_types_cannot_be_recorded_as_usage() {
        let usecase = CreditLedgerUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockCreditLedgerRepository::new()),
            Arc::new(MockMusicGateway::new()),
        );

        let err = usecase
            .record_usage(
                identity(Uuid::new_v4()),
                RecordUsageModel {
                    credits_used: Some(100),
                    entry_type: Some("allocation".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn history_clamps_limit_and_computes_analytics() {
        let user_id = Uuid::new_v4();
        let mut ledger_repo = MockCreditLedgerRepository::new();
        ledger_repo
            .expect_list_by_user()
            .with(eq(user_id), eq(500_i64), eq(0_i64))
            .returning(move |user_id, _, _| Ok(vec![ledger_entry(user_id, "generation", 10)]));
        ledger_repo
            .expect_list_usage_since()
            .withf(move |id, since| {
                *id == user_id && Utc::now() - *since <= Duration::days(30)
            })
            .times(1)
            .returning(move |user_id, _| {
                Ok(vec![
                    ledger_entry(user_id, "generation", 10),
                    ledger_entry(user_id, "video", 5),
                ])
            });
        ledger_repo
            .expect_usage_totals()
            .with(eq(user_id))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    UsageTotal {
                        entry_type: "generation".to_string(),
                        credits_used: 410,
                        record_count: 41,
                    },
                    UsageTotal {
                        entry_type: "video".to_string(),
                        credits_used: 5,
                        record_count: 1,
                    },
                ])
            });

        let usecase = CreditLedgerUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(ledger_repo),
            Arc::new(MockMusicGateway::new()),
        );

        let history = usecase
            .history(
                user_id,
                CreditHistoryQuery {
                    limit: Some(10_000),
                    offset: Some(-3),
                },
            )
            .await
            .unwrap();

        assert_eq!(history.history.len(), 1);
        assert_eq!(history.analytics.total_usage, 415);
        assert_eq!(history.analytics.record_count, 42);
        assert_eq!(history.analytics.daily_usage, 15);
    }

    #[tokio::test]
    async fn provider_credits_reports_extra_credits() {
        let mut music_gateway = MockMusicGateway::new();
        music_gateway.expect_get_credits().returning(|| {
            Ok(ProviderBalance {
                credits: 120,
                extra_credits: 30,
            })
        });

        let usecase = CreditLedgerUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockCreditLedgerRepository::new()),
            Arc::new(music_gateway),
        );

        let credits = usecase.provider_credits().await.unwrap();
        assert_eq!(credits.total_credits, 150);
        assert_eq!(credits.credits_used, 30);
    }
}
