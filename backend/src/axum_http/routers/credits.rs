use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::WithRejection;
use crates::{
    domain::{
        repositories::{credit_ledger::CreditLedgerRepository, users::UserRepository},
        value_objects::credits::{CreditHistoryQuery, RecordUsageModel},
    },
    generation::suno_client::SunoClient,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{credit_ledger::CreditLedgerPostgres, users::UserPostgres},
    },
};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{AppError, error_response},
    usecases::{credit_ledger::CreditLedgerUseCase, gateways::MusicGateway},
};

pub fn routes(db_pool: Arc<PgPoolSquad>, suno_client: Arc<SunoClient>) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let credit_ledger_repository = CreditLedgerPostgres::new(Arc::clone(&db_pool));
    let credit_ledger_usecase = CreditLedgerUseCase::new(
        Arc::new(user_repository),
        Arc::new(credit_ledger_repository),
        suno_client,
    );

    Router::new()
        .route("/", get(provider_credits))
        .route("/history", get(credit_history).post(record_usage))
        .with_state(Arc::new(credit_ledger_usecase))
}

pub async fn provider_credits<U, C, M>(
    State(credit_ledger_usecase): State<Arc<CreditLedgerUseCase<U, C, M>>>,
    _auth: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match credit_ledger_usecase.provider_credits().await {
        Ok(credits) => Json(credits).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn credit_history<U, C, M>(
    State(credit_ledger_usecase): State<Arc<CreditLedgerUseCase<U, C, M>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<CreditHistoryQuery>, AppError>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match credit_ledger_usecase.history(user_id, query).await {
        Ok(history) => Json(history).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn record_usage<U, C, M>(
    State(credit_ledger_usecase): State<Arc<CreditLedgerUseCase<U, C, M>>>,
    auth: AuthUser,
    WithRejection(Json(record_usage_model), _): WithRejection<Json<RecordUsageModel>, AppError>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match credit_ledger_usecase
        .record_usage(auth.identity(), record_usage_model)
        .await
    {
        Ok(recorded) => (StatusCode::CREATED, Json(recorded)).into_response(),
        Err(err) => error_response(&err),
    }
}
