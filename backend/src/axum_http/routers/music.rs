use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use crates::{
    domain::{
        repositories::{
            credit_ledger::CreditLedgerRepository, tracks::TrackRepository, users::UserRepository,
        },
        value_objects::{
            generation::{
                AudioTaskModel, CallbackQuery, ExtendMusicModel, GenerateMusicModel,
                ProviderCallbackModel,
            },
            tracks::DownloadQuery,
        },
    },
    generation::suno_client::SunoClient,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            credit_ledger::CreditLedgerPostgres, tracks::TrackPostgres, users::UserPostgres,
        },
    },
};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{AppError, error_response},
    config::config_model::DotEnvyConfig,
    usecases::{gateways::MusicGateway, music_generation::MusicGenerationUseCase},
};

type MusicState<U, C, T, M> = State<Arc<MusicGenerationUseCase<U, C, T, M>>>;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    suno_client: Arc<SunoClient>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let credit_ledger_repository = CreditLedgerPostgres::new(Arc::clone(&db_pool));
    let track_repository = TrackPostgres::new(Arc::clone(&db_pool));

    let music_usecase = MusicGenerationUseCase::new(
        Arc::new(user_repository),
        Arc::new(credit_ledger_repository),
        Arc::new(track_repository),
        suno_client,
        config.app.music_callback_url(),
        config.suno.callback_token.clone(),
    );

    Router::new()
        .route("/generate", post(generate))
        .route("/status/:id", get(status))
        .route("/extend", post(extend))
        .route("/wav", post(convert_to_wav))
        .route("/video", post(generate_video))
        .route("/callback", post(callback))
        .route("/download/:id", get(download))
        .with_state(Arc::new(music_usecase))
}

pub async fn generate<U, C, T, M>(
    State(music_usecase): MusicState<U, C, T, M>,
    auth: AuthUser,
    WithRejection(Json(generate_music_model), _): WithRejection<Json<GenerateMusicModel>, AppError>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match music_usecase
        .generate(auth.identity(), generate_music_model)
        .await
    {
        Ok(generated) => (StatusCode::CREATED, Json(generated)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn status<U, C, T, M>(
    State(music_usecase): MusicState<U, C, T, M>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(task_id), _): WithRejection<Path<String>, AppError>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match music_usecase.status(user_id, &task_id).await {
        Ok(status) => Json(status).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn extend<U, C, T, M>(
    State(music_usecase): MusicState<U, C, T, M>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Json(extend_music_model), _): WithRejection<Json<ExtendMusicModel>, AppError>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match music_usecase.extend(user_id, extend_music_model).await {
        Ok(task) => Json(task).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn convert_to_wav<U, C, T, M>(
    State(music_usecase): MusicState<U, C, T, M>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Json(audio_task_model), _): WithRejection<Json<AudioTaskModel>, AppError>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match music_usecase.convert_to_wav(user_id, audio_task_model).await {
        Ok(task) => Json(task).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn generate_video<U, C, T, M>(
    State(music_usecase): MusicState<U, C, T, M>,
    auth: AuthUser,
    WithRejection(Json(audio_task_model), _): WithRejection<Json<AudioTaskModel>, AppError>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match music_usecase
        .generate_video(&auth.identity(), audio_task_model)
        .await
    {
        Ok(task) => Json(task).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Called by the provider, not by a signed-in user.
pub async fn callback<U, C, T, M>(
    State(music_usecase): MusicState<U, C, T, M>,
    WithRejection(Query(query), _): WithRejection<Query<CallbackQuery>, AppError>,
    WithRejection(Json(provider_callback_model), _): WithRejection<
        Json<ProviderCallbackModel>,
        AppError,
    >,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match music_usecase
        .callback(query.token.as_deref(), provider_callback_model)
        .await
    {
        Ok(ack) => Json(ack).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn download<U, C, T, M>(
    State(music_usecase): MusicState<U, C, T, M>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(track_id), _): WithRejection<Path<String>, AppError>,
    WithRejection(Query(query), _): WithRejection<Query<DownloadQuery>, AppError>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    match music_usecase
        .download(user_id, &track_id, query.kind.unwrap_or_default())
        .await
    {
        Ok(download) => Json(download).into_response(),
        Err(err) => error_response(&err),
    }
}
