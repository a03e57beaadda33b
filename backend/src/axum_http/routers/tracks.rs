use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::WithRejection;
use crates::{
    domain::{
        repositories::tracks::TrackRepository,
        value_objects::tracks::{FavoriteTrackModel, SaveTrackModel},
    },
    infra::db::{postgres::postgres_connection::PgPoolSquad, repositories::tracks::TrackPostgres},
};
use serde_json::json;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{AppError, error_response},
    usecases::tracks::TrackUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let track_repository = TrackPostgres::new(Arc::clone(&db_pool));
    let track_usecase = TrackUseCase::new(Arc::new(track_repository));

    Router::new()
        .route("/", get(list_tracks).post(save_track))
        .route("/:id", delete(delete_track))
        .route("/:id/favorite", post(set_favorite))
        .route("/:id/play", post(record_play))
        .with_state(Arc::new(track_usecase))
}

pub async fn list_tracks<T>(
    State(track_usecase): State<Arc<TrackUseCase<T>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    T: TrackRepository + Send + Sync + 'static,
{
    match track_usecase.list(user_id).await {
        Ok(tracks) => Json(tracks).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn save_track<T>(
    State(track_usecase): State<Arc<TrackUseCase<T>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Json(save_track_model), _): WithRejection<Json<SaveTrackModel>, AppError>,
) -> impl IntoResponse
where
    T: TrackRepository + Send + Sync + 'static,
{
    match track_usecase.save(user_id, save_track_model).await {
        Ok((track, true)) => (StatusCode::CREATED, Json(track)).into_response(),
        Ok((track, false)) => Json(track).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn delete_track<T>(
    State(track_usecase): State<Arc<TrackUseCase<T>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(track_id), _): WithRejection<Path<String>, AppError>,
) -> impl IntoResponse
where
    T: TrackRepository + Send + Sync + 'static,
{
    match track_usecase.delete(user_id, &track_id).await {
        Ok(()) => Json(json!({ "message": "Track deleted successfully" })).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn set_favorite<T>(
    State(track_usecase): State<Arc<TrackUseCase<T>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(track_id), _): WithRejection<Path<String>, AppError>,
    WithRejection(Json(favorite_track_model), _): WithRejection<Json<FavoriteTrackModel>, AppError>,
) -> impl IntoResponse
where
    T: TrackRepository + Send + Sync + 'static,
{
    match track_usecase
        .set_favorite(user_id, &track_id, favorite_track_model)
        .await
    {
        Ok(track) => Json(track).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn record_play<T>(
    State(track_usecase): State<Arc<TrackUseCase<T>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(track_id), _): WithRejection<Path<String>, AppError>,
) -> impl IntoResponse
where
    T: TrackRepository + Send + Sync + 'static,
{
    match track_usecase.record_play(user_id, &track_id).await {
        Ok(track) => Json(track).into_response(),
        Err(err) => error_response(&err),
    }
}
