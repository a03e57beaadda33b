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
        repositories::projects::ProjectRepository,
        value_objects::projects::{AddProjectTracksModel, CreateProjectModel, UpdateProjectModel},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::projects::ProjectPostgres,
    },
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::{AppError, error_response},
    usecases::projects::ProjectUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let project_repository = ProjectPostgres::new(Arc::clone(&db_pool));
    let project_usecase = ProjectUseCase::new(Arc::new(project_repository));

    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/:id/tracks", post(add_tracks))
        .route("/:id/tracks/:track_id", delete(remove_track))
        .with_state(Arc::new(project_usecase))
}

pub async fn list_projects<P>(
    State(project_usecase): State<Arc<ProjectUseCase<P>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    P: ProjectRepository + Send + Sync + 'static,
{
    match project_usecase.list(user_id).await {
        Ok(projects) => Json(projects).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn create_project<P>(
    State(project_usecase): State<Arc<ProjectUseCase<P>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Json(create_project_model), _): WithRejection<Json<CreateProjectModel>, AppError>,
) -> impl IntoResponse
where
    P: ProjectRepository + Send + Sync + 'static,
{
    match project_usecase.create(user_id, create_project_model).await {
        Ok(project) => (StatusCode::CREATED, Json(project)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn get_project<P>(
    State(project_usecase): State<Arc<ProjectUseCase<P>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(project_id), _): WithRejection<Path<Uuid>, AppError>,
) -> impl IntoResponse
where
    P: ProjectRepository + Send + Sync + 'static,
{
    match project_usecase.get(user_id, project_id).await {
        Ok(project) => Json(project).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn update_project<P>(
    State(project_usecase): State<Arc<ProjectUseCase<P>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(project_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(update_project_model), _): WithRejection<Json<UpdateProjectModel>, AppError>,
) -> impl IntoResponse
where
    P: ProjectRepository + Send + Sync + 'static,
{
    match project_usecase
        .update(user_id, project_id, update_project_model)
        .await
    {
        Ok(project) => Json(project).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn delete_project<P>(
    State(project_usecase): State<Arc<ProjectUseCase<P>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(project_id), _): WithRejection<Path<Uuid>, AppError>,
) -> impl IntoResponse
where
    P: ProjectRepository + Send + Sync + 'static,
{
    match project_usecase.delete(user_id, project_id).await {
        Ok(()) => Json(json!({ "message": "Project deleted successfully" })).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn add_tracks<P>(
    State(project_usecase): State<Arc<ProjectUseCase<P>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path(project_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(add_project_tracks_model), _): WithRejection<
        Json<AddProjectTracksModel>,
        AppError,
    >,
) -> impl IntoResponse
where
    P: ProjectRepository + Send + Sync + 'static,
{
    match project_usecase
        .add_tracks(user_id, project_id, add_project_tracks_model)
        .await
    {
        Ok(project) => Json(project).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn remove_track<P>(
    State(project_usecase): State<Arc<ProjectUseCase<P>>>,
    AuthUser { user_id, .. }: AuthUser,
    WithRejection(Path((project_id, track_id)), _): WithRejection<Path<(Uuid, String)>, AppError>,
) -> impl IntoResponse
where
    P: ProjectRepository + Send + Sync + 'static,
{
    match project_usecase
        .remove_track(user_id, project_id, track_id)
        .await
    {
        Ok(project) => Json(project).into_response(),
        Err(err) => error_response(&err),
    }
}
