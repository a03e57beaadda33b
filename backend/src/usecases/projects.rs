use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use crates::domain::{
    entities::projects::{InsertProjectEntity, ProjectEntity, UpdateProjectChangeset},
    repositories::projects::ProjectRepository,
    value_objects::projects::{
        AddProjectTracksModel, CreateProjectModel, ProjectDto, UpdateProjectModel,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Project not found")]
    NotFound,
    #[error("You do not have access to this project")]
    Forbidden,
    #[error("Failed to fetch projects")]
    Fetch(#[source] anyhow::Error),
    #[error("Failed to create project")]
    Create(#[source] anyhow::Error),
    #[error("Failed to update project")]
    Update(#[source] anyhow::Error),
    #[error("Failed to delete project")]
    Delete(#[source] anyhow::Error),
    #[error("Failed to add tracks to project")]
    Add(#[source] anyhow::Error),
    #[error("Failed to remove track from project")]
    Remove(#[source] anyhow::Error),
}

impl ApiError for ProjectError {
    fn status_code(&self) -> StatusCode {
        match self {
            ProjectError::Validation(_) => StatusCode::BAD_REQUEST,
            ProjectError::NotFound => StatusCode::NOT_FOUND,
            ProjectError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ProjectError::Validation(_) => "VALIDATION_ERROR",
            ProjectError::NotFound => "NOT_FOUND",
            ProjectError::Forbidden => "FORBIDDEN",
            ProjectError::Fetch(_) => "FETCH_ERROR",
            ProjectError::Create(_) => "CREATE_ERROR",
            ProjectError::Update(_) => "UPDATE_ERROR",
            ProjectError::Delete(_) => "DELETE_ERROR",
            ProjectError::Add(_) => "ADD_ERROR",
            ProjectError::Remove(_) => "REMOVE_ERROR",
        }
    }
}

pub type ProjectResult<T> = std::result::Result<T, ProjectError>;

fn required_name(name: Option<String>) -> ProjectResult<String> {
    name.map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(ProjectError::Validation("Project name is required"))
}

pub struct ProjectUseCase<P>
where
    P: ProjectRepository + Send + Sync + 'static,
{
    project_repo: Arc<P>,
}

impl<P> ProjectUseCase<P>
where
    P: ProjectRepository + Send + Sync + 'static,
{
    pub fn new(project_repo: Arc<P>) -> Self {
        Self { project_repo }
    }

    /// Loads a project and checks it belongs to the caller. `wrap` picks the
    /// error code reported when the lookup itself fails.
    async fn owned_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        wrap: fn(anyhow::Error) -> ProjectError,
    ) -> ProjectResult<ProjectEntity> {
        let project = self
            .project_repo
            .find_by_id(project_id)
            .await
            .map_err(|err| {
                error!(%user_id, %project_id, db_error = ?err, "projects: failed to load project");
                wrap(err)
            })?
            .ok_or(ProjectError::NotFound)?;

        if project.user_id != user_id {
            warn!(%user_id, %project_id, "projects: access to a foreign project");
            return Err(ProjectError::Forbidden);
        }

        Ok(project)
    }

    pub async fn list(&self, user_id: Uuid) -> ProjectResult<Vec<ProjectDto>> {
        let projects = self
            .project_repo
            .list_by_user(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "projects: failed to list projects");
                ProjectError::Fetch(err)
            })?;

        Ok(projects.into_iter().map(ProjectDto::from).collect())
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        create_project_model: CreateProjectModel,
    ) -> ProjectResult<ProjectDto> {
        let name = required_name(create_project_model.name)?;

        let project = self
            .project_repo
            .create(InsertProjectEntity {
                user_id,
                name,
                description: create_project_model.description,
                track_ids: Vec::new(),
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "projects: failed to create project");
                ProjectError::Create(err)
            })?;

        info!(%user_id, project_id = %project.id, "projects: project created");
        Ok(ProjectDto::from(project))
    }

    pub async fn get(&self, user_id: Uuid, project_id: Uuid) -> ProjectResult<ProjectDto> {
        let project = self
            .owned_project(user_id, project_id, ProjectError::Fetch)
            .await?;
        Ok(ProjectDto::from(project))
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        update_project_model: UpdateProjectModel,
    ) -> ProjectResult<ProjectDto> {
        let name = match update_project_model.name {
            Some(name) => Some(required_name(Some(name))?),
            None => None,
        };

        self.owned_project(user_id, project_id, ProjectError::Update)
            .await?;

        let changeset = UpdateProjectChangeset {
            name,
            description: update_project_model.description,
            updated_at: Some(Utc::now()),
        };

        let project = self
            .project_repo
            .update(project_id, user_id, changeset)
            .await
            .map_err(|err| {
                error!(%user_id, %project_id, db_error = ?err, "projects: failed to update project");
                ProjectError::Update(err)
            })?
            .ok_or(ProjectError::NotFound)?;

        Ok(ProjectDto::from(project))
    }

    pub async fn delete(&self, user_id: Uuid, project_id: Uuid) -> ProjectResult<()> {
        self.owned_project(user_id, project_id, ProjectError::Delete)
            .await?;

        self.project_repo
            .delete(project_id, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, %project_id, db_error = ?err, "projects: failed to delete project");
                ProjectError::Delete(err)
            })?;

        info!(%user_id, %project_id, "projects: project deleted");
        Ok(())
    }

    pub async fn add_tracks(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        add_project_tracks_model: AddProjectTracksModel,
    ) -> ProjectResult<ProjectDto> {
        if add_project_tracks_model.track_ids.is_empty() {
            return Err(ProjectError::Validation("Track IDs are required"));
        }

        let project = self
            .project_repo
            .add_tracks(project_id, user_id, add_project_tracks_model.track_ids)
            .await
            .map_err(|err| {
                error!(%user_id, %project_id, db_error = ?err, "projects: failed to add tracks");
                ProjectError::Add(err)
            })?
            .ok_or(ProjectError::NotFound)?;

        Ok(ProjectDto::from(project))
    }

    pub async fn remove_track(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        track_id: String,
    ) -> ProjectResult<ProjectDto> {
        let project = self
            .project_repo
            .remove_track(project_id, user_id, track_id)
            .await
            .map_err(|err| {
                error!(%user_id, %project_id, db_error = ?err, "projects: failed to remove track");
                ProjectError::Remove(err)
            })?
            .ok_or(ProjectError::NotFound)?;

        Ok(ProjectDto::from(project))
    }
}
