use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::projects::{
    InsertProjectEntity, ProjectEntity, UpdateProjectChangeset,
};

#[automock]
#[async_trait]
pub trait ProjectRepository {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<ProjectEntity>>;

    async fn find_by_id(&self, project_id: Uuid) -> Result<Option<ProjectEntity>>;

    async fn create(&self, insert_project_entity: InsertProjectEntity) -> Result<ProjectEntity>;

    async fn update(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        changeset: UpdateProjectChangeset,
    ) -> Result<Option<ProjectEntity>>;

    async fn delete(&self, project_id: Uuid, user_id: Uuid) -> Result<usize>;

    /// Set-style insert scoped to the owner. `None` when the project is not theirs.
    async fn add_tracks(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        track_ids: Vec<String>,
    ) -> Result<Option<ProjectEntity>>;

    async fn remove_track(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        track_id: String,
    ) -> Result<Option<ProjectEntity>>;
}
