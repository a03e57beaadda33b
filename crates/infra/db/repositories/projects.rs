use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::projects},
};
use domain::{
    entities::projects::{InsertProjectEntity, ProjectEntity, UpdateProjectChangeset},
    repositories::projects::ProjectRepository,
    value_objects::projects::{merge_track_ids, remove_track_id},
};

pub struct ProjectPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ProjectPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn lock_owned_project(
    conn: &mut PgConnection,
    project_id: Uuid,
    user_id: Uuid,
) -> QueryResult<Option<ProjectEntity>> {
    projects::table
        .filter(projects::id.eq(project_id))
        .filter(projects::user_id.eq(user_id))
        .select(ProjectEntity::as_select())
        .for_update()
        .first::<ProjectEntity>(conn)
        .optional()
}

fn write_track_ids(
    conn: &mut PgConnection,
    project_id: Uuid,
    track_ids: Vec<String>,
) -> QueryResult<ProjectEntity> {
    update(projects::table.find(project_id))
        .set((
            projects::track_ids.eq(track_ids),
            projects::updated_at.eq(Utc::now()),
        ))
        .returning(ProjectEntity::as_returning())
        .get_result::<ProjectEntity>(conn)
}

#[async_trait]
impl ProjectRepository for ProjectPostgres {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<ProjectEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = projects::table
            .filter(projects::user_id.eq(user_id))
            .order(projects::updated_at.desc())
            .select(ProjectEntity::as_select())
            .load::<ProjectEntity>(&mut conn)?;

        Ok(results)
    }

    async fn find_by_id(&self, project_id: Uuid) -> Result<Option<ProjectEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = projects::table
            .find(project_id)
            .select(ProjectEntity::as_select())
            .first::<ProjectEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn create(&self, insert_project_entity: InsertProjectEntity) -> Result<ProjectEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(projects::table)
            .values(&insert_project_entity)
            .returning(ProjectEntity::as_returning())
            .get_result::<ProjectEntity>(&mut conn)?;

        Ok(result)
    }

    async fn update(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        changeset: UpdateProjectChangeset,
    ) -> Result<Option<ProjectEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(projects::table)
            .filter(projects::id.eq(project_id))
            .filter(projects::user_id.eq(user_id))
            .set(&changeset)
            .returning(ProjectEntity::as_returning())
            .get_result::<ProjectEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn delete(&self, project_id: Uuid, user_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(projects::table)
            .filter(projects::id.eq(project_id))
            .filter(projects::user_id.eq(user_id))
            .execute(&mut conn)?;

        Ok(deleted)
    }

    async fn add_tracks(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        track_ids: Vec<String>,
    ) -> Result<Option<ProjectEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<Option<ProjectEntity>, diesel::result::Error, _>(|tx| {
            let Some(project) = lock_owned_project(tx, project_id, user_id)? else {
                return Ok(None);
            };

            let merged = merge_track_ids(&project.track_ids, &track_ids);
            write_track_ids(tx, project_id, merged).map(Some)
        })?;

        Ok(result)
    }

    async fn remove_track(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        track_id: String,
    ) -> Result<Option<ProjectEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = conn.transaction::<Option<ProjectEntity>, diesel::result::Error, _>(|tx| {
            let Some(project) = lock_owned_project(tx, project_id, user_id)? else {
                return Ok(None);
            };

            let remaining = remove_track_id(&project.track_ids, &track_id);
            write_track_ids(tx, project_id, remaining).map(Some)
        })?;

        Ok(result)
    }
}
