use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::tracks},
};
use domain::{
    entities::tracks::{InsertTrackEntity, TrackEntity, TrackGenerationChangeset},
    repositories::tracks::TrackRepository,
};

pub struct TrackPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TrackPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TrackRepository for TrackPostgres {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<TrackEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = tracks::table
            .filter(tracks::user_id.eq(user_id))
            .order(tracks::created_at.desc())
            .select(TrackEntity::as_select())
            .load::<TrackEntity>(&mut conn)?;

        Ok(results)
    }

    async fn find_by_id(&self, track_id: &str) -> Result<Option<TrackEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = tracks::table
            .find(track_id)
            .select(TrackEntity::as_select())
            .first::<TrackEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn insert(&self, insert_track_entity: InsertTrackEntity) -> Result<TrackEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(tracks::table)
            .values(&insert_track_entity)
            .returning(TrackEntity::as_returning())
            .get_result::<TrackEntity>(&mut conn)?;

        Ok(result)
    }

    async fn insert_placeholders(&self, placeholders: Vec<InsertTrackEntity>) -> Result<usize> {
        if placeholders.is_empty() {
            return Ok(0);
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(tracks::table)
            .values(&placeholders)
            .on_conflict(tracks::id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(inserted)
    }

    async fn delete(&self, track_id: &str, user_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(tracks::table)
            .filter(tracks::id.eq(track_id))
            .filter(tracks::user_id.eq(user_id))
            .execute(&mut conn)?;

        Ok(deleted)
    }

    async fn set_favorite(
        &self,
        track_id: &str,
        user_id: Uuid,
        is_favorite: bool,
    ) -> Result<Option<TrackEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(tracks::table)
            .filter(tracks::id.eq(track_id))
            .filter(tracks::user_id.eq(user_id))
            .set((
                tracks::is_favorite.eq(is_favorite),
                tracks::updated_at.eq(Utc::now()),
            ))
            .returning(TrackEntity::as_returning())
            .get_result::<TrackEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn increment_play_count(
        &self,
        track_id: &str,
        user_id: Uuid,
    ) -> Result<Option<TrackEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = update(tracks::table)
            .filter(tracks::id.eq(track_id))
            .filter(tracks::user_id.eq(user_id))
            .set(tracks::play_count.eq(tracks::play_count + 1))
            .returning(TrackEntity::as_returning())
            .get_result::<TrackEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn increment_download_count(&self, track_id: &str, user_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(tracks::table)
            .filter(tracks::id.eq(track_id))
            .filter(tracks::user_id.eq(user_id))
            .set(tracks::download_count.eq(tracks::download_count + 1))
            .execute(&mut conn)?;

        Ok(updated)
    }

    async fn apply_generation_result(
        &self,
        track_id: &str,
        changeset: TrackGenerationChangeset,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(tracks::table.find(track_id))
            .set(&changeset)
            .execute(&mut conn)?;

        Ok(updated)
    }
}
