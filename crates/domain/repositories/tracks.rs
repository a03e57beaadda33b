use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::tracks::{InsertTrackEntity, TrackEntity, TrackGenerationChangeset};

#[automock]
#[async_trait]
pub trait TrackRepository {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<TrackEntity>>;

    async fn find_by_id(&self, track_id: &str) -> Result<Option<TrackEntity>>;

    async fn insert(&self, insert_track_entity: InsertTrackEntity) -> Result<TrackEntity>;

    /// Inserts generation placeholders, skipping ids that already exist.
    async fn insert_placeholders(&self, placeholders: Vec<InsertTrackEntity>) -> Result<usize>;

    async fn delete(&self, track_id: &str, user_id: Uuid) -> Result<usize>;

    async fn set_favorite(
        &self,
        track_id: &str,
        user_id: Uuid,
        is_favorite: bool,
    ) -> Result<Option<TrackEntity>>;

    async fn increment_play_count(
        &self,
        track_id: &str,
        user_id: Uuid,
    ) -> Result<Option<TrackEntity>>;

    async fn increment_download_count(&self, track_id: &str, user_id: Uuid) -> Result<usize>;

    async fn apply_generation_result(
        &self,
        track_id: &str,
        changeset: TrackGenerationChangeset,
    ) -> Result<usize>;
}
