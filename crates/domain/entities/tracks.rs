use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::track_statuses::TrackStatus,
    infra::db::postgres::schema::tracks,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = tracks)]
pub struct TrackEntity {
    pub id: String,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub tags: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub duration: Option<f64>,
    pub status: String,
    pub is_custom: bool,
    pub model: Option<String>,
    pub is_favorite: bool,
    pub play_count: i32,
    pub download_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackEntity {
    pub fn status(&self) -> TrackStatus {
        TrackStatus::from_str(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = tracks)]
pub struct InsertTrackEntity {
    pub id: String,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub tags: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub duration: Option<f64>,
    pub status: String,
    pub is_custom: bool,
    pub model: Option<String>,
}

/// Fields the generation provider reports back for a clip.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = tracks)]
pub struct TrackGenerationChangeset {
    pub title: Option<String>,
    pub status: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub duration: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}
