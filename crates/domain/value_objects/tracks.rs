use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::tracks::TrackEntity;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveTrackModel {
    pub id: Option<String>,
    pub title: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub tags: Option<String>,
    pub prompt: Option<String>,
    pub duration: Option<f64>,
    pub status: Option<String>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteTrackModel {
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackDto {
    pub id: String,
    pub title: String,
    pub project_id: Option<Uuid>,
    pub prompt: Option<String>,
    pub tags: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub duration: Option<f64>,
    pub status: String,
    pub is_favorite: bool,
    pub play_count: i32,
    pub download_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TrackEntity> for TrackDto {
    fn from(value: TrackEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            project_id: value.project_id,
            prompt: value.prompt,
            tags: value.tags,
            audio_url: value.audio_url,
            video_url: value.video_url,
            image_url: value.image_url,
            duration: value.duration,
            status: value.status,
            is_favorite: value.is_favorite,
            play_count: value.play_count,
            download_count: value.download_count,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    #[default]
    Audio,
    Video,
}

impl DownloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadKind::Audio => "audio",
            DownloadKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDto {
    pub download_url: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DownloadKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DownloadQuery {
    #[serde(rename = "type")]
    pub kind: Option<DownloadKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveTrackDto {
    #[serde(flatten)]
    pub track: TrackDto,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}
