use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    entities::tracks::InsertTrackEntity,
    repositories::tracks::TrackRepository,
    value_objects::{
        enums::track_statuses::TrackStatus,
        tracks::{FavoriteTrackModel, SaveTrackDto, SaveTrackModel, TrackDto},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Track not found")]
    NotFound,
    #[error("You do not have access to this track")]
    Forbidden,
    #[error("Failed to fetch tracks")]
    Fetch(#[source] anyhow::Error),
    #[error("Failed to save track")]
    Save(#[source] anyhow::Error),
    #[error("Failed to update track")]
    Update(#[source] anyhow::Error),
    #[error("Failed to delete track")]
    Delete(#[source] anyhow::Error),
}

impl ApiError for TrackError {
    fn status_code(&self) -> StatusCode {
        match self {
            TrackError::Validation(_) => StatusCode::BAD_REQUEST,
            TrackError::NotFound => StatusCode::NOT_FOUND,
            TrackError::Forbidden => StatusCode::FORBIDDEN,
            TrackError::Fetch(_)
            | TrackError::Save(_)
            | TrackError::Update(_)
            | TrackError::Delete(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            TrackError::Validation(_) => "VALIDATION_ERROR",
            TrackError::NotFound => "NOT_FOUND",
            TrackError::Forbidden => "FORBIDDEN",
            TrackError::Fetch(_) => "FETCH_ERROR",
            TrackError::Save(_) => "SAVE_ERROR",
            TrackError::Update(_) => "UPDATE_ERROR",
            TrackError::Delete(_) => "DELETE_ERROR",
        }
    }
}

pub type TrackResult<T> = std::result::Result<T, TrackError>;

pub struct TrackUseCase<T>
where
    T: TrackRepository + Send + Sync + 'static,
{
    track_repo: Arc<T>,
}

impl<T> TrackUseCase<T>
where
    T: TrackRepository + Send + Sync + 'static,
{
    pub fn new(track_repo: Arc<T>) -> Self {
        Self { track_repo }
    }

    pub async fn list(&self, user_id: Uuid) -> TrackResult<Vec<TrackDto>> {
        let tracks = self.track_repo.list_by_user(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "tracks: failed to list tracks");
            TrackError::Fetch(err)
        })?;

        Ok(tracks.into_iter().map(TrackDto::from).collect())
    }

    /// Saves a finished track. Returns the stored track and whether it was newly
    /// created; re-saving an id the caller already owns is a no-op.
    pub async fn save(
        &self,
        user_id: Uuid,
        save_track_model: SaveTrackModel,
    ) -> TrackResult<(SaveTrackDto, bool)> {
        let audio_url = save_track_model
            .audio_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(TrackError::Validation("Audio URL is required"))?;

        let track_id = save_track_model
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let existing = self
            .track_repo
            .find_by_id(&track_id)
            .await
            .map_err(|err| {
                error!(%user_id, %track_id, db_error = ?err, "tracks: failed to look up track");
                TrackError::Save(err)
            })?;

        if let Some(track) = existing {
            if track.user_id != user_id {
                warn!(%user_id, %track_id, "tracks: save attempted on a foreign track id");
                return Err(TrackError::Forbidden);
            }
            return Ok((
                SaveTrackDto {
                    track: TrackDto::from(track),
                    duplicate: true,
                },
                false,
            ));
        }

        let status = save_track_model
            .status
            .as_deref()
            .map(TrackStatus::from_str)
            .unwrap_or(TrackStatus::Completed);

        let insert_track_entity = InsertTrackEntity {
            id: track_id.clone(),
            user_id,
            project_id: save_track_model.project_id,
            title: save_track_model
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            description: None,
            prompt: save_track_model.prompt,
            tags: save_track_model.tags,
            audio_url: Some(audio_url),
            video_url: save_track_model.video_url,
            image_url: save_track_model.image_url,
            duration: save_track_model.duration,
            status: status.to_string(),
            is_custom: false,
            model: None,
        };

        let track = self
            .track_repo
            .insert(insert_track_entity)
            .await
            .map_err(|err| {
                error!(%user_id, %track_id, db_error = ?err, "tracks: failed to save track");
                TrackError::Save(err)
            })?;

        info!(%user_id, %track_id, "tracks: track saved");

        Ok((
            SaveTrackDto {
                track: TrackDto::from(track),
                duplicate: false,
            },
            true,
        ))
    }

    pub async fn delete(&self, user_id: Uuid, track_id: &str) -> TrackResult<()> {
        let track = self
            .track_repo
            .find_by_id(track_id)
            .await
            .map_err(|err| {
                error!(%user_id, track_id, db_error = ?err, "tracks: failed to look up track");
                TrackError::Delete(err)
            })?
            .ok_or(TrackError::NotFound)?;

        if track.user_id != user_id {
            return Err(TrackError::Forbidden);
        }

        self.track_repo
            .delete(track_id, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, track_id, db_error = ?err, "tracks: failed to delete track");
                TrackError::Delete(err)
            })?;

        info!(%user_id, track_id, "tracks: track deleted");
        Ok(())
    }

    pub async fn set_favorite(
        &self,
        user_id: Uuid,
        track_id: &str,
        favorite_track_model: FavoriteTrackModel,
    ) -> TrackResult<TrackDto> {
        let track = self
            .track_repo
            .set_favorite(track_id, user_id, favorite_track_model.is_favorite)
            .await
            .map_err(|err| {
                error!(%user_id, track_id, db_error = ?err, "tracks: failed to update favorite");
                TrackError::Update(err)
            })?
            .ok_or(TrackError::NotFound)?;

        Ok(TrackDto::from(track))
    }

    pub async fn record_play(&self, user_id: Uuid, track_id: &str) -> TrackResult<TrackDto> {
        let track = self
            .track_repo
            .increment_play_count(track_id, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, track_id, db_error = ?err, "tracks: failed to update play count");
                TrackError::Update(err)
            })?
            .ok_or(TrackError::NotFound)?;

        Ok(TrackDto::from(track))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::repositories::tracks::MockTrackRepository;

    fn save_model(id: Option<&str>) -> SaveTrackModel {
        SaveTrackModel {
            id: id.map(str::to_string),
            title: Some("Night Drive".to_string()),
            audio_url: Some("https://cdn.example.com/night-drive.mp3".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn save_requires_an_audio_url() {
        let usecase = TrackUseCase::new(Arc::new(MockTrackRepository::new()));

        let err = usecase
            .save(
                Uuid::new_v4(),
                SaveTrackModel {
                    audio_url: Some("  ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn saving_an_owned_id_again_is_a_duplicate() {
        let user_id = Uuid::new_v4();

        let mut track_repo = MockTrackRepository::new();
        track_repo
            .expect_find_by_id()
            .withf(|id| id.to_string() == "clip-1")
            .returning(move |id| Ok(Some(fixtures::track(id, user_id, TrackStatus::Completed))));
        track_repo.expect_insert().never();

        let usecase = TrackUseCase::new(Arc::new(track_repo));

        let (saved, created) = usecase.save(user_id, save_model(Some("clip-1"))).await.unwrap();

        assert!(!created);
        assert!(saved.duplicate);
        assert_eq!(saved.track.id, "clip-1");
    }

    #[tokio::test]
    async fn saving_a_foreign_id_is_forbidden() {
        let mut track_repo = MockTrackRepository::new();
        track_repo.expect_find_by_id().returning(|id| {
            Ok(Some(fixtures::track(
                id,
                Uuid::new_v4(),
                TrackStatus::Completed,
            )))
        });
        track_repo.expect_insert().never();

        let usecase = TrackUseCase::new(Arc::new(track_repo));

        let err = usecase
            .save(Uuid::new_v4(), save_model(Some("clip-1")))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn new_tracks_get_an_id_and_default_to_completed() {
        let user_id = Uuid::new_v4();

        let mut track_repo = MockTrackRepository::new();
        track_repo.expect_find_by_id().returning(|_| Ok(None));
        track_repo
            .expect_insert()
            .withf(move |entity| {
                entity.user_id == user_id
                    && Uuid::parse_str(&entity.id).is_ok()
                    && entity.status == "completed"
            })
            .times(1)
            .returning(move |entity| {
                let mut track = fixtures::track(&entity.id, user_id, TrackStatus::Completed);
                track.audio_url = entity.audio_url;
                Ok(track)
            });

        let usecase = TrackUseCase::new(Arc::new(track_repo));

        let (saved, created) = usecase.save(user_id, save_model(None)).await.unwrap();

        assert!(created);
        assert!(!saved.duplicate);
        assert_eq!(
            saved.track.audio_url.as_deref(),
            Some("https://cdn.example.com/night-drive.mp3")
        );
    }

    #[tokio::test]
    async fn deleting_a_foreign_track_is_forbidden() {
        let mut track_repo = MockTrackRepository::new();
        track_repo.expect_find_by_id().returning(|id| {
            Ok(Some(fixtures::track(
                id,
                Uuid::new_v4(),
                TrackStatus::Completed,
            )))
        });
        track_repo.expect_delete().never();

        let usecase = TrackUseCase::new(Arc::new(track_repo));

        let err = usecase.delete(Uuid::new_v4(), "clip-1").await.unwrap_err();
        assert!(matches!(err, TrackError::Forbidden));
    }

    #[tokio::test]
    async fn play_on_a_foreign_track_is_not_found() {
        let mut track_repo = MockTrackRepository::new();
        track_repo
            .expect_increment_play_count()
            .returning(|_, _| Ok(None));

        let usecase = TrackUseCase::new(Arc::new(track_repo));

        let err = usecase.record_play(Uuid::new_v4(), "clip-1").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
