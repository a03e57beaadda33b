use std::sync::Arc;

use anyhow::anyhow;
use axum::http::StatusCode;
use chrono::Utc;
use crates::{
    domain::{
        entities::tracks::{InsertTrackEntity, TrackGenerationChangeset},
        repositories::{
            credit_ledger::CreditLedgerRepository, tracks::TrackRepository, users::UserRepository,
        },
        value_objects::{
            credits::{DebitCreditsModel, DebitOutcome},
            enums::{ledger_entry_types::LedgerEntryType, track_statuses::TrackStatus},
            generation::{
                AudioTaskModel, CallbackAckDto, ExtendMusicModel, GENERATION_COST,
                GenerateMusicDto, GenerateMusicModel, GeneratedTrackDto, GenerationStatusDto,
                MIN_GENERATION_BALANCE, ProviderCallbackModel, ProviderClip, ProviderTaskDto,
            },
            tracks::{DownloadDto, DownloadKind},
            users::SessionIdentity,
        },
    },
    generation::suno_client::SunoError,
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    axum_http::error_responses::ApiError,
    usecases::{gateways::MusicGateway, users::ensure_user},
};

const EXTEND_PATH: &str = "/generate/extend";
const WAV_PATH: &str = "/wav/generate";
const VIDEO_PATH: &str = "/mp4/generate";
const DEFAULT_EXTEND_PROMPT: &str = "Continue the music";
const DEFAULT_EXTEND_MODEL: &str = "V5";
const DEFAULT_VIDEO_DOMAIN: &str = "AI Music Studio";

#[derive(Debug, Error)]
pub enum MusicError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("You need at least 10 credits to generate music")]
    InsufficientCredits,
    #[error(transparent)]
    Provider(#[from] SunoError),
    #[error("Failed to generate music")]
    Generation(#[source] anyhow::Error),
    #[error("Failed to fetch generation status")]
    Status(#[source] anyhow::Error),
    #[error("Track not found")]
    NotFound,
    #[error("Track is not ready for download yet")]
    NotReady,
    #[error("No audio file available for this track")]
    NoAudio,
    #[error("No {0} file available for this track")]
    NoFile(&'static str),
    #[error("Failed to prepare download")]
    Download(#[source] anyhow::Error),
    #[error("Invalid callback token")]
    InvalidCallbackToken,
}

impl ApiError for MusicError {
    fn status_code(&self) -> StatusCode {
        match self {
            MusicError::Validation(_) | MusicError::NotReady => StatusCode::BAD_REQUEST,
            MusicError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            MusicError::Provider(err) => err.status_code(),
            MusicError::NotFound | MusicError::NoAudio | MusicError::NoFile(_) => {
                StatusCode::NOT_FOUND
            }
            MusicError::InvalidCallbackToken => StatusCode::UNAUTHORIZED,
            MusicError::Generation(_) | MusicError::Status(_) | MusicError::Download(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            MusicError::Validation(_) => "VALIDATION_ERROR",
            MusicError::InsufficientCredits => "INSUFFICIENT_CREDITS",
            MusicError::Provider(err) => err.code(),
            MusicError::Generation(_) => "GENERATION_ERROR",
            MusicError::Status(_) => "STATUS_ERROR",
            MusicError::NotFound => "NOT_FOUND",
            MusicError::NotReady => "NOT_READY",
            MusicError::NoAudio => "NO_AUDIO",
            MusicError::NoFile(_) => "NO_FILE",
            MusicError::Download(_) => "DOWNLOAD_ERROR",
            MusicError::InvalidCallbackToken => "Unauthorized",
        }
    }
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;

/// Outcome of a write that must never fail the request it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    Recorded { entry_id: Uuid },
    Failed { reason: String },
}

impl SideEffect {
    pub fn is_recorded(&self) -> bool {
        matches!(self, SideEffect::Recorded { .. })
    }
}

/// Drops `null` members so optional fields are left out of provider bodies.
fn without_nulls(body: Value) -> Value {
    match body {
        Value::Object(map) => Value::Object(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => other,
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn changeset_from_clip(clip: &ProviderClip, status: TrackStatus) -> TrackGenerationChangeset {
    TrackGenerationChangeset {
        title: clip.title.clone(),
        status: Some(status.to_string()),
        audio_url: clip.audio_url.clone(),
        video_url: clip.video_url.clone(),
        image_url: clip.image_url.clone(),
        duration: clip.duration,
        updated_at: Some(Utc::now()),
    }
}

pub struct MusicGenerationUseCase<U, C, T, M>
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    credit_ledger_repo: Arc<C>,
    track_repo: Arc<T>,
    music_gateway: Arc<M>,
    callback_url: String,
    callback_token: Option<String>,
}

impl<U, C, T, M> MusicGenerationUseCase<U, C, T, M>
where
    U: UserRepository + Send + Sync + 'static,
    C: CreditLedgerRepository + Send + Sync + 'static,
    T: TrackRepository + Send + Sync + 'static,
    M: MusicGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        credit_ledger_repo: Arc<C>,
        track_repo: Arc<T>,
        music_gateway: Arc<M>,
        callback_url: String,
        callback_token: Option<String>,
    ) -> Self {
        Self {
            user_repo,
            credit_ledger_repo,
            track_repo,
            music_gateway,
            callback_url,
            callback_token,
        }
    }

    /// Submits a generation, stores the returned clips as processing tracks and
    /// records the usage. The usage write is reported, never raised.
    pub async fn generate(
        &self,
        identity: SessionIdentity,
        generate_music_model: GenerateMusicModel,
    ) -> MusicResult<GenerateMusicDto> {
        let user_id = identity.user_id;

        generate_music_model
            .validate()
            .map_err(MusicError::Validation)?;

        let balance = self.music_gateway.get_credits().await.map_err(|err| {
            error!(%user_id, error = %err, "music: failed to fetch provider balance");
            MusicError::Provider(err)
        })?;

        if balance.credits < MIN_GENERATION_BALANCE {
            warn!(%user_id, credits = balance.credits, "music: provider balance too low");
            return Err(MusicError::InsufficientCredits);
        }

        let clips = self
            .music_gateway
            .generate(generate_music_model.to_provider_request())
            .await
            .map_err(|err| {
                error!(%user_id, error = %err, "music: generation request failed");
                match err {
                    SunoError::Request(message) => MusicError::Generation(anyhow!(message)),
                    err => MusicError::Provider(err),
                }
            })?;

        let fallback_title = present(generate_music_model.title.clone())
            .unwrap_or_else(|| "Untitled".to_string());

        let placeholders: Vec<InsertTrackEntity> = clips
            .iter()
            .map(|clip| InsertTrackEntity {
                id: clip.id.clone(),
                user_id,
                project_id: generate_music_model.project_id,
                title: present(clip.title.clone()).unwrap_or_else(|| fallback_title.clone()),
                description: None,
                prompt: generate_music_model.effective_prompt(),
                tags: generate_music_model.tags.clone(),
                audio_url: clip.audio_url.clone(),
                video_url: clip.video_url.clone(),
                image_url: clip.image_url.clone(),
                duration: clip.duration,
                status: TrackStatus::Processing.to_string(),
                is_custom: generate_music_model.custom_mode,
                model: generate_music_model.mv.clone(),
            })
            .collect();

        let tracks: Vec<GeneratedTrackDto> = placeholders
            .iter()
            .map(|track| GeneratedTrackDto {
                id: track.id.clone(),
                title: track.title.clone(),
                status: track.status.clone(),
                audio_url: track.audio_url.clone(),
                video_url: track.video_url.clone(),
            })
            .collect();

        self.track_repo
            .insert_placeholders(placeholders)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "music: failed to store generated tracks");
                MusicError::Generation(err)
            })?;

        let task_ids: Vec<String> = tracks.iter().map(|track| track.id.clone()).collect();
        let usage = self
            .record_generation_usage(&identity, &generate_music_model, task_ids)
            .await;

        info!(
            %user_id,
            tracks = tracks.len(),
            usage_recorded = usage.is_recorded(),
            "music: generation submitted"
        );

        Ok(GenerateMusicDto {
            success: true,
            tracks,
            credits_used: GENERATION_COST,
            usage_recorded: usage.is_recorded(),
        })
    }

    async fn record_generation_usage(
        &self,
        identity: &SessionIdentity,
        generate_music_model: &GenerateMusicModel,
        task_ids: Vec<String>,
    ) -> SideEffect {
        let user_id = identity.user_id;

        if let Err(err) = ensure_user(self.user_repo.as_ref(), identity).await {
            error!(%user_id, db_error = ?err, "music: failed to load user for usage");
            return SideEffect::Failed {
                reason: err.to_string(),
            };
        }

        let debit = DebitCreditsModel {
            user_id,
            amount: GENERATION_COST,
            entry_type: LedgerEntryType::Generation,
            description: "Music generation".to_string(),
            metadata: json!({
                "mv": generate_music_model.mv,
                "custom_mode": generate_music_model.custom_mode,
                "task_ids": task_ids,
            }),
        };

        match self.credit_ledger_repo.debit(debit).await {
            Ok(DebitOutcome::Debited(entry)) => SideEffect::Recorded { entry_id: entry.id },
            Ok(DebitOutcome::InsufficientCredits { balance }) => {
                warn!(%user_id, balance, "music: local balance too low to record usage");
                SideEffect::Failed {
                    reason: format!("insufficient local balance: {balance}"),
                }
            }
            Err(err) => {
                error!(%user_id, db_error = ?err, "music: failed to record usage");
                SideEffect::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Polls the provider and writes terminal results through to the caller's track.
    pub async fn status(&self, user_id: Uuid, task_id: &str) -> MusicResult<GenerationStatusDto> {
        let clip = match self.music_gateway.task_status(task_id).await {
            Ok(Some(clip)) => clip,
            Ok(None) => return Ok(GenerationStatusDto::processing(task_id)),
            Err(SunoError::Request(message)) => {
                error!(%user_id, task_id, %message, "music: unreadable status response");
                return Err(MusicError::Status(anyhow!(message)));
            }
            Err(err) => {
                error!(%user_id, task_id, error = %err, "music: status fetch failed");
                return Err(MusicError::Provider(err));
            }
        };

        let status = clip
            .status
            .as_deref()
            .map(TrackStatus::from_provider)
            .unwrap_or_default();

        if status.is_terminal() {
            self.write_through(user_id, &clip, status).await;
        }

        Ok(GenerationStatusDto::from(clip))
    }

    async fn write_through(&self, user_id: Uuid, clip: &ProviderClip, status: TrackStatus) {
        let track_id = clip.id.as_str();
        match self.track_repo.find_by_id(track_id).await {
            Ok(Some(track)) if track.user_id == user_id => {
                if let Err(err) = self
                    .track_repo
                    .apply_generation_result(track_id, changeset_from_clip(clip, status))
                    .await
                {
                    error!(%user_id, track_id, db_error = ?err, "music: failed to update track from status");
                }
            }
            Ok(_) => {}
            Err(err) => {
                error!(%user_id, track_id, db_error = ?err, "music: failed to load track for status");
            }
        }
    }

    pub async fn extend(
        &self,
        user_id: Uuid,
        extend_music_model: ExtendMusicModel,
    ) -> MusicResult<ProviderTaskDto> {
        let audio_id = present(extend_music_model.audio_id)
            .ok_or(MusicError::Validation("audioId and continueAt are required"))?;
        let continue_at = extend_music_model
            .continue_at
            .filter(|at| *at > 0.0)
            .ok_or(MusicError::Validation("audioId and continueAt are required"))?;

        let body = without_nulls(json!({
            "defaultParamFlag": true,
            "audioId": audio_id,
            "prompt": present(extend_music_model.prompt)
                .unwrap_or_else(|| DEFAULT_EXTEND_PROMPT.to_string()),
            "style": extend_music_model.style,
            "title": extend_music_model.title,
            "continueAt": continue_at,
            "model": present(extend_music_model.model)
                .unwrap_or_else(|| DEFAULT_EXTEND_MODEL.to_string()),
            "negativeTags": extend_music_model.negative_tags,
            "vocalGender": extend_music_model.vocal_gender,
            "callBackUrl": self.callback_url_or(extend_music_model.call_back_url),
        }));

        self.start_task(user_id, EXTEND_PATH, body, "Music extension started")
            .await
    }

    pub async fn convert_to_wav(
        &self,
        user_id: Uuid,
        audio_task_model: AudioTaskModel,
    ) -> MusicResult<ProviderTaskDto> {
        let (task_id, audio_id) = Self::task_and_audio(&audio_task_model)?;

        let body = json!({
            "taskId": task_id,
            "audioId": audio_id,
            "callBackUrl": self.callback_url_or(audio_task_model.call_back_url),
        });

        self.start_task(user_id, WAV_PATH, body, "WAV conversion started")
            .await
    }

    pub async fn generate_video(
        &self,
        identity: &SessionIdentity,
        audio_task_model: AudioTaskModel,
    ) -> MusicResult<ProviderTaskDto> {
        let (task_id, audio_id) = Self::task_and_audio(&audio_task_model)?;

        let author = present(audio_task_model.author)
            .or_else(|| present(identity.name.clone()))
            .unwrap_or_else(|| "Anonymous".to_string());

        let body = json!({
            "taskId": task_id,
            "audioId": audio_id,
            "author": author,
            "domainName": present(audio_task_model.domain_name)
                .unwrap_or_else(|| DEFAULT_VIDEO_DOMAIN.to_string()),
            "callBackUrl": self.callback_url_or(audio_task_model.call_back_url),
        });

        self.start_task(identity.user_id, VIDEO_PATH, body, "Video generation started")
            .await
    }

    fn task_and_audio(audio_task_model: &AudioTaskModel) -> MusicResult<(String, String)> {
        match (
            present(audio_task_model.task_id.clone()),
            present(audio_task_model.audio_id.clone()),
        ) {
            (Some(task_id), Some(audio_id)) => Ok((task_id, audio_id)),
            _ => Err(MusicError::Validation("taskId and audioId are required")),
        }
    }

    fn callback_url_or(&self, requested: Option<String>) -> String {
        present(requested).unwrap_or_else(|| self.callback_url.clone())
    }

    async fn start_task(
        &self,
        user_id: Uuid,
        path: &'static str,
        body: Value,
        message: &str,
    ) -> MusicResult<ProviderTaskDto> {
        let task_id = self
            .music_gateway
            .submit_task(path, body)
            .await
            .map_err(|err| {
                error!(%user_id, path, error = %err, "music: provider task rejected");
                MusicError::Provider(err)
            })?;

        info!(%user_id, path, %task_id, "music: provider task started");

        Ok(ProviderTaskDto {
            task_id,
            status: "pending".to_string(),
            message: message.to_string(),
        })
    }

    /// Applies a provider completion callback to the matching tracks.
    pub async fn callback(
        &self,
        token: Option<&str>,
        provider_callback_model: ProviderCallbackModel,
    ) -> MusicResult<CallbackAckDto> {
        if let Some(expected) = self.callback_token.as_deref() {
            if token != Some(expected) {
                warn!("music: callback rejected, token mismatch");
                return Err(MusicError::InvalidCallbackToken);
            }
        }

        let Some(data) = provider_callback_model.data else {
            return Ok(CallbackAckDto {
                received: true,
                updated: 0,
            });
        };

        let mut updated = 0;
        for clip in &data.data {
            let changeset = changeset_from_clip(clip, TrackStatus::Completed);
            match self
                .track_repo
                .apply_generation_result(&clip.id, changeset)
                .await
            {
                Ok(count) => updated += count,
                Err(err) => {
                    error!(clip_id = %clip.id, db_error = ?err, "music: failed to apply callback clip");
                }
            }
        }

        info!(
            task_id = data.task_id.as_deref().unwrap_or_default(),
            callback_type = data.callback_type.as_deref().unwrap_or_default(),
            updated,
            "music: provider callback applied"
        );

        Ok(CallbackAckDto {
            received: true,
            updated,
        })
    }

    pub async fn download(
        &self,
        user_id: Uuid,
        track_id: &str,
        kind: DownloadKind,
    ) -> MusicResult<DownloadDto> {
        let track = self
            .track_repo
            .find_by_id(track_id)
            .await
            .map_err(|err| {
                error!(%user_id, track_id, db_error = ?err, "music: failed to load track for download");
                MusicError::Download(err)
            })?
            .filter(|track| track.user_id == user_id)
            .ok_or(MusicError::NotFound)?;

        if track.status() != TrackStatus::Completed {
            return Err(MusicError::NotReady);
        }

        let audio_url = present(track.audio_url.clone()).ok_or(MusicError::NoAudio)?;
        let download_url = match kind {
            DownloadKind::Audio => audio_url,
            DownloadKind::Video => {
                present(track.video_url.clone()).ok_or(MusicError::NoFile(kind.as_str()))?
            }
        };

        self.track_repo
            .increment_download_count(track_id, user_id)
            .await
            .map_err(|err| {
                error!(%user_id, track_id, db_error = ?err, "music: failed to count download");
                MusicError::Download(err)
            })?;

        Ok(DownloadDto {
            download_url,
            title: track.title,
            kind,
        })
    }
}
