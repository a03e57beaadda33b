use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credits charged for one song generation.
pub const GENERATION_COST: i32 = 10;
/// Minimum live provider balance required to submit a generation.
pub const MIN_GENERATION_BALANCE: i64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerateMusicModel {
    #[serde(default)]
    pub custom_mode: bool,
    pub gpt_description_prompt: Option<String>,
    pub prompt: Option<String>,
    pub tags: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub make_instrumental: bool,
    pub mv: Option<String>,
    #[serde(alias = "projectId")]
    pub project_id: Option<Uuid>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl GenerateMusicModel {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !present(&self.mv) {
            return Err("Model version (mv) is required");
        }
        if self.custom_mode {
            if !present(&self.prompt) || !present(&self.tags) {
                return Err("Custom mode requires prompt and tags");
            }
        } else if !present(&self.gpt_description_prompt) {
            return Err("Non-custom mode requires gpt_description_prompt");
        }
        Ok(())
    }

    /// Body sent to the provider. Custom mode carries lyrics, tags and title;
    /// description mode only the description prompt.
    pub fn to_provider_request(&self) -> ProviderGenerationRequest {
        let custom = self.custom_mode;
        ProviderGenerationRequest {
            custom_mode: custom,
            mv: self.mv.clone().unwrap_or_default(),
            gpt_description_prompt: if custom {
                None
            } else {
                self.gpt_description_prompt.clone()
            },
            prompt: if custom { self.prompt.clone() } else { None },
            tags: if custom { self.tags.clone() } else { None },
            title: if custom { self.title.clone() } else { None },
            make_instrumental: self.make_instrumental,
        }
    }

    /// Prompt stored on the placeholder track.
    pub fn effective_prompt(&self) -> Option<String> {
        if self.custom_mode {
            self.prompt.clone()
        } else {
            self.gpt_description_prompt.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderGenerationRequest {
    pub custom_mode: bool,
    pub mv: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpt_description_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub make_instrumental: bool,
}

/// One clip as reported by the provider, either at submission or on status polls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderClip {
    #[serde(alias = "clip_id")]
    pub id: String,
    #[serde(default, alias = "state")]
    pub status: Option<String>,
    pub title: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub duration: Option<f64>,
    pub tags: Option<String>,
    pub lyrics: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtendMusicModel {
    pub audio_id: Option<String>,
    pub continue_at: Option<f64>,
    pub prompt: Option<String>,
    pub style: Option<String>,
    pub title: Option<String>,
    pub model: Option<String>,
    pub negative_tags: Option<String>,
    pub vocal_gender: Option<String>,
    pub call_back_url: Option<String>,
}

/// Body shared by the WAV conversion and music video endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioTaskModel {
    pub task_id: Option<String>,
    pub audio_id: Option<String>,
    pub author: Option<String>,
    pub domain_name: Option<String>,
    pub call_back_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTaskDto {
    pub task_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTrackDto {
    pub id: String,
    pub title: String,
    pub status: String,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMusicDto {
    pub success: bool,
    pub tracks: Vec<GeneratedTrackDto>,
    pub credits_used: i32,
    pub usage_recorded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatusDto {
    pub id: String,
    pub status: String,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub error: Option<String>,
}

impl GenerationStatusDto {
    pub fn processing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: "processing".to_string(),
            audio_url: None,
            video_url: None,
            title: None,
            duration: None,
            error: None,
        }
    }
}

impl From<ProviderClip> for GenerationStatusDto {
    fn from(value: ProviderClip) -> Self {
        Self {
            id: value.id,
            status: value.status.unwrap_or_else(|| "processing".to_string()),
            audio_url: value.audio_url,
            video_url: value.video_url,
            title: value.title,
            duration: value.duration,
            error: value.error,
        }
    }
}

/// Completion callback posted by the provider for extend, WAV and video tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderCallbackModel {
    pub code: Option<i64>,
    pub msg: Option<String>,
    pub data: Option<ProviderCallbackData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderCallbackData {
    #[serde(alias = "callbackType")]
    pub callback_type: Option<String>,
    #[serde(alias = "taskId")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub data: Vec<ProviderClip>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackAckDto {
    pub received: bool,
    pub updated: usize,
}
