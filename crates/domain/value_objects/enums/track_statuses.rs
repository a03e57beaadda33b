use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            TrackStatus::Processing => "processing",
            TrackStatus::Completed => "completed",
            TrackStatus::Failed => "failed",
        };
        write!(f, "{}", status)
    }
}

impl TrackStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "completed" => TrackStatus::Completed,
            "failed" => TrackStatus::Failed,
            _ => TrackStatus::Processing,
        }
    }

    /// Maps the generation provider's clip states onto track states.
    pub fn from_provider(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "succeeded" | "success" | "completed" | "complete" => TrackStatus::Completed,
            "failed" | "error" | "create_task_failed" | "generate_audio_failed" => {
                TrackStatus::Failed
            }
            _ => TrackStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TrackStatus::Processing)
    }
}
