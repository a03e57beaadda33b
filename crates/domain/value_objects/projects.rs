use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::projects::ProjectEntity;

/// Appends ids not already present, keeping first-seen order.
pub fn merge_track_ids(existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for id in incoming {
        if !merged.contains(id) {
            merged.push(id.clone());
        }
    }
    merged
}

pub fn remove_track_id(existing: &[String], track_id: &str) -> Vec<String> {
    existing
        .iter()
        .filter(|id| id.as_str() != track_id)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateProjectModel {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateProjectModel {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddProjectTracksModel {
    #[serde(default)]
    pub track_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub track_ids: Vec<String>,
    pub track_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProjectEntity> for ProjectDto {
    fn from(value: ProjectEntity) -> Self {
        Self {
            id: value.id,
            track_count: value.track_ids.len(),
            name: value.name,
            description: value.description,
            track_ids: value.track_ids,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn merge_behaves_like_add_to_set() {
        let merged = merge_track_ids(&ids(&["a", "b"]), &ids(&["b", "c", "a", "c"]));
        assert_eq!(merged, ids(&["a", "b", "c"]));
    }

    #[test]
    fn remove_drops_only_the_given_id() {
        let remaining = remove_track_id(&ids(&["a", "b", "c"]), "b");
        assert_eq!(remaining, ids(&["a", "c"]));
        assert_eq!(remove_track_id(&remaining, "zzz"), remaining);
    }
}
