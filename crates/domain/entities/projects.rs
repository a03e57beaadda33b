use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::projects;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = projects)]
pub struct ProjectEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub track_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = projects)]
pub struct InsertProjectEntity {
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub track_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = projects)]
pub struct UpdateProjectChangeset {
    pub name: Option<String>,
    pub description: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
