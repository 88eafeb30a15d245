use serde::{Deserialize, Serialize};

use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NewCategory {
    /// URL-friendly unique name
    pub name: String,
    /// Display title
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub description: Option<String>,
}
