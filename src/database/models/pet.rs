use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Pet {
    pub id: Uuid,
    pub tenant_id: String,
    pub owner_id: Uuid,
    pub name: String,
    pub species: Option<String>,
}
