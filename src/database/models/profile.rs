use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Pet-owning client
    Owner,
    Vet,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Vet => "vet",
            Role::Admin => "admin",
        }
    }

    /// Clinic personnel, as opposed to a client
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Vet | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "vet" => Ok(Role::Vet),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Acting user as resolved from the auth token and the `profiles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub tenant_id: String,
    pub role: Role,
    pub full_name: Option<String>,
}

impl Profile {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}
