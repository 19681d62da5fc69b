use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Roles the scheduling engine distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Doctor => write!(f, "doctor"),
            Role::Patient => write!(f, "patient"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "doctor" | "medico" => Ok(Role::Doctor),
            "patient" | "paciente" => Ok(Role::Patient),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Caller identity as resolved from the bearer token. Trusted verbatim by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub person_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(person_id: Uuid, role: Role) -> Self {
        Self { person_id, role }
    }

    pub fn doctor(person_id: Uuid) -> Self {
        Self::new(person_id, Role::Doctor)
    }

    pub fn patient(person_id: Uuid) -> Self {
        Self::new(person_id, Role::Patient)
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }
}

impl TryFrom<&User> for AuthContext {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let person_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid identifier".to_string()))?;

        let role = user
            .role
            .as_deref()
            .ok_or_else(|| AppError::Auth("Token carries no role claim".to_string()))?
            .parse::<Role>()
            .map_err(AppError::Auth)?;

        Ok(Self { person_id, role })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}
