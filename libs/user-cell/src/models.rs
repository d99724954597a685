use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::policy::UserRole;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// 9-digit national identification number.
    pub cpr: String,
    /// Employees only.
    pub department: Option<String>,
    /// Doctors only.
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    // The hash is never serialized back out of the API.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub cpr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub cpr: String,
    pub department: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub department: Option<String>,
    pub specialty: Option<String>,
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn password_hash_is_never_serialized() {
        let account = UserAccount {
            id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: UserRole::Patient,
            profile: UserProfile {
                full_name: "Jane Doe".to_string(),
                cpr: "123456789".to_string(),
                ..Default::default()
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&account).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["role"], "patient");
    }

    #[test]
    fn row_without_password_hash_still_deserializes() {
        let row = json!({
            "id": "5b41ce3a-9f16-4a3e-bd28-3d36a4f5d02a",
            "username": "jdoe",
            "email": "jdoe@example.com",
            "role": "doctor",
            "profile": {
                "full_name": "Jane Doe",
                "phone": null,
                "address": null,
                "cpr": "123456789",
                "department": null,
                "specialty": "Cardiology"
            },
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        });

        let account: UserAccount = serde_json::from_value(row).unwrap();
        assert!(account.password_hash.is_empty());
        assert_eq!(account.profile.specialty.as_deref(), Some("Cardiology"));
    }
}
