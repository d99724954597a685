use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_models::policy::UserRole;

use crate::models::{
    CreateUserRequest, RegisterRequest, UpdateUserRequest, UserAccount, UserError, UserProfile,
};
use crate::services::password::hash_password;

const DUPLICATE_ACCOUNT_MESSAGE: &str = "Username or email already in use";

pub fn validate_cpr(cpr: &str) -> Result<(), UserError> {
    let cpr_regex = Regex::new(r"^\d{9}$").expect("valid CPR pattern");
    if !cpr_regex.is_match(cpr) {
        return Err(UserError::ValidationError(
            "CPR must be exactly 9 digits".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), UserError> {
    let email_regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email pattern");
    if !email_regex.is_match(email) || email.len() > 254 {
        return Err(UserError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), UserError> {
    if username.trim().len() < 3 {
        return Err(UserError::ValidationError(
            "Username must be at least 3 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), UserError> {
    if password.len() < 8 {
        return Err(UserError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

/// Profile fields follow the role: department is an employee attribute,
/// specialty a doctor attribute. Anything else is dropped silently.
fn shape_profile(role: UserRole, mut profile: UserProfile) -> UserProfile {
    if role != UserRole::Employee {
        profile.department = None;
    }
    if role != UserRole::Doctor {
        profile.specialty = None;
    }
    profile
}

pub struct UserService {
    supabase: SupabaseClient,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Public self-registration. Always creates a patient; staff accounts
    /// come from the admin path.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserAccount, UserError> {
        debug!("Registering new patient account: {}", request.username);

        validate_username(&request.username)?;
        validate_password(&request.password)?;
        validate_email(&request.email)?;
        validate_cpr(&request.cpr)?;
        if request.password != request.confirm_password {
            return Err(UserError::ValidationError(
                "Passwords do not match".to_string(),
            ));
        }

        let profile = UserProfile {
            full_name: request.full_name,
            phone: request.phone,
            address: request.address,
            cpr: request.cpr,
            department: None,
            specialty: None,
        };

        self.insert_user(
            &request.username,
            &request.email,
            &request.password,
            UserRole::Patient,
            profile,
            None,
        )
        .await
    }

    /// Admin path: any role, role-shaped profile.
    pub async fn create_user(
        &self,
        request: CreateUserRequest,
        auth_token: &str,
    ) -> Result<UserAccount, UserError> {
        debug!(
            "Creating {} account: {}",
            request.role, request.username
        );

        validate_username(&request.username)?;
        validate_password(&request.password)?;
        validate_email(&request.email)?;
        validate_cpr(&request.cpr)?;

        let profile = shape_profile(
            request.role,
            UserProfile {
                full_name: request.full_name,
                phone: request.phone,
                address: request.address,
                cpr: request.cpr,
                department: request.department,
                specialty: request.specialty,
            },
        );

        self.insert_user(
            &request.username,
            &request.email,
            &request.password,
            request.role,
            profile,
            Some(auth_token),
        )
        .await
    }

    async fn insert_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: UserRole,
        profile: UserProfile,
        auth_token: Option<&str>,
    ) -> Result<UserAccount, UserError> {
        self.check_duplicate_account(username, email, None, auth_token)
            .await?;

        let password_hash =
            hash_password(password).map_err(|e| UserError::Database(e.to_string()))?;

        let user_data = json!({
            "username": username,
            "email": email,
            "password_hash": password_hash,
            "role": role,
            "profile": profile,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/users",
                auth_token,
                Some(user_data),
                &[("Prefer", "return=representation")],
            )
            .await
            .map_err(map_db_error)?;

        let account = parse_single(result)?;
        info!("User account created with ID: {}", account.id);
        Ok(account)
    }

    pub async fn get_user(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<UserAccount, UserError> {
        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        self.fetch_one(&path, auth_token).await
    }

    /// Booking-side lookup: the referenced patient must exist with the
    /// patient role.
    pub async fn find_patient(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<UserAccount, UserError> {
        let path = format!("/rest/v1/users?id=eq.{}&role=eq.patient", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn find_doctor(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<UserAccount, UserError> {
        let path = format!("/rest/v1/users?id=eq.{}&role=eq.doctor", user_id);
        self.fetch_one(&path, auth_token).await
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        request: UpdateUserRequest,
        auth_token: &str,
    ) -> Result<UserAccount, UserError> {
        debug!("Updating user: {}", user_id);

        let current = self.get_user(user_id, auth_token).await?;

        if let Some(ref username) = request.username {
            validate_username(username)?;
        }
        if let Some(ref email) = request.email {
            validate_email(email)?;
        }
        if let Some(ref password) = request.password {
            validate_password(password)?;
        }

        let username_changed = request
            .username
            .as_ref()
            .is_some_and(|u| *u != current.username);
        let email_changed = request.email.as_ref().is_some_and(|e| *e != current.email);
        if username_changed || email_changed {
            self.check_duplicate_account(
                request.username.as_deref().unwrap_or(&current.username),
                request.email.as_deref().unwrap_or(&current.email),
                Some(user_id),
                Some(auth_token),
            )
            .await?;
        }

        let role = request.role.unwrap_or(current.role);
        let profile = shape_profile(
            role,
            UserProfile {
                full_name: request.full_name.unwrap_or(current.profile.full_name),
                phone: request.phone.or(current.profile.phone),
                address: request.address.or(current.profile.address),
                cpr: current.profile.cpr,
                department: request.department.or(current.profile.department),
                specialty: request.specialty.or(current.profile.specialty),
            },
        );

        let mut update_data = serde_json::Map::new();
        if let Some(username) = request.username {
            update_data.insert("username".to_string(), json!(username));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(password) = request.password {
            let password_hash =
                hash_password(&password).map_err(|e| UserError::Database(e.to_string()))?;
            update_data.insert("password_hash".to_string(), json!(password_hash));
        }
        if let Some(role) = request.role {
            update_data.insert("role".to_string(), json!(role));
        }
        update_data.insert("profile".to_string(), json!(profile));
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                &[("Prefer", "return=representation")],
            )
            .await
            .map_err(map_db_error)?;

        parse_single(result)
    }

    pub async fn delete_user(&self, user_id: &str, auth_token: &str) -> Result<(), UserError> {
        debug!("Deleting user: {}", user_id);

        self.get_user(user_id, auth_token).await?;

        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        info!("User deleted: {}", user_id);
        Ok(())
    }

    async fn fetch_one(&self, path: &str, auth_token: &str) -> Result<UserAccount, UserError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        if result.is_empty() {
            return Err(UserError::NotFound);
        }

        serde_json::from_value(result[0].clone()).map_err(|e| UserError::Database(e.to_string()))
    }

    async fn check_duplicate_account(
        &self,
        username: &str,
        email: &str,
        exclude_id: Option<&str>,
        auth_token: Option<&str>,
    ) -> Result<(), UserError> {
        let mut path = format!(
            "/rest/v1/users?or=(username.eq.{},email.eq.{})&select=id",
            username, email
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, auth_token, None)
            .await
            .map_err(map_db_error)?;

        if !existing.is_empty() {
            warn!("Duplicate account for username {} / email {}", username, email);
            return Err(UserError::Conflict(DUPLICATE_ACCOUNT_MESSAGE.to_string()));
        }
        Ok(())
    }
}

fn parse_single(result: Vec<Value>) -> Result<UserAccount, UserError> {
    let row = result
        .into_iter()
        .next()
        .ok_or_else(|| UserError::Database("Empty insert response".to_string()))?;
    serde_json::from_value(row).map_err(|e| UserError::Database(e.to_string()))
}

fn map_db_error(err: DbError) -> UserError {
    match err {
        DbError::NotFound(_) => UserError::NotFound,
        DbError::UniqueViolation(_) => UserError::Conflict(DUPLICATE_ACCOUNT_MESSAGE.to_string()),
        other => UserError::Database(other.to_string()),
    }
}
