//! Local accounts and the current session.
//!
//! Passwords are stored as salted SHA-256 digests. Accounts created before
//! hashing kept the password in clear text; those are upgraded on their first
//! successful login.

use crate::{
    core::policy::null_as_default,
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_json, read_list, write_json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Kind of account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Milk producer
    #[default]
    #[serde(alias = "produtor")]
    Producer,
    /// Dairy buyer managing an official dairy and its tanks
    #[serde(alias = "queijaria")]
    Dairy,
}

/// Stored account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier of the account
    pub id: String,
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Login email, stored lowercase
    pub email: String,
    /// Hex SHA-256 of salt and password
    #[serde(default, deserialize_with = "null_as_default")]
    pub password_hash: String,
    /// Per-account salt
    #[serde(default, deserialize_with = "null_as_default")]
    pub password_salt: String,
    /// Clear-text password of accounts created before hashing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Contact phone
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    /// City
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    /// State abbreviation
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    /// Producer or dairy
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: UserRole,
    /// When the account was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// The logged-in user, without credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Account id
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Login email
    pub email: String,
    /// Contact phone
    #[serde(default)]
    pub phone: String,
    /// City
    #[serde(default)]
    pub city: String,
    /// State abbreviation
    #[serde(default)]
    pub state: String,
    /// Producer or dairy
    #[serde(default)]
    pub role: UserRole,
    /// When the account was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            city: user.city.clone(),
            state: user.state.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Values submitted on sign-up
#[derive(Debug, Clone, Default)]
pub struct Registration {
    /// Display name
    pub name: String,
    /// Login email, required and unique
    pub email: String,
    /// Clear-text password, required
    pub password: String,
    /// Contact phone
    pub phone: Option<String>,
    /// City
    pub city: Option<String>,
    /// State abbreviation, upper-cased on save
    pub state: Option<String>,
    /// Account role
    pub role: UserRole,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn password_matches(user: &User, password: &str) -> bool {
    if !user.password_hash.is_empty() {
        return hash_password(&user.password_salt, password) == user.password_hash;
    }
    user.password.as_deref().is_some_and(|legacy| legacy == password)
}

async fn start_session<S>(store: &S, user: &User) -> Result<SessionUser>
where
    S: KeyValueStore + ?Sized,
{
    let session = SessionUser::from(user);
    write_json(store, keys::CURRENT_USER, &session).await?;
    Ok(session)
}

/// Creates an account and logs it in.
///
/// # Errors
/// Returns `MissingField` without email or password and `DuplicateEmail` when
/// the email is already registered.
pub async fn register<S>(store: &S, registration: Registration) -> Result<SessionUser>
where
    S: KeyValueStore + ?Sized,
{
    let email = normalize_email(&registration.email);
    let password = registration.password.trim();
    if email.is_empty() {
        return Err(Error::MissingField { field: "email" });
    }
    if password.is_empty() {
        return Err(Error::MissingField { field: "password" });
    }

    let mut users: Vec<User> = read_list(store, keys::USERS).await?;
    if users.iter().any(|u| normalize_email(&u.email) == email) {
        return Err(Error::DuplicateEmail { email });
    }

    let salt = generate_id();
    let user = User {
        id: generate_id(),
        name: registration.name.trim().to_string(),
        email,
        password_hash: hash_password(&salt, password),
        password_salt: salt,
        password: None,
        phone: registration.phone.unwrap_or_default().trim().to_string(),
        city: registration.city.unwrap_or_default().trim().to_string(),
        state: registration.state.unwrap_or_default().trim().to_uppercase(),
        role: registration.role,
        created_at: Utc::now(),
    };

    users.push(user.clone());
    write_json(store, keys::USERS, &users).await?;

    info!("Registered user {} ({:?})", user.email, user.role);
    start_session(store, &user).await
}

/// Logs in with email and password.
///
/// # Errors
/// Returns `MissingField` for blank input and `InvalidCredentials` when no
/// account matches.
pub async fn login<S>(store: &S, email: &str, password: &str) -> Result<SessionUser>
where
    S: KeyValueStore + ?Sized,
{
    let email = normalize_email(email);
    let password = password.trim();
    if email.is_empty() {
        return Err(Error::MissingField { field: "email" });
    }
    if password.is_empty() {
        return Err(Error::MissingField { field: "password" });
    }

    let mut users: Vec<User> = read_list(store, keys::USERS).await?;
    let Some(user) = users
        .iter_mut()
        .find(|u| normalize_email(&u.email) == email && password_matches(u, password))
    else {
        warn!("Failed login for {}", email);
        return Err(Error::InvalidCredentials);
    };

    let upgraded = user.password.take().is_some();
    if upgraded {
        user.password_salt = generate_id();
        user.password_hash = hash_password(&user.password_salt, password);
    }
    let user = user.clone();

    if upgraded {
        write_json(store, keys::USERS, &users).await?;
        info!("Upgraded stored password of {}", user.email);
    }

    info!("User {} logged in", user.email);
    start_session(store, &user).await
}

/// Ends the current session.
pub async fn logout<S>(store: &S) -> Result<()>
where
    S: KeyValueStore + ?Sized,
{
    store.remove(keys::CURRENT_USER).await
}

/// The logged-in user, if any.
pub async fn current_user<S>(store: &S) -> Result<Option<SessionUser>>
where
    S: KeyValueStore + ?Sized,
{
    read_json(store, keys::CURRENT_USER, None).await
}

/// Whether a session is active.
pub async fn is_authenticated<S>(store: &S) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    Ok(current_user(store).await?.is_some())
}
