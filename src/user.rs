//! User accounts: the user table, registration, and profile management.

use std::fmt::Display;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{AppConfig, AppJson, Error, PasswordHash, auth::Claims};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better
/// compile time errors, and more flexible generics that can have distinct
/// implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name the user goes by, unique across all users.
    pub username: String,
    /// The user's email address, unique across all users.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The part of a [User] that is safe to send to clients.
///
/// The password hash never appears in a response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name the user goes by.
    pub username: String,
    /// The user's email address.
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

// ============================================================================
// DATABASE
// ============================================================================

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns [Error::DuplicateUsername] or [Error::DuplicateEmail] if another
/// user already holds one of the unique fields, or [Error::Sql] for any other
/// SQL error.
pub fn create_user(
    username: &str,
    email: &str,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (username, email, password) VALUES (?1, ?2, ?3)",
        (username, email, password_hash.as_ref()),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        username: username.to_owned(),
        email: email.to_owned(),
        password_hash,
    })
}

fn map_user_row(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(3)?;

    Ok(User {
        id: UserID::new(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered
/// user, or [Error::Sql] if there was an error accessing the database.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, username, email, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], |row| map_user_row(row))
        .map_err(|error| error.into())
}

/// Get the user from the database with an email address equal to `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `email` does not belong to a registered user,
/// or [Error::Sql] if there was an error accessing the database.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, username, email, password FROM user WHERE email = :email")?
        .query_row(&[(":email", &email)], |row| map_user_row(row))
        .map_err(|error| error.into())
}

/// Update the username and/or email of the user with `user_id`.
///
/// Fields that are `None` are left unchanged. Unlike the rest of an account,
/// the unique fields can collide with another user's, so uniqueness is
/// re-checked here the same way it is at registration.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered
/// user, or [Error::DuplicateUsername]/[Error::DuplicateEmail] if the new
/// value is already taken.
pub fn update_user_profile(
    user_id: UserID,
    username: Option<&str>,
    email: Option<&str>,
    connection: &Connection,
) -> Result<User, Error> {
    let rows_updated = connection.execute(
        "UPDATE user
             SET username = COALESCE(?1, username),
                 email = COALESCE(?2, email)
             WHERE id = ?3",
        (username, email, user_id.as_i64()),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    get_user_by_id(user_id, connection)
}

/// Replace the password hash of the user with `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a registered
/// user, or [Error::Sql] if there was an error accessing the database.
pub fn update_user_password(
    user_id: UserID,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_updated = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_updated == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// The details sent by the client when registering an account.
///
/// Missing fields deserialize as empty strings and are rejected by the
/// handler's validation.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// The name the user will go by, unique across all users.
    #[serde(default)]
    pub username: String,
    /// The user's email address, unique across all users.
    #[serde(default)]
    pub email: String,
    /// The account password in plaintext.
    #[serde(default)]
    pub password: String,
}

/// A route handler for creating a new user account.
///
/// Responds with 201 and the user's public identity on success.
///
/// # Errors
///
/// Returns [Error::Validation] if any field is missing or empty, or
/// [Error::DuplicateUsername]/[Error::DuplicateEmail] if the account would
/// clash with an existing one.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn register(
    State(state): State<AppConfig>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, Error> {
    if request.username.is_empty() || request.email.is_empty() || request.password.is_empty() {
        return Err(Error::Validation("all fields are required".to_owned()));
    }

    let password_hash = PasswordHash::new(&request.password, PasswordHash::DEFAULT_COST)?;

    let connection = state.db_connection().lock().unwrap();
    let user = create_user(&request.username, &request.email, password_hash, &connection)?;

    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

/// A route handler for fetching the authenticated user's public identity.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn get_profile(
    State(state): State<AppConfig>,
    claims: Claims,
) -> Result<Json<UserProfile>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let user = get_user_by_id(claims.user_id(), &connection)?;

    Ok(Json(UserProfile::from(&user)))
}

/// The fields of a profile that a user may change.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    /// The new username, unique across all users.
    pub username: Option<String>,
    /// The new email address, unique across all users.
    pub email: Option<String>,
}

/// A route handler for updating the authenticated user's username and/or
/// email.
///
/// # Errors
///
/// Returns [Error::DuplicateUsername]/[Error::DuplicateEmail] if the new
/// value belongs to another user, or [Error::NotFound] if the account no
/// longer exists.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn update_profile(
    State(state): State<AppConfig>,
    claims: Claims,
    AppJson(request): AppJson<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, Error> {
    let connection = state.db_connection().lock().unwrap();
    let user = update_user_profile(
        claims.user_id(),
        request.username.as_deref(),
        request.email.as_deref(),
        &connection,
    )?;

    Ok(Json(UserProfile::from(&user)))
}

/// The body of a password change request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// The replacement password in plaintext.
    #[serde(default)]
    pub new_password: String,
}

/// A route handler for changing the authenticated user's password.
///
/// # Errors
///
/// Returns [Error::Validation] if the new password is empty, or
/// [Error::NotFound] if the account no longer exists.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn change_password(
    State(state): State<AppConfig>,
    claims: Claims,
    AppJson(request): AppJson<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    if request.new_password.is_empty() {
        return Err(Error::Validation("new password is required".to_owned()));
    }

    let password_hash = PasswordHash::new(&request.new_password, PasswordHash::DEFAULT_COST)?;

    let connection = state.db_connection().lock().unwrap();
    update_user_password(claims.user_id(), password_hash, &connection)?;

    Ok(Json(
        serde_json::json!({ "message": "Password changed successfully" }),
    ))
}
