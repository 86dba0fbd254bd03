//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match a registered user.
    ///
    /// This error deliberately does not distinguish between an unknown email
    /// and a wrong password.
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// The bearer token was missing, malformed, expired, or had a bad signature.
    #[error("token expired or invalid, please login again")]
    InvalidToken,

    /// The request body was missing a field or contained a malformed value.
    #[error("{0}")]
    Validation(String),

    /// The username already belongs to another user.
    #[error("username already exists")]
    DuplicateUsername,

    /// The email address already belongs to another user.
    #[error("email already exists")]
    DuplicateEmail,

    /// The user already has a category with this name.
    #[error("a category with this name already exists")]
    DuplicateCategoryName,

    /// The requested resource was not found.
    ///
    /// Also returned when the resource exists but belongs to another user, so
    /// that clients cannot probe for other users' resources.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged on the server, never sent to
    /// the client.
    #[error("hashing failed: {0}")]
    Hashing(String),

    /// The JWT could not be created.
    #[error("could not create token: {0}")]
    TokenCreation(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    Sql(rusqlite::Error),

    /// The CSV writer failed.
    #[error("could not render CSV: {0}")]
    Csv(String),

    /// The PDF document could not be rendered.
    #[error("could not render PDF: {0}")]
    Pdf(String),
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::Validation(rejection.body_text())
    }
}

/// A JSON body extractor that reports missing or malformed bodies as
/// [Error::Validation], so they get the same JSON error shape and 400 status
/// as domain validation failures instead of axum's plain-text 422.
#[derive(Debug)]
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;

        Ok(Self(value))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("category.") =>
            {
                Error::DuplicateCategoryName
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::Sql(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::InvalidCredentials | Error::InvalidToken => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            Error::Validation(_)
            | Error::DuplicateUsername
            | Error::DuplicateEmail
            | Error::DuplicateCategoryName => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            // Internal errors are logged in full and collapsed to a generic
            // message so that no library detail leaks to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        let body = Json(json!({ "message": message }));

        (status, body).into_response()
    }
}
