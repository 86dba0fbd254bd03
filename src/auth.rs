//! Bearer token authentication.
//!
//! Logging in issues a signed, time-limited JWT that binds the user's ID.
//! Protected handlers take [Claims] as an extractor argument, which validates
//! the `Authorization: Bearer` header and resolves the acting user before any
//! domain logic runs. Token validation is stateless, so logging out is simply
//! the client discarding its token.

use axum::{
    Json, RequestPartsExt,
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    AppConfig, AppJson, Error,
    user::{UserID, get_user_by_email},
};

/// How long a bearer token stays valid after being issued, in days.
pub const TOKEN_DURATION_DAYS: i64 = 30;

/// The contents of a JSON Web Token.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The ID of the user the token was issued to.
    pub sub: i64,
    /// The time the token was issued as a unix timestamp.
    pub iat: usize,
    /// The expiry time of the token as a unix timestamp.
    pub exp: usize,
}

impl Claims {
    /// The ID of the user that this token authenticates.
    pub fn user_id(&self) -> UserID {
        UserID::new(self.sub)
    }
}

impl<S> FromRequestParts<S> for Claims
where
    AppConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::InvalidToken)?;

        let config = AppConfig::from_ref(state);

        decode_token(bearer.token(), config.decoding_key())
    }
}

/// Create a signed token for `user_id` that expires after
/// [TOKEN_DURATION_DAYS] days.
///
/// # Errors
///
/// Returns [Error::TokenCreation] if the claims could not be encoded.
pub fn encode_token(user_id: UserID, encoding_key: &EncodingKey) -> Result<String, Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.as_i64(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(TOKEN_DURATION_DAYS)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, encoding_key)
        .map_err(|error| Error::TokenCreation(error.to_string()))
}

/// Validate the signature and expiry of `token` and return its claims.
///
/// # Errors
///
/// Returns [Error::InvalidToken] if the token is malformed, expired, or does
/// not verify against `decoding_key`.
pub fn decode_token(token: &str, decoding_key: &DecodingKey) -> Result<Claims, Error> {
    decode::<Claims>(token, decoding_key, &Validation::default())
        .map(|token_data| token_data.claims)
        .map_err(|_| Error::InvalidToken)
}

/// The credentials sent by the client when logging in.
///
/// Missing fields deserialize as empty strings, which fail verification the
/// same way wrong credentials do.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// The email the account was registered with.
    #[serde(default)]
    pub email: String,
    /// The account password in plaintext.
    #[serde(default)]
    pub password: String,
}

/// Handler for login requests.
///
/// On success responds with the bearer token and the user's public identity.
///
/// # Errors
///
/// Returns a generic [Error::InvalidCredentials] if the email does not belong
/// to a registered user or the password does not match, without revealing
/// which of the two failed.
///
/// # Panics
///
/// Panics if the lock for the database connection is poisoned.
pub async fn login(
    State(state): State<AppConfig>,
    AppJson(credentials): AppJson<LoginRequest>,
) -> Result<Json<Value>, Error> {
    let user = {
        let connection = state.db_connection().lock().unwrap();

        get_user_by_email(&credentials.email, &connection).map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            error => error,
        })?
    };

    if !user.password_hash.verify(&credentials.password)? {
        return Err(Error::InvalidCredentials);
    }

    let token = encode_token(user.id, state.encoding_key())?;

    Ok(Json(json!({
        "message": "Login Success",
        "token": token,
        "id": user.id,
        "username": user.username,
        "email": user.email,
    })))
}

#[cfg(test)]
mod token_tests {
    use jsonwebtoken::{DecodingKey, EncodingKey};

    use crate::{Error, user::UserID};

    use super::{decode_token, encode_token};

    #[test]
    fn decode_returns_claims_for_valid_token() {
        let encoding_key = EncodingKey::from_secret(b"42");
        let decoding_key = DecodingKey::from_secret(b"42");

        let token = encode_token(UserID::new(7), &encoding_key).unwrap();
        let claims = decode_token(&token, &decoding_key).unwrap();

        assert_eq!(claims.sub, 7);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn decode_fails_with_wrong_secret() {
        let encoding_key = EncodingKey::from_secret(b"42");
        let decoding_key = DecodingKey::from_secret(b"not 42");

        let token = encode_token(UserID::new(7), &encoding_key).unwrap();

        assert_eq!(
            decode_token(&token, &decoding_key),
            Err(Error::InvalidToken)
        );
    }

    #[test]
    fn decode_fails_with_garbage_token() {
        let decoding_key = DecodingKey::from_secret(b"42");

        assert_eq!(
            decode_token("not.a.token", &decoding_key),
            Err(Error::InvalidToken)
        );
    }
}
