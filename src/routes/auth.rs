use std::sync::OnceLock;

use axum::Json;
use axum::RequestPartsExt;
use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::{ApiError, AuthError, FieldErrors};
use crate::services::auth::{ProfileChanges, SignupError, normalize_email};
use crate::startup::AppState;

static KEYS: OnceLock<Keys> = OnceLock::new();

/// Installs the token signing keys from configuration. Later calls are
/// no-ops; the first install wins.
pub fn install_keys(secret: &[u8]) {
    let _ = KEYS.set(Keys::new(secret));
}

fn keys() -> &'static Keys {
    KEYS.get_or_init(|| {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Keys::new(secret.as_bytes())
    })
}

pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidToken)
    }
}

#[derive(Debug, Serialize)]
pub struct AuthBody {
    access_token: String,
    token_type: String,
}

impl AuthBody {
    fn new(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthPayload {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserPayload {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMePayload {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

/// The profile as callers see it; the password hash never leaves the
/// service layer.
#[derive(Debug, Serialize)]
pub struct UserBody {
    email: String,
    name: String,
}

fn validate_signup(payload: &CreateUserPayload) -> Result<(String, String, String), ApiError> {
    let mut errors = FieldErrors::new();
    if payload.email.as_deref().is_none_or(str::is_empty) {
        errors.push("email", "This field is required.");
    }
    if payload.name.as_deref().is_none_or(str::is_empty) {
        errors.push("name", "This field is required.");
    }
    match payload.password.as_deref() {
        None | Some("") => errors.push("password", "This field is required."),
        Some(p) if p.len() < 5 => {
            errors.push("password", "Ensure this field has at least 5 characters.")
        }
        Some(_) => {}
    }

    match (&payload.email, &payload.name, &payload.password) {
        (Some(email), Some(name), Some(password)) if errors.is_empty() => {
            Ok((email.clone(), name.clone(), password.clone()))
        }
        _ => Err(ApiError::Validation(errors)),
    }
}

#[instrument(name = "HTTP: Create user", skip(state, payload))]
pub async fn register_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let (email, name, password) = validate_signup(&payload)?;

    match state.auth_service.register(&email, &name, &password).await {
        Ok(_) => {
            tracing::info!("New user registered");
            Ok((
                StatusCode::CREATED,
                Json(UserBody {
                    email: normalize_email(&email),
                    name,
                }),
            ))
        }
        Err(SignupError::EmailTaken) => Err(ApiError::Validation(FieldErrors::single(
            "email",
            "user with this email already exists.",
        ))),
        Err(SignupError::Other(e)) => Err(e.into()),
    }
}

#[instrument(name = "HTTP: Authorize Handler", skip(state, payload))]
pub async fn authorize_handler(
    State(state): State<AppState>,
    Json(payload): Json<AuthPayload>,
) -> Result<Json<AuthBody>, AuthError> {
    tracing::info!("Received login request");

    let (Some(email), Some(password)) = (payload.email.as_deref(), payload.password.as_deref())
    else {
        return Err(AuthError::MissingCredentials);
    };
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    let user_id = state.auth_service.login(email, password).await.map_err(|e| {
        tracing::error!("Authorization failed: {:?}", e);
        e
    })?;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize,
    };

    let token = encode(&Header::default(), &claims, &keys().encoding).map_err(|e| {
        tracing::error!("JWT Encoding failed: {:?}", e);
        AuthError::TokenCreation
    })?;

    tracing::info!("JWT issued for user");
    Ok(Json(AuthBody::new(token)))
}

#[instrument(name = "HTTP: Retrieve profile", skip(state, claims))]
pub async fn me_handler(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<UserBody>, ApiError> {
    let user = state
        .auth_service
        .profile(claims.user_id()?)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(UserBody {
        email: user.email,
        name: user.name,
    }))
}

#[instrument(name = "HTTP: Update profile", skip(state, claims, payload))]
pub async fn update_me_handler(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<UpdateMePayload>,
) -> Result<Json<UserBody>, ApiError> {
    if let Some(password) = payload.password.as_deref() {
        if password.len() < 5 {
            return Err(ApiError::Validation(FieldErrors::single(
                "password",
                "Ensure this field has at least 5 characters.",
            )));
        }
    }

    let changes = ProfileChanges {
        email: payload.email,
        name: payload.name,
        password: payload.password,
    };

    match state
        .auth_service
        .update_profile(claims.user_id()?, changes)
        .await
    {
        Ok(Some(user)) => Ok(Json(UserBody {
            email: user.email,
            name: user.name,
        })),
        Ok(None) => Err(ApiError::NotFound),
        Err(SignupError::EmailTaken) => Err(ApiError::Validation(FieldErrors::single(
            "email",
            "user with this email already exists.",
        ))),
        Err(SignupError::Other(e)) => Err(e.into()),
    }
}

impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    #[instrument(name = "Extracting Claims", skip(_state, parts))]
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| {
                tracing::warn!("No bearer token in Authorization header");
                AuthError::InvalidToken
            })?;

        let token_data = decode::<Claims>(bearer.token(), &keys().decoding, &Validation::default())
            .map_err(|e| {
                tracing::error!("JWT decoding failed: {:?}", e);
                AuthError::InvalidToken
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> Keys {
        Keys::new(b"test-secret")
    }

    fn claims_for(user_id: Uuid, ttl: chrono::Duration) -> Claims {
        Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now() + ttl).timestamp() as usize,
        }
    }

    #[test]
    fn claims_round_trip_through_a_token() {
        let keys = test_keys();
        let user_id = Uuid::new_v4();
        let claims = claims_for(user_id, chrono::Duration::hours(1));

        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        let decoded = decode::<Claims>(&token, &keys.decoding, &Validation::default()).unwrap();

        assert_eq!(decoded.claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = test_keys();
        let claims = claims_for(Uuid::new_v4(), chrono::Duration::hours(-1));

        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(decode::<Claims>(&token, &keys.decoding, &Validation::default()).is_err());
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let claims = claims_for(Uuid::new_v4(), chrono::Duration::hours(1));

        let token = encode(&Header::default(), &claims, &Keys::new(b"other-secret").encoding).unwrap();
        assert!(decode::<Claims>(&token, &test_keys().decoding, &Validation::default()).is_err());
    }

    #[test]
    fn garbage_subject_has_no_user_id() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            exp: 0,
        };
        assert!(claims.user_id().is_err());
    }

    #[test]
    fn signup_requires_email_name_and_password() {
        let err = validate_signup(&CreateUserPayload {
            email: None,
            password: None,
            name: None,
        })
        .unwrap_err();

        let ApiError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        let value = serde_json::to_value(&errors).unwrap();
        assert!(value.get("email").is_some());
        assert!(value.get("name").is_some());
        assert!(value.get("password").is_some());
    }

    #[test]
    fn signup_rejects_short_passwords() {
        let err = validate_signup(&CreateUserPayload {
            email: Some("test@example.com".to_string()),
            password: Some("pw".to_string()),
            name: Some("Test User Name".to_string()),
        })
        .unwrap_err();

        let ApiError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "password": ["Ensure this field has at least 5 characters."],
            })
        );
    }

    #[test]
    fn signup_accepts_a_complete_payload() {
        let (email, name, password) = validate_signup(&CreateUserPayload {
            email: Some("test@example.com".to_string()),
            password: Some("testpass123".to_string()),
            name: Some("Test User Name".to_string()),
        })
        .unwrap();

        assert_eq!(email, "test@example.com");
        assert_eq!(name, "Test User Name");
        assert_eq!(password, "testpass123");
    }
}
