use crate::{
    errors::AuthError,
    models::user::UserModel,
    store::{self, user::UserRepository},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("a user with this email already exists")]
    EmailTaken,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Optional profile fields for a partial update; absent fields keep their
/// stored value.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Lower-cases the domain part of an email, leaving the local part as the
/// user typed it.
pub fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| anyhow::anyhow!("failed to hash password"))?
        .to_string();
    Ok(hash)
}

#[derive(Clone, Debug)]
pub struct AuthService {
    repo: UserRepository,
}

impl AuthService {
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    #[instrument(
        name = "AuthService: Register user",
        skip(self, password),
        fields(user_email = %email)
    )]
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Uuid, SignupError> {
        let email = normalize_email(email);
        let hash = hash_password(password)?;

        match self.repo.create_user(&email, name, &hash).await {
            Ok(id) => Ok(id),
            Err(e) if store::is_unique_violation(&e) => {
                tracing::warn!("Signup failed: email already registered");
                Err(SignupError::EmailTaken)
            }
            Err(e) => Err(SignupError::Other(e)),
        }
    }

    #[instrument(
        name = "AuthService: Login attempt",
        skip(self, password),
        fields(user_email = %email)
    )]
    pub async fn login(&self, email: &str, password: &str) -> Result<Uuid, AuthError> {
        // 1. Fetch User
        let user = self.repo.find_by_email(email).await.map_err(|e| {
            tracing::error!("Database error during login: {:?}", e);
            AuthError::Internal
        })?;

        let user = match user {
            Some(u) => u,
            None => {
                tracing::warn!("Login failed: User not found");
                return Err(AuthError::WrongCredentials);
            }
        };

        if !user.is_active {
            tracing::warn!("Login failed: Account is inactive");
            return Err(AuthError::WrongCredentials);
        }

        // 2. Parse Hash
        let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|e| {
            tracing::error!("Critial: Failed to parse password hash from DB: {:?}", e);
            AuthError::Internal
        })?;

        // 3. Verify Password
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            tracing::warn!("Login failed: Invalid password provided");
            return Err(AuthError::WrongCredentials);
        }

        tracing::info!("User authenticated successfully");
        Ok(user.id)
    }

    #[instrument(name = "AuthService: Fetch profile", skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> anyhow::Result<Option<UserModel>> {
        self.repo.find_by_id(user_id).await
    }

    #[instrument(name = "AuthService: Update profile", skip(self, changes))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<UserModel>, SignupError> {
        let Some(mut user) = self.repo.find_by_id(user_id).await? else {
            return Ok(None);
        };

        if let Some(email) = &changes.email {
            user.email = normalize_email(email);
        }
        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(password) = &changes.password {
            user.password_hash = hash_password(password)?;
        }

        match self.repo.update_user(&user).await {
            Ok(()) => Ok(Some(user)),
            Err(e) if store::is_unique_violation(&e) => Err(SignupError::EmailTaken),
            Err(e) => Err(SignupError::Other(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_domain_is_lowercased() {
        let samples = [
            ("test1@EXAMPLE.com", "test1@example.com"),
            ("Test2@example.com", "Test2@example.com"),
            ("TEST3@EXAMPLE.COM", "TEST3@example.com"),
            ("test4@EXAMPLE.COM", "test4@example.com"),
        ];
        for (input, expected) in samples {
            assert_eq!(normalize_email(input), expected);
        }
    }

    #[test]
    fn email_without_at_sign_is_left_alone() {
        assert_eq!(normalize_email("not-an-email"), "not-an-email");
    }

    #[test]
    fn password_hash_is_salted_and_verifiable() {
        let hash = hash_password("example123").unwrap();
        assert_ne!(hash, "example123");

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"example123", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrongpass", &parsed)
                .is_err()
        );
    }
}
