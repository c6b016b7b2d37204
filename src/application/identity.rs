use crate::domain::User;
use crate::infrastructure::{
    hash_password, verify_password, AuthError, AuthSettings, RepositoryError, TokenSigner,
    UserRepository,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

/// Well-formed Argon2id hash with the default cost parameters that matches no password.
/// Verified against on unknown emails so login timing does not reveal registered accounts.
const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$AAECAwQFBgcICQoLDA0ODw$\
AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("An account with this email already exists")]
    Conflict,
    #[error("Invalid credentials")]
    Unauthorized,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

/// A user together with a freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

pub struct IdentityService<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    signer: TokenSigner,
    starting_credits: i64,
}

impl<U> IdentityService<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, settings: AuthSettings) -> Self {
        Self {
            user_repo,
            signer: TokenSigner::new(&settings.jwt_secret, settings.token_ttl),
            starting_credits: settings.starting_credits,
        }
    }

    pub async fn register(&self, registration: Registration) -> Result<Session, IdentityError> {
        registration.validate()?;

        if self
            .user_repo
            .find_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(IdentityError::Conflict);
        }

        let password = registration.password.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| IdentityError::Internal(format!("password hashing task: {}", e)))?
            .map_err(internal)?;
        let user = User::new(
            registration.name,
            registration.email,
            password_hash,
            self.starting_credits,
        );

        match self.user_repo.create(&user).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => return Err(IdentityError::Conflict),
            Err(e) => return Err(e.into()),
        }
        info!(user_id = %user.id, "Registered user");

        let token = self.signer.issue(&user.id).map_err(internal)?;
        Ok(Session { user, token })
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let user = self.user_repo.find_by_email(email).await?;
        let hash = user
            .as_ref()
            .map_or(DUMMY_PASSWORD_HASH, |u| u.password_hash.as_str())
            .to_string();

        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| IdentityError::Internal(format!("password verification task: {}", e)))?;

        let user = user.ok_or(IdentityError::Unauthorized)?;
        match verified {
            Ok(true) => {}
            Ok(false) => return Err(IdentityError::Unauthorized),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Stored password hash is unusable");
                return Err(IdentityError::Unauthorized);
            }
        }

        let token = self.signer.issue(&user.id).map_err(internal)?;
        Ok(Session { user, token })
    }

    /// Returns the user id carried by a valid token.
    pub fn validate_token(&self, token: &str) -> Result<String, IdentityError> {
        self.signer
            .validate(token)
            .map_err(|_| IdentityError::Unauthorized)
    }

    pub async fn current_user(&self, user_id: &str) -> Result<User, IdentityError> {
        Ok(self.user_repo.get_by_id(user_id).await?)
    }
}

fn internal(e: AuthError) -> IdentityError {
    IdentityError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{Params, PasswordHash};

    #[test]
    fn dummy_hash_parses_with_default_cost_and_matches_nothing() {
        let parsed = PasswordHash::new(DUMMY_PASSWORD_HASH).unwrap();
        let params = Params::try_from(&parsed).unwrap();
        assert_eq!(params.m_cost(), Params::DEFAULT_M_COST);
        assert_eq!(params.t_cost(), Params::DEFAULT_T_COST);
        assert_eq!(params.p_cost(), Params::DEFAULT_P_COST);

        assert!(!verify_password("", DUMMY_PASSWORD_HASH).unwrap());
        assert!(!verify_password("secret1", DUMMY_PASSWORD_HASH).unwrap());
    }
}
