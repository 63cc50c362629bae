use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    auth::{
        password::{hash_password_blocking, verify_password_blocking},
        AuthError, AuthService, IssuedToken,
    },
    db::DbPool,
    entities::user::{self, Entity as User, Role},
    errors::ServiceError,
    services::queries::UserSummary,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 50, message = "Name must be 3 to 50 characters"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, max = 72, message = "Password must be 8 to 72 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: UserSummary,
}

pub struct UserService {
    db_pool: Arc<DbPool>,
    auth: Arc<AuthService>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, auth: Arc<AuthService>) -> Self {
        Self { db_pool, auth }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn insert_user(
        &self,
        name: String,
        email: String,
        password: String,
        role: Role,
    ) -> Result<user::Model, ServiceError> {
        let password_hash = hash_password_blocking(password).await?;
        let now = Utc::now();
        user::ActiveModel {
            name: Set(name),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            role: Set(role),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::conflict_on_unique(format!(
            "Email {} is already in use",
            email
        )))
    }

    /// Self-service sign up. The role is always `karyawan`.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<UserSummary, ServiceError> {
        let input = RegisterInput {
            name: input.name.trim().to_string(),
            email: normalize_email(&input.email),
            ..input
        };
        input.validate()?;

        if self.find_by_email(&input.email).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Email {} is already in use",
                input.email
            )));
        }

        let user = self
            .insert_user(input.name, input.email, input.password, Role::Karyawan)
            .await?;
        info!(user_id = user.id, "user registered");
        Ok(user.into())
    }

    /// Verifies credentials and issues an access token.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, ServiceError> {
        let input = LoginInput {
            email: normalize_email(&input.email),
            ..input
        };
        input.validate()?;

        let user = match self.find_by_email(&input.email).await? {
            Some(user) if user.deleted_at.is_none() => user,
            _ => {
                warn!("login for unknown account");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password_blocking(input.password, user.password_hash.clone()).await? {
            warn!(user_id = user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.auth.issue_token(user.id, user.role)?;
        info!(user_id = user.id, role = %user.role, "user logged in");
        Ok(LoginOutcome {
            token,
            user: user.into(),
        })
    }

    /// Creates the admin account unless a user with this email already exists.
    /// Returns whether an account was created.
    #[instrument(skip(self, password))]
    pub async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<bool, ServiceError> {
        let email = normalize_email(email);
        if self.find_by_email(&email).await?.is_some() {
            return Ok(false);
        }

        let user = self
            .insert_user(
                name.to_string(),
                email,
                password.to_string(),
                Role::Admin,
            )
            .await?;
        info!(user_id = user.id, "bootstrap admin created");
        Ok(true)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
