use std::sync::Arc;

use domain::{DomainError, RepositoryError, User, UserEmail, UserId};
use uuid::Uuid;

use crate::{
    clock::Clock, error::ApplicationError, password::PasswordHasher, repository::UserRepository,
};

/// 密码最小长度。
const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateUserRequest {
    pub email: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApplicationError> {
        let email = UserEmail::parse(request.email)?;
        if request.password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(DomainError::invalid_argument(
                "password",
                "must be at least 6 characters",
            )
            .into());
        }

        if self
            .deps
            .user_repository
            .find_by_email(email.clone())
            .await?
            .is_some()
        {
            return Err(DomainError::EmailAlreadyRegistered.into());
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;
        let now = self.deps.clock.now();
        let user = User::register(UserId::from(Uuid::new_v4()), email, password_hash, now);

        // 先查后插仍可能撞上并发注册，把唯一约束冲突归一成同一种结果
        match self.deps.user_repository.create(user).await {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::Conflict(_)) => Err(DomainError::EmailAlreadyRegistered.into()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn authenticate(
        &self,
        request: AuthenticateUserRequest,
    ) -> Result<User, ApplicationError> {
        // 凭证错误不区分"邮箱不存在"与"密码不对"
        let email =
            UserEmail::parse(request.email).map_err(|_| DomainError::InvalidCredentials)?;
        let user = self
            .deps
            .user_repository
            .find_by_email(email)
            .await?
            .ok_or(DomainError::InvalidCredentials)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password_hash)
            .await?;
        if !password_ok {
            return Err(DomainError::InvalidCredentials.into());
        }

        Ok(user)
    }
}
