//! 领域模型错误定义
//!
//! 定义了投票领域中所有可能的错误类型，提供清晰的错误上下文。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 参数校验错误
    #[error("参数无效: {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 投票不存在
    #[error("投票不存在")]
    PollNotFound,

    /// 邮箱已被注册
    #[error("邮箱已被注册")]
    EmailAlreadyRegistered,

    /// 凭证无效（邮箱或密码错误）
    #[error("凭证无效")]
    InvalidCredentials,
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// 记录不存在
    #[error("记录不存在")]
    NotFound,

    /// 唯一约束冲突
    #[error("唯一约束冲突: {0}")]
    Conflict(String),

    /// 瞬时故障，重试可能成功
    #[error("存储瞬时故障: {0}")]
    Transient(String),

    /// 不可重试的存储错误
    #[error("存储错误: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// 是否值得在有限次数内重试。
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
