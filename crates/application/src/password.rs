//! 密码哈希端口。
//!
//! 应用层只依赖该抽象，具体算法由基础设施层适配；哈希值一律以领域
//! 类型 `PasswordHash` 传递，明文从不进入存储。

use async_trait::async_trait;
use domain::PasswordHash;
use thiserror::Error;

/// 哈希或校验阶段的失败。两者都属于服务端内部故障，对外不暴露细节。
#[derive(Debug, Error)]
pub enum PasswordHasherError {
    #[error("密码哈希失败: {0}")]
    Hash(String),
    #[error("密码校验失败: {0}")]
    Verify(String),
}

impl PasswordHasherError {
    pub fn hash_error(message: impl Into<String>) -> Self {
        Self::Hash(message.into())
    }

    pub fn verify_error(message: impl Into<String>) -> Self {
        Self::Verify(message.into())
    }
}

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError>;

    /// 校验明文与哈希是否匹配。不匹配返回 `Ok(false)` 而不是错误。
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError>;
}
