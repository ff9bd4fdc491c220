//! 调用方身份
//!
//! 创建者与投票者统一使用该类型，匿名与实名在类型层面显式区分，
//! 不再用可空字段表达。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::UserId;

/// 请求方身份：匿名或经过认证的用户。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identity {
    Anonymous,
    Verified(UserId),
}

impl Identity {
    /// 实名身份对应的用户ID，匿名返回 None。
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identity::Anonymous => None,
            Identity::Verified(id) => Some(*id),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Identity::Verified(_))
    }

    /// 从存储层的可空 UUID 还原身份。
    pub fn from_optional_uuid(value: Option<Uuid>) -> Self {
        match value {
            Some(id) => Identity::Verified(UserId::new(id)),
            None => Identity::Anonymous,
        }
    }

    /// 转换为存储层的可空 UUID。
    pub fn to_optional_uuid(&self) -> Option<Uuid> {
        self.user_id().map(Uuid::from)
    }
}

impl From<UserId> for Identity {
    fn from(value: UserId) -> Self {
        Identity::Verified(value)
    }
}

impl From<Option<UserId>> for Identity {
    fn from(value: Option<UserId>) -> Self {
        match value {
            Some(id) => Identity::Verified(id),
            None => Identity::Anonymous,
        }
    }
}
