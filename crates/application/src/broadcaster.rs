use async_trait::async_trait;
use domain::PollId;
use thiserror::Error;

use crate::dto::PollSnapshot;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast failed: {0}")]
    Failed(String),
}

impl BroadcastError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// 快照推送端口。
///
/// 订阅关系由实现方维护；记账引擎只在选票提交之后调用 `publish`，
/// 订阅者绝不会看到可能被回滚的票数。
#[async_trait]
pub trait SnapshotBroadcaster: Send + Sync {
    async fn publish(
        &self,
        poll_id: PollId,
        snapshot: &PollSnapshot,
    ) -> Result<(), BroadcastError>;
}
