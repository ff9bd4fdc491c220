//! 快照订阅注册表
//!
//! 维护「投票 -> 订阅连接」与「连接 -> 当前订阅」两张映射，
//! 每个连接同一时刻最多订阅一个投票，加入新投票即退出旧投票。
//! 推送是尽力而为：序列化一次，逐个发往订阅者的通道，
//! 已关闭的通道顺手清理。

use std::collections::HashMap;

use application::{BroadcastError, PollSnapshot, SnapshotBroadcaster};
use async_trait::async_trait;
use domain::PollId;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// 订阅者接收推送文本的通道发送端。
pub type SnapshotSender = mpsc::UnboundedSender<String>;

#[derive(Default)]
struct RegistryState {
    /// 投票 -> 该投票的订阅连接
    topics: HashMap<PollId, HashMap<Uuid, SnapshotSender>>,
    /// 连接 -> 当前订阅的投票
    subscriptions: HashMap<Uuid, PollId>,
}

/// 进程内的订阅注册表。
///
/// 两张映射只会被 `subscribe` / `unsubscribe` 修改，`publish` 仅在
/// 发现死通道时做清理，因此注册表不会无限增长。
#[derive(Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅指定投票。连接已有订阅时先退出旧投票再加入新投票。
    pub async fn subscribe(&self, connection_id: Uuid, poll_id: PollId, sender: SnapshotSender) {
        let mut state = self.state.write().await;
        if let Some(previous) = state.subscriptions.insert(connection_id, poll_id) {
            if previous != poll_id {
                remove_subscriber(&mut state.topics, previous, connection_id);
            }
        }
        state
            .topics
            .entry(poll_id)
            .or_default()
            .insert(connection_id, sender);
        debug!(connection_id = %connection_id, poll_id = %poll_id, "连接订阅投票");
    }

    /// 退出当前订阅。连接断开时也走这里，立即从注册表移除。
    pub async fn unsubscribe(&self, connection_id: Uuid) {
        let mut state = self.state.write().await;
        if let Some(poll_id) = state.subscriptions.remove(&connection_id) {
            remove_subscriber(&mut state.topics, poll_id, connection_id);
            debug!(connection_id = %connection_id, poll_id = %poll_id, "连接退出订阅");
        }
    }

    /// 某投票当前的订阅连接数。
    pub async fn subscriber_count(&self, poll_id: PollId) -> usize {
        let state = self.state.read().await;
        state
            .topics
            .get(&poll_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}

fn remove_subscriber(
    topics: &mut HashMap<PollId, HashMap<Uuid, SnapshotSender>>,
    poll_id: PollId,
    connection_id: Uuid,
) {
    if let Some(subscribers) = topics.get_mut(&poll_id) {
        subscribers.remove(&connection_id);
        if subscribers.is_empty() {
            topics.remove(&poll_id);
        }
    }
}

#[async_trait]
impl SnapshotBroadcaster for SubscriptionRegistry {
    async fn publish(&self, poll_id: PollId, snapshot: &PollSnapshot) -> Result<(), BroadcastError> {
        // 序列化一次，所有订阅者收到完全相同的字节
        let payload = serde_json::to_string(snapshot)
            .map_err(|err| BroadcastError::failed(err.to_string()))?;

        let mut state = self.state.write().await;
        let RegistryState {
            topics,
            subscriptions,
        } = &mut *state;

        let Some(subscribers) = topics.get_mut(&poll_id) else {
            return Ok(());
        };

        // 发送失败说明接收端已经关闭，连带清理其订阅记录
        let mut closed = Vec::new();
        for (connection_id, sender) in subscribers.iter() {
            if sender.send(payload.clone()).is_err() {
                closed.push(*connection_id);
            }
        }
        for connection_id in &closed {
            subscribers.remove(connection_id);
            subscriptions.remove(connection_id);
            debug!(connection_id = %connection_id, poll_id = %poll_id, "订阅通道已关闭，移除订阅");
        }
        let topic_empty = subscribers.is_empty();
        if topic_empty {
            topics.remove(&poll_id);
        }

        Ok(())
    }
}
