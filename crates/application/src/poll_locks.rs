use std::collections::HashMap;
use std::sync::Arc;

use domain::PollId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 回收阈值：注册表超过该长度时清理无人持有的锁条目。
const SWEEP_THRESHOLD: usize = 1024;

/// 以投票ID为键的互斥锁注册表。
///
/// 同一投票上的记票彼此串行，不同投票互不阻塞。注册表本身的锁
/// 只在取出条目的瞬间持有，绝不跨越记票临界区。
#[derive(Default)]
pub struct PollLockRegistry {
    locks: Mutex<HashMap<PollId, Arc<Mutex<()>>>>,
}

impl PollLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指定投票的持有型锁守卫。
    pub async fn acquire(&self, poll_id: PollId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // 条目只增不减会缓慢膨胀，超过阈值时回收当前无人引用的条目
            if locks.len() > SWEEP_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(poll_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
