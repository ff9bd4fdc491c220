//! 内存仓储
//!
//! 与 PostgreSQL 仓储实现相同的契约，供集成测试和本地演示使用。
//! 支持注入瞬时故障来验证记票重试路径。

use std::sync::atomic::{AtomicU32, Ordering};

use application::{PollRepository, UserRepository, VoteRepository};
use async_trait::async_trait;
use domain::{Poll, PollId, RepositoryError, User, UserEmail, UserId, Vote};
use tokio::sync::Mutex;

#[derive(Default)]
struct StoreState {
    polls: Vec<Poll>,
    votes: Vec<Vote>,
}

/// 投票与选票台账的内存存储。
///
/// 临界区内没有 await 点，写操作同步完成，任务取消不会留下半程状态。
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    transient_failures: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让接下来 `count` 次记票以瞬时故障失败。
    pub fn inject_transient_failures(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> Result<(), RepositoryError> {
        let injected = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            Err(RepositoryError::transient("注入的瞬时故障"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PollRepository for MemoryStore {
    async fn create(&self, poll: Poll) -> Result<Poll, RepositoryError> {
        let mut state = self.state.lock().await;
        state.polls.push(poll.clone());
        Ok(poll)
    }

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.polls.iter().find(|poll| poll.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Poll>, RepositoryError> {
        let state = self.state.lock().await;
        // 按插入顺序的倒序即创建时间倒序
        Ok(state.polls.iter().rev().cloned().collect())
    }

    async fn record_vote(&self, vote: &Vote) -> Result<Poll, RepositoryError> {
        // 故障在任何状态变更之前注入，与真实存储中事务回滚的效果一致
        self.take_injected_failure()?;

        let mut state = self.state.lock().await;
        let poll = state
            .polls
            .iter_mut()
            .find(|poll| poll.id == vote.poll_id)
            .ok_or(RepositoryError::NotFound)?;
        // 服务层已校验过下标，这里越界说明计票数据完整性出了问题
        poll.apply_vote(vote.option_index)
            .map_err(|err| RepositoryError::storage(err.to_string()))?;
        let updated = poll.clone();
        state.votes.push(vote.clone());
        Ok(updated)
    }
}

#[async_trait]
impl VoteRepository for MemoryStore {
    async fn list_by_voter(&self, voter_id: UserId) -> Result<Vec<Vote>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .iter()
            .rev()
            .filter(|vote| vote.voter.user_id() == Some(voter_id))
            .cloned()
            .collect())
    }

    async fn count_for_poll(&self, poll_id: PollId) -> Result<u64, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .iter()
            .filter(|vote| vote.poll_id == poll_id)
            .count() as u64)
    }
}

/// 用户的内存存储。
#[derive(Default)]
pub struct MemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().await;
        if users.iter().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::conflict("邮箱已存在"));
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|user| user.email == email).cloned())
    }
}
