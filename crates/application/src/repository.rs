use async_trait::async_trait;
use domain::{Poll, PollId, RepositoryError, User, UserEmail, UserId, Vote};

/// 投票存储。票数字段只允许经由 `record_vote` 变更。
#[async_trait]
pub trait PollRepository: Send + Sync {
    async fn create(&self, poll: Poll) -> Result<Poll, RepositoryError>;

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError>;

    /// 按创建时间倒序返回全部投票。
    async fn list_all(&self) -> Result<Vec<Poll>, RepositoryError>;

    /// 原子记票：在同一个事务里追加选票并把对应选项票数加一，
    /// 返回更新后的投票。要么全部生效要么全部回滚，失败的尝试
    /// 不留任何持久化痕迹，因此对瞬时故障重试不会重复计票。
    async fn record_vote(&self, vote: &Vote) -> Result<Poll, RepositoryError>;
}

/// 选票台账，只追加。
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// 按投票时间倒序返回某用户的全部选票。
    async fn list_by_voter(&self, voter_id: UserId) -> Result<Vec<Vote>, RepositoryError>;

    /// 台账中引用某投票的选票总数，用于审计与一致性校验。
    async fn count_for_poll(&self, poll_id: PollId) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User, RepositoryError>;

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError>;
}
