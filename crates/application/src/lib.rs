//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、事务边界、
//! 以及对外部适配器（例如密码哈希、快照推送）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod password;
pub mod poll_locks;
pub mod repository;
pub mod services;

pub use broadcaster::{BroadcastError, SnapshotBroadcaster};
pub use clock::{Clock, SystemClock};
pub use dto::{OptionSnapshot, PollSnapshot, VoteHistoryEntry};
pub use error::ApplicationError;
pub use password::{PasswordHasher, PasswordHasherError};
pub use poll_locks::PollLockRegistry;
pub use repository::{PollRepository, UserRepository, VoteRepository};
pub use services::{
    AuthenticateUserRequest, CastVoteRequest, CreatePollRequest, PollService,
    PollServiceDependencies, RegisterUserRequest, UserService, UserServiceDependencies,
};
