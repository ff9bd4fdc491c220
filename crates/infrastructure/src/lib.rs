//! 基础设施层
//!
//! 提供应用层端口的具体适配器：PostgreSQL 仓储、内存仓储（测试用）、
//! bcrypt 密码哈希以及 WebSocket 快照订阅注册表。

pub mod broadcast;
pub mod memory;
pub mod password;
pub mod repository;

pub use broadcast::SubscriptionRegistry;
pub use memory::{MemoryStore, MemoryUserRepository};
pub use password::BcryptPasswordHasher;
pub use repository::{create_pg_pool, PgPollRepository, PgStorage, PgUserRepository, PgVoteRepository};
