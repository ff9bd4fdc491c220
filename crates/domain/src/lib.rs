//! 投票系统核心领域模型
//!
//! 包含投票、选票、用户等核心实体，以及身份与校验规则。

pub mod errors;
pub mod identity;
pub mod poll;
pub mod user;
pub mod value_objects;
pub mod vote;

// 重新导出常用类型
pub use errors::*;
pub use identity::*;
pub use poll::*;
pub use user::*;
pub use value_objects::*;
pub use vote::*;
