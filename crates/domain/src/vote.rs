use crate::identity::Identity;
use crate::value_objects::{PollId, Timestamp, VoteId};

/// 选票：台账中的一条只追加记录。
///
/// 每次被接受的投票请求恰好生成一条选票，生成后不再修改或删除。
/// 同一身份对同一投票重复投票是允许的。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub poll_id: PollId,
    pub voter: Identity,
    pub option_index: usize,
    pub created_at: Timestamp,
}

impl Vote {
    /// 组装一条选票；`option_index` 必须已对目标投票校验通过。
    pub fn new(
        id: VoteId,
        poll_id: PollId,
        voter: Identity,
        option_index: usize,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            poll_id,
            voter,
            option_index,
            created_at,
        }
    }
}
