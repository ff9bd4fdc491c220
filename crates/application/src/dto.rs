//! 对外数据传输对象。
//!
//! `get_poll`、`cast_vote` 的响应与 WebSocket 推送共用 `PollSnapshot`，
//! 由同一个序列化器产出，三处字节级一致，客户端无法区分拉取与推送。

use domain::{Poll, PollId, Timestamp, Vote};
use serde::{Deserialize, Serialize};

/// 投票快照：问题、选项与当前票数的只读视图。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub id: PollId,
    pub question: String,
    pub options: Vec<OptionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSnapshot {
    pub text: String,
    pub votes: u64,
}

impl From<&Poll> for PollSnapshot {
    fn from(poll: &Poll) -> Self {
        Self {
            id: poll.id,
            question: poll.question.clone(),
            options: poll
                .options
                .iter()
                .map(|option| OptionSnapshot {
                    text: option.text.clone(),
                    votes: option.votes,
                })
                .collect(),
        }
    }
}

/// 用户投票历史中的一条记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteHistoryEntry {
    pub poll_id: PollId,
    pub question: String,
    pub option_index: usize,
    pub option_text: String,
    pub created_at: Timestamp,
}

impl VoteHistoryEntry {
    /// 以当前投票内容解析一条选票。
    ///
    /// 投票解析不到时问题降级为 "Unknown"，选项下标越界时选项文本降级
    /// 为空串；历史查询绝不因解析失败而报错。
    pub fn resolve(vote: &Vote, poll: Option<&Poll>) -> Self {
        let question = poll
            .map(|poll| poll.question.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let option_text = poll
            .and_then(|poll| poll.options.get(vote.option_index))
            .map(|option| option.text.clone())
            .unwrap_or_default();
        Self {
            poll_id: vote.poll_id,
            question,
            option_index: vote.option_index,
            option_text,
            created_at: vote.created_at,
        }
    }
}
