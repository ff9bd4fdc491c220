use crate::errors::DomainError;
use crate::identity::Identity;
use crate::value_objects::{PollId, Timestamp};

/// 单个投票选项及其当前票数。
///
/// 选项顺序在创建后固定不变，选票通过位置下标引用选项。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PollOption {
    pub text: String,
    pub votes: u64,
}

/// 投票实体。
///
/// 不变量：每个选项的 `votes` 等于台账中引用该投票、该选项下标的选票数量。
/// 选项创建后不增、不删、不重排。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub created_by: Identity,
    pub created_at: Timestamp,
}

impl Poll {
    pub fn new(
        id: PollId,
        question: impl Into<String>,
        options: Vec<String>,
        created_by: Identity,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let question = Self::validate_question(question.into())?;
        let options = Self::normalize_options(options)?;
        Ok(Self {
            id,
            question,
            options,
            created_by,
            created_at,
        })
    }

    /// 校验选票下标并转换为内部下标类型。
    ///
    /// 入参用 i64 以便负数下标也能走到这里统一报错，而不是在解析层被拦截。
    pub fn checked_option_index(&self, index: i64) -> Result<usize, DomainError> {
        let idx = usize::try_from(index)
            .map_err(|_| DomainError::invalid_argument("option_index", "out of range"))?;
        if idx >= self.options.len() {
            return Err(DomainError::invalid_argument("option_index", "out of range"));
        }
        Ok(idx)
    }

    /// 指定选项票数加一。
    pub fn apply_vote(&mut self, option_index: usize) -> Result<(), DomainError> {
        match self.options.get_mut(option_index) {
            Some(option) => {
                option.votes += 1;
                Ok(())
            }
            None => Err(DomainError::invalid_argument(
                "option_index",
                "out of range",
            )),
        }
    }

    /// 所有选项票数之和。
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|option| option.votes).sum()
    }

    fn validate_question(question: String) -> Result<String, DomainError> {
        let trimmed = question.trim();
        if trimmed.chars().count() < 3 {
            return Err(DomainError::invalid_argument(
                "question",
                "must be at least 3 characters",
            ));
        }
        Ok(trimmed.to_owned())
    }

    fn normalize_options(options: Vec<String>) -> Result<Vec<PollOption>, DomainError> {
        let options: Vec<PollOption> = options
            .into_iter()
            .filter_map(|text| {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(PollOption {
                        text: trimmed.to_owned(),
                        votes: 0,
                    })
                }
            })
            .collect();
        if options.len() < 2 {
            return Err(DomainError::invalid_argument(
                "options",
                "at least 2 non-blank options are required",
            ));
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn new_poll(question: &str, options: &[&str]) -> Result<Poll, DomainError> {
        Poll::new(
            PollId::new(Uuid::new_v4()),
            question,
            options.iter().map(|s| s.to_string()).collect(),
            Identity::Anonymous,
            Utc::now(),
        )
    }

    #[test]
    fn test_poll_creation_starts_with_zero_tallies() {
        let poll = new_poll("Pick one", &["A", "B"]).unwrap();
        assert_eq!(poll.question, "Pick one");
        assert_eq!(poll.options.len(), 2);
        assert!(poll.options.iter().all(|o| o.votes == 0));
        assert_eq!(poll.total_votes(), 0);
    }

    #[test]
    fn test_question_validation() {
        // 两个字符不足三个
        assert!(new_poll("ab", &["x", "y"]).is_err());
        // 空白不计入长度
        assert!(new_poll("  ab  ", &["x", "y"]).is_err());
        assert!(new_poll("abc", &["x", "y"]).is_ok());
        // 非 ASCII 按字符计数
        assert!(new_poll("选什么", &["x", "y"]).is_ok());

        let poll = new_poll("  Best color?  ", &["Red", "Blue"]).unwrap();
        assert_eq!(poll.question, "Best color?");
    }

    #[test]
    fn test_blank_options_are_discarded() {
        let poll = new_poll("Pick one", &["A", "   ", "B", ""]).unwrap();
        assert_eq!(poll.options.len(), 2);
        assert_eq!(poll.options[0].text, "A");
        assert_eq!(poll.options[1].text, "B");

        // 丢弃空白后不足两个选项
        assert!(new_poll("Pick one", &["only-one"]).is_err());
        assert!(new_poll("Pick one", &["A", "   "]).is_err());
        assert!(new_poll("Pick one", &[]).is_err());
    }

    #[test]
    fn test_checked_option_index_bounds() {
        let poll = new_poll("Pick one", &["A", "B"]).unwrap();
        assert!(poll.checked_option_index(-1).is_err());
        assert!(poll.checked_option_index(2).is_err());
        assert_eq!(poll.checked_option_index(0).unwrap(), 0);
        assert_eq!(poll.checked_option_index(1).unwrap(), 1);
    }

    #[test]
    fn test_apply_vote_increments_exactly_one_option() {
        let mut poll = new_poll("Pick one", &["A", "B"]).unwrap();
        poll.apply_vote(1).unwrap();
        assert_eq!(poll.options[0].votes, 0);
        assert_eq!(poll.options[1].votes, 1);
        assert_eq!(poll.total_votes(), 1);

        assert!(poll.apply_vote(2).is_err());
        assert_eq!(poll.total_votes(), 1);
    }
}
