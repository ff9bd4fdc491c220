use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use domain::{DomainError, Identity, Poll, PollId, UserId, Vote, VoteId};
use uuid::Uuid;

use crate::{
    broadcaster::SnapshotBroadcaster,
    clock::Clock,
    dto::{PollSnapshot, VoteHistoryEntry},
    error::ApplicationError,
    poll_locks::PollLockRegistry,
    repository::{PollRepository, VoteRepository},
};

/// 单次记票对瞬时存储故障的最大尝试次数（含首次）。
const MAX_RECORD_ATTEMPTS: u32 = 3;

/// 两次尝试之间的退避间隔。
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<String>,
    pub creator: Identity,
}

#[derive(Debug, Clone)]
pub struct CastVoteRequest {
    pub poll_id: Uuid,
    // 用 i64 承接下标，负数也要进入引擎统一报 InvalidArgument
    pub option_index: i64,
    pub voter: Identity,
}

pub struct PollServiceDependencies {
    pub poll_repository: Arc<dyn PollRepository>,
    pub vote_repository: Arc<dyn VoteRepository>,
    pub broadcaster: Arc<dyn SnapshotBroadcaster>,
    pub clock: Arc<dyn Clock>,
}

/// 记账引擎：校验、记票、产出快照、触发推送。
pub struct PollService {
    deps: PollServiceDependencies,
    locks: PollLockRegistry,
}

impl PollService {
    pub fn new(deps: PollServiceDependencies) -> Self {
        Self {
            deps,
            locks: PollLockRegistry::new(),
        }
    }

    pub async fn create_poll(
        &self,
        request: CreatePollRequest,
    ) -> Result<PollSnapshot, ApplicationError> {
        let now = self.deps.clock.now();
        let poll = Poll::new(
            PollId::from(Uuid::new_v4()),
            request.question,
            request.options,
            request.creator,
            now,
        )?;

        let stored = self.deps.poll_repository.create(poll).await?;
        Ok(PollSnapshot::from(&stored))
    }

    pub async fn get_poll(&self, poll_id: Uuid) -> Result<PollSnapshot, ApplicationError> {
        let poll = self
            .deps
            .poll_repository
            .find_by_id(PollId::from(poll_id))
            .await?
            .ok_or(DomainError::PollNotFound)?;
        Ok(PollSnapshot::from(&poll))
    }

    pub async fn list_polls(&self) -> Result<Vec<PollSnapshot>, ApplicationError> {
        let polls = self.deps.poll_repository.list_all().await?;
        Ok(polls.iter().map(PollSnapshot::from).collect())
    }

    pub async fn cast_vote(
        &self,
        request: CastVoteRequest,
    ) -> Result<PollSnapshot, ApplicationError> {
        let poll_id = PollId::from(request.poll_id);

        // 同一投票串行，不同投票并行。锁一直覆盖到推送完成，
        // 保证单个连接收到的同一投票快照票数单调不减。
        let _guard = self.locks.acquire(poll_id).await;

        let poll = self
            .deps
            .poll_repository
            .find_by_id(poll_id)
            .await?
            .ok_or(DomainError::PollNotFound)?;
        let option_index = poll.checked_option_index(request.option_index)?;

        let now = self.deps.clock.now();
        let vote = Vote::new(
            VoteId::from(Uuid::new_v4()),
            poll_id,
            request.voter,
            option_index,
            now,
        );

        let updated = self.record_with_retry(&vote).await?;
        let snapshot = PollSnapshot::from(&updated);

        // 选票已经落库，推送失败只记录日志，不影响本次投票结果
        if let Err(broadcast_error) = self.deps.broadcaster.publish(poll_id, &snapshot).await {
            tracing::error!(
                poll_id = %poll_id,
                vote_id = %vote.id,
                error = %broadcast_error,
                "选票已提交，但快照推送失败"
            );
        }

        Ok(snapshot)
    }

    pub async fn list_votes_for_user(
        &self,
        voter_id: Uuid,
    ) -> Result<Vec<VoteHistoryEntry>, ApplicationError> {
        let votes = self
            .deps
            .vote_repository
            .list_by_voter(UserId::from(voter_id))
            .await?;

        // 同一投票只查一次，解析失败降级为占位值而不是报错
        let mut polls: HashMap<PollId, Option<Poll>> = HashMap::new();
        for vote in &votes {
            if let std::collections::hash_map::Entry::Vacant(entry) = polls.entry(vote.poll_id) {
                let poll = self.deps.poll_repository.find_by_id(vote.poll_id).await?;
                entry.insert(poll);
            }
        }

        Ok(votes
            .iter()
            .map(|vote| {
                VoteHistoryEntry::resolve(vote, polls.get(&vote.poll_id).and_then(Option::as_ref))
            })
            .collect())
    }

    /// 对瞬时存储故障做有限重试；其余错误原样向上传播。
    async fn record_with_retry(&self, vote: &Vote) -> Result<Poll, ApplicationError> {
        let mut attempt = 1;
        loop {
            match self.deps.poll_repository.record_vote(vote).await {
                Ok(poll) => return Ok(poll),
                Err(err) if err.is_transient() && attempt < MAX_RECORD_ATTEMPTS => {
                    tracing::warn!(
                        poll_id = %vote.poll_id,
                        attempt,
                        error = %err,
                        "记票遇到瞬时故障，准备重试"
                    );
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use domain::RepositoryError;

    use super::*;
    use crate::broadcaster::BroadcastError;
    use crate::clock::SystemClock;

    #[derive(Default)]
    struct StoreState {
        polls: Vec<Poll>,
        votes: Vec<Vote>,
    }

    /// 内存存储桩：单把锁下同步变更，带瞬时故障注入。
    #[derive(Default)]
    struct InMemoryStore {
        state: Mutex<StoreState>,
        transient_failures: AtomicU32,
    }

    impl InMemoryStore {
        fn fail_next(&self, times: u32) {
            self.transient_failures.store(times, Ordering::SeqCst);
        }

        fn push_vote(&self, vote: Vote) {
            self.state.lock().unwrap().votes.push(vote);
        }

        fn tally(&self, poll_id: PollId) -> Vec<u64> {
            let state = self.state.lock().unwrap();
            state
                .polls
                .iter()
                .find(|poll| poll.id == poll_id)
                .map(|poll| poll.options.iter().map(|o| o.votes).collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl PollRepository for InMemoryStore {
        async fn create(&self, poll: Poll) -> Result<Poll, RepositoryError> {
            self.state.lock().unwrap().polls.push(poll.clone());
            Ok(poll)
        }

        async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
            let state = self.state.lock().unwrap();
            Ok(state.polls.iter().find(|poll| poll.id == id).cloned())
        }

        async fn list_all(&self) -> Result<Vec<Poll>, RepositoryError> {
            let state = self.state.lock().unwrap();
            Ok(state.polls.iter().rev().cloned().collect())
        }

        async fn record_vote(&self, vote: &Vote) -> Result<Poll, RepositoryError> {
            let remaining = self.transient_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.transient_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(RepositoryError::transient("injected failure"));
            }

            let mut state = self.state.lock().unwrap();
            let poll = state
                .polls
                .iter_mut()
                .find(|poll| poll.id == vote.poll_id)
                .ok_or(RepositoryError::NotFound)?;
            poll.apply_vote(vote.option_index)
                .map_err(|err| RepositoryError::storage(err.to_string()))?;
            let updated = poll.clone();
            state.votes.push(vote.clone());
            Ok(updated)
        }
    }

    #[async_trait]
    impl VoteRepository for InMemoryStore {
        async fn list_by_voter(&self, voter_id: UserId) -> Result<Vec<Vote>, RepositoryError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .votes
                .iter()
                .rev()
                .filter(|vote| vote.voter.user_id() == Some(voter_id))
                .cloned()
                .collect())
        }

        async fn count_for_poll(&self, poll_id: PollId) -> Result<u64, RepositoryError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .votes
                .iter()
                .filter(|vote| vote.poll_id == poll_id)
                .count() as u64)
        }
    }

    #[derive(Default)]
    struct RecordingBroadcaster {
        published: Mutex<Vec<(PollId, PollSnapshot)>>,
    }

    #[async_trait]
    impl SnapshotBroadcaster for RecordingBroadcaster {
        async fn publish(
            &self,
            poll_id: PollId,
            snapshot: &PollSnapshot,
        ) -> Result<(), BroadcastError> {
            self.published
                .lock()
                .unwrap()
                .push((poll_id, snapshot.clone()));
            Ok(())
        }
    }

    struct FailingBroadcaster;

    #[async_trait]
    impl SnapshotBroadcaster for FailingBroadcaster {
        async fn publish(
            &self,
            _poll_id: PollId,
            _snapshot: &PollSnapshot,
        ) -> Result<(), BroadcastError> {
            Err(BroadcastError::failed("wire down"))
        }
    }

    struct TestHarness {
        service: PollService,
        store: Arc<InMemoryStore>,
        broadcaster: Arc<RecordingBroadcaster>,
    }

    fn harness() -> TestHarness {
        let store = Arc::new(InMemoryStore::default());
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let service = PollService::new(PollServiceDependencies {
            poll_repository: store.clone(),
            vote_repository: store.clone(),
            broadcaster: broadcaster.clone(),
            clock: Arc::new(SystemClock),
        });
        TestHarness {
            service,
            store,
            broadcaster,
        }
    }

    async fn create_sample_poll(service: &PollService) -> PollSnapshot {
        service
            .create_poll(CreatePollRequest {
                question: "Best color?".to_string(),
                options: vec!["Red".to_string(), "Blue".to_string()],
                creator: Identity::Anonymous,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_poll_validates_input() {
        let h = harness();

        let too_short = h
            .service
            .create_poll(CreatePollRequest {
                question: "ab".to_string(),
                options: vec!["x".to_string(), "y".to_string()],
                creator: Identity::Anonymous,
            })
            .await;
        assert!(matches!(
            too_short,
            Err(ApplicationError::Domain(DomainError::InvalidArgument { .. }))
        ));

        let one_option = h
            .service
            .create_poll(CreatePollRequest {
                question: "Pick one".to_string(),
                options: vec!["only-one".to_string()],
                creator: Identity::Anonymous,
            })
            .await;
        assert!(matches!(
            one_option,
            Err(ApplicationError::Domain(DomainError::InvalidArgument { .. }))
        ));

        let snapshot = create_sample_poll(&h.service).await;
        assert!(snapshot.options.iter().all(|option| option.votes == 0));
    }

    #[tokio::test]
    async fn test_cast_vote_updates_tally_and_ledger() {
        let h = harness();
        let poll = create_sample_poll(&h.service).await;

        let snapshot = h
            .service
            .cast_vote(CastVoteRequest {
                poll_id: poll.id.into(),
                option_index: 1,
                voter: Identity::Anonymous,
            })
            .await
            .unwrap();

        assert_eq!(snapshot.options[0].votes, 0);
        assert_eq!(snapshot.options[1].votes, 1);
        assert_eq!(h.store.tally(poll.id), vec![0, 1]);
        assert_eq!(h.store.count_for_poll(poll.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cast_vote_rejects_bad_indices() {
        let h = harness();
        let poll = create_sample_poll(&h.service).await;

        for bad_index in [-1_i64, 2, 99] {
            let result = h
                .service
                .cast_vote(CastVoteRequest {
                    poll_id: poll.id.into(),
                    option_index: bad_index,
                    voter: Identity::Anonymous,
                })
                .await;
            assert!(matches!(
                result,
                Err(ApplicationError::Domain(DomainError::InvalidArgument { .. }))
            ));
        }

        // 校验失败不得留下任何痕迹
        assert_eq!(h.store.tally(poll.id), vec![0, 0]);
        assert_eq!(h.store.count_for_poll(poll.id).await.unwrap(), 0);
        assert!(h.broadcaster.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_poll_fails_not_found() {
        let h = harness();

        let get = h.service.get_poll(Uuid::new_v4()).await;
        assert!(matches!(
            get,
            Err(ApplicationError::Domain(DomainError::PollNotFound))
        ));

        let cast = h
            .service
            .cast_vote(CastVoteRequest {
                poll_id: Uuid::new_v4(),
                option_index: 0,
                voter: Identity::Anonymous,
            })
            .await;
        assert!(matches!(
            cast,
            Err(ApplicationError::Domain(DomainError::PollNotFound))
        ));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let h = harness();
        let poll = create_sample_poll(&h.service).await;

        // 预算内：前两次失败，第三次成功，票数恰好加一
        h.store.fail_next(2);
        let snapshot = h
            .service
            .cast_vote(CastVoteRequest {
                poll_id: poll.id.into(),
                option_index: 0,
                voter: Identity::Anonymous,
            })
            .await
            .unwrap();
        assert_eq!(snapshot.options[0].votes, 1);
        assert_eq!(h.store.count_for_poll(poll.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_exhaustion_surfaces_transient_error() {
        let h = harness();
        let poll = create_sample_poll(&h.service).await;

        h.store.fail_next(MAX_RECORD_ATTEMPTS);
        let result = h
            .service
            .cast_vote(CastVoteRequest {
                poll_id: poll.id.into(),
                option_index: 0,
                voter: Identity::Anonymous,
            })
            .await;

        assert!(matches!(
            result,
            Err(ApplicationError::Repository(RepositoryError::Transient(_)))
        ));
        // 预算耗尽后不得有半套效果
        assert_eq!(h.store.tally(poll.id), vec![0, 0]);
        assert_eq!(h.store.count_for_poll(poll.id).await.unwrap(), 0);
        assert!(h.broadcaster.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_published_snapshots_follow_commit_order() {
        let h = harness();
        let poll = create_sample_poll(&h.service).await;

        for index in [0_i64, 1, 1] {
            h.service
                .cast_vote(CastVoteRequest {
                    poll_id: poll.id.into(),
                    option_index: index,
                    voter: Identity::Anonymous,
                })
                .await
                .unwrap();
        }

        let published = h.broadcaster.published.lock().unwrap();
        assert_eq!(published.len(), 3);
        let totals: Vec<u64> = published
            .iter()
            .map(|(_, snapshot)| snapshot.options.iter().map(|o| o.votes).sum())
            .collect();
        assert_eq!(totals, vec![1, 2, 3]);
        assert!(published.iter().all(|(id, _)| *id == poll.id));
    }

    #[tokio::test]
    async fn test_broadcast_failure_does_not_fail_the_vote() {
        let store = Arc::new(InMemoryStore::default());
        let service = PollService::new(PollServiceDependencies {
            poll_repository: store.clone(),
            vote_repository: store.clone(),
            broadcaster: Arc::new(FailingBroadcaster),
            clock: Arc::new(SystemClock),
        });
        let poll = create_sample_poll(&service).await;

        let snapshot = service
            .cast_vote(CastVoteRequest {
                poll_id: poll.id.into(),
                option_index: 0,
                voter: Identity::Anonymous,
            })
            .await
            .unwrap();

        assert_eq!(snapshot.options[0].votes, 1);
        assert_eq!(store.count_for_poll(poll.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_polls_newest_first() {
        let h = harness();
        for question in ["First poll", "Second poll", "Third poll"] {
            h.service
                .create_poll(CreatePollRequest {
                    question: question.to_string(),
                    options: vec!["A".to_string(), "B".to_string()],
                    creator: Identity::Anonymous,
                })
                .await
                .unwrap();
        }

        let polls = h.service.list_polls().await.unwrap();
        let questions: Vec<&str> = polls.iter().map(|p| p.question.as_str()).collect();
        assert_eq!(questions, vec!["Third poll", "Second poll", "First poll"]);
    }

    #[tokio::test]
    async fn test_vote_history_resolution() {
        let h = harness();
        let voter_id = Uuid::new_v4();
        let voter = Identity::Verified(UserId::from(voter_id));

        let first = create_sample_poll(&h.service).await;
        let second = h
            .service
            .create_poll(CreatePollRequest {
                question: "Tabs or spaces?".to_string(),
                options: vec!["Tabs".to_string(), "Spaces".to_string()],
                creator: voter,
            })
            .await
            .unwrap();

        h.service
            .cast_vote(CastVoteRequest {
                poll_id: first.id.into(),
                option_index: 1,
                voter,
            })
            .await
            .unwrap();
        h.service
            .cast_vote(CastVoteRequest {
                poll_id: second.id.into(),
                option_index: 0,
                voter,
            })
            .await
            .unwrap();

        // 台账里的孤儿选票：对应投票已无法解析
        h.store.push_vote(Vote::new(
            VoteId::new(Uuid::new_v4()),
            PollId::new(Uuid::new_v4()),
            voter,
            0,
            chrono::Utc::now(),
        ));

        let history = h.service.list_votes_for_user(voter_id).await.unwrap();
        assert_eq!(history.len(), 3);

        // 最近的在最前
        assert_eq!(history[0].question, "Unknown");
        assert_eq!(history[0].option_text, "");
        assert_eq!(history[1].question, "Tabs or spaces?");
        assert_eq!(history[1].option_text, "Tabs");
        assert_eq!(history[2].question, "Best color?");
        assert_eq!(history[2].option_text, "Blue");

        // 匿名选票不会进入任何用户的历史
        let other = h.service.list_votes_for_user(Uuid::new_v4()).await.unwrap();
        assert!(other.is_empty());
    }
}
