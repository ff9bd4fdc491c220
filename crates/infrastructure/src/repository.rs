//! PostgreSQL 仓储实现
//!
//! 记票走单事务原语：同一事务内追加选票台账并更新选项计票，
//! 失败的尝试不留任何持久化痕迹，重试不会重复计票。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use application::{PollRepository, UserRepository, VoteRepository};
use async_trait::async_trait;
use config::DatabaseConfig;
use domain::{
    Identity, PasswordHash, Poll, PollId, PollOption, RepositoryError, Timestamp, User, UserEmail,
    UserId, Vote, VoteId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// 区分可重试与不可重试的数据库错误。
/// 连接层故障（IO、取连接超时、连接池关闭）重试可能成功，
/// 唯一约束冲突与其余错误重试也不会改变结果。
fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            RepositoryError::conflict(db_err.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            RepositoryError::transient(err.to_string())
        }
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct PollRecord {
    id: Uuid,
    question: String,
    created_by: Option<Uuid>,
    created_at: Timestamp,
}

#[derive(Debug, FromRow)]
struct OptionRecord {
    poll_id: Uuid,
    option_index: i32,
    text: String,
    votes: i64,
}

#[derive(Debug, FromRow)]
struct VoteRecord {
    id: Uuid,
    poll_id: Uuid,
    user_id: Option<Uuid>,
    option_index: i32,
    created_at: Timestamp,
}

impl TryFrom<VoteRecord> for Vote {
    type Error = RepositoryError;

    fn try_from(value: VoteRecord) -> Result<Self, Self::Error> {
        let option_index = usize::try_from(value.option_index)
            .map_err(|_| invalid_data("选票的选项下标为负，台账数据已损坏"))?;
        Ok(Vote::new(
            VoteId::from(value.id),
            PollId::from(value.poll_id),
            Identity::from_optional_uuid(value.user_id),
            option_index,
            value.created_at,
        ))
    }
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    password_hash: String,
    created_at: Timestamp,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let email = UserEmail::parse(value.email).map_err(|err| invalid_data(err.to_string()))?;
        let password_hash =
            PasswordHash::new(value.password_hash).map_err(|err| invalid_data(err.to_string()))?;
        Ok(User {
            id: UserId::from(value.id),
            email,
            password_hash,
            created_at: value.created_at,
        })
    }
}

/// 把投票主行和选项行装配成领域对象。选项行须已按下标升序排列。
fn assemble_poll(record: PollRecord, option_rows: Vec<OptionRecord>) -> Result<Poll, RepositoryError> {
    let mut options = Vec::with_capacity(option_rows.len());
    for row in option_rows {
        let votes = u64::try_from(row.votes)
            .map_err(|_| invalid_data("选项票数为负，计票数据已损坏"))?;
        options.push(PollOption {
            text: row.text,
            votes,
        });
    }
    Ok(Poll {
        id: PollId::from(record.id),
        question: record.question,
        options,
        created_by: Identity::from_optional_uuid(record.created_by),
        created_at: record.created_at,
    })
}

/// 在同一连接（或事务）上读取投票及其全部选项。
async fn fetch_poll(conn: &mut PgConnection, id: PollId) -> Result<Option<Poll>, RepositoryError> {
    let record = sqlx::query_as::<_, PollRecord>(
        r#"SELECT id, question, created_by, created_at FROM polls WHERE id = $1"#,
    )
    .bind(Uuid::from(id))
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    let Some(record) = record else {
        return Ok(None);
    };

    let option_rows = sqlx::query_as::<_, OptionRecord>(
        r#"
        SELECT poll_id, option_index, text, votes
        FROM poll_options
        WHERE poll_id = $1
        ORDER BY option_index
        "#,
    )
    .bind(Uuid::from(id))
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_err)?;

    assemble_poll(record, option_rows).map(Some)
}

#[derive(Clone)]
pub struct PgPollRepository {
    pool: PgPool,
}

impl PgPollRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PollRepository for PgPollRepository {
    async fn create(&self, poll: Poll) -> Result<Poll, RepositoryError> {
        // 投票主行与选项行必须同时落库
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        sqlx::query(
            r#"INSERT INTO polls (id, question, created_by, created_at) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(Uuid::from(poll.id))
        .bind(&poll.question)
        .bind(poll.created_by.to_optional_uuid())
        .bind(poll.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        for (index, option) in poll.options.iter().enumerate() {
            sqlx::query(
                r#"INSERT INTO poll_options (poll_id, option_index, text, votes) VALUES ($1, $2, $3, $4)"#,
            )
            .bind(Uuid::from(poll.id))
            .bind(index as i32)
            .bind(&option.text)
            .bind(option.votes as i64)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(poll)
    }

    async fn find_by_id(&self, id: PollId) -> Result<Option<Poll>, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;
        fetch_poll(&mut conn, id).await
    }

    async fn list_all(&self) -> Result<Vec<Poll>, RepositoryError> {
        let poll_rows = sqlx::query_as::<_, PollRecord>(
            r#"SELECT id, question, created_by, created_at FROM polls ORDER BY created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let option_rows = sqlx::query_as::<_, OptionRecord>(
            r#"SELECT poll_id, option_index, text, votes FROM poll_options ORDER BY poll_id, option_index"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let mut grouped: HashMap<Uuid, Vec<OptionRecord>> = HashMap::new();
        for row in option_rows {
            grouped.entry(row.poll_id).or_default().push(row);
        }

        let mut polls = Vec::with_capacity(poll_rows.len());
        for record in poll_rows {
            let options = grouped.remove(&record.id).unwrap_or_default();
            polls.push(assemble_poll(record, options)?);
        }
        Ok(polls)
    }

    async fn record_vote(&self, vote: &Vote) -> Result<Poll, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        sqlx::query(
            r#"
            INSERT INTO votes (id, poll_id, user_id, option_index, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(vote.id))
        .bind(Uuid::from(vote.poll_id))
        .bind(vote.voter.to_optional_uuid())
        .bind(vote.option_index as i32)
        .bind(vote.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        let updated = sqlx::query(
            r#"UPDATE poll_options SET votes = votes + 1 WHERE poll_id = $1 AND option_index = $2"#,
        )
        .bind(Uuid::from(vote.poll_id))
        .bind(vote.option_index as i32)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;
        if updated.rows_affected() != 1 {
            // 服务层已校验过下标，走到这里说明投票或选项行缺失
            return Err(RepositoryError::NotFound);
        }

        let poll = fetch_poll(&mut tx, vote.poll_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        // 提交阶段的失败结果不明（事务可能已生效），按不可重试处理
        tx.commit()
            .await
            .map_err(|err| RepositoryError::storage(err.to_string()))?;

        Ok(poll)
    }
}

#[derive(Clone)]
pub struct PgVoteRepository {
    pool: PgPool,
}

impl PgVoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteRepository for PgVoteRepository {
    async fn list_by_voter(&self, voter_id: UserId) -> Result<Vec<Vote>, RepositoryError> {
        let records = sqlx::query_as::<_, VoteRecord>(
            r#"
            SELECT id, poll_id, user_id, option_index, created_at
            FROM votes
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(Uuid::from(voter_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Vote::try_from).collect()
    }

    async fn count_for_poll(&self, poll_id: PollId) -> Result<u64, RepositoryError> {
        let count =
            sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM votes WHERE poll_id = $1"#)
                .bind(Uuid::from(poll_id))
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(count as u64)
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(Uuid::from(user.id))
        .bind(user.email.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, email, password_hash, created_at FROM users WHERE email = $1"#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }
}

/// PostgreSQL 仓储的一站式装配。
#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub poll_repository: Arc<PgPollRepository>,
    pub vote_repository: Arc<PgVoteRepository>,
    pub user_repository: Arc<PgUserRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            poll_repository: Arc::new(PgPollRepository::new(pool.clone())),
            vote_repository: Arc::new(PgVoteRepository::new(pool.clone())),
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(settings: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_seconds))
        .connect(&settings.url)
        .await
}
