use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use application::services::{
    AuthenticateUserRequest, CastVoteRequest, CreatePollRequest, RegisterUserRequest,
};
use application::{PollSnapshot, VoteHistoryEntry};

use crate::{auth::TokenResponse, error::ApiError, state::AppState, websocket::websocket_upgrade};

#[derive(Debug, Deserialize)]
struct SignupPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreatePollPayload {
    question: String,
    options: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CastVotePayload {
    option_index: i64,
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(cors_origins))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/polls", post(create_poll).get(list_polls))
        .route("/polls/{poll_id}", get(get_poll))
        .route("/polls/{poll_id}/vote", post(cast_vote))
        .route("/me/votes", get(my_votes))
        .route("/ws", get(websocket_upgrade))
}

fn build_cors(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupPayload>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let user = state
        .user_service
        .register(RegisterUserRequest {
            email: payload.email,
            password: payload.password,
        })
        .await?;
    let token = state.jwt_service.generate_token(user.id)?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .user_service
        .authenticate(AuthenticateUserRequest {
            email: payload.email,
            password: payload.password,
        })
        .await?;
    let token = state.jwt_service.generate_token(user.id)?;

    Ok(Json(TokenResponse { token }))
}

async fn create_poll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePollPayload>,
) -> Result<(StatusCode, Json<PollSnapshot>), ApiError> {
    // 创建者可以匿名，带了令牌就记下创建人
    let creator = state.jwt_service.identity_from_headers(&headers)?;
    let snapshot = state
        .poll_service
        .create_poll(CreatePollRequest {
            question: payload.question,
            options: payload.options,
            creator,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn list_polls(
    State(state): State<AppState>,
) -> Result<Json<Vec<PollSnapshot>>, ApiError> {
    let snapshots = state.poll_service.list_polls().await?;
    Ok(Json(snapshots))
}

async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<Json<PollSnapshot>, ApiError> {
    let snapshot = state.poll_service.get_poll(poll_id).await?;
    Ok(Json(snapshot))
}

async fn cast_vote(
    State(state): State<AppState>,
    Path(poll_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<CastVotePayload>,
) -> Result<Json<PollSnapshot>, ApiError> {
    let voter = state.jwt_service.identity_from_headers(&headers)?;
    let snapshot = state
        .poll_service
        .cast_vote(CastVoteRequest {
            poll_id,
            option_index: payload.option_index,
            voter,
        })
        .await?;

    Ok(Json(snapshot))
}

async fn my_votes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<VoteHistoryEntry>>, ApiError> {
    let user_id = state.jwt_service.require_user_from_headers(&headers)?;
    let entries = state
        .poll_service
        .list_votes_for_user(Uuid::from(user_id))
        .await?;

    Ok(Json(entries))
}
