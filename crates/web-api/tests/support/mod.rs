//! 集成测试公共装配。
//!
//! 用内存仓储和订阅注册表拼出完整路由，不依赖外部数据库；
//! 密码哈希选低代价 bcrypt 以缩短测试时间。

use std::sync::Arc;

use application::{
    PollService, PollServiceDependencies, SystemClock, UserService, UserServiceDependencies,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use infrastructure::{
    BcryptPasswordHasher, MemoryStore, MemoryUserRepository, SubscriptionRegistry,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use web_api::{router, AppState, AuthConfig, JwtService};

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub fn build_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let users = Arc::new(MemoryUserRepository::new());
    let registry = Arc::new(SubscriptionRegistry::new());
    let clock = Arc::new(SystemClock);

    let poll_service = Arc::new(PollService::new(PollServiceDependencies {
        poll_repository: store.clone(),
        vote_repository: store.clone(),
        broadcaster: registry.clone(),
        clock: clock.clone(),
    }));
    let user_service = Arc::new(UserService::new(UserServiceDependencies {
        user_repository: users,
        password_hasher: Arc::new(BcryptPasswordHasher::with_cost(4)),
        clock,
    }));
    let jwt_service = Arc::new(JwtService::new(&AuthConfig {
        jwt_secret: "integration-test-secret-key-0123456789".to_string(),
        token_ttl_days: 30,
    }));

    let state = AppState::new(poll_service, user_service, registry, jwt_service);
    let cors_origins = vec!["*".to_string()];

    TestApp {
        router: router(state, &cors_origins),
        store,
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request build")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request build")
}

pub async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));
    (status, body)
}
