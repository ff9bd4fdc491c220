use std::sync::Arc;

use application::{PollService, UserService};
use infrastructure::SubscriptionRegistry;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub poll_service: Arc<PollService>,
    pub user_service: Arc<UserService>,
    /// WebSocket 订阅注册表，与记账引擎共用同一实例
    pub registry: Arc<SubscriptionRegistry>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        poll_service: Arc<PollService>,
        user_service: Arc<UserService>,
        registry: Arc<SubscriptionRegistry>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            poll_service,
            user_service,
            registry,
            jwt_service,
        }
    }
}
