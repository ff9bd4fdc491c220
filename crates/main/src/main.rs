//! 主应用程序入口
//!
//! 启动投票服务的 Axum Web API。

use std::sync::Arc;

use application::{
    PollService, PollServiceDependencies, SystemClock, UserService, UserServiceDependencies,
};
use config::AppConfig;
use infrastructure::{create_pg_pool, BcryptPasswordHasher, PgStorage, SubscriptionRegistry};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 加载配置（默认值 < 配置文件 < APP_ 环境变量）
    let config = AppConfig::load()?;
    tracing::info!(config = %config.sanitize(), "配置加载完成");

    // 建立连接池并运行迁移
    let pg_pool = create_pg_pool(&config.database).await?;
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let storage = PgStorage::new(pg_pool);

    // 订阅注册表同时充当快照广播器
    let registry = Arc::new(SubscriptionRegistry::new());
    let password_hasher: Arc<dyn application::PasswordHasher> =
        Arc::new(BcryptPasswordHasher::default());
    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock::default());

    // 创建应用层服务
    let poll_service = Arc::new(PollService::new(PollServiceDependencies {
        poll_repository: storage.poll_repository.clone(),
        vote_repository: storage.vote_repository.clone(),
        broadcaster: registry.clone(),
        clock: clock.clone(),
    }));
    let user_service = Arc::new(UserService::new(UserServiceDependencies {
        user_repository: storage.user_repository.clone(),
        password_hasher,
        clock,
    }));
    let jwt_service = Arc::new(JwtService::new(&config.auth));

    let state = AppState::new(poll_service, user_service, registry, jwt_service);

    // 启动 Web 服务器
    let app = router(state, &config.server.cors_origins);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("投票服务器启动在 http://{}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// 等待 ctrl-c 或 SIGTERM。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "监听 ctrl-c 失败");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "监听 SIGTERM 失败"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("收到停机信号，开始优雅退出");
}
