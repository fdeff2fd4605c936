//! 认证网关主入口

use longevity_gateway::{
    auth::clock::SystemClock, config::AppConfig, db, handlers::health, middleware::AppState,
    routes, telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let mut flush_only = false;
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("longevity-gateway {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            "--flush-expired-tokens" => flush_only = true,
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(env) = std::env::var("LONGEVITY_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Longevity gateway starting...");

    // 内存存储没有可清理的记录
    if flush_only {
        config.require_database("--flush-expired-tokens")?;
    }

    // 3. 存储：配置了数据库则使用 PostgreSQL，否则使用内存存储
    let clock = Arc::new(SystemClock);
    let app_state = if config.uses_database() {
        let db_pool = db::create_pool(&config.database).await?;
        db::run_migrations(&db_pool).await?;
        tracing::info!("Database initialized");

        AppState::with_postgres(config.clone(), db_pool, clock)?
    } else {
        tracing::warn!("database.url not set, using in-memory storage; data is lost on restart");
        AppState::in_memory(config.clone(), clock)?
    };

    // 一次性维护命令：清理过期的黑名单记录
    if flush_only {
        let purged = app_state.auth_service.flush_expired_tokens().await?;
        println!("Flushed {} expired blacklist entries", purged);
        return Ok(());
    }

    // 4. 构建路由
    let app = routes::create_router(Arc::new(app_state));

    // 5. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 6. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
///
/// 收到信号后开始排空连接；超时后强制退出进程
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("longevity-gateway {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: longevity-gateway [选项]");
    println!();
    println!("选项:");
    println!("  --version               打印版本信息并退出");
    println!("  --help                  打印此帮助信息并退出");
    println!("  --flush-expired-tokens  清理过期的令牌黑名单记录并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 LONGEVITY_ 前缀的环境变量完成");
    println!("  例如 LONGEVITY_SECURITY__JWT_SECRET、LONGEVITY_DATABASE__URL");
}
