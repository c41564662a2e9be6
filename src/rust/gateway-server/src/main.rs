//! サーボ/IMU ゲートウェイ サーバー

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gateway_common::{configure, GatewayState, HalConnector, Settings, VERSION};

mod shutdown;

/// サーボ/IMU ゲートウェイ
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 設定ファイル（.json / .toml / .yaml）
    #[arg(short, long)]
    config: Option<String>,

    /// バインドするホストアドレス
    #[arg(long)]
    host: Option<String>,

    /// ポート番号
    #[arg(short, long)]
    port: Option<u16>,

    /// `ip` 未指定時の接続先デバイス
    #[arg(long)]
    default_ip: Option<String>,

    /// ログレベル設定 (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// コマンドライン引数で設定を上書き
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.server.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ip) = &self.default_ip {
            settings.device.default_ip = ip.clone();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = level.clone();
        }
    }
}

#[cfg(not(feature = "mock"))]
fn create_connector(settings: &Settings) -> Arc<dyn HalConnector> {
    info!("Using TCP HAL (default port {})", settings.device.hal_port);
    Arc::new(gateway_common::TcpHal::new(settings.device.hal_port))
}

#[cfg(feature = "mock")]
fn create_connector(_settings: &Settings) -> Arc<dyn HalConnector> {
    tracing::warn!("Using mock HAL, no hardware will be contacted");
    Arc::new(gateway_common::MockHal::default())
}

/// CORS設定（`*` なら全オリジンを許可）
fn build_cors(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .max_age(3600);

    if origins.iter().any(|o| o == "*") {
        cors.allow_any_origin()
    } else {
        origins.iter().fold(cors, |cors, origin| cors.allowed_origin(origin))
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 設定読み込み（デフォルト → ファイル → 環境変数 → 引数）
    let mut settings =
        Settings::new(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut settings);

    // ログ初期化（RUST_LOG が設定されていればそちらを優先）
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    // ビルド番号を取得
    const BUILD_NUMBER: &str = env!("BUILD_NUMBER");
    info!("servo gateway starting (version {}, build #{})", VERSION, BUILD_NUMBER);
    info!(
        "Built {} from {} for {}",
        env!("BUILD_TIME"),
        env!("GIT_HASH"),
        env!("BUILD_TARGET")
    );

    settings.validate().context("Invalid configuration")?;
    info!("Configuration validated successfully");
    info!(
        "Default device: {} (connect timeout {} ms, command timeout {} ms)",
        settings.device.default_ip,
        settings.device.connect_timeout_ms,
        settings.device.command_timeout_ms
    );

    let state = web::Data::new(GatewayState::new(create_connector(&settings), &settings));
    let cors_origins = settings.api.cors_origins.clone();
    let max_body_size = settings.api.max_body_size;

    let bind_address = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Starting HTTP server on {}", bind_address);

    // HTTPサーバー構築
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(max_body_size))
            .wrap(middleware::Logger::default())
            .wrap(build_cors(&cors_origins))
            .configure(configure)
    })
    .disable_signals();

    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();

    info!("Server running at http://{}", bind_address);

    // サーバーをグレースフルシャットダウンで実行
    let server_handle = server.handle();
    let shutdown_receiver = shutdown::setup_shutdown_handler();

    let shutdown_task = async move {
        shutdown_receiver.wait().await;
        info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
        info!("Server stopped");
    };

    // サーバーとシャットダウンタスクを並行実行
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e).context("HTTP server failed");
            }
        }
        _ = shutdown_task => {
            info!("Shutdown completed");
        }
    }

    Ok(())
}
