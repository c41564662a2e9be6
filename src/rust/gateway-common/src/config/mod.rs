//! 共通設定管理モジュール

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use crate::error::{GatewayError, Result};

/// サーバー設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// バインドするホストアドレス
    pub host: String,

    /// ポート番号
    pub port: u16,

    /// ワーカースレッド数
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

/// デバイス（HAL）設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// `ip` が省略された場合の接続先
    pub default_ip: String,

    /// HALのTCPポート（アドレスにポートが含まれない場合）
    pub hal_port: u16,

    /// 接続タイムアウト（ミリ秒、0で無効）
    pub connect_timeout_ms: u64,

    /// コマンドタイムアウト（ミリ秒、0で無効）
    pub command_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            default_ip: "192.168.1.1".to_string(),
            hal_port: 50051,
            connect_timeout_ms: 5000,
            command_timeout_ms: 10000,
        }
    }
}

impl DeviceConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.command_timeout_ms)
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// pingプローブ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PingConfig {
    /// 実行するpingコマンド
    pub program: String,

    /// 送信パケット数
    pub count: u32,

    /// プロセス全体のタイムアウト（秒）
    pub timeout_secs: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        PingConfig {
            program: "ping".to_string(),
            count: 1,
            timeout_secs: 5,
        }
    }
}

/// ロギング設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// ログレベル（`RUST_LOG` が優先）
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

/// API設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// CORS許可オリジン
    pub cors_origins: Vec<String>,

    /// 最大リクエストボディサイズ（バイト）
    pub max_body_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            cors_origins: vec!["*".to_string()],
            max_body_size: 256 * 1024,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// サーバー設定
    pub server: ServerConfig,

    /// デバイス設定
    pub device: DeviceConfig,

    /// ping設定
    pub ping: PingConfig,

    /// ロギング設定
    pub logging: LoggingConfig,

    /// API設定
    pub api: ApiConfig,
}

impl Settings {
    /// 設定を読み込む
    ///
    /// 読み込み優先順位：
    /// 1. 環境変数
    /// 2. 設定ファイル（`CONFIG_FILE` または引数で指定された場合）
    /// 3. デフォルト値
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(str::to_string)
            .or_else(|| env::var("CONFIG_FILE").ok());

        let mut settings = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        // 環境変数で上書き
        settings.override_from_env();

        Ok(settings)
    }

    /// 設定ファイルから読み込む
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_str_with_format(path, &content)
    }

    /// 拡張子で形式を判定してパースする
    fn from_str_with_format(path: &str, content: &str) -> Result<Self> {
        // JSON形式
        if path.ends_with(".json") {
            serde_json::from_str(content)
                .map_err(|e| GatewayError::Config(format!("Failed to parse JSON config: {}", e)))
        }
        // TOML形式
        else if path.ends_with(".toml") {
            toml::from_str(content)
                .map_err(|e| GatewayError::Config(format!("Failed to parse TOML config: {}", e)))
        }
        // YAML形式
        else if path.ends_with(".yaml") || path.ends_with(".yml") {
            serde_yaml::from_str(content)
                .map_err(|e| GatewayError::Config(format!("Failed to parse YAML config: {}", e)))
        } else {
            Err(GatewayError::Config("Unsupported config file format".to_string()))
        }
    }

    /// 環境変数で設定を上書き
    fn override_from_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// キー検索関数で設定を上書き（解釈できない値は無視）
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // サーバー設定
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(workers) = lookup("WORKERS").and_then(|v| v.parse().ok()) {
            self.server.workers = Some(workers);
        }

        // デバイス設定
        if let Some(ip) = lookup("DEFAULT_DEVICE_IP") {
            self.device.default_ip = ip;
        }
        if let Some(port) = lookup("HAL_PORT").and_then(|v| v.parse().ok()) {
            self.device.hal_port = port;
        }
        if let Some(ms) = lookup("CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.device.connect_timeout_ms = ms;
        }
        if let Some(ms) = lookup("COMMAND_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.device.command_timeout_ms = ms;
        }

        // ping設定
        if let Some(program) = lookup("PING_PROGRAM") {
            self.ping.program = program;
        }
        if let Some(secs) = lookup("PING_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.ping.timeout_secs = secs;
        }

        // ロギング設定
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        // API設定
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.api.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(size) = lookup("MAX_BODY_SIZE").and_then(|v| v.parse().ok()) {
            self.api.max_body_size = size;
        }
    }

    /// 設定を検証
    pub fn validate(&self) -> Result<()> {
        // ポート番号の検証
        if self.server.port == 0 {
            return Err(GatewayError::Config("Invalid port number: 0".to_string()));
        }

        if self.device.default_ip.trim().is_empty() {
            return Err(GatewayError::Config("Default device IP cannot be empty".to_string()));
        }

        if self.ping.program.trim().is_empty() {
            return Err(GatewayError::Config("Ping program cannot be empty".to_string()));
        }

        if self.api.max_body_size == 0 {
            return Err(GatewayError::Config("Max body size must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// CORSで全オリジンを許可するか
    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}
