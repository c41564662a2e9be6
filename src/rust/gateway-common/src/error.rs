//! 共通エラー型定義

use thiserror::Error;

/// ゲートウェイ共通エラー型
#[derive(Debug, Error)]
pub enum GatewayError {
    /// クライアント入力の検証エラー（空の設定リストなど）
    #[error("{0}")]
    Validation(String),

    /// デバイスが操作を拒否した
    #[error("{0}")]
    Declined(String),

    /// pingプローブが非ゼロで終了した
    #[error("Failed to ping {address}")]
    Unreachable { address: String, output: String },

    /// 無効なパラメータ（必須値の欠落、数値として解釈できない値）
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// 接続エラー
    #[error("Connection error: {0}")]
    Connection(String),

    /// デバイス側で発生したエラー
    #[error("Device error: {0}")]
    Device(String),

    /// HALプロトコル違反
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// タイムアウト
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// クローズ済みセッションの使用
    #[error("Session closed: {0}")]
    SessionClosed(String),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO エラー
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON パースエラー
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result型のエイリアス
pub type Result<T> = std::result::Result<T, GatewayError>;

/// レスポンスの `status` フィールドに対応するエラー分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 入力不正またはデバイスによる拒否（"failure"）
    Failure,
    /// それ以外の想定外エラー（"error"）
    Unexpected,
}

impl GatewayError {
    /// エラー分類を返す
    pub fn class(&self) -> ErrorClass {
        match self {
            GatewayError::Validation(_)
            | GatewayError::Declined(_)
            | GatewayError::Unreachable { .. } => ErrorClass::Failure,
            _ => ErrorClass::Unexpected,
        }
    }

    /// HTTPステータスコードを返す
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::Failure => 400,
            ErrorClass::Unexpected => 500,
        }
    }

    /// エラーコードを返す（ログ出力用）
    pub fn error_code(&self) -> &str {
        match self {
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::Declined(_) => "OPERATION_DECLINED",
            GatewayError::Unreachable { .. } => "UNREACHABLE",
            GatewayError::InvalidParameter(_) => "INVALID_PARAMETER",
            GatewayError::Connection(_) => "CONNECTION_ERROR",
            GatewayError::Device(_) => "DEVICE_ERROR",
            GatewayError::Protocol(_) => "PROTOCOL_ERROR",
            GatewayError::Timeout(_) => "TIMEOUT",
            GatewayError::SessionClosed(_) => "SESSION_CLOSED",
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Io(_) => "IO_ERROR",
            GatewayError::Json(_) => "JSON_ERROR",
        }
    }
}
