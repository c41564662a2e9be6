//! サーボ/IMUゲートウェイ 共通ライブラリ
//!
//! HTTPリクエストを1回限りのデバイスセッションと1つのHALコマンドに変換する。

pub mod error;
pub mod config;
pub mod hal;
pub mod session;
pub mod probe;
pub mod state;
pub mod api;

// バージョン情報
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

// 主要な型の再エクスポート
pub use error::{ErrorClass, GatewayError, Result};
pub use config::Settings;
pub use hal::{HalConnector, HalSession, ImuApi, ServoApi, TcpHal};
pub use session::{with_session, DeviceSession, SessionLimits};
pub use state::GatewayState;
pub use api::configure;

#[cfg(any(test, feature = "mock"))]
pub use hal::{MockBehavior, MockCall, MockHal};

/// プラットフォーム情報
pub fn platform_info() -> PlatformInfo {
    PlatformInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        family: std::env::consts::FAMILY.to_string(),
    }
}

/// プラットフォーム情報構造体
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub family: String,
}
