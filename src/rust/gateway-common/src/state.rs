//! アプリケーション状態
//!
//! リクエスト間で共有するのは読み取り専用の設定とHALコネクターだけ。

use std::sync::Arc;

use crate::config::{DeviceConfig, PingConfig, Settings};
use crate::error::Result;
use crate::hal::{HalConnector, HalSession};
use crate::session::{self, SessionLimits};
use futures::future::BoxFuture;

/// ハンドラーに渡す共有状態
#[derive(Clone)]
pub struct GatewayState {
    connector: Arc<dyn HalConnector>,
    device: DeviceConfig,
    ping: PingConfig,
}

impl GatewayState {
    pub fn new(connector: Arc<dyn HalConnector>, settings: &Settings) -> Self {
        GatewayState {
            connector,
            device: settings.device.clone(),
            ping: settings.ping.clone(),
        }
    }

    /// `ip` 未指定時の接続先
    pub fn default_address(&self) -> &str {
        &self.device.default_ip
    }

    pub fn ping_config(&self) -> &PingConfig {
        &self.ping
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits::from(&self.device)
    }

    /// アドレスにセッションを開いて1つの操作を実行する
    pub async fn with_session<T, F>(&self, address: &str, op: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut (dyn HalSession + 'static)) -> BoxFuture<'s, Result<T>>,
    {
        session::with_session(self.connector.as_ref(), address, self.limits(), op).await
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("device", &self.device)
            .field("ping", &self.ping)
            .finish_non_exhaustive()
    }
}
