//! デバイスセッション
//!
//! 1リクエストにつき1接続。プールや再利用はしない。
//! [`with_session`] はコマンドの成否やタイムアウトに関わらず必ず切断する。

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::error::{GatewayError, Result};
use crate::hal::{HalConnector, HalSession};

/// セッションのタイムアウト設定
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionLimits {
    pub connect_timeout: Option<Duration>,
    pub command_timeout: Option<Duration>,
}

impl From<&DeviceConfig> for SessionLimits {
    fn from(config: &DeviceConfig) -> Self {
        SessionLimits {
            connect_timeout: config.connect_timeout(),
            command_timeout: config.command_timeout(),
        }
    }
}

/// 1リクエスト分のHAL接続
pub struct DeviceSession {
    address: String,
    hal: Option<Box<dyn HalSession>>,
}

impl DeviceSession {
    /// 未接続のセッションを作成
    pub fn new(address: impl Into<String>) -> Self {
        DeviceSession {
            address: address.into(),
            hal: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_open(&self) -> bool {
        self.hal.is_some()
    }

    /// HALに接続する（接続済みなら何もしない）
    pub async fn open(
        &mut self,
        connector: &dyn HalConnector,
        connect_timeout: Option<Duration>,
    ) -> Result<()> {
        if self.hal.is_some() {
            return Ok(());
        }

        debug!("Opening device session to {}", self.address);
        let hal = within(
            connect_timeout,
            connector.connect(&self.address),
            || format!("connecting to {}", self.address),
        )
        .await?;
        self.hal = Some(hal);
        Ok(())
    }

    /// 接続中のHALを取得
    pub fn hal(&mut self) -> Result<&mut (dyn HalSession + 'static)> {
        match self.hal.as_deref_mut() {
            Some(hal) => Ok(hal),
            None => Err(GatewayError::SessionClosed(self.address.clone())),
        }
    }

    /// 切断する。未接続・切断済みでも安全に呼べる。
    pub async fn close(&mut self) -> Result<()> {
        match self.hal.take() {
            Some(mut hal) => {
                debug!("Closing device session to {}", self.address);
                hal.close().await
            }
            None => Ok(()),
        }
    }
}

/// タイムアウト付きで実行
async fn within<T, F, D>(limit: Option<Duration>, fut: F, describe: D) -> Result<T>
where
    F: Future<Output = Result<T>>,
    D: FnOnce() -> String,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            GatewayError::Timeout(format!("{} after {} ms", describe(), limit.as_millis()))
        })?,
        None => fut.await,
    }
}

/// セッションを開き、1つの操作を実行して、必ず閉じる
///
/// 操作が失敗した場合は操作のエラーを優先し、切断時のエラーはログに残すだけにする。
/// 操作が成功して切断だけが失敗した場合は切断のエラーを返す。
pub async fn with_session<T, F>(
    connector: &dyn HalConnector,
    address: &str,
    limits: SessionLimits,
    op: F,
) -> Result<T>
where
    F: for<'s> FnOnce(&'s mut (dyn HalSession + 'static)) -> BoxFuture<'s, Result<T>>,
{
    let mut session = DeviceSession::new(address);

    let result = match session.open(connector, limits.connect_timeout).await {
        Ok(()) => match session.hal() {
            Ok(hal) => {
                within(limits.command_timeout, op(hal), || format!("command to {}", address)).await
            }
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    let closed = session.close().await;

    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!("Failed to close device session to {}: {}", address, close_err);
            Err(e)
        }
    }
}
