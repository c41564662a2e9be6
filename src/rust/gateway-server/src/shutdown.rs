//! シャットダウンシグナル処理

use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// シャットダウンシグナル受信器
pub struct ShutdownReceiver {
    rx: oneshot::Receiver<()>,
}

impl ShutdownReceiver {
    /// シグナルを待機
    pub async fn wait(self) {
        let _ = self.rx.await;
    }
}

/// Ctrl+C（UnixではSIGTERMも）を待つタスクを起動
pub fn setup_shutdown_handler() -> ShutdownReceiver {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = tx.send(());
    });

    info!("Shutdown handler registered");
    ShutdownReceiver { rx }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let mut sigterm = match unix_signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!("Unable to listen for SIGTERM: {}", err);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = sigterm.recv() => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C signal"),
        Err(err) => {
            warn!("Unable to listen for shutdown signal: {}", err);
            // シグナルを受け取れない場合はサーバー側の終了を待つ
            std::future::pending::<()>().await
        }
    }
}
