//! ICMP到達性プローブ
//!
//! デバイスセッションは使わず、外部の `ping` コマンドを1回実行する。

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::PingConfig;
use crate::error::{GatewayError, Result};

/// pingの実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// パケット数を指定するオプション
#[cfg(windows)]
const COUNT_FLAG: &str = "-n";
#[cfg(not(windows))]
const COUNT_FLAG: &str = "-c";

/// アドレスにpingを1回実行する
pub async fn ping(config: &PingConfig, address: &str) -> Result<PingOutcome> {
    let count = config.count.max(1).to_string();
    debug!("Running {} {} {} {}", config.program, COUNT_FLAG, count, address);

    let mut command = Command::new(&config.program);
    command.arg(COUNT_FLAG).arg(&count);
    // `-` で始まるアドレスをオプションとして解釈させない
    #[cfg(not(windows))]
    command.arg("--");
    command.arg(address).stdin(Stdio::null()).kill_on_drop(true);
    let child = command.output();

    let output = if config.timeout_secs > 0 {
        let limit = Duration::from_secs(config.timeout_secs);
        tokio::time::timeout(limit, child)
            .await
            .map_err(|_| {
                GatewayError::Timeout(format!("ping {} after {} s", address, config.timeout_secs))
            })??
    } else {
        child.await?
    };

    Ok(PingOutcome {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
