//! TCP上のHAL実装
//!
//! 1行1メッセージのJSON RPC。リクエストは `{"id", "method", "params"}`、
//! 応答は `{"id", "result"}` または `{"id", "error"}`。

use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::error::{GatewayError, Result};
use super::traits::{HalConnector, HalSession, ImuApi, ServoApi};
use super::types::{
    CalibrationParams, CalibrationStatus, ImuData, ServoId, ServoInfo, ServoPosition,
    TorqueEnableSetting, TorqueSetting,
};

/// RPCメソッド名
pub mod method {
    pub const START_CALIBRATION: &str = "servo.start_calibration";
    pub const CANCEL_CALIBRATION: &str = "servo.cancel_calibration";
    pub const GET_CALIBRATION_STATUS: &str = "servo.get_calibration_status";
    pub const GET_POSITIONS: &str = "servo.get_positions";
    pub const GET_SERVO_INFO: &str = "servo.get_servo_info";
    pub const SCAN: &str = "servo.scan";
    pub const CHANGE_ID: &str = "servo.change_id";
    pub const SET_TORQUE: &str = "servo.set_torque";
    pub const SET_TORQUE_ENABLE: &str = "servo.set_torque_enable";
    pub const ENABLE_MOVEMENT: &str = "servo.enable_movement";
    pub const DISABLE_MOVEMENT: &str = "servo.disable_movement";
    pub const IMU_GET_DATA: &str = "imu.get_data";
}

#[derive(Debug, Serialize)]
struct HalRequest<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct HalReply {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// 応答1行あたりの上限バイト数
pub const MAX_REPLY_BYTES: u64 = 1024 * 1024;

/// TCP HALコネクター
#[derive(Debug, Clone)]
pub struct TcpHal {
    hal_port: u16,
    max_reply_bytes: u64,
}

impl TcpHal {
    pub fn new(hal_port: u16) -> Self {
        TcpHal { hal_port, max_reply_bytes: MAX_REPLY_BYTES }
    }

    /// 応答行の上限を変更する
    pub fn with_max_reply_bytes(mut self, max_reply_bytes: u64) -> Self {
        self.max_reply_bytes = max_reply_bytes;
        self
    }

    /// ポート指定がなければHALポートを付与する
    pub fn resolve(&self, address: &str) -> String {
        let address = address.trim();
        if address.parse::<SocketAddr>().is_ok() {
            return address.to_string();
        }
        if let Ok(ip) = address.parse::<IpAddr>() {
            return SocketAddr::new(ip, self.hal_port).to_string();
        }
        if address.contains(':') {
            return address.to_string();
        }
        format!("{}:{}", address, self.hal_port)
    }
}

#[async_trait]
impl HalConnector for TcpHal {
    async fn connect(&self, address: &str) -> Result<Box<dyn HalSession>> {
        let target = self.resolve(address);
        debug!("Connecting to HAL at {}", target);

        let stream = TcpStream::connect(target.as_str())
            .await
            .map_err(|e| GatewayError::Connection(format!("{}: {}", target, e)))?;
        stream.set_nodelay(true)?;

        Ok(Box::new(TcpSession::new(
            address.to_string(),
            stream,
            self.max_reply_bytes,
        )))
    }
}

/// TCP HALセッション
pub struct TcpSession {
    address: String,
    reader: BufReader<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
    next_id: u64,
    max_reply_bytes: u64,
}

impl TcpSession {
    fn new(address: String, stream: TcpStream, max_reply_bytes: u64) -> Self {
        let (read_half, write_half) = stream.into_split();
        TcpSession {
            address,
            reader: BufReader::new(read_half),
            writer: Some(write_half),
            next_id: 1,
            max_reply_bytes,
        }
    }

    /// リクエストを1件送信し、対応する応答を待つ
    async fn call<R: DeserializeOwned>(&mut self, method: &str, params: Value) -> Result<R> {
        let id = self.next_id;
        self.next_id += 1;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| GatewayError::SessionClosed(self.address.clone()))?;

        let mut line = serde_json::to_vec(&HalRequest { id, method, params })?;
        line.push(b'\n');
        trace!("HAL -> {}: {}", self.address, String::from_utf8_lossy(&line).trim_end());

        writer
            .write_all(&line)
            .await
            .map_err(|e| GatewayError::Connection(format!("{}: {}", self.address, e)))?;
        writer
            .flush()
            .await
            .map_err(|e| GatewayError::Connection(format!("{}: {}", self.address, e)))?;

        let mut buf = String::new();
        let read = (&mut self.reader)
            .take(self.max_reply_bytes)
            .read_line(&mut buf)
            .await
            .map_err(|e| GatewayError::Connection(format!("{}: {}", self.address, e)))?;
        if read == 0 {
            return Err(GatewayError::Connection(format!(
                "{}: connection closed by device",
                self.address
            )));
        }
        if read as u64 >= self.max_reply_bytes && !buf.ends_with('\n') {
            return Err(GatewayError::Protocol(format!(
                "reply to {} exceeds {} bytes",
                method, self.max_reply_bytes
            )));
        }
        trace!("HAL <- {}: {}", self.address, buf.trim_end());

        let reply: HalReply = serde_json::from_str(buf.trim_end())
            .map_err(|e| GatewayError::Protocol(format!("malformed reply to {}: {}", method, e)))?;
        if reply.id != id {
            return Err(GatewayError::Protocol(format!(
                "reply id {} does not match request id {}",
                reply.id, id
            )));
        }
        if let Some(error) = reply.error {
            return Err(GatewayError::Device(format!("{}: {}", method, error)));
        }

        serde_json::from_value(reply.result)
            .map_err(|e| GatewayError::Protocol(format!("unexpected result for {}: {}", method, e)))
    }

    /// 戻り値を使わない呼び出し
    async fn call_unit(&mut self, method: &str, params: Value) -> Result<()> {
        let _: IgnoredAny = self.call(method, params).await?;
        Ok(())
    }
}

#[async_trait]
impl ServoApi for TcpSession {
    async fn start_calibration(
        &mut self,
        servo_id: ServoId,
        params: CalibrationParams,
    ) -> Result<bool> {
        self.call(
            method::START_CALIBRATION,
            json!({
                "servo_id": servo_id,
                "calibration_speed": params.speed,
                "current_threshold": params.current_threshold,
            }),
        )
        .await
    }

    async fn cancel_calibration(&mut self, servo_id: ServoId) -> Result<bool> {
        self.call(method::CANCEL_CALIBRATION, json!({ "servo_id": servo_id }))
            .await
    }

    async fn get_calibration_status(&mut self) -> Result<CalibrationStatus> {
        self.call(method::GET_CALIBRATION_STATUS, json!({})).await
    }

    async fn get_positions(&mut self) -> Result<Vec<ServoPosition>> {
        self.call(method::GET_POSITIONS, json!({})).await
    }

    async fn get_servo_info(&mut self, servo_id: ServoId) -> Result<ServoInfo> {
        self.call(method::GET_SERVO_INFO, json!({ "servo_id": servo_id }))
            .await
    }

    async fn scan(&mut self) -> Result<Vec<ServoId>> {
        self.call(method::SCAN, json!({})).await
    }

    async fn change_id(&mut self, old_id: ServoId, new_id: ServoId) -> Result<bool> {
        self.call(
            method::CHANGE_ID,
            json!({ "old_id": old_id, "new_id": new_id }),
        )
        .await
    }

    async fn set_torque(&mut self, settings: &[TorqueSetting]) -> Result<()> {
        let pairs: Vec<(ServoId, &Number)> =
            settings.iter().map(|s| (s.servo_id, &s.torque)).collect();
        self.call_unit(method::SET_TORQUE, json!({ "settings": pairs }))
            .await
    }

    async fn set_torque_enable(&mut self, settings: &[TorqueEnableSetting]) -> Result<()> {
        let pairs: Vec<(ServoId, bool)> =
            settings.iter().map(|s| (s.servo_id, s.enabled)).collect();
        self.call_unit(method::SET_TORQUE_ENABLE, json!({ "settings": pairs }))
            .await
    }

    async fn enable_movement(&mut self) -> Result<()> {
        self.call_unit(method::ENABLE_MOVEMENT, json!({})).await
    }

    async fn disable_movement(&mut self) -> Result<()> {
        self.call_unit(method::DISABLE_MOVEMENT, json!({})).await
    }
}

#[async_trait]
impl ImuApi for TcpSession {
    async fn get_imu_data(&mut self) -> Result<ImuData> {
        self.call(method::IMU_GET_DATA, json!({})).await
    }
}

#[async_trait]
impl HalSession for TcpSession {
    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            debug!("Closing HAL session to {}", self.address);
            match writer.shutdown().await {
                Ok(()) => {}
                // 相手側が先に切断している場合
                Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {}
                Err(e) => {
                    return Err(GatewayError::Connection(format!("{}: {}", self.address, e)));
                }
            }
        }
        Ok(())
    }
}
