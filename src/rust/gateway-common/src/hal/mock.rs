//! モックHAL
//!
//! 応答を事前に設定でき、呼び出し履歴とセッションの開閉回数を記録する。

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{GatewayError, Result};
use super::traits::{HalConnector, HalSession, ImuApi, ServoApi};
use super::types::{
    CalibrationParams, CalibrationStatus, ImuData, ServoId, ServoInfo, ServoPosition,
    TorqueEnableSetting, TorqueSetting,
};

/// モックデバイスの振る舞い
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// 接続を失敗させる
    pub unreachable: bool,
    /// コマンドを失敗させる（エラーメッセージ）
    pub command_error: Option<String>,
    /// 切断を失敗させる
    pub close_error: Option<String>,
    pub calibration_accepted: bool,
    pub cancel_accepted: bool,
    pub change_id_accepted: bool,
    pub calibration: CalibrationStatus,
    pub positions: Vec<ServoPosition>,
    pub servo_ids: Vec<ServoId>,
    pub imu: ImuData,
}

impl Default for MockBehavior {
    fn default() -> Self {
        MockBehavior {
            unreachable: false,
            command_error: None,
            close_error: None,
            calibration_accepted: true,
            cancel_accepted: true,
            change_id_accepted: true,
            calibration: CalibrationStatus {
                is_calibrating: false,
                calibrating_servo_id: None,
            },
            positions: Vec::new(),
            servo_ids: Vec::new(),
            imu: ImuData {
                gyro: json!({ "x": 0.0, "y": 0.0, "z": 0.0 }),
                accel: json!({ "x": 0.0, "y": 0.0, "z": 9.81 }),
            },
        }
    }
}

/// 記録される呼び出し
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Connect(String),
    StartCalibration { servo_id: ServoId, params: CalibrationParams },
    CancelCalibration(ServoId),
    GetCalibrationStatus,
    GetPositions,
    GetServoInfo(ServoId),
    Scan,
    ChangeId { old_id: ServoId, new_id: ServoId },
    SetTorque(Vec<TorqueSetting>),
    SetTorqueEnable(Vec<TorqueEnableSetting>),
    EnableMovement,
    DisableMovement,
    GetImuData,
    Close,
}

#[derive(Debug, Default)]
struct Journal {
    calls: Vec<MockCall>,
    opened: usize,
    closed: usize,
}

/// モックHALコネクター
#[derive(Debug, Clone, Default)]
pub struct MockHal {
    behavior: MockBehavior,
    journal: Arc<Mutex<Journal>>,
}

impl MockHal {
    pub fn new(behavior: MockBehavior) -> Self {
        MockHal {
            behavior,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    /// 呼び出し履歴（接続・切断を含む）
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.journal).calls.clone()
    }

    /// 接続・切断以外の呼び出し
    pub fn commands(&self) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, MockCall::Connect(_) | MockCall::Close))
            .collect()
    }

    /// 開いたままのセッション数
    pub fn open_sessions(&self) -> usize {
        let journal = lock(&self.journal);
        journal.opened - journal.closed
    }

    /// 開かれたセッション数
    pub fn sessions_opened(&self) -> usize {
        lock(&self.journal).opened
    }
}

fn lock(journal: &Mutex<Journal>) -> MutexGuard<'_, Journal> {
    journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl HalConnector for MockHal {
    async fn connect(&self, address: &str) -> Result<Box<dyn HalSession>> {
        lock(&self.journal).calls.push(MockCall::Connect(address.to_string()));

        if self.behavior.unreachable {
            return Err(GatewayError::Connection(format!("{}: host unreachable", address)));
        }

        lock(&self.journal).opened += 1;
        Ok(Box::new(MockSession {
            address: address.to_string(),
            behavior: self.behavior.clone(),
            journal: self.journal.clone(),
            open: true,
        }))
    }
}

/// モックセッション
struct MockSession {
    address: String,
    behavior: MockBehavior,
    journal: Arc<Mutex<Journal>>,
    open: bool,
}

impl MockSession {
    /// 呼び出しを記録し、設定されたエラーがあれば返す
    fn record(&self, call: MockCall) -> Result<()> {
        if !self.open {
            return Err(GatewayError::SessionClosed(self.address.clone()));
        }
        lock(&self.journal).calls.push(call);
        match &self.behavior.command_error {
            Some(msg) => Err(GatewayError::Device(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ServoApi for MockSession {
    async fn start_calibration(
        &mut self,
        servo_id: ServoId,
        params: CalibrationParams,
    ) -> Result<bool> {
        self.record(MockCall::StartCalibration { servo_id, params })?;
        Ok(self.behavior.calibration_accepted)
    }

    async fn cancel_calibration(&mut self, servo_id: ServoId) -> Result<bool> {
        self.record(MockCall::CancelCalibration(servo_id))?;
        Ok(self.behavior.cancel_accepted)
    }

    async fn get_calibration_status(&mut self) -> Result<CalibrationStatus> {
        self.record(MockCall::GetCalibrationStatus)?;
        Ok(self.behavior.calibration.clone())
    }

    async fn get_positions(&mut self) -> Result<Vec<ServoPosition>> {
        self.record(MockCall::GetPositions)?;
        Ok(self.behavior.positions.clone())
    }

    async fn get_servo_info(&mut self, servo_id: ServoId) -> Result<ServoInfo> {
        self.record(MockCall::GetServoInfo(servo_id))?;
        let mut info = ServoInfo::new();
        info.insert("id".to_string(), json!(servo_id));
        info.insert("current_position".to_string(), json!(2048));
        info.insert("temperature".to_string(), json!(35.0));
        info.insert("voltage".to_string(), json!(12.1));
        Ok(info)
    }

    async fn scan(&mut self) -> Result<Vec<ServoId>> {
        self.record(MockCall::Scan)?;
        Ok(self.behavior.servo_ids.clone())
    }

    async fn change_id(&mut self, old_id: ServoId, new_id: ServoId) -> Result<bool> {
        self.record(MockCall::ChangeId { old_id, new_id })?;
        Ok(self.behavior.change_id_accepted)
    }

    async fn set_torque(&mut self, settings: &[TorqueSetting]) -> Result<()> {
        self.record(MockCall::SetTorque(settings.to_vec()))
    }

    async fn set_torque_enable(&mut self, settings: &[TorqueEnableSetting]) -> Result<()> {
        self.record(MockCall::SetTorqueEnable(settings.to_vec()))
    }

    async fn enable_movement(&mut self) -> Result<()> {
        self.record(MockCall::EnableMovement)
    }

    async fn disable_movement(&mut self) -> Result<()> {
        self.record(MockCall::DisableMovement)
    }
}

#[async_trait]
impl ImuApi for MockSession {
    async fn get_imu_data(&mut self) -> Result<ImuData> {
        self.record(MockCall::GetImuData)?;
        Ok(self.behavior.imu.clone())
    }
}

#[async_trait]
impl HalSession for MockSession {
    async fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let mut journal = lock(&self.journal);
        journal.calls.push(MockCall::Close);
        journal.closed += 1;
        drop(journal);

        match &self.behavior.close_error {
            Some(msg) => Err(GatewayError::Connection(msg.clone())),
            None => Ok(()),
        }
    }
}
