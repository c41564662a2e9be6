//! HALが扱うデータ型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// サーボID
pub type ServoId = i32;

/// キャリブレーション時の速度（デフォルト）
pub const DEFAULT_CALIBRATION_SPEED: i32 = 300;

/// キャリブレーション時の電流しきい値（デフォルト）
pub const DEFAULT_CURRENT_THRESHOLD: f64 = 600.0;

/// キャリブレーションパラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub speed: i32,
    pub current_threshold: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        CalibrationParams {
            speed: DEFAULT_CALIBRATION_SPEED,
            current_threshold: DEFAULT_CURRENT_THRESHOLD,
        }
    }
}

/// キャリブレーション状態
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub is_calibrating: bool,
    #[serde(default)]
    pub calibrating_servo_id: Option<ServoId>,
}

/// サーボの現在位置と速度（デバイスからは `[id, position, speed]` で届く）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(ServoId, f64, f64)")]
pub struct ServoPosition {
    pub servo_id: ServoId,
    pub position: f64,
    pub speed: f64,
}

impl From<(ServoId, f64, f64)> for ServoPosition {
    fn from((servo_id, position, speed): (ServoId, f64, f64)) -> Self {
        ServoPosition { servo_id, position, speed }
    }
}

/// サーボ情報（デバイスの応答をそのまま返す）
pub type ServoInfo = Map<String, Value>;

/// トルク設定（数値はクライアントが送った形のまま保持する）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorqueSetting {
    pub servo_id: ServoId,
    pub torque: Number,
}

/// トルク有効/無効設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorqueEnableSetting {
    pub servo_id: ServoId,
    pub enabled: bool,
}

/// IMUデータ（内容は解釈せずに返す）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuData {
    pub gyro: Value,
    pub accel: Value,
}
