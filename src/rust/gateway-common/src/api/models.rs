//! レスポンスモデル定義
//!
//! すべてのレスポンスは `status` を持つ共通エンベロープで返す。
//! エンドポイント固有のフィールドはエンベロープに平坦化される。

use serde::Serialize;
use serde_json::Value;

use crate::hal::{
    CalibrationParams, ImuData, ServoId, ServoInfo, ServoPosition, TorqueEnableSetting,
    TorqueSetting,
};

/// レスポンスの結果区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
    Error,
}

/// 共通レスポンスエンベロープ
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, body: T) -> Self {
        ApiResponse {
            status: Status::Success,
            message: Some(message.into()),
            body,
        }
    }

    /// メッセージを持たない成功レスポンス（servo情報・スキャン結果）
    pub fn data(body: T) -> Self {
        ApiResponse {
            status: Status::Success,
            message: None,
            body,
        }
    }
}

impl ApiResponse<Empty> {
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse::success(message, Empty {})
    }
}

impl ApiResponse<ErrorBody> {
    pub fn failure(message: impl Into<String>, output: Option<String>) -> Self {
        ApiResponse {
            status: Status::Failure,
            message: Some(message.into()),
            body: ErrorBody { output },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            status: Status::Error,
            message: Some(message.into()),
            body: ErrorBody { output: None },
        }
    }
}

/// 追加フィールドなし
#[derive(Debug, Clone, Default, Serialize)]
pub struct Empty {}

/// 失敗・エラー時の追加フィールド
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// 小数点以下2桁に丸める
///
/// `value * 100.0` を経由せず、f64 が表す正確な2進値を基準にする。
/// ちょうど中間の値は偶数側に丸める（0.125 → 0.12, 0.375 → 0.38）。
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let bits = value.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if exp_bits == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), exp_bits - 1075)
    };
    // 整数値
    if exponent >= 0 {
        return value;
    }
    let shift = -exponent;
    if shift >= 64 {
        return 0.0f64.copysign(value);
    }

    // value * 100 = scaled / unit（誤差なし）
    let scaled = mantissa as u128 * 100;
    let unit = 1u128 << shift;
    let mut hundredths = scaled / unit;
    let remainder = scaled % unit;
    if 2 * remainder > unit || (2 * remainder == unit && hundredths % 2 == 1) {
        hundredths += 1;
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    format!("{}{}.{:02}", sign, hundredths / 100, hundredths % 100)
        .parse()
        .unwrap_or(value)
}

/// `/start_calibration`
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationStarted {
    pub details: CalibrationDetails,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CalibrationDetails {
    pub speed: i32,
    pub current_threshold: f64,
}

impl From<CalibrationParams> for CalibrationDetails {
    fn from(params: CalibrationParams) -> Self {
        CalibrationDetails {
            speed: params.speed,
            current_threshold: params.current_threshold,
        }
    }
}

/// `/ping`
#[derive(Debug, Clone, Serialize)]
pub struct PingBody {
    pub output: String,
}

/// `/get_positions`
#[derive(Debug, Clone, Serialize)]
pub struct PositionsBody {
    pub data: Vec<PositionEntry>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PositionEntry {
    pub servo_id: ServoId,
    pub position: f64,
    pub speed: f64,
}

impl From<ServoPosition> for PositionEntry {
    fn from(sample: ServoPosition) -> Self {
        PositionEntry {
            servo_id: sample.servo_id,
            position: round2(sample.position),
            speed: round2(sample.speed),
        }
    }
}

/// `/get_servo_info`
#[derive(Debug, Clone, Serialize)]
pub struct ServoInfoBody {
    pub servo_id: ServoId,
    pub info: ServoInfo,
}

/// `/scan_servos`
#[derive(Debug, Clone, Serialize)]
pub struct ScanBody {
    pub servo_ids: Vec<ServoId>,
}

/// `/set_torque`
#[derive(Debug, Clone, Serialize)]
pub struct TorqueBody {
    pub settings: Vec<TorqueSetting>,
}

/// `/set_torque_enable`
#[derive(Debug, Clone, Serialize)]
pub struct TorqueEnableBody {
    pub settings: Vec<TorqueEnableEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TorqueEnableEntry {
    pub servo_id: ServoId,
    pub status: &'static str,
}

impl From<&TorqueEnableSetting> for TorqueEnableEntry {
    fn from(setting: &TorqueEnableSetting) -> Self {
        TorqueEnableEntry {
            servo_id: setting.servo_id,
            status: if setting.enabled { "enabled" } else { "disabled" },
        }
    }
}

/// `/get_imu_data`
#[derive(Debug, Clone, Serialize)]
pub struct ImuBody {
    pub gyro: Value,
    pub accel: Value,
}

impl From<ImuData> for ImuBody {
    fn from(data: ImuData) -> Self {
        ImuBody {
            gyro: data.gyro,
            accel: data.accel,
        }
    }
}

/// `/health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthBody {
    pub version: String,
    pub platform: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(-0.004), -0.0);
        assert_eq!(round2(3.0), 3.0);
        assert_eq!(round2(-3.456), -3.46);
    }

    #[test]
    fn test_round2_ties_use_exact_value() {
        // 正確に中間の値は偶数側へ
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.12);
        // 2.675 の実際の値は 2.67499999... なので切り捨て
        assert_eq!(round2(2.675), 2.67);
        assert_eq!(round2(1.005), 1.0);
        assert!(round2(f64::NAN).is_nan());
        assert_eq!(round2(f64::INFINITY), f64::INFINITY);
        assert_eq!(round2(1e300), 1e300);
    }

    #[test]
    fn test_envelope_flattens_body() {
        let response = ApiResponse::success(
            "Calibration started for servo 3",
            CalibrationStarted {
                details: CalibrationParams::default().into(),
            },
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "success",
                "message": "Calibration started for servo 3",
                "details": { "speed": 300, "current_threshold": 600.0 }
            })
        );
    }

    #[test]
    fn test_data_only_envelope_has_no_message() {
        let response = ApiResponse::data(ScanBody { servo_ids: vec![1, 4] });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "status": "success", "servo_ids": [1, 4] })
        );
    }

    #[test]
    fn test_error_envelopes() {
        assert_eq!(
            serde_json::to_value(ApiResponse::error("An error occurred: boom")).unwrap(),
            json!({ "status": "error", "message": "An error occurred: boom" })
        );
        assert_eq!(
            serde_json::to_value(ApiResponse::failure(
                "Failed to ping 10.0.0.2",
                Some("timeout".to_string())
            ))
            .unwrap(),
            json!({ "status": "failure", "message": "Failed to ping 10.0.0.2", "output": "timeout" })
        );
    }

    #[test]
    fn test_torque_enable_entry_status() {
        let on = TorqueEnableEntry::from(&TorqueEnableSetting { servo_id: 1, enabled: true });
        let off = TorqueEnableEntry::from(&TorqueEnableSetting { servo_id: 2, enabled: false });
        assert_eq!(on.status, "enabled");
        assert_eq!(off.status, "disabled");
    }
}
