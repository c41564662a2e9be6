//! レスポンス変換
//!
//! ハンドラーの結果をエンベロープとHTTPステータスに変換する唯一の境界。

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{ErrorClass, GatewayError, Result};
use super::models::ApiResponse;

/// エンドポイントに対応する操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Ping,
    StartCalibration,
    CancelCalibration,
    CalibrationStatus,
    GetPositions,
    GetServoInfo,
    ScanServos,
    ChangeServoId,
    SetTorque,
    SetTorqueEnable,
    GetImuData,
    EnableMovement,
    DisableMovement,
}

impl Operation {
    /// ログ用の操作名
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Ping => "ping",
            Operation::StartCalibration => "start_calibration",
            Operation::CancelCalibration => "cancel_calibration",
            Operation::CalibrationStatus => "get_calibration_status",
            Operation::GetPositions => "get_positions",
            Operation::GetServoInfo => "get_servo_info",
            Operation::ScanServos => "scan_servos",
            Operation::ChangeServoId => "change_servo_id",
            Operation::SetTorque => "set_torque",
            Operation::SetTorqueEnable => "set_torque_enable",
            Operation::GetImuData => "get_imu_data",
            Operation::EnableMovement => "enable_movement",
            Operation::DisableMovement => "disable_movement",
        }
    }

    /// 想定外エラーのメッセージ
    pub fn error_message(&self, address: &str, err: &GatewayError) -> String {
        match self {
            Operation::StartCalibration => err.to_string(),
            Operation::Ping => format!("An error occurred while pinging {}: {}", address, err),
            Operation::GetPositions => {
                format!("An error occurred while retrieving positions: {}", err)
            }
            Operation::GetServoInfo => {
                format!("An error occurred while fetching the servo information: {}", err)
            }
            Operation::ScanServos => format!("An error occurred while scanning for servos: {}", err),
            _ => format!("An error occurred: {}", err),
        }
    }
}

/// 結果をHTTPレスポンスに変換
pub fn respond<T: Serialize>(
    op: Operation,
    address: &str,
    result: Result<ApiResponse<T>>,
) -> HttpResponse {
    match result {
        Ok(response) => {
            info!("{} completed", op.name());
            HttpResponse::Ok().json(response)
        }
        Err(err) => error_response(op, address, &err),
    }
}

/// エラーをHTTPレスポンスに変換
pub fn error_response(op: Operation, address: &str, err: &GatewayError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = match (err.class(), err) {
        (ErrorClass::Failure, GatewayError::Unreachable { output, .. }) => {
            warn!("{} failed [{}]: {}", op.name(), err.error_code(), err);
            ApiResponse::failure(err.to_string(), Some(output.clone()))
        }
        (ErrorClass::Failure, _) => {
            warn!("{} failed [{}]: {}", op.name(), err.error_code(), err);
            ApiResponse::failure(err.to_string(), None)
        }
        (ErrorClass::Unexpected, _) => {
            error!("{} error [{}]: {}", op.name(), err.error_code(), err);
            ApiResponse::error(op.error_message(address, err))
        }
    };

    HttpResponse::build(status).json(body)
}
