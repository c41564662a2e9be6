//! コマンドハンドラー
//!
//! 各関数はセッションを1つ開き、HALコマンドを1つだけ発行する。
//! `ping` だけはセッションを使わない。

use futures::FutureExt;
use tracing::{debug, info};

use crate::error::{GatewayError, Result};
use crate::probe;
use crate::state::GatewayState;
use super::models::{
    ApiResponse, CalibrationStarted, Empty, ImuBody, PingBody, PositionEntry, PositionsBody,
    ScanBody, ServoInfoBody, TorqueBody, TorqueEnableBody, TorqueEnableEntry,
};
use super::params::{
    ChangeIdParams, ServoParams, StartCalibrationParams, TorqueEnableParams, TorqueParams,
};

/// 到達性を確認する
pub async fn ping(state: &GatewayState, address: &str) -> Result<ApiResponse<PingBody>> {
    let outcome = probe::ping(state.ping_config(), address).await?;
    if !outcome.success {
        return Err(GatewayError::Unreachable {
            address: address.to_string(),
            output: outcome.stderr,
        });
    }

    info!("Ping to {} succeeded", address);
    Ok(ApiResponse::success(
        format!("Successfully pinged {}", address),
        PingBody { output: outcome.stdout },
    ))
}

pub async fn start_calibration(
    state: &GatewayState,
    params: StartCalibrationParams,
) -> Result<ApiResponse<CalibrationStarted>> {
    let StartCalibrationParams { address, servo_id, calibration } = params;

    let accepted = state
        .with_session(&address, move |hal| {
            async move { hal.start_calibration(servo_id, calibration).await }.boxed()
        })
        .await?;

    if !accepted {
        return Err(GatewayError::Declined(format!(
            "Failed to start calibration for servo {}",
            servo_id
        )));
    }

    Ok(ApiResponse::success(
        format!("Calibration started for servo {}", servo_id),
        CalibrationStarted { details: calibration.into() },
    ))
}

pub async fn cancel_calibration(
    state: &GatewayState,
    params: ServoParams,
) -> Result<ApiResponse<Empty>> {
    let ServoParams { address, servo_id } = params;

    let cancelled = state
        .with_session(&address, move |hal| {
            async move { hal.cancel_calibration(servo_id).await }.boxed()
        })
        .await?;

    if !cancelled {
        return Err(GatewayError::Declined(format!(
            "Failed to cancel calibration for servo {}",
            servo_id
        )));
    }

    Ok(ApiResponse::message(format!("Calibration cancelled for servo {}", servo_id)))
}

pub async fn calibration_status(
    state: &GatewayState,
    address: &str,
) -> Result<ApiResponse<Empty>> {
    let status = state
        .with_session(address, |hal| async move { hal.get_calibration_status().await }.boxed())
        .await?;

    let message = if status.is_calibrating {
        match status.calibrating_servo_id {
            Some(id) => format!("Calibration in progress for servo {}", id),
            None => "Calibration in progress for servo none".to_string(),
        }
    } else {
        "No calibration in progress".to_string()
    };

    Ok(ApiResponse::message(message))
}

pub async fn get_positions(
    state: &GatewayState,
    address: &str,
) -> Result<ApiResponse<PositionsBody>> {
    let samples = state
        .with_session(address, |hal| async move { hal.get_positions().await }.boxed())
        .await?;
    debug!("Received {} position samples from {}", samples.len(), address);

    Ok(ApiResponse::success(
        "Current positions and speeds retrieved",
        PositionsBody {
            data: samples.into_iter().map(PositionEntry::from).collect(),
        },
    ))
}

pub async fn get_servo_info(
    state: &GatewayState,
    params: ServoParams,
) -> Result<ApiResponse<ServoInfoBody>> {
    let ServoParams { address, servo_id } = params;

    let info = state
        .with_session(&address, move |hal| {
            async move { hal.get_servo_info(servo_id).await }.boxed()
        })
        .await?;

    Ok(ApiResponse::data(ServoInfoBody { servo_id, info }))
}

pub async fn scan_servos(state: &GatewayState, address: &str) -> Result<ApiResponse<ScanBody>> {
    let servo_ids = state
        .with_session(address, |hal| async move { hal.scan().await }.boxed())
        .await?;
    info!("Found {} servo(s) at {}", servo_ids.len(), address);

    Ok(ApiResponse::data(ScanBody { servo_ids }))
}

pub async fn change_servo_id(
    state: &GatewayState,
    params: ChangeIdParams,
) -> Result<ApiResponse<Empty>> {
    let ChangeIdParams { address, old_id, new_id } = params;

    let changed = state
        .with_session(&address, move |hal| {
            async move { hal.change_id(old_id, new_id).await }.boxed()
        })
        .await?;

    if !changed {
        return Err(GatewayError::Declined("Failed to change servo ID".to_string()));
    }

    Ok(ApiResponse::message(format!(
        "Successfully changed servo ID from {} to {}",
        old_id, new_id
    )))
}

pub async fn set_torque(state: &GatewayState, params: TorqueParams) -> Result<ApiResponse<TorqueBody>> {
    let TorqueParams { address, settings } = params;
    let body = TorqueBody { settings: settings.clone() };

    state
        .with_session(&address, move |hal| {
            async move { hal.set_torque(&settings).await }.boxed()
        })
        .await?;

    Ok(ApiResponse::success("Torque settings applied successfully", body))
}

pub async fn set_torque_enable(
    state: &GatewayState,
    params: TorqueEnableParams,
) -> Result<ApiResponse<TorqueEnableBody>> {
    let TorqueEnableParams { address, settings } = params;
    let body = TorqueEnableBody {
        settings: settings.iter().map(TorqueEnableEntry::from).collect(),
    };

    state
        .with_session(&address, move |hal| {
            async move { hal.set_torque_enable(&settings).await }.boxed()
        })
        .await?;

    Ok(ApiResponse::success("Torque enable settings applied successfully", body))
}

pub async fn get_imu_data(state: &GatewayState, address: &str) -> Result<ApiResponse<ImuBody>> {
    let data = state
        .with_session(address, |hal| async move { hal.get_imu_data().await }.boxed())
        .await?;

    Ok(ApiResponse::success("IMU Sensor Data", ImuBody::from(data)))
}

pub async fn enable_movement(state: &GatewayState, address: &str) -> Result<ApiResponse<Empty>> {
    state
        .with_session(address, |hal| async move { hal.enable_movement().await }.boxed())
        .await?;

    Ok(ApiResponse::message("Movement enabled for all servos"))
}

pub async fn disable_movement(state: &GatewayState, address: &str) -> Result<ApiResponse<Empty>> {
    state
        .with_session(address, |hal| async move { hal.disable_movement().await }.boxed())
        .await?;

    Ok(ApiResponse::message("Movement disabled for all servos"))
}
