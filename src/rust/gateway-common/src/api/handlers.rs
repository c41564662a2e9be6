//! HTTPハンドラー実装
//!
//! パラメータ抽出 → コマンド実行 → レスポンス変換 を1つのtracingスパン内で行う。

use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{GatewayError, Result};
use crate::state::GatewayState;
use super::commands;
use super::models::{ApiResponse, HealthBody};
use super::params::{
    ChangeIdParams, JsonBody, QueryParams, ServoParams, StartCalibrationParams,
    TorqueEnableParams, TorqueParams,
};
use super::response::{respond, Operation};

type Query = web::Query<HashMap<String, String>>;
type Body = std::result::Result<web::Bytes, actix_web::Error>;

/// リクエストIDつきスパンで処理を実行し、結果を変換する
async fn handle<T, F>(op: Operation, address: String, work: F) -> HttpResponse
where
    T: Serialize,
    F: Future<Output = Result<ApiResponse<T>>>,
{
    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        operation = op.name(),
        address = %address,
    );

    async move {
        let result = work.await;
        respond(op, &address, result)
    }
    .instrument(span)
    .await
}

/// JSONボディを解析（読み取れないボディは想定外エラー）
fn parse_body(body: Body) -> Result<JsonBody> {
    let bytes = body.map_err(|e| {
        GatewayError::InvalidParameter(format!("unreadable request body: {}", e))
    })?;
    JsonBody::parse(&bytes)
}

/// ボディ指定の `ip` を優先し、なければクエリ・既定値を使う
fn body_address(body: &Result<JsonBody>, query: &QueryParams, default_ip: &str) -> String {
    match body {
        Ok(body) => body.address(query, default_ip),
        Err(_) => query.address(default_ip),
    }
}

/// GET /ping
pub async fn ping(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::Ping, address.clone(), async {
        info!("Pinging {}", address);
        commands::ping(&state, &address).await
    })
    .await
}

/// POST /start_calibration
pub async fn start_calibration(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::StartCalibration, address, async {
        let params = StartCalibrationParams::from_query(&query, state.default_address())?;
        info!(
            "Starting calibration for servo {} (speed {}, current threshold {})",
            params.servo_id, params.calibration.speed, params.calibration.current_threshold
        );
        commands::start_calibration(&state, params).await
    })
    .await
}

/// POST /cancel_calibration
pub async fn cancel_calibration(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::CancelCalibration, address, async {
        let params = ServoParams::from_query(&query, state.default_address())?;
        info!("Cancelling calibration for servo {}", params.servo_id);
        commands::cancel_calibration(&state, params).await
    })
    .await
}

/// GET /get_calibration_status
pub async fn get_calibration_status(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::CalibrationStatus, address.clone(), async {
        info!("Querying calibration status");
        commands::calibration_status(&state, &address).await
    })
    .await
}

/// GET /get_positions
pub async fn get_positions(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::GetPositions, address.clone(), async {
        info!("Reading servo positions");
        commands::get_positions(&state, &address).await
    })
    .await
}

/// GET /get_servo_info
pub async fn get_servo_info(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::GetServoInfo, address, async {
        let params = ServoParams::from_query(&query, state.default_address())?;
        info!("Reading info for servo {}", params.servo_id);
        commands::get_servo_info(&state, params).await
    })
    .await
}

/// GET /scan_servos
pub async fn scan_servos(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::ScanServos, address.clone(), async {
        info!("Scanning for servos");
        commands::scan_servos(&state, &address).await
    })
    .await
}

/// POST /change_servo_id
pub async fn change_servo_id(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::ChangeServoId, address, async {
        let params = ChangeIdParams::from_query(&query, state.default_address())?;
        info!("Changing servo ID {} -> {}", params.old_id, params.new_id);
        commands::change_servo_id(&state, params).await
    })
    .await
}

/// POST /set_torque
pub async fn set_torque(state: web::Data<GatewayState>, query: Query, body: Body) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let body = parse_body(body);
    let address = body_address(&body, &query, state.default_address());

    handle(Operation::SetTorque, address, async {
        let params = TorqueParams::from_body(&body?, &query, state.default_address())?;
        info!("Setting torque for {} servo(s)", params.settings.len());
        commands::set_torque(&state, params).await
    })
    .await
}

/// POST /set_torque_enable
pub async fn set_torque_enable(
    state: web::Data<GatewayState>,
    query: Query,
    body: Body,
) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let body = parse_body(body);
    let address = body_address(&body, &query, state.default_address());

    handle(Operation::SetTorqueEnable, address, async {
        let params = TorqueEnableParams::from_body(&body?, &query, state.default_address())?;
        info!("Setting torque enable for {} servo(s)", params.settings.len());
        commands::set_torque_enable(&state, params).await
    })
    .await
}

/// GET /get_imu_data
pub async fn get_imu_data(state: web::Data<GatewayState>, query: Query) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let address = query.address(state.default_address());

    handle(Operation::GetImuData, address.clone(), async {
        info!("Reading IMU data");
        commands::get_imu_data(&state, &address).await
    })
    .await
}

/// POST /enable_movement
pub async fn enable_movement(
    state: web::Data<GatewayState>,
    query: Query,
    body: Body,
) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let body = parse_body(body);
    let address = body_address(&body, &query, state.default_address());

    handle(Operation::EnableMovement, address.clone(), async {
        body?;
        info!("Enabling movement");
        commands::enable_movement(&state, &address).await
    })
    .await
}

/// POST /disable_movement
pub async fn disable_movement(
    state: web::Data<GatewayState>,
    query: Query,
    body: Body,
) -> HttpResponse {
    let query = QueryParams::new(query.into_inner());
    let body = parse_body(body);
    let address = body_address(&body, &query, state.default_address());

    handle(Operation::DisableMovement, address.clone(), async {
        body?;
        info!("Disabling movement");
        commands::disable_movement(&state, &address).await
    })
    .await
}

/// GET /health（ハードウェアには触れない）
pub async fn health() -> HttpResponse {
    let platform = crate::platform_info();
    HttpResponse::Ok().json(ApiResponse::success(
        "healthy",
        HealthBody {
            version: crate::VERSION.to_string(),
            platform: format!("{}-{}", platform.os, platform.arch),
        },
    ))
}
