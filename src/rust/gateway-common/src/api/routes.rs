//! ルーティング

use actix_web::{error::InternalError, web, HttpResponse};
use tracing::error;

use super::handlers;
use super::models::ApiResponse;

/// 全エンドポイントを登録
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        error!("Failed to decode query string: {}", err);
        let response = HttpResponse::InternalServerError()
            .json(ApiResponse::error(format!("An error occurred: {}", err)));
        InternalError::from_response(err, response).into()
    }))
    .route("/health", web::get().to(handlers::health))
    .route("/ping", web::get().to(handlers::ping))
    .route("/start_calibration", web::post().to(handlers::start_calibration))
    .route("/cancel_calibration", web::post().to(handlers::cancel_calibration))
    .route("/get_calibration_status", web::get().to(handlers::get_calibration_status))
    .route("/get_positions", web::get().to(handlers::get_positions))
    .route("/get_servo_info", web::get().to(handlers::get_servo_info))
    .route("/scan_servos", web::get().to(handlers::scan_servos))
    .route("/change_servo_id", web::post().to(handlers::change_servo_id))
    .route("/set_torque", web::post().to(handlers::set_torque))
    .route("/set_torque_enable", web::post().to(handlers::set_torque_enable))
    .route("/get_imu_data", web::get().to(handlers::get_imu_data))
    .route("/enable_movement", web::post().to(handlers::enable_movement))
    .route("/disable_movement", web::post().to(handlers::disable_movement));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::hal::{
        CalibrationParams, MockBehavior, MockCall, MockHal, ServoPosition, TorqueEnableSetting,
        TorqueSetting,
    };
    use crate::state::GatewayState;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Number, Value};
    use std::sync::Arc;

    fn app_state(hal: &MockHal) -> web::Data<GatewayState> {
        web::Data::new(GatewayState::new(Arc::new(hal.clone()), &Settings::default()))
    }

    macro_rules! call {
        ($hal:expr, $req:expr) => {{
            let app = test::init_service(
                App::new().app_data(app_state(&$hal)).configure(configure),
            )
            .await;
            let resp = test::call_service(&app, $req.to_request()).await;
            let status = resp.status();
            let body: Value = test::read_body_json(resp).await;
            (status, body)
        }};
    }

    #[actix_web::test]
    async fn test_start_calibration_defaults() {
        let hal = MockHal::default();

        let (status, body) = call!(hal, test::TestRequest::post().uri("/start_calibration?servo_id=3"));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "success",
                "message": "Calibration started for servo 3",
                "details": { "speed": 300, "current_threshold": 600.0 }
            })
        );
        assert_eq!(
            hal.calls(),
            vec![
                MockCall::Connect("192.168.1.1".to_string()),
                MockCall::StartCalibration {
                    servo_id: 3,
                    params: CalibrationParams { speed: 300, current_threshold: 600.0 },
                },
                MockCall::Close,
            ]
        );
    }

    #[actix_web::test]
    async fn test_start_calibration_declined() {
        let hal = MockHal::new(MockBehavior {
            calibration_accepted: false,
            ..MockBehavior::default()
        });

        let (status, body) = call!(
            hal,
            test::TestRequest::post().uri("/start_calibration?servo_id=2&speed=100&current=250.5")
        );

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "status": "failure", "message": "Failed to start calibration for servo 2" })
        );
    }

    #[actix_web::test]
    async fn test_servo_info_without_servo_id_is_error() {
        let hal = MockHal::default();

        let (status, body) = call!(hal, test::TestRequest::get().uri("/get_servo_info"));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        let message = body["message"].as_str().unwrap();
        assert!(message.starts_with("An error occurred while fetching the servo information: "));
        assert!(message.contains("servo_id"));
        assert!(hal.calls().is_empty());
    }

    #[actix_web::test]
    async fn test_servo_info_success() {
        let hal = MockHal::default();

        let (status, body) =
            call!(hal, test::TestRequest::get().uri("/get_servo_info?servo_id=5&ip=10.0.0.3"));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["servo_id"], 5);
        assert_eq!(body["info"]["id"], 5);
        assert_eq!(body["info"]["temperature"], 35.0);
        assert!(body.get("message").is_none());
        assert_eq!(hal.calls()[0], MockCall::Connect("10.0.0.3".to_string()));
    }

    #[actix_web::test]
    async fn test_non_numeric_servo_id_is_error() {
        let hal = MockHal::default();

        let (status, body) =
            call!(hal, test::TestRequest::post().uri("/cancel_calibration?servo_id=abc"));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("An error occurred: "));
        assert!(hal.calls().is_empty());
    }

    #[actix_web::test]
    async fn test_empty_settings_is_failure() {
        for uri in ["/set_torque", "/set_torque_enable"] {
            let hal = MockHal::default();

            let (status, body) = call!(
                hal,
                test::TestRequest::post().uri(uri).set_json(json!({ "settings": [] }))
            );

            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body, json!({ "status": "failure", "message": "No settings provided" }));
            assert!(hal.calls().is_empty());
        }
    }

    #[actix_web::test]
    async fn test_torque_enable_parses_case_insensitively() {
        let hal = MockHal::default();

        let (status, body) = call!(
            hal,
            test::TestRequest::post()
                .uri("/set_torque_enable")
                .set_json(json!({ "settings": [[1, "true"], [2, "FALSE"]], "ip": "10.0.0.4" }))
        );

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "success",
                "message": "Torque enable settings applied successfully",
                "settings": [
                    { "servo_id": 1, "status": "enabled" },
                    { "servo_id": 2, "status": "disabled" }
                ]
            })
        );
        assert_eq!(
            hal.calls(),
            vec![
                MockCall::Connect("10.0.0.4".to_string()),
                MockCall::SetTorqueEnable(vec![
                    TorqueEnableSetting { servo_id: 1, enabled: true },
                    TorqueEnableSetting { servo_id: 2, enabled: false },
                ]),
                MockCall::Close,
            ]
        );
    }

    #[actix_web::test]
    async fn test_set_torque_echoes_settings() {
        let hal = MockHal::default();

        let (status, body) = call!(
            hal,
            test::TestRequest::post()
                .uri("/set_torque")
                .set_json(json!({ "settings": [[3, 40], [4, 12.5]] }))
        );

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Torque settings applied successfully");
        assert_eq!(
            body["settings"],
            json!([{ "servo_id": 3, "torque": 40 }, { "servo_id": 4, "torque": 12.5 }])
        );
        assert!(body["settings"][0]["torque"].is_u64());
        assert_eq!(
            hal.commands(),
            vec![MockCall::SetTorque(vec![
                TorqueSetting { servo_id: 3, torque: 40.into() },
                TorqueSetting { servo_id: 4, torque: Number::from_f64(12.5).unwrap() },
            ])]
        );
    }

    #[actix_web::test]
    async fn test_malformed_json_body_is_error() {
        let hal = MockHal::default();

        let (status, body) = call!(
            hal,
            test::TestRequest::post()
                .uri("/set_torque")
                .insert_header(("content-type", "application/json"))
                .set_payload("{\"settings\": [[1, 2]")
        );

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(hal.calls().is_empty());
    }

    #[actix_web::test]
    async fn test_positions_are_rounded() {
        let hal = MockHal::new(MockBehavior {
            positions: vec![
                ServoPosition { servo_id: 1, position: 12.3456, speed: 1.111 },
                ServoPosition { servo_id: 2, position: 0.0, speed: -3.456 },
            ],
            ..MockBehavior::default()
        });

        let (status, body) = call!(hal, test::TestRequest::get().uri("/get_positions"));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "success",
                "message": "Current positions and speeds retrieved",
                "data": [
                    { "servo_id": 1, "position": 12.35, "speed": 1.11 },
                    { "servo_id": 2, "position": 0.0, "speed": -3.46 }
                ]
            })
        );
    }

    #[actix_web::test]
    async fn test_change_servo_id_declined() {
        let hal = MockHal::new(MockBehavior {
            change_id_accepted: false,
            ..MockBehavior::default()
        });

        let (status, body) =
            call!(hal, test::TestRequest::post().uri("/change_servo_id?old_id=5&new_id=9"));

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "status": "failure", "message": "Failed to change servo ID" }));
        assert_eq!(hal.commands(), vec![MockCall::ChangeId { old_id: 5, new_id: 9 }]);
        assert_eq!(hal.open_sessions(), 0);
    }

    #[actix_web::test]
    async fn test_change_servo_id_success() {
        let hal = MockHal::default();

        let (status, body) =
            call!(hal, test::TestRequest::post().uri("/change_servo_id?old_id=5&new_id=9"));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully changed servo ID from 5 to 9");
    }

    #[actix_web::test]
    async fn test_unreachable_device_is_error_on_every_endpoint() {
        let requests = vec![
            test::TestRequest::post().uri("/start_calibration?servo_id=1"),
            test::TestRequest::post().uri("/cancel_calibration?servo_id=1"),
            test::TestRequest::get().uri("/get_calibration_status"),
            test::TestRequest::get().uri("/get_positions"),
            test::TestRequest::get().uri("/get_servo_info?servo_id=1"),
            test::TestRequest::get().uri("/scan_servos"),
            test::TestRequest::post().uri("/change_servo_id?old_id=1&new_id=2"),
            test::TestRequest::post().uri("/set_torque").set_json(json!({ "settings": [[1, 10]] })),
            test::TestRequest::post()
                .uri("/set_torque_enable")
                .set_json(json!({ "settings": [[1, "true"]] })),
            test::TestRequest::get().uri("/get_imu_data"),
            test::TestRequest::post().uri("/enable_movement").set_json(json!({})),
            test::TestRequest::post().uri("/disable_movement").set_json(json!({})),
        ];

        for req in requests {
            let hal = MockHal::new(MockBehavior {
                unreachable: true,
                ..MockBehavior::default()
            });

            let (status, body) = call!(hal, req);

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["status"], "error");
            assert!(body["message"].as_str().unwrap().contains("host unreachable"));
            assert_eq!(hal.commands(), Vec::new());
            assert_eq!(hal.open_sessions(), 0);
        }
    }

    #[actix_web::test]
    async fn test_scan_error_prefix() {
        let hal = MockHal::new(MockBehavior {
            command_error: Some("bus fault".to_string()),
            ..MockBehavior::default()
        });

        let (status, body) = call!(hal, test::TestRequest::get().uri("/scan_servos"));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["message"],
            "An error occurred while scanning for servos: Device error: bus fault"
        );
        assert_eq!(hal.open_sessions(), 0);
    }

    #[actix_web::test]
    async fn test_scan_and_calibration_status() {
        let hal = MockHal::new(MockBehavior {
            servo_ids: vec![1, 2, 7],
            ..MockBehavior::default()
        });

        let (_, body) = call!(hal, test::TestRequest::get().uri("/scan_servos"));
        assert_eq!(body, json!({ "status": "success", "servo_ids": [1, 2, 7] }));

        let (_, body) = call!(hal, test::TestRequest::get().uri("/get_calibration_status"));
        assert_eq!(
            body,
            json!({ "status": "success", "message": "No calibration in progress" })
        );
    }

    #[actix_web::test]
    async fn test_close_failure_after_success_is_error() {
        let hal = MockHal::new(MockBehavior {
            close_error: Some("reset by peer".to_string()),
            ..MockBehavior::default()
        });

        let (status, body) = call!(hal, test::TestRequest::get().uri("/get_imu_data"));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An error occurred: Connection error: reset by peer");
    }

    #[actix_web::test]
    async fn test_imu_data_passthrough() {
        let hal = MockHal::default();

        let (status, body) = call!(hal, test::TestRequest::get().uri("/get_imu_data"));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "success",
                "message": "IMU Sensor Data",
                "gyro": { "x": 0.0, "y": 0.0, "z": 0.0 },
                "accel": { "x": 0.0, "y": 0.0, "z": 9.81 }
            })
        );
    }

    #[actix_web::test]
    async fn test_movement_uses_body_address() {
        let hal = MockHal::default();

        let (status, body) = call!(
            hal,
            test::TestRequest::post()
                .uri("/enable_movement")
                .set_json(json!({ "ip": "10.0.0.50" }))
        );

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "status": "success", "message": "Movement enabled for all servos" })
        );
        assert_eq!(
            hal.calls(),
            vec![
                MockCall::Connect("10.0.0.50".to_string()),
                MockCall::EnableMovement,
                MockCall::Close,
            ]
        );
    }

    #[actix_web::test]
    async fn test_movement_without_body_uses_default_address() {
        let hal = MockHal::default();

        let (status, _) = call!(hal, test::TestRequest::post().uri("/disable_movement"));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(hal.calls()[0], MockCall::Connect("192.168.1.1".to_string()));
    }

    #[actix_web::test]
    async fn test_health_never_touches_hardware() {
        let hal = MockHal::default();

        let (status, body) = call!(hal, test::TestRequest::get().uri("/health"));

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "healthy");
        assert_eq!(body["version"], crate::VERSION);
        assert!(hal.calls().is_empty());
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn test_ping_failure_reports_stderr() {
        let hal = MockHal::default();
        let mut settings = Settings::default();
        settings.ping.program = "false".to_string();
        let state = web::Data::new(GatewayState::new(Arc::new(hal.clone()), &settings));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/ping?ip=10.0.0.9").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "failure");
        assert_eq!(body["message"], "Failed to ping 10.0.0.9");
        assert_eq!(body["output"], "");
        assert!(hal.calls().is_empty());
    }

    #[cfg(unix)]
    #[actix_web::test]
    async fn test_ping_success_reports_stdout() {
        let hal = MockHal::default();
        let mut settings = Settings::default();
        settings.ping.program = "echo".to_string();
        let state = web::Data::new(GatewayState::new(Arc::new(hal.clone()), &settings));
        let app = test::init_service(App::new().app_data(state).configure(configure)).await;

        let req = test::TestRequest::get().uri("/ping?ip=10.0.0.9").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Successfully pinged 10.0.0.9");
        assert_eq!(body["output"], "-c 1 -- 10.0.0.9\n");
    }
}
