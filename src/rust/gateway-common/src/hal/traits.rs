//! HAL抽象化トレイト

use async_trait::async_trait;
use std::sync::Arc;
use crate::error::Result;
use super::types::{
    CalibrationParams, CalibrationStatus, ImuData, ServoId, ServoInfo, ServoPosition,
    TorqueEnableSetting, TorqueSetting,
};

/// サーボ操作（`servo.*`）
#[async_trait]
pub trait ServoApi: Send {
    /// キャリブレーションを開始（デバイスが拒否した場合は `false`）
    async fn start_calibration(
        &mut self,
        servo_id: ServoId,
        params: CalibrationParams,
    ) -> Result<bool>;

    /// キャリブレーションを中止
    async fn cancel_calibration(&mut self, servo_id: ServoId) -> Result<bool>;

    /// キャリブレーション状態を取得
    async fn get_calibration_status(&mut self) -> Result<CalibrationStatus>;

    /// 全サーボの位置と速度を取得（デバイスの報告順）
    async fn get_positions(&mut self) -> Result<Vec<ServoPosition>>;

    /// サーボ情報を取得
    async fn get_servo_info(&mut self, servo_id: ServoId) -> Result<ServoInfo>;

    /// 接続されているサーボをスキャン
    async fn scan(&mut self) -> Result<Vec<ServoId>>;

    /// サーボIDを変更
    async fn change_id(&mut self, old_id: ServoId, new_id: ServoId) -> Result<bool>;

    /// トルクを設定
    async fn set_torque(&mut self, settings: &[TorqueSetting]) -> Result<()>;

    /// トルクの有効/無効を設定
    async fn set_torque_enable(&mut self, settings: &[TorqueEnableSetting]) -> Result<()>;

    /// 全サーボの動作を有効化
    async fn enable_movement(&mut self) -> Result<()>;

    /// 全サーボの動作を無効化
    async fn disable_movement(&mut self) -> Result<()>;
}

/// IMU操作（`imu.*`）
#[async_trait]
pub trait ImuApi: Send {
    /// ジャイロと加速度を取得
    async fn get_imu_data(&mut self) -> Result<ImuData>;
}

/// 1リクエスト分のHAL接続
#[async_trait]
pub trait HalSession: ServoApi + ImuApi {
    /// 切断（2回目以降は何もしない）
    async fn close(&mut self) -> Result<()>;
}

/// HALへの接続を確立するトレイト
#[async_trait]
pub trait HalConnector: Send + Sync {
    /// アドレスに接続
    async fn connect(&self, address: &str) -> Result<Box<dyn HalSession>>;
}

/// Arc<T>にHalConnectorトレイトを実装
#[async_trait]
impl<T: HalConnector + ?Sized> HalConnector for Arc<T> {
    async fn connect(&self, address: &str) -> Result<Box<dyn HalSession>> {
        (**self).connect(address).await
    }
}
