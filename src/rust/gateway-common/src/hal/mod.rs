//! HAL（ハードウェア抽象化層）モジュール

pub mod traits;
pub mod types;
pub mod tcp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// 再エクスポート
pub use traits::{HalConnector, HalSession, ImuApi, ServoApi};
pub use types::{
    CalibrationParams,
    CalibrationStatus,
    ImuData,
    ServoId,
    ServoInfo,
    ServoPosition,
    TorqueEnableSetting,
    TorqueSetting,
};
pub use tcp::TcpHal;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBehavior, MockCall, MockHal};
