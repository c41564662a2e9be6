//! エンドポイントごとのパラメータ抽出
//!
//! クエリ文字列またはJSONボディから型付きのパラメータを作る。副作用はない。

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{GatewayError, Result};
use crate::hal::{CalibrationParams, ServoId, TorqueEnableSetting, TorqueSetting};

/// 設定リストが空・未指定の場合のメッセージ
pub const NO_SETTINGS: &str = "No settings provided";

/// クエリパラメータ
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    params: HashMap<String, String>,
}

impl QueryParams {
    pub fn new(params: HashMap<String, String>) -> Self {
        QueryParams { params }
    }

    /// `ip` を取得（未指定なら既定アドレス）
    pub fn address(&self, default_ip: &str) -> String {
        self.params
            .get("ip")
            .cloned()
            .unwrap_or_else(|| default_ip.to_string())
    }

    /// 必須パラメータを解析
    pub fn required<T: FromStr>(&self, name: &str) -> Result<T> {
        match self.params.get(name) {
            Some(raw) => parse_text(name, raw),
            None => Err(GatewayError::InvalidParameter(format!(
                "missing required parameter '{}'",
                name
            ))),
        }
    }

    /// 任意パラメータを解析（未指定なら既定値）
    pub fn optional<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        match self.params.get(name) {
            Some(raw) => parse_text(name, raw),
            None => Ok(default),
        }
    }
}

fn parse_text<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        GatewayError::InvalidParameter(format!("invalid value for '{}': {:?}", name, raw))
    })
}

/// JSONボディ
#[derive(Debug, Clone, Default)]
pub struct JsonBody {
    fields: Map<String, Value>,
}

impl JsonBody {
    /// ボディを解析（空ボディは空オブジェクトとして扱う）
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody::default());
        }
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(fields) => Ok(JsonBody { fields }),
            Value::Null => Ok(JsonBody::default()),
            other => Err(GatewayError::InvalidParameter(format!(
                "request body must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// `ip` を取得（ボディ → クエリ → 既定アドレスの順）
    pub fn address(&self, query: &QueryParams, default_ip: &str) -> String {
        match self.fields.get("ip") {
            Some(Value::String(ip)) => ip.clone(),
            _ => query.address(default_ip),
        }
    }

    /// `settings` を取得。空・未指定は検証エラー。
    fn settings(&self) -> Result<&[Value]> {
        match self.fields.get("settings") {
            Some(Value::Array(items)) if !items.is_empty() => Ok(items.as_slice()),
            None | Some(Value::Null) => Err(GatewayError::Validation(NO_SETTINGS.to_string())),
            Some(Value::Array(_)) => Err(GatewayError::Validation(NO_SETTINGS.to_string())),
            Some(other) => Err(GatewayError::InvalidParameter(format!(
                "'settings' must be a list of [servo_id, value] pairs, got {}",
                json_type(other)
            ))),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// `[servo_id, value]` の組を分解
fn settings_pair<'a>(index: usize, item: &'a Value) -> Result<(ServoId, &'a Value)> {
    let pair = match item.as_array() {
        Some(pair) if pair.len() == 2 => pair,
        _ => {
            return Err(GatewayError::InvalidParameter(format!(
                "settings[{}] must be a [servo_id, value] pair",
                index
            )))
        }
    };

    let servo_id = match &pair[0] {
        Value::Number(n) => n.as_i64().and_then(|v| ServoId::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        GatewayError::InvalidParameter(format!("settings[{}] has an invalid servo id", index))
    })?;

    Ok((servo_id, &pair[1]))
}

/// `POST /start_calibration`
#[derive(Debug, Clone, PartialEq)]
pub struct StartCalibrationParams {
    pub address: String,
    pub servo_id: ServoId,
    pub calibration: CalibrationParams,
}

impl StartCalibrationParams {
    pub fn from_query(query: &QueryParams, default_ip: &str) -> Result<Self> {
        let defaults = CalibrationParams::default();
        Ok(StartCalibrationParams {
            servo_id: query.required("servo_id")?,
            calibration: CalibrationParams {
                speed: query.optional("speed", defaults.speed)?,
                current_threshold: query.optional("current", defaults.current_threshold)?,
            },
            address: query.address(default_ip),
        })
    }
}

/// `servo_id` だけを取るエンドポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoParams {
    pub address: String,
    pub servo_id: ServoId,
}

impl ServoParams {
    pub fn from_query(query: &QueryParams, default_ip: &str) -> Result<Self> {
        Ok(ServoParams {
            servo_id: query.required("servo_id")?,
            address: query.address(default_ip),
        })
    }
}

/// `POST /change_servo_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeIdParams {
    pub address: String,
    pub old_id: ServoId,
    pub new_id: ServoId,
}

impl ChangeIdParams {
    pub fn from_query(query: &QueryParams, default_ip: &str) -> Result<Self> {
        Ok(ChangeIdParams {
            old_id: query.required("old_id")?,
            new_id: query.required("new_id")?,
            address: query.address(default_ip),
        })
    }
}

/// `POST /set_torque`
#[derive(Debug, Clone, PartialEq)]
pub struct TorqueParams {
    pub address: String,
    pub settings: Vec<TorqueSetting>,
}

impl TorqueParams {
    pub fn from_body(body: &JsonBody, query: &QueryParams, default_ip: &str) -> Result<Self> {
        let settings = body
            .settings()?
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let (servo_id, value) = settings_pair(index, item)?;
                let torque = value.as_number().cloned().ok_or_else(|| {
                    GatewayError::InvalidParameter(format!(
                        "settings[{}] torque must be a number",
                        index
                    ))
                })?;
                Ok(TorqueSetting { servo_id, torque })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TorqueParams {
            address: body.address(query, default_ip),
            settings,
        })
    }
}

/// `POST /set_torque_enable`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorqueEnableParams {
    pub address: String,
    pub settings: Vec<TorqueEnableSetting>,
}

impl TorqueEnableParams {
    pub fn from_body(body: &JsonBody, query: &QueryParams, default_ip: &str) -> Result<Self> {
        let settings = body
            .settings()?
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let (servo_id, value) = settings_pair(index, item)?;
                // "true" との大文字小文字を区別しない比較
                let enabled = match value {
                    Value::String(s) => s.to_lowercase() == "true",
                    Value::Bool(b) => *b,
                    _ => {
                        return Err(GatewayError::InvalidParameter(format!(
                            "settings[{}] status must be \"true\" or \"false\"",
                            index
                        )))
                    }
                };
                Ok(TorqueEnableSetting { servo_id, enabled })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TorqueEnableParams {
            address: body.address(query, default_ip),
            settings,
        })
    }
}
