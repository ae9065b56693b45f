//! 邮编记录

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::RawPostalPayload;

/// 字段长度上限，与 `postal_codes` 表结构一致
pub const MAX_CODE_LEN: usize = 10;
pub const MAX_COUNTRY_LEN: usize = 60;
pub const MAX_ABBREVIATION_LEN: usize = 10;
pub const MAX_PLACE_NAME_LEN: usize = 100;
pub const MAX_STATE_LEN: usize = 100;

/// 记录校验错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    #[error("field `{field}` is {actual} characters long, at most {max} allowed")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{field} {value} is out of range")]
    CoordinateOutOfRange { field: &'static str, value: f64 },

    #[error("payload contains no places")]
    NoPlaces,
}

/// 一个已解析的邮编
///
/// `code` 是唯一键，创建后不再修改；记录存在时坐标、国家与地区必然存在。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalRecord {
    pub code: String,
    pub country: String,
    pub country_abbreviation: String,
    pub place_name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub state: String,
    #[serde(default)]
    pub state_abbreviation: String,
}

impl PostalRecord {
    /// 由远端数据构造记录，使用第一个 place
    ///
    /// 记录以请求的邮编为键，而不是响应中的 `post code`
    pub fn from_payload(code: &str, payload: &RawPostalPayload) -> Result<Self, ValidationError> {
        let place = payload.places.first().ok_or(ValidationError::NoPlaces)?;

        let record = Self {
            code: code.trim().to_string(),
            country: payload.country.trim().to_string(),
            country_abbreviation: payload.country_abbreviation.trim().to_string(),
            place_name: place.place_name.trim().to_string(),
            longitude: place.longitude,
            latitude: place.latitude,
            state: place.state.trim().to_string(),
            state_abbreviation: place.state_abbreviation.trim().to_string(),
        };
        record.validate()?;
        Ok(record)
    }

    /// 校验字段约束
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_text("code", &self.code, MAX_CODE_LEN, true)?;
        check_text("country", &self.country, MAX_COUNTRY_LEN, true)?;
        check_text(
            "country_abbreviation",
            &self.country_abbreviation,
            MAX_ABBREVIATION_LEN,
            true,
        )?;
        check_text("place_name", &self.place_name, MAX_PLACE_NAME_LEN, true)?;
        check_text("state", &self.state, MAX_STATE_LEN, true)?;
        check_text(
            "state_abbreviation",
            &self.state_abbreviation,
            MAX_ABBREVIATION_LEN,
            false,
        )?;
        check_coordinate("longitude", self.longitude, 180.0)?;
        check_coordinate("latitude", self.latitude, 90.0)?;
        Ok(())
    }
}

fn check_text(
    field: &'static str,
    value: &str,
    max: usize,
    required: bool,
) -> Result<(), ValidationError> {
    if required && value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    // 按字符计数，地名多为西里尔字母
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

fn check_coordinate(field: &'static str, value: f64, bound: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value.abs() > bound {
        return Err(ValidationError::CoordinateOutOfRange { field, value });
    }
    Ok(())
}

impl fmt::Display for PostalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Longitude: {},", self.longitude)?;
        writeln!(f, "Latitude: {},", self.latitude)?;
        writeln!(f, "Country: {},", self.country)?;
        write!(f, "State: {}", self.state)
    }
}
