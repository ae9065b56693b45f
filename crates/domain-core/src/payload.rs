//! 远端原始数据
//!
//! 字段名与 zippopotam.us 的 JSON 一致（含空格）

use serde::{Deserialize, Deserializer, Serialize};

/// 远端返回的邮编数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPostalPayload {
    #[serde(rename = "post code")]
    pub post_code: String,
    pub country: String,
    #[serde(rename = "country abbreviation")]
    pub country_abbreviation: String,
    #[serde(default)]
    pub places: Vec<RawPlace>,
}

/// 邮编下的地点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPlace {
    #[serde(rename = "place name")]
    pub place_name: String,
    #[serde(deserialize_with = "coordinate")]
    pub longitude: f64,
    #[serde(deserialize_with = "coordinate")]
    pub latitude: f64,
    pub state: String,
    #[serde(rename = "state abbreviation", default)]
    pub state_abbreviation: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Coordinate {
    Number(f64),
    Text(String),
}

/// 线上接口以字符串返回坐标，测试数据中也有数字
fn coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Coordinate::deserialize(deserializer)? {
        Coordinate::Number(value) => Ok(value),
        Coordinate::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid coordinate {text:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_live_api_shape() {
        let body = r#"{
            "post code": "241014",
            "country": "Russia",
            "country abbreviation": "RU",
            "places": [
                {
                    "place name": "Брянск 14",
                    "longitude": "76.9133",
                    "state": "Брянская Область",
                    "state abbreviation": "",
                    "latitude": "48.1699"
                }
            ]
        }"#;

        let payload: RawPostalPayload = serde_json::from_str(body).unwrap();
        assert_eq!(payload.post_code, "241014");
        assert_eq!(payload.country_abbreviation, "RU");
        assert_eq!(payload.places.len(), 1);
        assert_eq!(payload.places[0].longitude, 76.9133);
        assert_eq!(payload.places[0].latitude, 48.1699);
    }

    #[test]
    fn test_numeric_coordinates_and_missing_abbreviation() {
        let body = r#"{
            "post code": "241014",
            "country": "Russia",
            "country abbreviation": "RU",
            "places": [
                {"place name": "Брянск", "longitude": 76.9133, "latitude": 48.1699, "state": "Брянск 14"}
            ]
        }"#;

        let payload: RawPostalPayload = serde_json::from_str(body).unwrap();
        assert_eq!(payload.places[0].longitude, 76.9133);
        assert_eq!(payload.places[0].state_abbreviation, "");
    }

    #[test]
    fn test_invalid_coordinate_text() {
        let body = r#"{
            "post code": "241014",
            "country": "Russia",
            "country abbreviation": "RU",
            "places": [
                {"place name": "x", "longitude": "east", "latitude": "1", "state": "y"}
            ]
        }"#;

        let err = serde_json::from_str::<RawPostalPayload>(body).unwrap_err();
        assert!(err.to_string().contains("invalid coordinate"));
    }
}
