//! Declarative augmentation configuration.
//!
//! A config is a JSON object mapping a transform key to its parameters:
//!
//! ```json
//! {
//!     "resize": {"percentage": 100, "size": [64, 64]},
//!     "hflip": {"percentage": 50},
//!     "rbrightness": {"percentage": 30, "interval": [-20, 20]}
//! }
//! ```
//!
//! Key order is the pipeline order, so the underlying map keeps insertion
//! order (`serde_json` is built with `preserve_order`).

use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::path::Path;

/// Insertion-ordered mapping from transform key to parameter object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AugmentationConfig(Map<String, Value>);

impl AugmentationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse augmentation config")
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).context("Augmentation config must be a JSON object")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read augmentation config: {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("In file {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize augmentation config")
    }

    /// Appends (or replaces) the parameters of one transform.
    pub fn insert(&mut self, key: impl Into<String>, params: Value) -> Option<Value> {
        self.0.insert(key.into(), params)
    }

    /// Appends every entry of `other`, keeping its order.
    pub fn merge(&mut self, other: AugmentationConfig) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Parameter view of `key`'s fragment.
    pub fn params<'a>(&'a self, key: &'a str) -> Result<Params<'a>, ConfigError> {
        match self.0.get(key) {
            Some(Value::Object(values)) => Ok(Params {
                transform: key,
                values,
            }),
            _ => Err(ConfigError::NotAnObject {
                transform: key.to_string(),
            }),
        }
    }
}

impl From<Map<String, Value>> for AugmentationConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Typed access to one transform's parameter object.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    transform: &'a str,
    values: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    pub fn new(transform: &'a str, values: &'a Map<String, Value>) -> Self {
        Self { transform, values }
    }

    pub fn transform(&self) -> &str {
        self.transform
    }

    /// Reads and deserializes a required parameter.
    pub fn get<T: DeserializeOwned>(&self, parameter: &str) -> Result<T, ConfigError> {
        let value = self
            .values
            .get(parameter)
            .ok_or_else(|| ConfigError::MissingParameter {
                transform: self.transform.to_string(),
                parameter: parameter.to_string(),
            })?;
        T::deserialize(value).map_err(|e| self.invalid(parameter, e.to_string()))
    }

    /// The application percentage, an integer in `0..=100`.
    pub fn percentage(&self) -> Result<u8, ConfigError> {
        let raw: u64 = self.get("percentage")?;
        u8::try_from(raw)
            .ok()
            .filter(|p| *p <= 100)
            .ok_or_else(|| self.invalid("percentage", format!("{raw} is outside 0..=100")))
    }

    pub fn invalid(&self, parameter: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidParameter {
            transform: self.transform.to_string(),
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}

/// A real-valued parameter that serializes back in the form it was
/// written: `10` stays `10`, `10.0` stays `10.0`.
#[derive(Debug, Clone, Copy)]
pub struct Scalar {
    value: f64,
    integral: bool,
}

impl Scalar {
    pub fn get(self) -> f64 {
        self.value
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self {
            value,
            integral: false,
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (self.integral, self.value >= 0.0) {
            (true, true) => serializer.serialize_u64(self.value as u64),
            (true, false) => serializer.serialize_i64(self.value as i64),
            (false, _) => serializer.serialize_f64(self.value),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = Number::deserialize(deserializer)?;
        let value = number
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("{number} is not representable as f64")))?;
        Ok(Self {
            value,
            integral: number.is_i64() || number.is_u64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_keep_declaration_order() -> Result<()> {
        let config = AugmentationConfig::from_json_str(
            r#"{"vflip": {"percentage": 1}, "blur": {"percentage": 2, "ksize": [3, 3]}, "hflip": {"percentage": 3}}"#,
        )?;
        assert_eq!(config.keys().collect::<Vec<_>>(), ["vflip", "blur", "hflip"]);
        Ok(())
    }

    #[test]
    fn test_missing_parameter() {
        let config = AugmentationConfig::from_value(json!({"blur": {"percentage": 10}})).unwrap();
        let params = config.params("blur").unwrap();
        let err = params.get::<[u32; 2]>("ksize").unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter { .. }));
    }

    #[test]
    fn test_percentage_out_of_range() {
        let config =
            AugmentationConfig::from_value(json!({"hflip": {"percentage": 101}})).unwrap();
        let err = config.params("hflip").unwrap().percentage().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { .. }));
    }

    #[test]
    fn test_fragment_must_be_object() {
        let config = AugmentationConfig::from_value(json!({"hflip": 50})).unwrap();
        assert!(matches!(
            config.params("hflip"),
            Err(ConfigError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_json_string_round_trip() -> Result<()> {
        let config = AugmentationConfig::from_value(json!({
            "rcrop": {"percentage": 40, "size": 32},
            "hflip": {"percentage": 50},
        }))?;
        let parsed = AugmentationConfig::from_json_str(&config.to_json_string()?)?;
        assert_eq!(parsed, config);
        Ok(())
    }

    #[test]
    fn test_scalar_keeps_written_form() -> Result<()> {
        for value in [json!(10), json!(-3), json!(10.0), json!(0.25)] {
            let scalar: Scalar = serde_json::from_value(value.clone())?;
            assert_eq!(serde_json::to_value(scalar)?, value);
        }
        let integral: Scalar = serde_json::from_value(json!(4))?;
        assert_eq!(integral, Scalar::from(4.0));
        assert_eq!(integral.get(), 4.0);
        Ok(())
    }

    #[test]
    fn test_scalar_rejects_non_numbers() {
        assert!(serde_json::from_value::<Scalar>(json!("4")).is_err());
    }
}
