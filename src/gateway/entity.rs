//! Entities handled by the generic DAO.

use crate::error::{GatewayError, GatewayResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A persisted type.
///
/// `default_instance` is what single-object queries return when nothing usable came back.
/// The provided implementation deserializes an empty object, which succeeds for types whose
/// fields are all `#[serde(default)]` or optional; override it otherwise.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn default_instance() -> GatewayResult<Self> {
        serde_json::from_value(Value::Object(Map::new())).map_err(|e| {
            GatewayError::default_construction(std::any::type_name::<Self>(), e.to_string())
        })
    }
}
