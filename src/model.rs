//! Model trait connecting factories to concrete entity types
//!
//! A factory produces attribute mappings; this trait is the bridge that
//! turns a resolved mapping into a typed instance (and back into a row for
//! the persistence backend) through serde.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::attributes::ResolvedMap;
use crate::error::{FactoryError, FactoryResult};

/// Trait for entity types that can be built by factories
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table (or collection) name used by the persistence backend
    fn table() -> &'static str;

    /// Column name of the primary key
    fn key_name() -> &'static str {
        "id"
    }

    /// Short model name used in error messages
    fn model_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Current primary key value, `None` when the instance is unsaved
    fn primary_key(&self) -> Option<Value> {
        let row = self.to_row().ok()?;
        match row.get(Self::key_name()) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        }
    }

    /// Back-fill the primary key assigned by the persistence backend
    fn set_primary_key(&mut self, key: &Value) -> FactoryResult<()>;

    /// Materialize an instance from a resolved attribute mapping
    fn from_row(row: ResolvedMap) -> FactoryResult<Self> {
        let object = Value::Object(row.into_iter().collect());
        Ok(serde_json::from_value(object)?)
    }

    /// Serialize the instance into a row for the persistence backend
    fn to_row(&self) -> FactoryResult<ResolvedMap> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(FactoryError::Serialization(
                <serde_json::Error as serde::de::Error>::custom(
                    "model did not serialize to a JSON object",
                ),
            )),
        }
    }
}
