//! Attribute values produced by definitions and states
//!
//! Resolution distinguishes four kinds of attribute value: a plain literal,
//! a deferred computation over already-resolved attributes, a nested factory
//! builder (replaced by the key of the entity it creates), and a reference
//! to an existing entity (replaced by its key). The expansion pass in the
//! builder turns an [`AttributeMap`] into a [`ResolvedMap`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::FactoryResult;
use crate::model::Model;

/// Unresolved attribute mapping, as returned by definitions and states
pub type AttributeMap = HashMap<String, Attribute>;

/// Fully resolved attribute mapping, ready for materialization
pub type ResolvedMap = HashMap<String, Value>;

/// Deferred attribute computation over the in-progress resolved mapping
pub type DeferredFn = dyn Fn(&ResolvedMap) -> Value + Send + Sync;

/// Type-erased nested factory builder, resolved to the created entity's key
#[async_trait::async_trait]
pub trait SubFactory: Send + Sync {
    async fn create_key(&self) -> FactoryResult<Value>;
}

/// Type-erased reference to an already-constructed entity
pub trait Keyed: Send + Sync {
    fn key(&self) -> Option<Value>;
    fn keyed_name(&self) -> &'static str;
}

impl<M: Model> Keyed for M {
    fn key(&self) -> Option<Value> {
        self.primary_key()
    }

    fn keyed_name(&self) -> &'static str {
        M::model_name()
    }
}

/// One attribute value in a definition, state, or override mapping
#[derive(Clone)]
pub enum Attribute {
    /// Plain value, passed through unchanged
    Literal(Value),
    /// Computed from the in-progress resolved mapping during expansion
    Deferred(Arc<DeferredFn>),
    /// Nested builder; the related entity is created and its key substituted
    Factory(Arc<dyn SubFactory>),
    /// Existing entity; its key is substituted
    Reference(Arc<dyn Keyed>),
}

impl Attribute {
    pub fn literal(value: impl Into<Value>) -> Self {
        Attribute::Literal(value.into())
    }

    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&ResolvedMap) -> Value + Send + Sync + 'static,
    {
        Attribute::Deferred(Arc::new(f))
    }

    pub fn reference<M: Model>(model: M) -> Self {
        Attribute::Reference(Arc::new(model))
    }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Attribute::Literal(value)
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Attribute::Deferred(_) => f.write_str("Deferred(..)"),
            Attribute::Factory(_) => f.write_str("Factory(..)"),
            Attribute::Reference(keyed) => {
                f.debug_tuple("Reference").field(&keyed.key()).finish()
            }
        }
    }
}

/// Build an [`AttributeMap`] of literal values
///
/// ```
/// let attrs = fabriq::attributes! {
///     "name" => "Ada",
///     "active" => true,
/// };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attributes {
    () => {
        $crate::attributes::AttributeMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::attributes::AttributeMap::new();
        $(
            map.insert(
                ($key).to_string(),
                $crate::attributes::Attribute::from($crate::__serde_json::json!($value)),
            );
        )+
        map
    }};
}
