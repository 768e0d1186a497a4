//! # fabriq: Model Factories
//!
//! A model-factory system for generating test data: register named
//! definitions and state overlays per model type, then use fluent builders
//! to produce raw attribute mappings, in-memory instances, or persisted
//! records, with after-making and after-creating lifecycle callbacks.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use serde_json::Value;
//! use fabriq::prelude::*;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     #[serde(default)]
//!     id: Option<i64>,
//!     name: String,
//!     active: bool,
//! }
//!
//! impl Model for User {
//!     fn table() -> &'static str { "users" }
//!     fn model_name() -> &'static str { "User" }
//!     fn set_primary_key(&mut self, key: &Value) -> FactoryResult<()> {
//!         self.id = serde_json::from_value(key.clone())?;
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> FactoryResult<()> {
//! let factory = Factory::new(Arc::new(MemoryPersister::new()));
//!
//! factory.define::<User, _>(|faker, _| fabriq::attributes! {
//!     "name" => faker.name(),
//!     "active" => false,
//! });
//! factory.state::<User>("active", fabriq::attributes! { "active" => true });
//!
//! let users = factory
//!     .of::<User>()
//!     .state("active")
//!     .times(2)
//!     .create(AttributeMap::new())
//!     .await?
//!     .into_vec();
//! assert_eq!(users.len(), 2);
//! assert!(users.iter().all(|user| user.active && user.id.is_some()));
//! # Ok(())
//! # }
//! ```

#[doc(hidden)]
pub use serde_json as __serde_json;

pub mod attributes;
pub mod builder;
pub mod error;
pub mod fake;
pub mod model;
pub mod persist;
pub mod registry;
pub mod seeder;

// Re-export core types
pub use attributes::{Attribute, AttributeMap, Keyed, ResolvedMap, SubFactory};
pub use builder::{FactoryBuilder, Generated, LazyCreate};
pub use error::{FactoryError, FactoryResult};
pub use fake::Faker;
pub use model::Model;
pub use persist::{MemoryPersister, Persister, DEFAULT_CONNECTION};
pub use registry::{Factory, StateEntry, DEFAULT_DEFINITION};
pub use seeder::{Seeder, SeederRunner};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::attributes::{Attribute, AttributeMap, ResolvedMap};
    pub use crate::builder::{FactoryBuilder, Generated, LazyCreate};
    pub use crate::error::{FactoryError, FactoryResult};
    pub use crate::fake::Faker;
    pub use crate::model::Model;
    pub use crate::persist::{MemoryPersister, Persister};
    pub use crate::registry::{Factory, DEFAULT_DEFINITION};
    pub use crate::seeder::{Seeder, SeederRunner};
}
