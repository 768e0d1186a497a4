//! Factory registry: definitions, states, and lifecycle callbacks
//!
//! The registry is populated once during setup and then shared read-only by
//! any number of builders. Entries are keyed by `(TypeId, name)`, which keeps
//! the three cases distinct: a state registered with attributes, a state that
//! exists only as a callback target, and a state that is missing entirely.
//!
//! `Factory` is a cheap-clone handle; clones share the same registries and
//! persistence backend.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::attributes::{AttributeMap, ResolvedMap};
use crate::builder::FactoryBuilder;
use crate::error::FactoryResult;
use crate::fake::Faker;
use crate::model::Model;
use crate::persist::Persister;

/// Name of the base definition used when none is given
pub const DEFAULT_DEFINITION: &str = "default";

/// Generator signature shared by definitions and generator-based states
pub type DefinitionFn = dyn Fn(&Faker, &AttributeMap) -> AttributeMap + Send + Sync;

/// Registered lifecycle callback for a model type
pub type Callback<M> = Arc<dyn Fn(&mut M, &Faker) + Send + Sync>;

/// A registered state: a static overlay or a generator
#[derive(Clone)]
pub enum StateEntry {
    Static(AttributeMap),
    Generator(Arc<DefinitionFn>),
}

type Key = (TypeId, String);
type CallbackMap = HashMap<Key, Vec<Box<dyn Any + Send + Sync>>>;

struct Inner {
    definitions: RwLock<HashMap<Key, Arc<DefinitionFn>>>,
    states: RwLock<HashMap<Key, StateEntry>>,
    after_making: RwLock<CallbackMap>,
    after_creating: RwLock<CallbackMap>,
    faker: Faker,
    persister: Arc<dyn Persister>,
}

/// Shared registry of model definitions, states, and callbacks
#[derive(Clone)]
pub struct Factory {
    inner: Arc<Inner>,
}

impl Factory {
    pub fn new(persister: Arc<dyn Persister>) -> Self {
        Self {
            inner: Arc::new(Inner {
                definitions: RwLock::new(HashMap::new()),
                states: RwLock::new(HashMap::new()),
                after_making: RwLock::new(HashMap::new()),
                after_creating: RwLock::new(HashMap::new()),
                faker: Faker::new(),
                persister,
            }),
        }
    }

    /// Register the default definition for a model type
    ///
    /// # Panics
    /// Panics if the registry lock is poisoned.
    pub fn define<M, F>(&self, generator: F)
    where
        M: Model,
        F: Fn(&Faker, &AttributeMap) -> AttributeMap + Send + Sync + 'static,
    {
        self.define_as::<M, F>(DEFAULT_DEFINITION, generator);
    }

    /// Register a named definition for a model type
    ///
    /// # Panics
    /// Panics if the registry lock is poisoned.
    pub fn define_as<M, F>(&self, name: &str, generator: F)
    where
        M: Model,
        F: Fn(&Faker, &AttributeMap) -> AttributeMap + Send + Sync + 'static,
    {
        self.inner
            .definitions
            .write()
            .unwrap()
            .insert((TypeId::of::<M>(), name.to_string()), Arc::new(generator));
    }

    /// Register a state as a static attribute overlay
    ///
    /// # Panics
    /// Panics if the registry lock is poisoned.
    pub fn state<M: Model>(&self, state: &str, attributes: AttributeMap) {
        self.inner.states.write().unwrap().insert(
            (TypeId::of::<M>(), state.to_string()),
            StateEntry::Static(attributes),
        );
    }

    /// Register a state backed by a generator
    ///
    /// # Panics
    /// Panics if the registry lock is poisoned.
    pub fn state_with<M, F>(&self, state: &str, generator: F)
    where
        M: Model,
        F: Fn(&Faker, &AttributeMap) -> AttributeMap + Send + Sync + 'static,
    {
        self.inner.states.write().unwrap().insert(
            (TypeId::of::<M>(), state.to_string()),
            StateEntry::Generator(Arc::new(generator)),
        );
    }

    /// Register a callback run after in-memory construction
    ///
    /// # Panics
    /// Panics if the registry lock is poisoned.
    pub fn after_making<M, F>(&self, callback: F)
    where
        M: Model,
        F: Fn(&mut M, &Faker) + Send + Sync + 'static,
    {
        self.after_making_state::<M, F>(DEFAULT_DEFINITION, callback);
    }

    /// Register an after-making callback scoped to a state name
    ///
    /// # Panics
    /// Panics if the registry lock is poisoned.
    pub fn after_making_state<M, F>(&self, state: &str, callback: F)
    where
        M: Model,
        F: Fn(&mut M, &Faker) + Send + Sync + 'static,
    {
        let callback: Callback<M> = Arc::new(callback);
        self.inner
            .after_making
            .write()
            .unwrap()
            .entry((TypeId::of::<M>(), state.to_string()))
            .or_default()
            .push(Box::new(callback));
    }

    /// Register a callback run after persistence
    ///
    /// # Panics
    /// Panics if the registry lock is poisoned.
    pub fn after_creating<M, F>(&self, callback: F)
    where
        M: Model,
        F: Fn(&mut M, &Faker) + Send + Sync + 'static,
    {
        self.after_creating_state::<M, F>(DEFAULT_DEFINITION, callback);
    }

    /// Register an after-creating callback scoped to a state name
    ///
    /// # Panics
    /// Panics if the registry lock is poisoned.
    pub fn after_creating_state<M, F>(&self, state: &str, callback: F)
    where
        M: Model,
        F: Fn(&mut M, &Faker) + Send + Sync + 'static,
    {
        let callback: Callback<M> = Arc::new(callback);
        self.inner
            .after_creating
            .write()
            .unwrap()
            .entry((TypeId::of::<M>(), state.to_string()))
            .or_default()
            .push(Box::new(callback));
    }

    /// Builder for a model type under the default definition
    pub fn of<M: Model>(&self) -> FactoryBuilder<M> {
        FactoryBuilder::new(self.clone(), DEFAULT_DEFINITION)
    }

    /// Builder for a model type under a named definition
    pub fn of_definition<M: Model>(&self, name: &str) -> FactoryBuilder<M> {
        FactoryBuilder::new(self.clone(), name)
    }

    /// Resolve a single attribute mapping without materializing
    pub async fn raw_of<M: Model>(&self, overrides: AttributeMap) -> FactoryResult<ResolvedMap> {
        self.of::<M>().raw_attributes(&overrides).await
    }

    /// Make one unsaved instance under the default definition
    pub async fn make_one<M: Model>(&self, overrides: AttributeMap) -> FactoryResult<M> {
        self.of::<M>().make_single(&overrides).await
    }

    /// Create and persist one instance under the default definition
    pub async fn create_one<M: Model>(&self, overrides: AttributeMap) -> FactoryResult<M> {
        self.of::<M>().create_single(&overrides).await
    }

    /// Create and persist a batch of instances
    pub async fn create_many<M: Model>(
        &self,
        count: i64,
        overrides: AttributeMap,
    ) -> FactoryResult<Vec<M>> {
        Ok(self
            .of::<M>()
            .times(count)
            .create(overrides)
            .await?
            .into_vec())
    }

    pub(crate) fn definition(&self, ty: TypeId, name: &str) -> Option<Arc<DefinitionFn>> {
        self.inner
            .definitions
            .read()
            .unwrap()
            .get(&(ty, name.to_string()))
            .cloned()
    }

    pub(crate) fn state_entry(&self, ty: TypeId, state: &str) -> Option<StateEntry> {
        self.inner
            .states
            .read()
            .unwrap()
            .get(&(ty, state.to_string()))
            .cloned()
    }

    pub(crate) fn has_after_callback(&self, ty: TypeId, state: &str) -> bool {
        let key = (ty, state.to_string());
        self.inner.after_making.read().unwrap().contains_key(&key)
            || self.inner.after_creating.read().unwrap().contains_key(&key)
    }

    pub(crate) fn after_making_callbacks<M: Model>(&self, name: &str) -> Vec<Callback<M>> {
        Self::callbacks::<M>(&self.inner.after_making, name)
    }

    pub(crate) fn after_creating_callbacks<M: Model>(&self, name: &str) -> Vec<Callback<M>> {
        Self::callbacks::<M>(&self.inner.after_creating, name)
    }

    // Callbacks are cloned out under the read lock so dispatch never holds it.
    fn callbacks<M: Model>(registry: &RwLock<CallbackMap>, name: &str) -> Vec<Callback<M>> {
        registry
            .read()
            .unwrap()
            .get(&(TypeId::of::<M>(), name.to_string()))
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.downcast_ref::<Callback<M>>().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn faker(&self) -> &Faker {
        &self.inner.faker
    }

    pub(crate) fn persister(&self) -> &Arc<dyn Persister> {
        &self.inner.persister
    }
}
