//! Fluent builder producing attribute mappings and model instances
//!
//! A builder is cheap and short-lived: it borrows the shared registry,
//! carries its own configuration (definition name, active states, repeat
//! count, connection override), and resolves everything lazily at generation
//! time. Generation returns [`Generated::One`] when no repeat count is set
//! and [`Generated::Many`] otherwise, so `times(0)` yields an empty set
//! rather than an error.

use std::any::TypeId;
use std::marker::PhantomData;
use std::slice;
use std::sync::Arc;

use serde_json::Value;

use crate::attributes::{Attribute, AttributeMap, DeferredFn, ResolvedMap, SubFactory};
use crate::error::{FactoryError, FactoryResult};
use crate::model::Model;
use crate::registry::{Callback, Factory, StateEntry};

/// Output of a generation call: one instance, or a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Generated<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Generated<T> {
    /// The single produced value, if exactly one was produced
    pub fn one(self) -> Option<T> {
        match self {
            Generated::One(value) => Some(value),
            Generated::Many(mut values) if values.len() == 1 => values.pop(),
            Generated::Many(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Generated::One(value) => vec![value],
            Generated::Many(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Generated::One(_) => 1,
            Generated::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        match self {
            Generated::One(value) => slice::from_ref(value).iter(),
            Generated::Many(values) => values.iter(),
        }
    }
}

impl<T> IntoIterator for Generated<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

/// Builder for one model type under one definition name
pub struct FactoryBuilder<M: Model> {
    factory: Factory,
    name: String,
    connection: Option<String>,
    active_states: Vec<String>,
    amount: Option<i64>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for FactoryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            name: self.name.clone(),
            connection: self.connection.clone(),
            active_states: self.active_states.clone(),
            amount: self.amount,
            _marker: PhantomData,
        }
    }
}

impl<M: Model> FactoryBuilder<M> {
    pub(crate) fn new(factory: Factory, name: &str) -> Self {
        Self {
            factory,
            name: name.to_string(),
            connection: None,
            active_states: Vec::new(),
            amount: None,
            _marker: PhantomData,
        }
    }

    /// Set the repeat count for subsequent generation calls
    ///
    /// Counts below one are legal and yield an empty batch.
    pub fn times(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Activate a state; existence is checked at resolution time
    pub fn state(self, state: impl Into<String>) -> Self {
        self.states([state])
    }

    /// Activate several states, in order
    pub fn states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_states.extend(states.into_iter().map(Into::into));
        self
    }

    /// Override the persistence connection for created instances
    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection = Some(name.into());
        self
    }

    /// Resolve attribute mappings without materializing instances
    pub async fn raw(&self, overrides: AttributeMap) -> FactoryResult<Generated<ResolvedMap>> {
        match self.amount {
            None => Ok(Generated::One(self.raw_attributes(&overrides).await?)),
            Some(amount) if amount < 1 => Ok(Generated::Many(Vec::new())),
            Some(amount) => {
                let mut mappings = Vec::with_capacity(amount as usize);
                for _ in 0..amount {
                    mappings.push(self.raw_attributes(&overrides).await?);
                }
                Ok(Generated::Many(mappings))
            }
        }
    }

    /// Materialize instances in memory and run after-making callbacks
    pub async fn make(&self, overrides: AttributeMap) -> FactoryResult<Generated<M>> {
        match self.amount {
            None => Ok(Generated::One(self.make_single(&overrides).await?)),
            Some(amount) if amount < 1 => Ok(Generated::Many(Vec::new())),
            Some(amount) => {
                let mut instances = Vec::with_capacity(amount as usize);
                for _ in 0..amount {
                    instances.push(self.make_instance(&overrides).await?);
                }
                self.call_after_making(&mut instances);
                Ok(Generated::Many(instances))
            }
        }
    }

    /// Make, persist, and run after-creating callbacks
    pub async fn create(&self, overrides: AttributeMap) -> FactoryResult<Generated<M>> {
        match self.amount {
            None => Ok(Generated::One(self.create_single(&overrides).await?)),
            Some(amount) if amount < 1 => Ok(Generated::Many(Vec::new())),
            Some(amount) => {
                let mut instances = Vec::with_capacity(amount as usize);
                for _ in 0..amount {
                    instances.push(self.make_instance(&overrides).await?);
                }
                self.call_after_making(&mut instances);
                self.store(&mut instances).await?;
                self.call_after_creating(&mut instances);
                Ok(Generated::Many(instances))
            }
        }
    }

    /// Defer a `create` call with the given overrides
    pub fn lazy(&self, overrides: AttributeMap) -> LazyCreate<M> {
        LazyCreate {
            builder: self.clone(),
            overrides,
        }
    }

    /// Resolution pipeline: definition, states in order, caller overrides,
    /// then expansion of deferred, nested, and reference attributes.
    pub(crate) async fn raw_attributes(
        &self,
        overrides: &AttributeMap,
    ) -> FactoryResult<ResolvedMap> {
        let ty = TypeId::of::<M>();
        let definition =
            self.factory
                .definition(ty, &self.name)
                .ok_or_else(|| FactoryError::UnknownDefinition {
                    model: M::model_name(),
                    name: self.name.clone(),
                })?;

        let faker = self.factory.faker();
        let mut attributes = definition(faker, overrides);

        for state in &self.active_states {
            match self.factory.state_entry(ty, state) {
                Some(StateEntry::Static(overlay)) => attributes.extend(overlay),
                Some(StateEntry::Generator(generator)) => {
                    attributes.extend(generator(faker, overrides));
                }
                None => {
                    // Callback-only states contribute no attributes.
                    if self.factory.has_after_callback(ty, state) {
                        continue;
                    }
                    return Err(FactoryError::UnknownState {
                        model: M::model_name(),
                        state: state.clone(),
                    });
                }
            }
        }

        attributes.extend(overrides.clone());
        self.expand(attributes).await
    }

    async fn expand(&self, attributes: AttributeMap) -> FactoryResult<ResolvedMap> {
        let mut resolved = ResolvedMap::new();
        let mut deferred: Vec<(String, Arc<DeferredFn>)> = Vec::new();

        for (key, attribute) in attributes {
            match attribute {
                Attribute::Literal(value) => {
                    resolved.insert(key, value);
                }
                Attribute::Reference(model) => {
                    let value = model
                        .key()
                        .ok_or(FactoryError::MissingPrimaryKey(model.keyed_name()))?;
                    resolved.insert(key, value);
                }
                Attribute::Factory(nested) => {
                    resolved.insert(key, nested.create_key().await?);
                }
                Attribute::Deferred(f) => deferred.push((key, f)),
            }
        }

        // Deferred attributes see all non-deferred values, plus any deferred
        // value resolved before them in key order.
        deferred.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, f) in deferred {
            let value = f(&resolved);
            resolved.insert(key, value);
        }

        Ok(resolved)
    }

    async fn make_instance(&self, overrides: &AttributeMap) -> FactoryResult<M> {
        let row = self.raw_attributes(overrides).await?;
        M::from_row(row)
    }

    pub(crate) async fn make_single(&self, overrides: &AttributeMap) -> FactoryResult<M> {
        let mut instance = self.make_instance(overrides).await?;
        self.call_after_making(slice::from_mut(&mut instance));
        Ok(instance)
    }

    pub(crate) async fn create_single(&self, overrides: &AttributeMap) -> FactoryResult<M> {
        let mut instance = self.make_single(overrides).await?;
        self.store(slice::from_mut(&mut instance)).await?;
        self.call_after_creating(slice::from_mut(&mut instance));
        Ok(instance)
    }

    async fn store(&self, instances: &mut [M]) -> FactoryResult<()> {
        for instance in instances.iter_mut() {
            let row = instance.to_row()?;
            let key = self
                .factory
                .persister()
                .insert(M::table(), M::key_name(), self.connection.as_deref(), &row)
                .await?;
            instance.set_primary_key(&key)?;
            tracing::debug!(
                table = M::table(),
                connection = ?self.connection,
                "persisted factory instance"
            );
        }
        Ok(())
    }

    fn call_after_making(&self, instances: &mut [M]) {
        self.call_after(instances, |name| {
            self.factory.after_making_callbacks::<M>(name)
        });
    }

    fn call_after_creating(&self, instances: &mut [M]) {
        self.call_after(instances, |name| {
            self.factory.after_creating_callbacks::<M>(name)
        });
    }

    // Dispatch order: per instance, the definition name first, then active
    // states in the order they were added; within a name, registration order.
    fn call_after<F>(&self, instances: &mut [M], fetch: F)
    where
        F: Fn(&str) -> Vec<Callback<M>>,
    {
        let mut names: Vec<&str> = Vec::with_capacity(1 + self.active_states.len());
        names.push(self.name.as_str());
        names.extend(self.active_states.iter().map(String::as_str));

        let faker = self.factory.faker();
        for instance in instances.iter_mut() {
            for name in &names {
                for callback in fetch(name) {
                    callback(instance, faker);
                }
            }
        }
    }
}

impl Attribute {
    /// Nested builder attribute: the related entity is created during
    /// expansion and its primary key substituted.
    pub fn factory<M: Model>(builder: FactoryBuilder<M>) -> Self {
        Attribute::Factory(Arc::new(builder))
    }
}

#[async_trait::async_trait]
impl<M: Model> SubFactory for FactoryBuilder<M> {
    async fn create_key(&self) -> FactoryResult<Value> {
        let instance = self.create_single(&AttributeMap::new()).await?;
        instance
            .primary_key()
            .ok_or(FactoryError::MissingPrimaryKey(M::model_name()))
    }
}

/// Deferred `create` call produced by [`FactoryBuilder::lazy`]
pub struct LazyCreate<M: Model> {
    builder: FactoryBuilder<M>,
    overrides: AttributeMap,
}

impl<M: Model> LazyCreate<M> {
    /// Perform the deferred create exactly as configured
    pub async fn call(&self) -> FactoryResult<Generated<M>> {
        self.builder.create(self.overrides.clone()).await
    }
}
