//! Typed access to a single slice, bound to a provider.
//!
//! `LocationState` takes the provider explicitly. The `use_*` functions find
//! it through `Provider::current()` and fail with `MissingProvider` when
//! nothing is mounted on the calling thread.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{LocationStateError, Result};
use crate::provider::Provider;
use crate::store::{Store, Subscription};
use crate::value::Listener;

/// Validates a raw slice value, `None` meaning "use the default".
pub type Refine<T> = Arc<dyn Fn(&Value) -> Option<T> + Send + Sync>;

/// Names one slice in one store, with its default value.
pub struct LocationStateDefinition<T> {
    pub name: String,
    pub default_value: T,
    pub store_name: String,
    pub refine: Option<Refine<T>>,
}

impl<T> LocationStateDefinition<T> {
    pub fn new(name: impl Into<String>, default_value: T, store_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value,
            store_name: store_name.into(),
            refine: None,
        }
    }

    /// Replace serde decoding of the raw value with `refine`.
    pub fn refine<F>(mut self, refine: F) -> Self
    where
        F: Fn(&Value) -> Option<T> + Send + Sync + 'static,
    {
        self.refine = Some(Arc::new(refine));
        self
    }
}

impl<T: Clone> Clone for LocationStateDefinition<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            default_value: self.default_value.clone(),
            store_name: self.store_name.clone(),
            refine: self.refine.clone(),
        }
    }
}

/// Argument of a state setter: a new value or a function of the current one.
pub enum SetStateAction<T> {
    Value(T),
    Update(Box<dyn FnOnce(T) -> T + Send>),
}

impl<T> SetStateAction<T> {
    pub fn update<F>(f: F) -> Self
    where
        F: FnOnce(T) -> T + Send + 'static,
    {
        Self::Update(Box::new(f))
    }
}

/// A slice of a store, read and written as `T`.
pub struct LocationState<T> {
    store: Arc<dyn Store>,
    definition: Arc<LocationStateDefinition<T>>,
}

impl<T> Clone for LocationState<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            definition: Arc::clone(&self.definition),
        }
    }
}

impl<T> LocationState<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    pub fn new(provider: &Provider, definition: LocationStateDefinition<T>) -> Result<Self> {
        Ok(Self {
            store: provider.store(&definition.store_name)?,
            definition: Arc::new(definition),
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Current value: the stored one if present and valid, else the default.
    pub fn get(&self) -> T {
        let def = &self.definition;
        self.store
            .get(&def.name)
            .and_then(|raw| match &def.refine {
                Some(refine) => refine(&raw),
                None => serde_json::from_value(raw).ok(),
            })
            .unwrap_or_else(|| def.default_value.clone())
    }

    pub fn set(&self, value: T) {
        match serde_json::to_value(value) {
            Ok(value) => self.store.set(&self.definition.name, Some(value)),
            Err(e) => warn!(
                "LocationState: cannot encode {}, keeping current value: {e}",
                self.definition.name
            ),
        }
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        self.set(f(self.get()));
    }

    pub fn apply(&self, action: SetStateAction<T>) {
        match action {
            SetStateAction::Value(value) => self.set(value),
            SetStateAction::Update(f) => self.update(f),
        }
    }

    /// Remove the stored value; reads fall back to the default.
    pub fn reset(&self) {
        self.store.set(&self.definition.name, None);
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        self.store.subscribe(&self.definition.name, listener)
    }
}

/// Read half of a `LocationState`.
pub struct LocationGetState<T>(LocationState<T>);

impl<T> LocationGetState<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    pub fn get(&self) -> T {
        self.0.get()
    }
}

/// Write half of a `LocationState`.
pub struct LocationSetState<T>(LocationState<T>);

impl<T> Clone for LocationSetState<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> LocationSetState<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    pub fn set(&self, value: T) {
        self.0.set(value);
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        self.0.update(f);
    }

    pub fn apply(&self, action: SetStateAction<T>) {
        self.0.apply(action);
    }

    pub fn reset(&self) {
        self.0.reset();
    }
}

fn current_state<T>(definition: LocationStateDefinition<T>) -> Result<LocationState<T>>
where
    T: Clone + Serialize + DeserializeOwned,
{
    let provider = Provider::current().ok_or(LocationStateError::MissingProvider)?;
    LocationState::new(&provider, definition)
}

/// Current value of the slice and a setter for it.
pub fn use_location_state<T>(
    definition: LocationStateDefinition<T>,
) -> Result<(T, LocationSetState<T>)>
where
    T: Clone + Serialize + DeserializeOwned,
{
    let state = current_state(definition)?;
    Ok((state.get(), LocationSetState(state)))
}

pub fn use_location_get_state<T>(
    definition: LocationStateDefinition<T>,
) -> Result<LocationGetState<T>>
where
    T: Clone + Serialize + DeserializeOwned,
{
    current_state(definition).map(LocationGetState)
}

pub fn use_location_set_state<T>(
    definition: LocationStateDefinition<T>,
) -> Result<LocationSetState<T>>
where
    T: Clone + Serialize + DeserializeOwned,
{
    current_state(definition).map(LocationSetState)
}

/// Navigation key of the current provider.
pub fn use_location_key() -> Result<Option<String>> {
    Provider::current()
        .map(|provider| provider.key())
        .ok_or(LocationStateError::MissingProvider)
}
