//! Typed property accessor registry
//!
//! Each host object type builds one [`PropertyTable`] at startup, mapping
//! property names to a getter and an optional setter. Lookups of names that
//! were never registered fail with [`HostError::UnknownProperty`].

use super::{HostError, PropertyValue};
use crate::codec::OscType;
use std::collections::HashMap;

/// Reads a property from a target
pub type Getter<T> = Box<dyn Fn(&T) -> Result<PropertyValue, HostError> + Send + Sync>;

/// Writes a property on a target
pub type Setter<T> = Box<dyn Fn(&T, &OscType) -> Result<(), HostError> + Send + Sync>;

struct Accessor<T> {
    getter: Getter<T>,
    setter: Option<Setter<T>>,
}

/// Property name → (getter, setter) for one target type
pub struct PropertyTable<T> {
    accessors: HashMap<&'static str, Accessor<T>>,
}

impl<T> PropertyTable<T> {
    pub fn new() -> Self {
        Self {
            accessors: HashMap::new(),
        }
    }

    /// Register a read-only property
    pub fn readable<G>(mut self, name: &'static str, getter: G) -> Self
    where
        G: Fn(&T) -> Result<PropertyValue, HostError> + Send + Sync + 'static,
    {
        self.accessors.insert(
            name,
            Accessor {
                getter: Box::new(getter),
                setter: None,
            },
        );
        self
    }

    /// Register a read/write property
    pub fn writable<G, S>(mut self, name: &'static str, getter: G, setter: S) -> Self
    where
        G: Fn(&T) -> Result<PropertyValue, HostError> + Send + Sync + 'static,
        S: Fn(&T, &OscType) -> Result<(), HostError> + Send + Sync + 'static,
    {
        self.accessors.insert(
            name,
            Accessor {
                getter: Box::new(getter),
                setter: Some(Box::new(setter)),
            },
        );
        self
    }

    pub fn get(&self, target: &T, name: &str) -> Result<PropertyValue, HostError> {
        let accessor = self
            .accessors
            .get(name)
            .ok_or_else(|| HostError::UnknownProperty(name.to_string()))?;
        (accessor.getter)(target)
    }

    pub fn set(&self, target: &T, name: &str, value: &OscType) -> Result<(), HostError> {
        let accessor = self
            .accessors
            .get(name)
            .ok_or_else(|| HostError::UnknownProperty(name.to_string()))?;
        match &accessor.setter {
            Some(setter) => setter(target, value),
            None => Err(HostError::ReadOnly(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.accessors.contains_key(name)
    }

    pub fn is_writable(&self, name: &str) -> bool {
        self.accessors
            .get(name)
            .is_some_and(|a| a.setter.is_some())
    }

    /// Registered property names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.accessors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<T> Default for PropertyTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
