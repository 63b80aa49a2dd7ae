//! Mock host object for testing and the demo daemon

use super::{ChangeHook, HookId, HookSet, HostError, HostObject, PropertyValue};
use crate::codec::OscType;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

struct Slot {
    value: PropertyValue,
    writable: bool,
    listenable: bool,
}

/// Thread-safe property bag implementing [`HostObject`]
///
/// Writes through [`HostObject::set_property`] or [`MockObject::update`] fire
/// any installed change hooks, mirroring how a host notifies observers.
/// After [`MockObject::destroy`] every capability fails with
/// [`HostError::TargetDestroyed`].
pub struct MockObject {
    name: String,
    slots: Mutex<HashMap<String, Slot>>,
    methods: HashSet<String>,
    calls: Mutex<Vec<(String, Vec<OscType>)>>,
    hooks: HookSet,
    destroyed: AtomicBool,
}

impl MockObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Mutex::new(HashMap::new()),
            methods: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            hooks: HookSet::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Read/write, observable property
    pub fn with_property(self, name: &str, value: impl Into<OscType>) -> Self {
        self.with_slot(name, PropertyValue::scalar(value), true, true)
    }

    /// Read-only, observable property
    pub fn with_read_only(self, name: &str, value: impl Into<OscType>) -> Self {
        self.with_slot(name, PropertyValue::scalar(value), false, true)
    }

    /// Read-only property that cannot be observed
    pub fn with_static(self, name: &str, value: impl Into<OscType>) -> Self {
        self.with_slot(name, PropertyValue::scalar(value), false, false)
    }

    pub fn with_slot(self, name: &str, value: PropertyValue, writable: bool, listenable: bool) -> Self {
        self.slots.lock().insert(
            name.to_string(),
            Slot {
                value,
                writable,
                listenable,
            },
        );
        self
    }

    pub fn with_method(mut self, name: &str) -> Self {
        self.methods.insert(name.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host-side change: replace the value and notify observers
    pub fn update(&self, property: &str, value: PropertyValue) {
        {
            let mut slots = self.slots.lock();
            match slots.get_mut(property) {
                Some(slot) => slot.value = value,
                None => {
                    log::warn!("{}: update of unknown property {}", self.name, property);
                    return;
                }
            }
        }
        self.hooks.fire(property);
    }

    /// Simulate deletion of the host object
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Number of change hooks currently installed for `property`
    pub fn hook_count(&self, property: &str) -> usize {
        self.hooks.count(property)
    }

    /// Method invocations received so far, in order
    pub fn calls(&self) -> Vec<(String, Vec<OscType>)> {
        self.calls.lock().clone()
    }

    fn check_alive(&self) -> Result<(), HostError> {
        if self.is_destroyed() {
            Err(HostError::TargetDestroyed)
        } else {
            Ok(())
        }
    }
}

impl HostObject for MockObject {
    fn get_property(&self, property: &str) -> Result<PropertyValue, HostError> {
        self.check_alive()?;
        self.slots
            .lock()
            .get(property)
            .map(|slot| slot.value.clone())
            .ok_or_else(|| HostError::UnknownProperty(property.to_string()))
    }

    fn set_property(&self, property: &str, value: &OscType) -> Result<(), HostError> {
        self.check_alive()?;
        {
            let mut slots = self.slots.lock();
            let slot = slots
                .get_mut(property)
                .ok_or_else(|| HostError::UnknownProperty(property.to_string()))?;
            if !slot.writable {
                return Err(HostError::ReadOnly(property.to_string()));
            }
            slot.value = PropertyValue::Scalar(value.clone());
        }
        self.hooks.fire(property);
        Ok(())
    }

    fn call_method(&self, method: &str, args: &[OscType]) -> Result<Option<Vec<OscType>>, HostError> {
        self.check_alive()?;
        if !self.methods.contains(method) {
            return Err(HostError::UnknownMethod(method.to_string()));
        }
        self.calls.lock().push((method.to_string(), args.to_vec()));
        Ok(None)
    }

    fn supports_listenable(&self, property: &str) -> bool {
        !self.is_destroyed()
            && self
                .slots
                .lock()
                .get(property)
                .is_some_and(|slot| slot.listenable)
    }

    fn add_change_hook(&self, property: &str, hook: ChangeHook) -> Result<HookId, HostError> {
        self.check_alive()?;
        if !self.supports_listenable(property) {
            return Err(HostError::NotListenable(property.to_string()));
        }
        Ok(self.hooks.add(property, hook))
    }

    fn remove_change_hook(&self, property: &str, id: HookId) -> Result<(), HostError> {
        self.check_alive()?;
        self.hooks.remove(property, id)
    }
}
