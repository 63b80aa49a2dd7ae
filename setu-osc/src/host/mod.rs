//! Capability interface for controlled host objects
//!
//! The gateway never owns the object graph it exposes. Host objects are
//! reached only through [`HostObject`], which makes each capability explicit:
//!
//! | Capability | Method |
//! |------------|--------|
//! | Read a property | [`HostObject::get_property`] |
//! | Write a property | [`HostObject::set_property`] |
//! | Invoke a method | [`HostObject::call_method`] |
//! | Observe a property | [`HostObject::supports_listenable`], [`HostObject::add_change_hook`], [`HostObject::remove_change_hook`] |
//!
//! Implementors typically back the property capabilities with a
//! [`PropertyTable`] and the observation capabilities with a [`HookSet`].

mod accessor;
mod hooks;
mod mock;

pub use accessor::{Getter, PropertyTable, Setter};
pub use hooks::HookSet;
pub use mock::MockObject;

use crate::codec::OscType;
use std::sync::Arc;

/// Callback fired by a host object whenever an observed property changes
pub type ChangeHook = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`HostObject::add_change_hook`], used to remove it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// Failures reported by host objects
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// The property exists but cannot be observed on this target
    #[error("Property cannot be listened to: {0}")]
    NotListenable(String),

    #[error("Property is read-only: {0}")]
    ReadOnly(String),

    /// The property does not apply to this particular target
    #[error("Property not applicable: {0}")]
    NotApplicable(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The underlying host object no longer exists
    #[error("Target object has been destroyed")]
    TargetDestroyed,

    /// No hook with this id is installed (already removed)
    #[error("Change hook not found")]
    HookNotFound,
}

/// Value read from a host property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Scalar(OscType),
    Tuple(Vec<OscType>),
}

impl PropertyValue {
    pub fn scalar(value: impl Into<OscType>) -> Self {
        PropertyValue::Scalar(value.into())
    }

    /// Normalize into an argument tuple (scalars become single-element tuples)
    pub fn into_args(self) -> Vec<OscType> {
        match self {
            PropertyValue::Scalar(v) => vec![v],
            PropertyValue::Tuple(values) => values,
        }
    }
}

impl From<OscType> for PropertyValue {
    fn from(value: OscType) -> Self {
        PropertyValue::Scalar(value)
    }
}

/// Generic get/set/call/listen capability of a controlled object
pub trait HostObject: Send + Sync {
    /// Read the current value of a property
    fn get_property(&self, property: &str) -> Result<PropertyValue, HostError>;

    /// Write a property
    fn set_property(&self, property: &str, value: &OscType) -> Result<(), HostError>;

    /// Invoke a named method with request arguments
    fn call_method(&self, method: &str, _args: &[OscType]) -> Result<Option<Vec<OscType>>, HostError> {
        Err(HostError::UnknownMethod(method.to_string()))
    }

    /// Whether change hooks may be installed for this property
    fn supports_listenable(&self, property: &str) -> bool;

    /// Install a change hook for a property
    fn add_change_hook(&self, property: &str, hook: ChangeHook) -> Result<HookId, HostError>;

    /// Remove a previously installed change hook
    fn remove_change_hook(&self, property: &str, id: HookId) -> Result<(), HostError>;
}
