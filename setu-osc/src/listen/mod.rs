//! Property subscriptions ("listen")
//!
//! # Lifecycle
//!
//! ```text
//!                start_listen                 stop_listen / clear_all
//! Unsubscribed ───────────────► Subscribed ─────────────────────────► Unsubscribed
//!                                  │  ▲
//!                                  └──┘ start_listen (same key):
//!                                       old hook removed, new one installed
//! ```
//!
//! A subscription is keyed by (component, property, params). Each one owns
//! exactly one change hook on its target. The hook reads the current value
//! and sends `(*params, *value)` to `<prefix>/<component>/get/<property>`.
//! The same emission runs once at subscribe time, so a client always sees
//! the current value without waiting for a change.
//!
//! Hooks hold only a weak reference to their target; a target that has been
//! dropped silently stops emitting.

use crate::codec::OscType;
use crate::dispatch::HandlerError;
use crate::host::{HookId, HostError, HostObject, PropertyValue};
use crate::transport::OscSender;
use crate::transport::udp::log_send_error;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

/// Optional value reader used instead of a direct property read
///
/// Receives the subscription parameters.
pub type ListenGetter = Arc<dyn Fn(&[OscType]) -> Result<PropertyValue, HostError> + Send + Sync>;

/// Identity of a subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub component: String,
    pub property: String,
    params: Params,
}

impl SubscriptionKey {
    pub fn new(component: &str, property: &str, params: &[OscType]) -> Self {
        Self {
            component: component.to_string(),
            property: property.to_string(),
            params: Params(params.to_vec()),
        }
    }

    pub fn params(&self) -> &[OscType] {
        &self.params.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{:?}", self.component, self.property, self.params.0)
    }
}

/// Parameter tuple with bitwise float equality, usable as a map key
#[derive(Debug, Clone)]
struct Params(Vec<OscType>);

impl PartialEq for Params {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| match (a, b) {
                (OscType::Float(x), OscType::Float(y)) => x.to_bits() == y.to_bits(),
                (OscType::Double(x), OscType::Double(y)) => x.to_bits() == y.to_bits(),
                _ => a == b,
            })
    }
}

impl Eq for Params {}

impl Hash for Params {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for param in &self.0 {
            param.tag().hash(state);
            match param {
                OscType::Int(v) => v.hash(state),
                OscType::Long(v) => v.hash(state),
                OscType::Float(v) => v.to_bits().hash(state),
                OscType::Double(v) => v.to_bits().hash(state),
                OscType::String(s) => s.hash(state),
                OscType::Blob(b) => b.hash(state),
                OscType::Bool(_) | OscType::Nil => {}
            }
        }
    }
}

struct Subscription {
    target: Arc<dyn HostObject>,
    hook: HookId,
}

/// Reads a subscribed value and sends it to the current reply target
struct Emitter {
    sender: OscSender,
    address: String,
    property: String,
    params: Vec<OscType>,
    target: Weak<dyn HostObject>,
    getter: Option<ListenGetter>,
}

impl Emitter {
    fn emit(&self) {
        let Some(target) = self.target.upgrade() else {
            log::debug!("Listener target for {} is gone", self.address);
            return;
        };

        let value = catch_unwind(AssertUnwindSafe(|| match &self.getter {
            Some(getter) => getter(&self.params),
            None => target.get_property(&self.property),
        }));

        let value = match value {
            Ok(value) => value,
            Err(_) => {
                log::error!("Value reader for {} panicked", self.address);
                return;
            }
        };

        match value {
            Ok(value) => {
                let mut args = self.params.clone();
                args.extend(value.into_args());
                if let Err(e) = self.sender.send(&self.address, &args) {
                    log_send_error(&self.address, &e);
                }
            }
            Err(e) => log::warn!("Failed to read value for {}: {}", self.address, e),
        }
    }
}

/// Active subscriptions, at most one hook per key
pub struct SubscriptionRegistry {
    sender: OscSender,
    prefix: String,
    subscriptions: Mutex<HashMap<SubscriptionKey, Subscription>>,
}

impl SubscriptionRegistry {
    /// `prefix` is prepended to emission addresses (e.g. `/live`)
    pub fn new(sender: OscSender, prefix: &str) -> Self {
        Self {
            sender,
            prefix: prefix.trim_end_matches('/').to_string(),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Address that emissions for `component`/`property` are sent to
    pub fn emission_address(&self, component: &str, property: &str) -> String {
        format!("{}/{}/get/{}", self.prefix, component, property)
    }

    /// Subscribe to changes of `property` on `target`
    ///
    /// An existing subscription with the same key is torn down first. Fails
    /// with an unsupported-kind error if the target cannot observe the
    /// property; in that case no subscription is recorded.
    pub fn start_listen(
        &self,
        component: &str,
        target: Arc<dyn HostObject>,
        property: &str,
        params: &[OscType],
        getter: Option<ListenGetter>,
    ) -> Result<(), HandlerError> {
        let key = SubscriptionKey::new(component, property, params);

        let previous = self.subscriptions.lock().remove(&key);
        if let Some(previous) = previous {
            log::debug!("Replacing listener {}", key);
            release(&key, previous);
        }

        if !target.supports_listenable(property) {
            return Err(HostError::NotListenable(property.to_string()).into());
        }

        let emitter = Arc::new(Emitter {
            sender: self.sender.clone(),
            address: self.emission_address(component, property),
            property: property.to_string(),
            params: params.to_vec(),
            target: Arc::downgrade(&target),
            getter,
        });
        let hook_emitter = Arc::clone(&emitter);
        let hook = target.add_change_hook(property, Arc::new(move || hook_emitter.emit()))?;

        log::info!("Adding listener for {}", key);
        let replaced = self
            .subscriptions
            .lock()
            .insert(key.clone(), Subscription { target, hook });
        if let Some(replaced) = replaced {
            // Lost a race with a concurrent subscribe for the same key
            release(&key, replaced);
        }

        emitter.emit();
        Ok(())
    }

    /// Remove a subscription; unknown keys are a logged no-op
    pub fn stop_listen(&self, component: &str, property: &str, params: &[OscType]) {
        let key = SubscriptionKey::new(component, property, params);
        let removed = self.subscriptions.lock().remove(&key);
        match removed {
            Some(subscription) => {
                log::info!("Removing listener for {}", key);
                release(&key, subscription);
            }
            None => log::warn!("No listener function found for {}", key),
        }
    }

    /// Stop every subscription
    pub fn clear_all(&self) {
        let drained: Vec<_> = self.subscriptions.lock().drain().collect();
        if !drained.is_empty() {
            log::info!("Clearing {} listener(s)", drained.len());
        }
        for (key, subscription) in drained {
            release(&key, subscription);
        }
    }

    pub fn is_subscribed(&self, component: &str, property: &str, params: &[OscType]) -> bool {
        self.subscriptions
            .lock()
            .contains_key(&SubscriptionKey::new(component, property, params))
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.clear_all();
    }
}

/// Remove the hook; failures mean the hook or its owner is already gone
fn release(key: &SubscriptionKey, subscription: Subscription) {
    if let Err(e) = subscription
        .target
        .remove_change_hook(&key.property, subscription.hook)
    {
        log::info!("Listener {} already detached: {}", key, e);
    }
}
