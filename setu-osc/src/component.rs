//! Conventional address families for host objects
//!
//! A component (`song`, `track`, `clip`, ...) exposes each property under
//! four addresses and each method under one:
//!
//! | Address | Arguments | Reply |
//! |---------|-----------|-------|
//! | `<prefix>/<component>/get/<p>` | params | `(*params, *value)` |
//! | `<prefix>/<component>/set/<p>` | params, value | none |
//! | `<prefix>/<component>/start_listen/<p>` | params | emissions at `get/<p>` |
//! | `<prefix>/<component>/stop_listen/<p>` | params | none |
//! | `<prefix>/<component>/<method>` | params, args | method result |
//!
//! For a fixed target the params tuple is empty. For an indexed collection
//! (tracks, scenes) the first argument selects the object and is echoed back
//! as the single param.

use crate::codec::OscType;
use crate::dispatch::{HandlerError, args};
use crate::gateway::GatewayHandle;
use crate::host::{HostError, HostObject};
use std::sync::Arc;

/// Resolves an index argument to a collection member
pub type IndexLookup = Arc<dyn Fn(usize) -> Option<Arc<dyn HostObject>> + Send + Sync>;

/// Whether a `set/<p>` address is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

#[derive(Clone)]
enum Target {
    Fixed(Arc<dyn HostObject>),
    Indexed(IndexLookup),
}

impl Target {
    /// Number of leading arguments that identify the object
    fn param_count(&self) -> usize {
        match self {
            Target::Fixed(_) => 0,
            Target::Indexed(_) => 1,
        }
    }

    fn resolve(&self, args: &[OscType]) -> Result<Arc<dyn HostObject>, HandlerError> {
        match self {
            Target::Fixed(target) => Ok(Arc::clone(target)),
            Target::Indexed(lookup) => {
                let index = args::index(args, 0)?;
                lookup(index).ok_or_else(|| HandlerError::Failed(format!("No object at index {}", index)))
            }
        }
    }
}

/// Registers one component's addresses on a gateway
pub struct ComponentApi {
    handle: GatewayHandle,
    component: String,
}

impl ComponentApi {
    pub fn new(handle: GatewayHandle, component: &str) -> Self {
        Self {
            handle,
            component: component.to_string(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// `<prefix>/<component>/<verb>/<name>`, or `<prefix>/<component>/<name>`
    /// when `verb` is `None`
    pub fn address(&self, verb: Option<&str>, name: &str) -> String {
        match verb {
            Some(verb) => format!("{}/{}/{}/{}", self.handle.prefix(), self.component, verb, name),
            None => format!("{}/{}/{}", self.handle.prefix(), self.component, name),
        }
    }

    /// Expose a property of a single object
    pub fn expose_property(&self, target: Arc<dyn HostObject>, property: &str, access: Access) {
        self.register_property(Target::Fixed(target), property, access);
    }

    /// Expose a property of every member of an indexed collection
    pub fn expose_indexed_property(&self, lookup: IndexLookup, property: &str, access: Access) {
        self.register_property(Target::Indexed(lookup), property, access);
    }

    /// Expose a method of a single object
    pub fn expose_method(&self, target: Arc<dyn HostObject>, method: &str) {
        self.register_method(Target::Fixed(target), method);
    }

    /// Expose a method of every member of an indexed collection
    pub fn expose_indexed_method(&self, lookup: IndexLookup, method: &str) {
        self.register_method(Target::Indexed(lookup), method);
    }

    fn register_property(&self, target: Target, property: &str, access: Access) {
        let n = target.param_count();

        let get_target = target.clone();
        let get_property = property.to_string();
        self.handle.add_handler(&self.address(Some("get"), property), move |args| {
            let object = get_target.resolve(args)?;
            let value = match object.get_property(&get_property) {
                Ok(value) => value.into_args(),
                Err(HostError::NotApplicable(_)) => vec![OscType::Nil],
                Err(e) => return Err(e.into()),
            };
            let mut reply = args[..n].to_vec();
            reply.extend(value);
            Ok(Some(reply))
        });

        if access == Access::ReadWrite {
            let set_target = target.clone();
            let set_property = property.to_string();
            self.handle.add_handler(&self.address(Some("set"), property), move |args| {
                let object = set_target.resolve(args)?;
                let value = args::arg(args, n)?;
                object.set_property(&set_property, value)?;
                Ok(None)
            });
        }

        let listen_handle = self.handle.clone();
        let listen_component = self.component.clone();
        let listen_property = property.to_string();
        self.handle
            .add_handler(&self.address(Some("start_listen"), property), move |args| {
                let object = target.resolve(args)?;
                listen_handle.start_listen(&listen_component, object, &listen_property, &args[..n], None)?;
                Ok(None)
            });

        let stop_handle = self.handle.clone();
        let stop_component = self.component.clone();
        let stop_property = property.to_string();
        self.handle
            .add_handler(&self.address(Some("stop_listen"), property), move |args| {
                args::require(args, n)?;
                stop_handle.stop_listen(&stop_component, &stop_property, &args[..n]);
                Ok(None)
            });
    }

    fn register_method(&self, target: Target, method: &str) {
        let n = target.param_count();
        let method_name = method.to_string();
        self.handle.add_handler(&self.address(None, method), move |args| {
            let object = target.resolve(args)?;
            let result = object.call_method(&method_name, &args[n..])?;
            Ok(result.map(|values| {
                let mut reply = args[..n].to_vec();
                reply.extend(values);
                reply
            }))
        });
    }
}
