//! Durable stand-ins for live proxy instances.
//!
//! A [`Surrogate`] captures what is needed to rebuild a proxy later: its class, the filter
//! signature the proxy factory computed for that class, and the active method handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};
use crate::handler::{default_interceptor, DefaultMethodHandler, MethodHandler};
use crate::hierarchy::{ClassNode, HierarchyLoader};

/// Identity under which a proxy instance is known to a [`ProxyRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProxyId(pub u64);

/// A proxy that can hand out its own handler.
pub trait DirectHandlerHolder {
    fn handler(&self) -> Option<Arc<dyn MethodHandler>>;
}

/// A proxy whose handler is held by the proxy-class registry.
pub trait RegisteredProxy {
    fn proxy_id(&self) -> ProxyId;
}

/// A live proxy instance.
pub trait ProxyInstance {
    /// The runtime class of this instance.
    fn proxy_class(&self) -> ClassNode;

    fn as_direct_handler_holder(&self) -> Option<&dyn DirectHandlerHolder> {
        None
    }

    fn as_registered_proxy(&self) -> Option<&dyn RegisteredProxy> {
        None
    }
}

/// Bookkeeping the proxy factory keeps about generated classes and their instances.
pub trait ProxyRegistry {
    fn handler_of(&self, proxy: ProxyId) -> Option<Arc<dyn MethodHandler>>;

    fn filter_signature(&self, class: &str) -> Option<String>;
}

/// Thread-safe in-memory [`ProxyRegistry`].
#[derive(Default)]
pub struct ProxyClassRegistry {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<ProxyId, Arc<dyn MethodHandler>>>,
    filter_signatures: RwLock<HashMap<String, String>>,
}

impl ProxyClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_class(&self, class: impl Into<String>, filter_signature: impl Into<String>) {
        self.filter_signatures
            .write()
            .insert(class.into(), filter_signature.into());
    }

    /// Registers `handler` for a fresh proxy instance and returns the instance's id.
    pub fn register_instance(&self, handler: Arc<dyn MethodHandler>) -> ProxyId {
        let id = ProxyId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().insert(id, handler);
        id
    }

    pub fn set_handler(&self, proxy: ProxyId, handler: Arc<dyn MethodHandler>) {
        self.handlers.write().insert(proxy, handler);
    }

    pub fn unregister_instance(&self, proxy: ProxyId) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.write().remove(&proxy)
    }
}

impl ProxyRegistry for ProxyClassRegistry {
    fn handler_of(&self, proxy: ProxyId) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.read().get(&proxy).cloned()
    }

    fn filter_signature(&self, class: &str) -> Option<String> {
        self.filter_signatures.read().get(class).cloned()
    }
}

impl fmt::Debug for ProxyClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyClassRegistry")
            .field("instances", &self.handlers.read().len())
            .field("classes", &self.filter_signatures.read().len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Surrogate {
    class: ClassNode,
    filter_signature: String,
    handler: Option<Arc<dyn MethodHandler>>,
}

impl Surrogate {
    pub fn new(
        class: ClassNode,
        filter_signature: impl Into<String>,
        handler: Option<Arc<dyn MethodHandler>>,
    ) -> Self {
        Self {
            class,
            filter_signature: filter_signature.into(),
            handler,
        }
    }

    pub fn class(&self) -> &ClassNode {
        &self.class
    }

    pub fn filter_signature(&self) -> &str {
        &self.filter_signature
    }

    pub fn handler(&self) -> Option<&Arc<dyn MethodHandler>> {
        self.handler.as_ref()
    }

    /// Converts to the persisted wire form. Fails if the handler has no persistent key.
    pub fn persist(&self) -> Result<PersistedSurrogate> {
        let handler = match &self.handler {
            Some(handler) => Some(
                handler
                    .persistent_key()
                    .ok_or_else(|| ProxyError::UnpersistableHandler {
                        class: self.class.name().to_string(),
                    })?
                    .to_string(),
            ),
            None => None,
        };
        Ok(PersistedSurrogate {
            class: self.class.name().to_string(),
            filter_signature: self.filter_signature.clone(),
            handler,
        })
    }
}

impl PartialEq for Surrogate {
    fn eq(&self, other: &Self) -> bool {
        let same_handler = match (&self.handler, &other.handler) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.class == other.class && self.filter_signature == other.filter_signature && same_handler
    }
}

impl Eq for Surrogate {}

/// Builds a surrogate for `instance`.
///
/// The handler comes from the instance itself when it is a [`DirectHandlerHolder`], otherwise
/// from `registry` when it is a [`RegisteredProxy`]. An instance with neither capability cannot
/// be made durable.
pub fn build_surrogate(
    registry: &dyn ProxyRegistry,
    instance: &dyn ProxyInstance,
) -> Result<Surrogate> {
    let class = instance.proxy_class();

    let handler = if let Some(holder) = instance.as_direct_handler_holder() {
        holder.handler()
    } else if let Some(registered) = instance.as_registered_proxy() {
        registry.handler_of(registered.proxy_id())
    } else {
        tracing::debug!(target: "nova.proxy", class = %class, "instance exposes no method handler");
        return Err(ProxyError::InvalidSurrogate {
            class: class.name().to_string(),
        });
    };

    let filter_signature =
        registry
            .filter_signature(class.name())
            .ok_or_else(|| ProxyError::MissingFilterSignature {
                class: class.name().to_string(),
            })?;

    Ok(Surrogate {
        class,
        filter_signature,
        handler,
    })
}

/// Persisted form of a [`Surrogate`]: class name, filter signature, handler key.
///
/// Field order is part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSurrogate {
    pub class: String,
    pub filter_signature: String,
    pub handler: Option<String>,
}

impl PersistedSurrogate {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Rebuilds a surrogate, loading the class through `loader` and the handler from `handlers`.
    pub fn restore(&self, loader: &mut HierarchyLoader, handlers: &HandlerRegistry) -> Result<Surrogate> {
        let class = loader.ensure_class(&self.class)?;
        let handler = match &self.handler {
            Some(key) => Some(handlers.get(key).ok_or_else(|| ProxyError::UnknownHandler {
                key: key.clone(),
            })?),
            None => None,
        };
        Ok(Surrogate::new(class, self.filter_signature.clone(), handler))
    }
}

/// Handlers that can be restored by persistent key.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl HandlerRegistry {
    /// A registry that knows the default interceptor.
    pub fn new() -> Self {
        let mut handlers = HashMap::new();
        handlers.insert(DefaultMethodHandler::KEY.to_string(), default_interceptor());
        Self { handlers }
    }

    /// Registers `handler` under its persistent key.
    pub fn register(&mut self, handler: Arc<dyn MethodHandler>) -> Result<()> {
        let Some(key) = handler.persistent_key().map(str::to_string) else {
            return Err(ProxyError::UnpersistableHandler {
                class: format!("{handler:?}"),
            });
        };
        self.handlers.insert(key, handler);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.get(key).cloned()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
