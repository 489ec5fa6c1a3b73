use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::hierarchy::MethodRecord;

/// A dynamically typed argument or return value passed through a [`MethodHandler`].
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Void,
    Null,
    Boolean(bool),
    Char(char),
    Int(i64),
    Float(f64),
    String(String),
    Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Value::Object(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.downcast_ref(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("Void"),
            Value::Null => f.write_str("Null"),
            Value::Boolean(v) => write!(f, "Boolean({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Object(_) => f.write_str("Object(..)"),
        }
    }
}

/// Calls the original (non-intercepted) implementation with a receiver and arguments.
pub type Proceed<'a> = &'a dyn Fn(&dyn Any, Vec<Value>) -> anyhow::Result<Value>;

/// Invoked by generated proxy code for every intercepted call.
pub trait MethodHandler: Send + Sync {
    fn invoke(
        &self,
        receiver: &dyn Any,
        method: &MethodRecord,
        proceed: Proceed<'_>,
        args: Vec<Value>,
    ) -> anyhow::Result<Value>;

    /// Stable name used to restore this handler after persistence; `None` if the handler cannot
    /// be persisted.
    fn persistent_key(&self) -> Option<&str> {
        None
    }
}

impl fmt::Debug for dyn MethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.persistent_key() {
            Some(key) => write!(f, "MethodHandler({key})"),
            None => f.write_str("MethodHandler(..)"),
        }
    }
}

/// A handler that only runs the original implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultMethodHandler;

impl DefaultMethodHandler {
    pub const KEY: &'static str = "nova.proxy.default";
}

impl MethodHandler for DefaultMethodHandler {
    fn invoke(
        &self,
        receiver: &dyn Any,
        _method: &MethodRecord,
        proceed: Proceed<'_>,
        args: Vec<Value>,
    ) -> anyhow::Result<Value> {
        proceed(receiver, args)
    }

    fn persistent_key(&self) -> Option<&str> {
        Some(Self::KEY)
    }
}

/// The process-wide pass-through handler, created on first use.
pub fn default_interceptor() -> Arc<dyn MethodHandler> {
    static DEFAULT: OnceLock<Arc<dyn MethodHandler>> = OnceLock::new();
    Arc::clone(DEFAULT.get_or_init(|| Arc::new(DefaultMethodHandler)))
}
