//! Runtime support for generated proxy classes.
//!
//! - [`encode`] builds the JVM method descriptors generated code uses as lookup keys.
//! - [`find_declared`], [`find_inherited`] and [`find_super_method`] resolve a method by name and
//!   descriptor over a [`ClassNode`] graph loaded from a [`ClassProvider`].
//! - [`resolve_pair`] wires the two methods each interception stub needs.
//! - [`default_interceptor`] is the pass-through [`MethodHandler`].
//! - [`build_surrogate`] turns a live proxy into a persistable [`Surrogate`].

#![forbid(unsafe_code)]

mod config;
mod descriptor;
mod error;
mod handler;
mod hierarchy;
mod locator;
mod pair;
mod surrogate;

pub use crate::config::{init_tracing, ConfigError, LoggingConfig, ProxyConfig};
pub use crate::descriptor::{
    encode, encode_with_prefix, Descriptor, MethodShape, PrimitiveKind, ReturnShape, TypeShape,
};
pub use crate::error::{ProxyError, Result};
pub use crate::handler::{default_interceptor, DefaultMethodHandler, MethodHandler, Proceed, Value};
pub use crate::hierarchy::{
    ClassDefinition, ClassKind, ClassNode, ClassProvider, ClassStub, DeclaredMethod,
    HierarchyLoader, MethodRecord, StaticClassProvider,
};
pub use crate::locator::{
    find_declared, find_declared_for, find_inherited, find_super_method, find_super_method_for,
    LocatorConfig, MethodLocator,
};
pub use crate::pair::{resolve_pair, resolve_pair_for_instance};
pub use crate::surrogate::{
    build_surrogate, DirectHandlerHolder, HandlerRegistry, PersistedSurrogate, ProxyClassRegistry,
    ProxyId, ProxyInstance, ProxyRegistry, RegisteredProxy, Surrogate,
};
