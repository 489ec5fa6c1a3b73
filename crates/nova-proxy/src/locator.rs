//! Method lookup by `(name, descriptor)` over a [`ClassNode`] graph.
//!
//! Inherited lookups walk the whole superclass chain before any interface is examined. Interfaces
//! reachable through several paths are searched again on every path; the first match wins.

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::error::{ProxyError, Result};
use crate::hierarchy::{ClassNode, MethodRecord};
use crate::surrogate::ProxyInstance;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocatorConfig {
    /// Maximum nesting of superclass/interface steps a single lookup may take. Unlimited when
    /// unset.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MethodLocator {
    config: LocatorConfig,
}

struct Query<'a> {
    class: &'a ClassNode,
    name: &'a str,
    descriptor: &'a Descriptor,
}

impl<'a> Query<'a> {
    fn not_found(&self) -> ProxyError {
        tracing::debug!(
            target: "nova.proxy",
            class = %self.class,
            name = self.name,
            descriptor = %self.descriptor,
            "method not found"
        );
        ProxyError::not_found(self.class.name(), self.name, self.descriptor)
    }
}

impl MethodLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    /// Finds a method declared by `class` itself. Never looks at supertypes.
    pub fn find_declared(
        &self,
        class: &ClassNode,
        name: &str,
        descriptor: &Descriptor,
    ) -> Result<MethodRecord> {
        let query = Query {
            class,
            name,
            descriptor,
        };
        find_in_class(class, name, descriptor)?.ok_or_else(|| query.not_found())
    }

    /// Finds a method in `class`, its superclass chain, then its interfaces.
    pub fn find_inherited(
        &self,
        class: &ClassNode,
        name: &str,
        descriptor: &Descriptor,
    ) -> Result<MethodRecord> {
        let query = Query {
            class,
            name,
            descriptor,
        };
        self.search(Some(class), &query, 0)?
            .ok_or_else(|| query.not_found())
    }

    /// Like [`MethodLocator::find_inherited`] but skips `class`'s own declarations: the search
    /// starts at its superclass and falls back to `class`'s interfaces.
    pub fn find_super_method(
        &self,
        class: &ClassNode,
        name: &str,
        descriptor: &Descriptor,
    ) -> Result<MethodRecord> {
        let query = Query {
            class,
            name,
            descriptor,
        };
        let found = match self.search(class.superclass(), &query, 1)? {
            Some(method) => Some(method),
            None => self.search_interfaces(class, &query, 0)?,
        };
        found.ok_or_else(|| query.not_found())
    }

    fn search(
        &self,
        class: Option<&ClassNode>,
        query: &Query<'_>,
        depth: usize,
    ) -> Result<Option<MethodRecord>> {
        let Some(class) = class else {
            return Ok(None);
        };
        if let Some(limit) = self.config.max_depth.filter(|limit| depth > *limit) {
            return Err(ProxyError::HierarchyTooDeep {
                class: query.class.name().to_string(),
                limit,
            });
        }
        tracing::trace!(target: "nova.proxy", class = %class, depth, "searching class");

        if let Some(method) = find_in_class(class, query.name, query.descriptor)? {
            return Ok(Some(method));
        }
        if let Some(method) = self.search(class.superclass(), query, depth + 1)? {
            return Ok(Some(method));
        }
        self.search_interfaces(class, query, depth)
    }

    fn search_interfaces(
        &self,
        class: &ClassNode,
        query: &Query<'_>,
        depth: usize,
    ) -> Result<Option<MethodRecord>> {
        for interface in class.interfaces() {
            if let Some(method) = self.search(Some(interface), query, depth + 1)? {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }
}

// Names are compared first so methods with other names are never encoded.
fn find_in_class(
    class: &ClassNode,
    name: &str,
    descriptor: &Descriptor,
) -> Result<Option<MethodRecord>> {
    for method in class.declared_methods() {
        if method.name != name {
            continue;
        }
        let candidate = method.descriptor()?;
        if candidate == *descriptor {
            return Ok(Some(MethodRecord::new(class, method, candidate)));
        }
    }
    Ok(None)
}

pub fn find_declared(class: &ClassNode, name: &str, descriptor: &Descriptor) -> Result<MethodRecord> {
    MethodLocator::default().find_declared(class, name, descriptor)
}

pub fn find_inherited(class: &ClassNode, name: &str, descriptor: &Descriptor) -> Result<MethodRecord> {
    MethodLocator::default().find_inherited(class, name, descriptor)
}

pub fn find_super_method(
    class: &ClassNode,
    name: &str,
    descriptor: &Descriptor,
) -> Result<MethodRecord> {
    MethodLocator::default().find_super_method(class, name, descriptor)
}

/// [`find_declared`] on the runtime class of a proxy instance.
pub fn find_declared_for(
    instance: &dyn ProxyInstance,
    name: &str,
    descriptor: &Descriptor,
) -> Result<MethodRecord> {
    find_declared(&instance.proxy_class(), name, descriptor)
}

/// [`find_super_method`] on the runtime class of a proxy instance.
pub fn find_super_method_for(
    instance: &dyn ProxyInstance,
    name: &str,
    descriptor: &Descriptor,
) -> Result<MethodRecord> {
    find_super_method(&instance.proxy_class(), name, descriptor)
}
