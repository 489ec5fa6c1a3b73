//! Class graph the locator walks.
//!
//! Nodes are built on demand from a [`ClassProvider`] by a [`HierarchyLoader`]. A class's declared
//! methods are fetched lazily, on the first lookup that touches that class, and cached on the node.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::descriptor::{encode, Descriptor, ReturnShape, TypeShape};
use crate::error::{ProxyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
}

/// Structural information about a class: its kind and direct supertypes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassStub {
    pub binary_name: String,
    pub kind: ClassKind,
    pub super_binary_name: Option<String>,
    pub interfaces: Vec<String>,
}

/// A method as reported by the introspection facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredMethod {
    pub name: String,
    #[serde(default)]
    pub params: Vec<TypeShape>,
    #[serde(rename = "returns", default = "void_return")]
    pub return_type: ReturnShape,
}

fn void_return() -> ReturnShape {
    ReturnShape::Void
}

impl DeclaredMethod {
    pub fn new(name: impl Into<String>, params: Vec<TypeShape>, return_type: ReturnShape) -> Self {
        Self {
            name: name.into(),
            params,
            return_type,
        }
    }

    pub fn descriptor(&self) -> Result<Descriptor> {
        encode(&self.params, &self.return_type)
    }
}

/// Introspection facility the hierarchy is built from.
///
/// `declared_methods` may be privileged or expensive; it is called at most once per loaded node.
/// Implementations must tolerate concurrent calls.
pub trait ClassProvider: Send + Sync {
    fn lookup_class(&self, binary_name: &str) -> Option<ClassStub>;

    /// Methods declared directly by `binary_name`, in declaration order.
    fn declared_methods(&self, binary_name: &str) -> Vec<DeclaredMethod>;
}

/// A shared, read-only view of one class in the hierarchy.
///
/// Cloning is cheap. Two nodes compare equal when they name the same class.
#[derive(Clone)]
pub struct ClassNode(Arc<ClassNodeData>);

struct ClassNodeData {
    name: String,
    kind: ClassKind,
    superclass: Option<ClassNode>,
    interfaces: Vec<ClassNode>,
    methods: OnceLock<Arc<[DeclaredMethod]>>,
    source: Option<Arc<dyn ClassProvider>>,
}

impl ClassNode {
    /// Builds a node whose declared methods are known up front.
    pub fn new(
        name: impl Into<String>,
        kind: ClassKind,
        superclass: Option<ClassNode>,
        interfaces: Vec<ClassNode>,
        methods: Vec<DeclaredMethod>,
    ) -> Self {
        ClassNode(Arc::new(ClassNodeData {
            name: name.into(),
            kind,
            superclass,
            interfaces,
            methods: OnceLock::from(Arc::from(methods)),
            source: None,
        }))
    }

    fn lazy(
        stub: ClassStub,
        superclass: Option<ClassNode>,
        interfaces: Vec<ClassNode>,
        source: Arc<dyn ClassProvider>,
    ) -> Self {
        ClassNode(Arc::new(ClassNodeData {
            name: stub.binary_name,
            kind: stub.kind,
            superclass,
            interfaces,
            methods: OnceLock::new(),
            source: Some(source),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> ClassKind {
        self.0.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind() == ClassKind::Interface
    }

    pub fn superclass(&self) -> Option<&ClassNode> {
        self.0.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[ClassNode] {
        &self.0.interfaces
    }

    pub fn declared_methods(&self) -> &[DeclaredMethod] {
        self.0.methods.get_or_init(|| match &self.0.source {
            Some(source) => {
                tracing::trace!(target: "nova.proxy", class = %self.0.name, "listing declared methods");
                Arc::from(source.declared_methods(&self.0.name))
            }
            None => Arc::from(Vec::new()),
        })
    }

    /// Whether both handles point at the same node (not merely the same class name).
    pub fn ptr_eq(&self, other: &ClassNode) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ClassNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.name == other.0.name
    }
}

impl Eq for ClassNode {}

impl fmt::Debug for ClassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassNode")
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("superclass", &self.superclass().map(ClassNode::name))
            .field(
                "interfaces",
                &self.0.interfaces.iter().map(ClassNode::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Display for ClassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// A resolved method. The declaring class is fixed when the record is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRecord {
    pub name: String,
    pub descriptor: Descriptor,
    pub declaring_class: ClassNode,
    pub params: Vec<TypeShape>,
    pub return_type: ReturnShape,
}

impl MethodRecord {
    pub(crate) fn new(declaring_class: &ClassNode, method: &DeclaredMethod, descriptor: Descriptor) -> Self {
        Self {
            name: method.name.clone(),
            descriptor,
            declaring_class: declaring_class.clone(),
            params: method.params.clone(),
            return_type: method.return_type.clone(),
        }
    }
}

impl fmt::Display for MethodRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.declaring_class, self.name, self.descriptor)
    }
}

/// Builds [`ClassNode`]s from a [`ClassProvider`] on demand.
///
/// Every class is loaded once, so an interface reachable through several paths is represented by
/// a single shared node.
pub struct HierarchyLoader {
    provider: Arc<dyn ClassProvider>,
    loaded: HashMap<String, ClassNode>,
    in_progress: HashSet<String>,
}

impl HierarchyLoader {
    pub fn new(provider: Arc<dyn ClassProvider>) -> Self {
        Self {
            provider,
            loaded: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// Returns the node for `binary_name`, loading it and all of its supertypes if needed.
    pub fn ensure_class(&mut self, binary_name: &str) -> Result<ClassNode> {
        if let Some(node) = self.loaded.get(binary_name) {
            return Ok(node.clone());
        }
        if self.in_progress.contains(binary_name) {
            tracing::debug!(target: "nova.proxy", class = binary_name, "cyclic class hierarchy");
            return Err(ProxyError::CyclicHierarchy {
                class: binary_name.to_string(),
            });
        }

        let Some(stub) = self.provider.lookup_class(binary_name) else {
            return Err(ProxyError::UnknownClass {
                name: binary_name.to_string(),
            });
        };

        self.in_progress.insert(binary_name.to_string());
        let supertypes = self.load_supertypes(&stub);
        self.in_progress.remove(binary_name);
        let (superclass, interfaces) = supertypes?;

        let node = ClassNode::lazy(stub, superclass, interfaces, Arc::clone(&self.provider));
        tracing::debug!(
            target: "nova.proxy",
            class = binary_name,
            interfaces = node.interfaces().len(),
            "loaded class node"
        );
        self.loaded.insert(binary_name.to_string(), node.clone());
        Ok(node)
    }

    fn load_supertypes(&mut self, stub: &ClassStub) -> Result<(Option<ClassNode>, Vec<ClassNode>)> {
        let superclass = match stub.super_binary_name.as_deref() {
            Some(name) => Some(self.ensure_class(name)?),
            None => None,
        };
        let interfaces = stub
            .interfaces
            .iter()
            .map(|name| self.ensure_class(name))
            .collect::<Result<Vec<_>>>()?;
        Ok((superclass, interfaces))
    }
}

/// One class entry of a [`StaticClassProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub methods: Vec<DeclaredMethod>,
}

/// In-memory provider, deserializable from a `{ "classes": [...] }` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticClassProvider {
    #[serde(default)]
    classes: Vec<ClassDefinition>,
}

impl StaticClassProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a class definition.
    pub fn define(&mut self, class: ClassDefinition) -> &mut Self {
        match self.classes.iter_mut().find(|c| c.name == class.name) {
            Some(existing) => *existing = class,
            None => self.classes.push(class),
        }
        self
    }

    pub fn classes(&self) -> &[ClassDefinition] {
        &self.classes
    }

    fn find(&self, binary_name: &str) -> Option<&ClassDefinition> {
        self.classes.iter().find(|c| c.name == binary_name)
    }
}

impl ClassProvider for StaticClassProvider {
    fn lookup_class(&self, binary_name: &str) -> Option<ClassStub> {
        self.find(binary_name).map(|class| ClassStub {
            binary_name: class.name.clone(),
            kind: class.kind,
            super_binary_name: class.superclass.clone(),
            interfaces: class.interfaces.clone(),
        })
    }

    fn declared_methods(&self, binary_name: &str) -> Vec<DeclaredMethod> {
        self.find(binary_name)
            .map(|class| class.methods.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn class(name: &str, superclass: Option<&str>, interfaces: &[&str]) -> ClassDefinition {
        ClassDefinition {
            name: name.to_string(),
            kind: ClassKind::Class,
            superclass: superclass.map(str::to_string),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            methods: Vec::new(),
        }
    }

    #[test]
    fn shared_interfaces_load_as_one_node() {
        let mut provider = StaticClassProvider::new();
        provider
            .define(ClassDefinition {
                kind: ClassKind::Interface,
                ..class("Root", None, &[])
            })
            .define(ClassDefinition {
                kind: ClassKind::Interface,
                ..class("Left", None, &["Root"])
            })
            .define(ClassDefinition {
                kind: ClassKind::Interface,
                ..class("Right", None, &["Root"])
            })
            .define(class("Impl", None, &["Left", "Right"]));

        let mut loader = HierarchyLoader::new(Arc::new(provider));
        let node = loader.ensure_class("Impl").unwrap();
        let left_root = &node.interfaces()[0].interfaces()[0];
        let right_root = &node.interfaces()[1].interfaces()[0];
        assert!(left_root.ptr_eq(right_root));
        assert!(left_root.is_interface());
        assert_eq!(left_root.kind(), ClassKind::Interface);
        assert_eq!(node.kind(), ClassKind::Class);
    }

    #[test]
    fn rejects_cycles_and_unknown_classes() {
        let mut provider = StaticClassProvider::new();
        provider
            .define(class("A", Some("B"), &[]))
            .define(class("B", Some("A"), &[]))
            .define(class("C", Some("Missing"), &[]));
        let mut loader = HierarchyLoader::new(Arc::new(provider));

        assert!(matches!(
            loader.ensure_class("A"),
            Err(ProxyError::CyclicHierarchy { class }) if class == "A"
        ));
        assert!(matches!(
            loader.ensure_class("C"),
            Err(ProxyError::UnknownClass { name }) if name == "Missing"
        ));
    }

    struct CountingProvider {
        inner: StaticClassProvider,
        listings: AtomicUsize,
    }

    impl ClassProvider for CountingProvider {
        fn lookup_class(&self, binary_name: &str) -> Option<ClassStub> {
            self.inner.lookup_class(binary_name)
        }

        fn declared_methods(&self, binary_name: &str) -> Vec<DeclaredMethod> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            self.inner.declared_methods(binary_name)
        }
    }

    #[test]
    fn declared_methods_are_listed_lazily_and_once() {
        let mut inner = StaticClassProvider::new();
        inner.define(ClassDefinition {
            methods: vec![DeclaredMethod::new("run", Vec::new(), ReturnShape::Void)],
            ..class("Task", None, &[])
        });
        let provider = Arc::new(CountingProvider {
            inner,
            listings: AtomicUsize::new(0),
        });

        let mut loader = HierarchyLoader::new(provider.clone());
        let node = loader.ensure_class("Task").unwrap();
        assert_eq!(provider.listings.load(Ordering::SeqCst), 0);

        assert_eq!(node.declared_methods().len(), 1);
        assert_eq!(node.declared_methods()[0].name, "run");
        assert_eq!(provider.listings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn eagerly_built_nodes_keep_their_methods() {
        let methods = vec![
            DeclaredMethod::new("open", Vec::new(), ReturnShape::Void),
            DeclaredMethod::new("close", Vec::new(), ReturnShape::Void),
        ];
        let node = ClassNode::new("Door", ClassKind::Class, None, Vec::new(), methods.clone());

        assert_eq!(node.kind(), ClassKind::Class);
        assert_eq!(node.declared_methods(), &methods[..]);
    }
}
