use crate::descriptor::Descriptor;

pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors produced while resolving methods, encoding descriptors, or building surrogates.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The requested `(name, descriptor)` does not exist in the searched scope.
    ///
    /// `class` is always the class the caller queried, even when the search bottomed out
    /// somewhere deep in the interface graph.
    #[error("not found {name}:{descriptor} in {class}")]
    NotFound {
        class: String,
        name: String,
        descriptor: Descriptor,
    },

    #[error("bad type: {type_name}")]
    BadType { type_name: String },

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("cannot make a surrogate of {class}: instance exposes no method handler")]
    InvalidSurrogate { class: String },

    #[error("no filter signature registered for proxy class {class}")]
    MissingFilterSignature { class: String },

    #[error("method handler of {class} has no persistent key")]
    UnpersistableHandler { class: String },

    #[error("unknown persisted method handler {key}")]
    UnknownHandler { key: String },

    #[error("unknown class {name}")]
    UnknownClass { name: String },

    #[error("cyclic class hierarchy through {class}")]
    CyclicHierarchy { class: String },

    #[error("hierarchy of {class} exceeds the maximum search depth of {limit}")]
    HierarchyTooDeep { class: String, limit: usize },

    #[error("method slot {index} (and {index} + 1) out of range for {len} slots")]
    SlotOutOfRange { index: usize, len: usize },

    #[error("surrogate encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl ProxyError {
    pub(crate) fn not_found(class: &str, name: &str, descriptor: &Descriptor) -> Self {
        ProxyError::NotFound {
            class: class.to_string(),
            name: name.to_string(),
            descriptor: descriptor.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProxyError::NotFound { .. })
    }
}
