use crate::descriptor::Descriptor;
use crate::error::{ProxyError, Result};
use crate::hierarchy::{ClassNode, MethodRecord};
use crate::locator::MethodLocator;
use crate::surrogate::ProxyInstance;

/// Resolves the two methods an interception stub needs and stores them at `slots[index]` and
/// `slots[index + 1]`.
///
/// `slots[index]` receives the implementation inherited from `class`'s ancestors
/// ([`MethodLocator::find_super_method`]); `slots[index + 1]` receives `this_method` declared by
/// `class` itself, or `None` when no name is given. Either lookup failing fails the whole call,
/// after which the caller must treat `slots` as unusable.
pub fn resolve_pair(
    class: &ClassNode,
    super_method: &str,
    this_method: Option<&str>,
    index: usize,
    descriptor: &Descriptor,
    slots: &mut [Option<MethodRecord>],
) -> Result<()> {
    MethodLocator::default().resolve_pair(class, super_method, this_method, index, descriptor, slots)
}

/// [`resolve_pair`] on the runtime class of a proxy instance.
pub fn resolve_pair_for_instance(
    instance: &dyn ProxyInstance,
    super_method: &str,
    this_method: Option<&str>,
    index: usize,
    descriptor: &Descriptor,
    slots: &mut [Option<MethodRecord>],
) -> Result<()> {
    resolve_pair(
        &instance.proxy_class(),
        super_method,
        this_method,
        index,
        descriptor,
        slots,
    )
}

impl MethodLocator {
    pub fn resolve_pair(
        &self,
        class: &ClassNode,
        super_method: &str,
        this_method: Option<&str>,
        index: usize,
        descriptor: &Descriptor,
        slots: &mut [Option<MethodRecord>],
    ) -> Result<()> {
        if index.checked_add(1).map_or(true, |this_index| this_index >= slots.len()) {
            return Err(ProxyError::SlotOutOfRange {
                index,
                len: slots.len(),
            });
        }

        // The declared side is never looked up once the inherited side has failed.
        let inherited = self.find_super_method(class, super_method, descriptor)?;
        let declared = match this_method {
            Some(name) => Some(self.find_declared(class, name, descriptor)?),
            None => None,
        };

        tracing::trace!(
            target: "nova.proxy",
            class = %class,
            index,
            super_method = %inherited,
            this_method = ?declared.as_ref().map(|m| m.to_string()),
            "resolved method pair"
        );
        slots[index] = Some(inherited);
        slots[index + 1] = declared;
        Ok(())
    }
}
