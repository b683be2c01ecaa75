//! Configuration snapshots and customizer chains.
//!
//! The dispatch core consumes configuration only through a copy-and-mutate
//! contract: a [`ConfigSnapshot`] is a typed map of entries that can produce
//! an independent copy of itself, and a [`ConfigCustomizer`] mutates the copy
//! it is handed - never the parent. Customizers compose into an ordered
//! [`ConfigCustomizerChain`], applied first-registered-first.
//!
//! Instance-level customization runs once when an extension instance is
//! created; method-level customization runs on every invocation against a
//! fresh copy of the instance-level result, so per-call changes never
//! accumulate.

use crate::descriptor::{MethodDecl, TypeDescriptor};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A clonable, typed entry stored in a [`ConfigSnapshot`].
///
/// Blanket-implemented for every `Clone + Send + Sync + 'static` type; user
/// configuration sections just derive `Clone`.
pub trait ConfigEntry: Any + Send + Sync {
    /// Produce an independent copy of this entry.
    fn clone_entry(&self) -> Box<dyn ConfigEntry>;

    /// Typed view for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable typed view for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + Send + Sync> ConfigEntry for T {
    fn clone_entry(&self) -> Box<dyn ConfigEntry> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A mutation-isolated configuration snapshot.
///
/// Copies share nothing with their parent: mutating a copy never leaks
/// upstream, and a parent mutated after the copy never leaks downstream.
#[derive(Default)]
pub struct ConfigSnapshot {
    entries: HashMap<TypeId, Box<dyn ConfigEntry>>,
}

impl ConfigSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce an independent, mutation-isolated copy.
    pub fn create_copy(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(id, entry)| (*id, ConfigEntry::clone_entry(entry.as_ref())))
                .collect(),
        }
    }

    /// Typed lookup of a configuration section.
    pub fn get<C: ConfigEntry>(&self) -> Option<&C> {
        self.entries
            .get(&TypeId::of::<C>())
            .and_then(|entry| <dyn Any>::downcast_ref(ConfigEntry::as_any(entry.as_ref())))
    }

    /// Mutable typed lookup of a configuration section.
    pub fn get_mut<C: ConfigEntry>(&mut self) -> Option<&mut C> {
        self.entries
            .get_mut(&TypeId::of::<C>())
            .and_then(|entry| entry.as_any_mut().downcast_mut())
    }

    /// Fetch a section, inserting its default first if absent.
    pub fn get_or_default<C: ConfigEntry + Default>(&mut self) -> &mut C {
        let entry = self
            .entries
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Box::new(C::default()));
        match entry.as_any_mut().downcast_mut() {
            Some(section) => section,
            // Entries are keyed by their own TypeId.
            None => unreachable!("config entry stored under a foreign TypeId"),
        }
    }

    /// Insert or replace a configuration section.
    pub fn put<C: ConfigEntry>(&mut self, section: C) {
        self.entries.insert(TypeId::of::<C>(), Box::new(section));
    }

    /// Number of stored sections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no sections are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigSnapshot({} entries)", self.entries.len())
    }
}

/// A function over a mutable configuration snapshot.
pub trait ConfigCustomizer: Send + Sync + 'static {
    /// Mutate the given snapshot. The snapshot is always a copy scoped to
    /// one instance or one invocation, never shared ambient state.
    fn customize(&self, config: &mut ConfigSnapshot);
}

impl<F> ConfigCustomizer for F
where
    F: Fn(&mut ConfigSnapshot) + Send + Sync + 'static,
{
    fn customize(&self, config: &mut ConfigSnapshot) {
        (self)(config)
    }
}

/// An ordered set of customizers, applied in registration order.
#[derive(Clone, Default)]
pub struct ConfigCustomizerChain {
    customizers: Vec<Arc<dyn ConfigCustomizer>>,
}

impl ConfigCustomizerChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a customizer.
    pub fn add(&mut self, customizer: Arc<dyn ConfigCustomizer>) {
        self.customizers.push(customizer);
    }

    /// Number of customizers in the chain.
    pub fn len(&self) -> usize {
        self.customizers.len()
    }

    /// True if the chain holds no customizers.
    pub fn is_empty(&self) -> bool {
        self.customizers.is_empty()
    }
}

impl ConfigCustomizer for ConfigCustomizerChain {
    fn customize(&self, config: &mut ConfigSnapshot) {
        for customizer in &self.customizers {
            customizer.customize(config);
        }
    }
}

impl fmt::Debug for ConfigCustomizerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigCustomizerChain({})", self.customizers.len())
    }
}

/// Derives configuration customizers from extension types and methods.
///
/// Registered on the registry; consulted once per metadata build to seed the
/// instance-level chain and the per-method chains.
pub trait ConfigCustomizerFactory: Send + Sync + 'static {
    /// Customizers applied once per extension instance.
    fn for_type(&self, ty: &TypeDescriptor) -> Vec<Arc<dyn ConfigCustomizer>> {
        let _ = ty;
        Vec::new()
    }

    /// Customizers applied on every invocation of `method`.
    fn for_method(
        &self,
        ty: &TypeDescriptor,
        method: &MethodDecl,
    ) -> Vec<Arc<dyn ConfigCustomizer>> {
        let _ = (ty, method);
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigCustomizer, ConfigCustomizerChain, ConfigSnapshot};
    use std::sync::Arc;

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Label(String);

    #[test]
    fn copies_are_mutation_isolated() {
        let mut parent = ConfigSnapshot::new();
        parent.put(Label("parent".into()));

        let mut copy = parent.create_copy();
        copy.get_or_default::<Label>().0 = "child".into();

        assert_eq!(parent.get::<Label>(), Some(&Label("parent".into())));
        assert_eq!(copy.get::<Label>(), Some(&Label("child".into())));
    }

    #[test]
    fn chain_applies_in_registration_order() {
        let mut chain = ConfigCustomizerChain::new();
        chain.add(Arc::new(|config: &mut ConfigSnapshot| {
            config.get_or_default::<Label>().0.push('a');
        }));
        chain.add(Arc::new(|config: &mut ConfigSnapshot| {
            config.get_or_default::<Label>().0.push('b');
        }));

        let mut config = ConfigSnapshot::new();
        chain.customize(&mut config);
        assert_eq!(config.get::<Label>(), Some(&Label("ab".into())));
    }

    #[test]
    fn get_or_default_inserts_once() {
        let mut config = ConfigSnapshot::new();
        config.get_or_default::<Label>().0 = "set".into();
        assert_eq!(config.len(), 1);
        assert_eq!(config.get_or_default::<Label>().0, "set");
    }
}
