//! Extension factories: capability providers for extension types.
//!
//! An [`ExtensionFactory`] decides whether it can produce instances of a
//! given extension type, and either backs them with a concrete
//! [`ExtensionObject`] (a non-virtual factory) or relies entirely on handler
//! resolution to cover the type's surface (a proxy factory, the default).

use crate::descriptor::TypeDescriptor;
use crate::error::{BoxError, ExtensionError};
use crate::handle::HandleSupplier;
use crate::handler::{ExtensionObject, HandlerCustomizer, HandlerFactory};
use crate::metadata::MetadataBuilder;
use bitflags::bitflags;
use std::any::Any;
use std::sync::Arc;

bitflags! {
    /// Behavior flags declared by an extension factory.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FactoryFlags: u8 {
        /// The factory attaches a concrete backing instance; methods not
        /// claimed by a handler factory dispatch onto it directly.
        const NON_VIRTUAL = 1 << 0;
    }
}

/// A capability provider deciding whether it can produce instances of a
/// given extension type.
///
/// Factories are registered once, live for the lifetime of the enclosing
/// registry lineage, and must be immutable after registration.
pub trait ExtensionFactory: Any + Send + Sync {
    /// True if the factory can process the given extension type.
    fn accepts(&self, ty: &TypeDescriptor) -> bool;

    /// Attach a backing instance for the extension type.
    ///
    /// Only called for factories declaring [`FactoryFlags::NON_VIRTUAL`].
    /// The supplier may lazily open a handle on first access; implementors
    /// must not fetch it before it is needed.
    fn attach(
        &self,
        ty: &TypeDescriptor,
        handle: &Arc<dyn HandleSupplier>,
    ) -> Result<Box<dyn ExtensionObject>, BoxError> {
        let _ = handle;
        Err(Box::new(ExtensionError::NoBackingInstance {
            type_name: ty.name(),
        }))
    }

    /// Handler factories consulted for this factory's types before the
    /// globally registered chain.
    fn handler_factories(&self) -> Vec<Arc<dyn HandlerFactory>> {
        Vec::new()
    }

    /// Handler customizers applied to this factory's resolved handlers
    /// before the globally registered ones.
    fn handler_customizers(&self) -> Vec<Arc<dyn HandlerCustomizer>> {
        Vec::new()
    }

    /// Behavior flags. The default is a proxy factory.
    fn flags(&self) -> FactoryFlags {
        FactoryFlags::empty()
    }

    /// Seed the metadata being built for one of this factory's types.
    ///
    /// Explicit per-method handlers added here take priority over the whole
    /// handler-resolution chain; instance and method config customizers
    /// added here run before any registered customizer factory's.
    fn build_metadata(&self, builder: &mut MetadataBuilder) {
        let _ = builder;
    }
}
