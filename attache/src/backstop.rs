//! Built-in handler factories consulted after every registered one.
//!
//! Two backstops close the resolution chain: interface-provided (default)
//! method bodies dispatch to themselves, and - for non-virtual factories
//! only - anything left dispatches directly onto the attached backing
//! instance. Methods that fall through both are bound to the missing-handler
//! sentinel by the metadata builder.

use attache_core::{
    Args, BoxError, ExtensionError, ExtensionHandler, ExtensionObject, HandleSupplier,
    HandlerFactory, MethodDecl, MethodKey, TypeDescriptor, Value,
};
use std::sync::Arc;

/// Binds interface-provided (default) methods to their own declared body.
pub(crate) struct ProvidedMethodHandlerFactory;

impl HandlerFactory for ProvidedMethodHandlerFactory {
    fn accepts(&self, _ty: &TypeDescriptor, method: &MethodDecl) -> bool {
        method.provided_body().is_some()
    }

    fn build(
        &self,
        _ty: &TypeDescriptor,
        method: &MethodDecl,
    ) -> Option<Arc<dyn ExtensionHandler>> {
        method.provided_body().cloned()
    }
}

/// Binds any remaining method to a direct invocation on the backing
/// instance attached by a non-virtual factory.
pub(crate) struct InstanceMethodHandlerFactory;

impl HandlerFactory for InstanceMethodHandlerFactory {
    fn accepts(&self, _ty: &TypeDescriptor, _method: &MethodDecl) -> bool {
        true
    }

    fn build(
        &self,
        ty: &TypeDescriptor,
        method: &MethodDecl,
    ) -> Option<Arc<dyn ExtensionHandler>> {
        Some(Arc::new(InstanceMethodHandler {
            type_name: ty.name(),
            method: method.key(),
        }))
    }
}

struct InstanceMethodHandler {
    type_name: &'static str,
    method: MethodKey,
}

impl ExtensionHandler for InstanceMethodHandler {
    fn invoke(
        &self,
        _handle: &dyn HandleSupplier,
        target: Option<&dyn ExtensionObject>,
        args: Args,
    ) -> Result<Value, BoxError> {
        match target {
            Some(instance) => instance.invoke_method(&self.method, args),
            None => Err(Box::new(ExtensionError::NoBackingInstance {
                type_name: self.type_name,
            })),
        }
    }
}
