//! Handlers: the bound unit of execution for one extension method.
//!
//! A [`ExtensionHandler`] executes exactly one method on an extension type.
//! Handlers are produced by [`HandlerFactory`] instances consulted in a
//! priority chain, optionally wrapped by [`HandlerCustomizer`]s, and bound
//! into immutable metadata as a [`ResolvedHandler`].
//!
//! "No handler found" is not a special case threaded through the dispatch
//! path: it is the [`ResolvedHandler::Missing`] variant, invoked exactly like
//! a bound handler and raising the misconfiguration error from inside the
//! same invocation path.

use crate::config::ConfigSnapshot;
use crate::descriptor::{MethodDecl, MethodKey, TypeDescriptor};
use crate::error::{BoxError, ExtensionError};
use crate::handle::HandleSupplier;
use crate::value::{Args, Value, into_value};
use std::fmt;
use std::sync::Arc;

/// A backing implementation instance attached by a non-virtual factory.
///
/// This is the dynamic-invocation seam: the instance-dispatch backstop
/// forwards any method not claimed by a handler factory to
/// [`invoke_method`](ExtensionObject::invoke_method) on the attached object.
pub trait ExtensionObject: Send + Sync + 'static {
    /// Execute the method identified by `method` on this instance.
    fn invoke_method(&self, method: &MethodKey, args: Args) -> Result<Value, BoxError>;
}

/// The bound unit of execution for exactly one extension method.
///
/// Implementable directly, or as a plain closure:
///
/// ```rust,ignore
/// let handler = |_: &dyn HandleSupplier, _: Option<&dyn ExtensionObject>, _: Args| {
///     Ok(into_value("hi".to_string()))
/// };
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot handle extension method invocations",
    label = "missing `ExtensionHandler` implementation",
    note = "Handlers must implement `invoke`, or be a closure over (&dyn HandleSupplier, Option<&dyn ExtensionObject>, Args)."
)]
pub trait ExtensionHandler: Send + Sync + 'static {
    /// Execute the method.
    ///
    /// `target` is the backing instance for non-virtual attachments, absent
    /// for pure proxy dispatch. Handlers that do not need the database
    /// handle must not query `handle` for it; acquisition may be expensive
    /// and is strictly lazy.
    fn invoke(
        &self,
        handle: &dyn HandleSupplier,
        target: Option<&dyn ExtensionObject>,
        args: Args,
    ) -> Result<Value, BoxError>;

    /// One-time hook run at metadata-build time, so a misconfigured handler
    /// fails when the extension type is first used instead of deep inside a
    /// later call stack.
    fn warm(&self, config: &ConfigSnapshot) -> Result<(), BoxError> {
        let _ = config;
        Ok(())
    }
}

impl<F> ExtensionHandler for F
where
    F: Fn(&dyn HandleSupplier, Option<&dyn ExtensionObject>, Args) -> Result<Value, BoxError>
        + Send
        + Sync
        + 'static,
{
    fn invoke(
        &self,
        handle: &dyn HandleSupplier,
        target: Option<&dyn ExtensionObject>,
        args: Args,
    ) -> Result<Value, BoxError> {
        (self)(handle, target, args)
    }
}

/// A handler that does nothing and yields `()`.
///
/// Installed for the synthesized finalizer entry on dispatch proxies.
pub fn noop_handler() -> Arc<dyn ExtensionHandler> {
    Arc::new(
        |_: &dyn HandleSupplier, _: Option<&dyn ExtensionObject>, _: Args| Ok(into_value(())),
    )
}

/// Produces handlers for (extension type, method) pairs.
///
/// Factories are stateless and referentially shared across metadata builds;
/// a chain of them is consulted in priority order, and the first factory
/// that accepts a pair *and* returns a handler wins.
pub trait HandlerFactory: Send + Sync + 'static {
    /// True if this factory may be able to handle the pair.
    fn accepts(&self, ty: &TypeDescriptor, method: &MethodDecl) -> bool;

    /// Build the handler, or decline and let the chain continue.
    fn build(&self, ty: &TypeDescriptor, method: &MethodDecl) -> Option<Arc<dyn ExtensionHandler>>;
}

/// Wraps a resolved handler before it is bound into metadata.
///
/// Customizers run after resolution and compose in consultation order, most
/// recently registered first.
pub trait HandlerCustomizer: Send + Sync + 'static {
    /// Return the handler to bind in place of `handler`.
    fn customize(
        &self,
        handler: Arc<dyn ExtensionHandler>,
        ty: &TypeDescriptor,
        method: &MethodDecl,
    ) -> Arc<dyn ExtensionHandler>;
}

/// The binding recorded in metadata for one method.
///
/// `Missing` is a deferred sentinel, not an absence: invoking it raises the
/// misconfiguration error naming the declaring type and method, through the
/// same path as any bound handler.
#[derive(Clone)]
pub enum ResolvedHandler {
    /// A handler was produced for the method.
    Bound(Arc<dyn ExtensionHandler>),
    /// No factory in the chain claimed the method.
    Missing {
        /// Name of the declaring extension type.
        type_name: &'static str,
        /// The unresolvable method.
        method: MethodKey,
    },
}

impl ResolvedHandler {
    /// Invoke the binding.
    pub fn invoke(
        &self,
        handle: &dyn HandleSupplier,
        target: Option<&dyn ExtensionObject>,
        args: Args,
    ) -> Result<Value, BoxError> {
        match self {
            ResolvedHandler::Bound(handler) => handler.invoke(handle, target, args),
            ResolvedHandler::Missing { type_name, method } => {
                Err(Box::new(ExtensionError::MissingHandler {
                    type_name: *type_name,
                    method: method.to_string(),
                }))
            }
        }
    }

    /// Run the warm hook of a bound handler. Missing sentinels warm to
    /// nothing; whether they are an error at build time is the caller's
    /// fail-fast policy.
    pub fn warm(&self, config: &ConfigSnapshot) -> Result<(), BoxError> {
        match self {
            ResolvedHandler::Bound(handler) => handler.warm(config),
            ResolvedHandler::Missing { .. } => Ok(()),
        }
    }

    /// True for the missing sentinel.
    pub fn is_missing(&self) -> bool {
        matches!(self, ResolvedHandler::Missing { .. })
    }

    /// The misconfiguration error this sentinel raises, if it is one.
    pub fn missing_error(&self) -> Option<ExtensionError> {
        match self {
            ResolvedHandler::Bound(_) => None,
            ResolvedHandler::Missing { type_name, method } => {
                Some(ExtensionError::MissingHandler {
                    type_name: *type_name,
                    method: method.to_string(),
                })
            }
        }
    }

    /// Identity of the bound handler, for binding-stability assertions.
    pub fn handler_identity(&self) -> Option<usize> {
        match self {
            ResolvedHandler::Bound(handler) => {
                Some(Arc::as_ptr(handler) as *const () as usize)
            }
            ResolvedHandler::Missing { .. } => None,
        }
    }
}

impl fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedHandler::Bound(_) => f.write_str("ResolvedHandler::Bound"),
            ResolvedHandler::Missing { type_name, method } => {
                write!(f, "ResolvedHandler::Missing({type_name}.{method})")
            }
        }
    }
}
