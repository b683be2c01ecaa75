//! The handle-supplier collaborator contract.
//!
//! The dispatch core never opens or owns the underlying database handle. A
//! [`HandleSupplier`] yields it lazily, exposes the ambient configuration,
//! and scopes each dispatched call under an [`ExtensionContext`] so that
//! observability state is set up and torn down on every exit path.

use crate::config::ConfigSnapshot;
use crate::descriptor::MethodKey;
use crate::error::BoxError;
use crate::value::Value;
use std::any::Any;
use std::fmt;

/// Identifies one dispatched call: the extension type, the method, and the
/// configuration scoped to this invocation.
///
/// The dispatch core conditions no behavior on the contents; suppliers use
/// it for logging, tracing, and to expose the scoped configuration to the
/// executing handler.
pub struct ExtensionContext {
    config: ConfigSnapshot,
    extension_type: &'static str,
    method: MethodKey,
}

impl ExtensionContext {
    /// Build the context for one method invocation.
    pub fn for_method(
        config: ConfigSnapshot,
        extension_type: &'static str,
        method: MethodKey,
    ) -> Self {
        Self {
            config,
            extension_type,
            method,
        }
    }

    /// The invocation-scoped configuration.
    pub fn config(&self) -> &ConfigSnapshot {
        &self.config
    }

    /// Name of the extension type being dispatched.
    pub fn extension_type(&self) -> &'static str {
        self.extension_type
    }

    /// The method being dispatched.
    pub fn method(&self) -> &MethodKey {
        &self.method
    }
}

impl fmt::Display for ExtensionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.extension_type, self.method)
    }
}

impl fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("extension_type", &self.extension_type)
            .field("method", &self.method)
            .field("config", &self.config)
            .finish()
    }
}

/// The body executed under a context scope.
pub type ContextBody<'a> = Box<dyn FnOnce() -> Result<Value, BoxError> + 'a>;

/// Lazily yields the underlying database handle and the ambient
/// configuration, and scopes dispatched calls.
pub trait HandleSupplier: Send + Sync + 'static {
    /// The ambient configuration this supplier was created under.
    fn config(&self) -> &ConfigSnapshot;

    /// The underlying handle, opened on first access.
    ///
    /// Opening may be expensive; the dispatch core never calls this
    /// speculatively. The handle's concrete type is the supplier's affair.
    fn handle(&self) -> Result<&dyn Any, BoxError>;

    /// Run `body` scoped under `context`.
    ///
    /// Implementations must guarantee context teardown on every exit path:
    /// normal return, handler failure, and unwinding alike. Failures from
    /// `body` pass through unchanged.
    fn invoke_in_context(
        &self,
        context: &ExtensionContext,
        body: ContextBody<'_>,
    ) -> Result<Value, BoxError>;
}
