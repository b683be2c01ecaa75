//! Error types for Attache.
//!
//! This module provides the structured error taxonomy for the extension
//! dispatch core, built on `thiserror`:
//!
//! - [`ExtensionError`] - every failure the dispatch core can raise itself
//! - [`BoxError`] - opaque failures raised by handlers and collaborators
//!
//! Handler execution failures are never rewrapped in a way that obscures the
//! original error: they travel through the [`ExtensionError::Execution`]
//! variant, which is transparent for both `Display` and `source`.

use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures raised by the extension dispatch core.
#[derive(Error, Debug)]
pub enum ExtensionError {
    /// An extension type declares the same method signature more than once
    /// with no overriding declaration. Fatal at metadata construction.
    #[error("{type_name} has ambiguous method {signature}, resolve with an explicit override")]
    AmbiguousMethods {
        /// Name of the offending extension type.
        type_name: &'static str,
        /// The duplicated method signature.
        signature: String,
    },

    /// No handler factory produced a handler for a declared method. Raised
    /// lazily at first invocation, or at metadata construction under
    /// fail-fast mode.
    #[error("method {type_name}.{method} has no registered extension handler")]
    MissingHandler {
        /// Name of the declaring extension type.
        type_name: &'static str,
        /// The unresolvable method.
        method: String,
    },

    /// Proxy creation was requested while disallowed for the registry.
    #[error("creating extension proxies is disallowed for this registry")]
    ProxyDisallowed,

    /// Instance dispatch was invoked without a backing instance.
    #[error("no backing instance for {type_name}, attached through a proxy factory?")]
    NoBackingInstance {
        /// Name of the extension type.
        type_name: &'static str,
    },

    /// An invocation named a method the extension type does not declare.
    #[error("{type_name} declares no method matching {method}")]
    UnknownMethod {
        /// Name of the extension type.
        type_name: &'static str,
        /// The requested method description.
        method: String,
    },

    /// An invocation supplied the wrong number of arguments.
    #[error("method {type_name}.{method} takes {expected} arguments, {actual} were supplied")]
    ArityMismatch {
        /// Name of the extension type.
        type_name: &'static str,
        /// The invoked method.
        method: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// A handler's warm-up hook failed during metadata construction.
    #[error("handler for {type_name}.{method} failed to warm up")]
    Warm {
        /// Name of the extension type.
        type_name: &'static str,
        /// The method whose handler failed.
        method: String,
        /// The underlying warm-up failure.
        #[source]
        source: BoxError,
    },

    /// An extension factory failed to attach a backing instance.
    #[error("factory failed to attach {type_name}")]
    Attach {
        /// Name of the extension type.
        type_name: &'static str,
        /// The underlying attach failure.
        #[source]
        source: BoxError,
    },

    /// A failure raised by a handler or collaborator, passed through with
    /// its identity intact.
    #[error(transparent)]
    Execution(BoxError),
}

impl ExtensionError {
    /// Recover a typed dispatch error from a boxed one.
    ///
    /// Errors that originated inside the dispatch core (e.g. the missing
    /// handler sentinel) come back as their own variant instead of being
    /// wrapped a second time; everything else passes through as
    /// [`ExtensionError::Execution`].
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<ExtensionError>() {
            Ok(err) => *err,
            Err(err) => ExtensionError::Execution(err),
        }
    }
}
