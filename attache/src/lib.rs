//! # attache - Extension Dispatch for Database Handles
//!
//! `attache` lets arbitrary capability interfaces become callable, stateful
//! *extension objects* bound to a database handle. Per-type and per-method
//! behavior is resolved through an ordered, pluggable chain of factories,
//! frozen into cached metadata, and invoked through an eagerly built
//! dispatch table - no reflection, no hand-written backing types.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use attache::{ExtensionRegistry, args};
//!
//! let registry = ExtensionRegistry::new();
//! registry.register(GreeterFactory);
//!
//! let greeter = registry.find_for_type::<Greeter>(&supplier)?.unwrap();
//! let reply = greeter.invoke("say_hi", args![])?;
//! ```
//!
//! ## Resolution Order
//!
//! For every declared method, the first of these to produce a handler wins:
//!
//! 1. explicit handlers the owning factory seeded into the metadata builder
//! 2. the owning factory's own handler factories
//! 3. globally registered handler factories, most recently registered first
//! 4. the built-in backstops: interface-provided method bodies, then - for
//!    non-virtual factories - direct dispatch onto the backing instance
//!
//! Methods nothing claims are bound to a deferred sentinel that fails at
//! first invocation, or at construction under fail-fast mode.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod backstop;
mod proxy;
mod registry;
pub mod testing;

// Re-exports
pub use attache_core::{
    Args,
    BoxError,
    ConfigCustomizer,
    ConfigCustomizerChain,
    ConfigCustomizerFactory,
    ConfigEntry,
    ConfigSnapshot,
    ContextBody,
    ExtensionContext,
    ExtensionError,
    ExtensionFactory,
    ExtensionHandler,
    ExtensionMetadata,
    ExtensionObject,
    ExtensionType,
    FactoryFlags,
    HandleSupplier,
    HandlerCustomizer,
    HandlerFactory,
    MetadataBuilder,
    MethodDecl,
    MethodFlags,
    MethodKey,
    ParamSpec,
    ResolvedHandler,
    TypeDescriptor,
    TypeDescriptorBuilder,
    Value,
    args,
    into_value,
    noop_handler,
};

pub use proxy::{ExtensionProxy, HandlerInvoker, ProxyToken};
pub use registry::ExtensionRegistry;
