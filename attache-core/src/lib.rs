//! # attache-core
//!
//! Core contracts for the Attache extension dispatch framework.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! extension authors - handler implementations, factories, and collaborator
//! stubs - without pulling in the full `attache` registry.
//!
//! # Dispatch Model
//!
//! An *extension type* is a capability interface a caller wants to use
//! against a database handle, described at runtime by a
//! [`TypeDescriptor`]. Dispatch is resolved in three layers:
//!
//! ## Layer 1: Factories ([`ExtensionFactory`])
//!
//! A factory decides whether it can produce instances of an extension type,
//! and whether those instances are backed by a concrete object
//! ([`FactoryFlags::NON_VIRTUAL`]) or synthesized purely from handlers.
//!
//! ## Layer 2: Handler Resolution ([`HandlerFactory`])
//!
//! For every declared method, a chain of handler factories is consulted in
//! priority order until one produces the [`ExtensionHandler`] bound to that
//! method. Methods nothing claims are bound to the
//! [`ResolvedHandler::Missing`] sentinel, which raises a misconfiguration
//! error through the ordinary invocation path.
//!
//! ## Layer 3: Metadata ([`ExtensionMetadata`])
//!
//! The resolved bindings and config customizer chains freeze into an
//! immutable, per-type record, built once and shared for the life of the
//! registry lineage it was built from.
//!
//! # Error Types
//!
//! - [`ExtensionError`] - every failure the dispatch core raises itself
//! - [`BoxError`] - opaque handler and collaborator failures

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod config;
mod descriptor;
mod error;
mod factory;
mod handle;
mod handler;
mod metadata;
mod value;

// Re-exports
pub use config::{
    ConfigCustomizer, ConfigCustomizerChain, ConfigCustomizerFactory, ConfigEntry, ConfigSnapshot,
};
pub use descriptor::{
    ExtensionType, MethodDecl, MethodFlags, MethodKey, ParamSpec, TypeDescriptor,
    TypeDescriptorBuilder,
};
pub use error::{BoxError, ExtensionError};
pub use factory::{ExtensionFactory, FactoryFlags};
pub use handle::{ContextBody, ExtensionContext, HandleSupplier};
pub use handler::{
    ExtensionHandler, ExtensionObject, HandlerCustomizer, HandlerFactory, ResolvedHandler,
    noop_handler,
};
pub use metadata::{ExtensionMetadata, MetadataBuilder};
pub use value::{Args, Value, into_value};
